//! Heading-aware Markdown splitter.
//!
//! A document is cut at every line that starts with one or more `#`
//! followed by whitespace. Each section is `heading + "\n" + body`, trimmed.
//! Text before the first heading forms a section of its own. Sections longer
//! than `max_chars` characters are hard-sliced into `max_chars` pieces plus a
//! trailing remainder.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkMetadata, Document};

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#+[ \t].*$").expect("heading pattern compiles"));

pub const DEFAULT_MAX_CHARS: usize = 1800;

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    max_chars: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self { max_chars: DEFAULT_MAX_CHARS }
    }
}

impl Chunker {
    pub fn new(max_chars: usize) -> Result<Self> {
        if max_chars == 0 {
            return Err(Error::InvalidConfig("max_chars must be positive".into()));
        }
        Ok(Self { max_chars })
    }

    /// Split one document into ordered chunks with stable ids.
    pub fn split(&self, doc: &Document) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for section in sections(&doc.text) {
            for piece in hard_slices(&section, self.max_chars) {
                let id = chunk_id(&doc.path, chunks.len(), &piece);
                chunks.push(Chunk { id, text: piece, metadata: ChunkMetadata::for_path(&doc.path) });
            }
        }
        chunks
    }
}

/// Normalised, non-empty sections in document order.
pub fn sections(text: &str) -> Vec<String> {
    let headings: Vec<_> = HEADING.find_iter(text).collect();
    if headings.is_empty() {
        let whole = text.trim();
        return if whole.is_empty() { Vec::new() } else { vec![whole.to_string()] };
    }

    let mut out = Vec::with_capacity(headings.len() + 1);
    let preamble = text[..headings[0].start()].trim();
    if !preamble.is_empty() {
        out.push(preamble.to_string());
    }
    for (i, m) in headings.iter().enumerate() {
        let end = headings.get(i + 1).map_or(text.len(), regex::Match::start);
        let body = &text[m.end()..end];
        let body = body
            .strip_prefix("\r\n")
            .or_else(|| body.strip_prefix('\n'))
            .unwrap_or(body);
        let section = format!("{}\n{}", m.as_str().trim_end(), body);
        let section = section.trim();
        if !section.is_empty() {
            out.push(section.to_string());
        }
    }
    out
}

/// Successive `max_chars`-character slices. Counts chars, never splits a code point.
pub fn hard_slices(section: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = section.chars().collect();
    chars.chunks(max_chars.max(1)).map(|c| c.iter().collect()).collect()
}

/// First 8 bytes of the BLAKE3 digest, hex encoded.
pub fn short_hash(text: &str) -> String {
    let hex = blake3::hash(text.as_bytes()).to_hex();
    hex.as_str()[..16].to_string()
}

pub fn chunk_id(path: &str, index: usize, text: &str) -> String {
    format!("{path}::{index}::{}", short_hash(text))
}
