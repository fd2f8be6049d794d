//! Newline-delimited JSON chunk records: one `{id, text, metadata}` per line.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::Chunk;

pub fn write_jsonl(chunks: &[Chunk], out: &Path) -> Result<usize> {
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut w = BufWriter::new(File::create(out)?);
    for chunk in chunks {
        let line = serde_json::to_string(chunk).map_err(|e| Error::Operation(e.to_string()))?;
        w.write_all(line.as_bytes())?;
        w.write_all(b"\n")?;
    }
    w.flush()?;
    Ok(chunks.len())
}

/// Read every record or fail on the first malformed line. Blank lines are skipped.
pub fn read_jsonl(path: &Path) -> Result<Vec<Chunk>> {
    if !path.is_file() {
        return Err(Error::NotFound(format!("chunk file {}", path.display())));
    }
    parse_jsonl(BufReader::new(File::open(path)?))
}

pub fn parse_jsonl<R: BufRead>(reader: R) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let chunk: Chunk = serde_json::from_str(&line)
            .map_err(|e| Error::MalformedRecord { line: idx + 1, reason: e.to_string() })?;
        if chunk.id.is_empty() {
            return Err(Error::MalformedRecord { line: idx + 1, reason: "empty id".into() });
        }
        chunks.push(chunk);
    }
    Ok(chunks)
}
