use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use daybook_core::error::Error;
use daybook_core::traits::{Embedder, VectorCollection};
use daybook_core::types::{ChunkMetadata, QueryResult};

use crate::schema::build_chunk_schema;
use crate::table::{dim_key, ensure_table, get_meta, metric_key, open_db, set_meta, table_exists};

pub const METRIC: &str = "cosine";

/// A LanceDB table bound to cosine distance, driven synchronously through a
/// private current-thread runtime.
pub struct LanceCollection {
    rt: Runtime,
    db: Connection,
    name: String,
    embedder: Box<dyn Embedder>,
}

impl LanceCollection {
    /// Open `name`, creating it (and recording its metric) when absent.
    pub fn open_or_create(db_path: &Path, name: &str, embedder: Box<dyn Embedder>) -> Result<Self> {
        let this = Self::connect(db_path, name, embedder)?;
        this.rt.block_on(this.prepare(true))?;
        Ok(this)
    }

    /// Open an existing collection. A missing one is a configuration error.
    pub fn open(db_path: &Path, name: &str, embedder: Box<dyn Embedder>) -> Result<Self> {
        let this = Self::connect(db_path, name, embedder)?;
        this.rt.block_on(this.prepare(false))?;
        Ok(this)
    }

    fn connect(db_path: &Path, name: &str, embedder: Box<dyn Embedder>) -> Result<Self> {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        let uri = db_path.to_string_lossy().to_string();
        let db = rt
            .block_on(open_db(&uri))
            .map_err(|e| Error::InvalidConfig(format!("cannot open vector store at {uri}: {e}")))?;
        Ok(Self { rt, db, name: name.to_string(), embedder })
    }

    async fn prepare(&self, create: bool) -> Result<()> {
        let dim = self.embedder.dim();
        let exists = table_exists(&self.db, &self.name).await?;
        let metric = get_meta(&self.db, &metric_key(&self.name)).await?;

        match (exists, metric.as_deref()) {
            (_, Some(m)) if m != METRIC => {
                return Err(Error::InvalidConfig(format!(
                    "collection '{}' uses metric '{m}', expected '{METRIC}'",
                    self.name
                ))
                .into());
            }
            (true, None) => {
                return Err(Error::InvalidConfig(format!(
                    "collection '{}' has no recorded distance metric",
                    self.name
                ))
                .into());
            }
            (false, _) if !create => {
                return Err(Error::InvalidConfig(format!("collection '{}' does not exist", self.name)).into());
            }
            _ => {}
        }

        if let Some(stored) = get_meta(&self.db, &dim_key(&self.name)).await? {
            if stored != dim.to_string() {
                return Err(Error::InvalidConfig(format!(
                    "collection '{}' stores {stored}-d vectors but the embedder produces {dim}-d",
                    self.name
                ))
                .into());
            }
        }

        if !exists {
            set_meta(&self.db, &metric_key(&self.name), METRIC).await?;
            set_meta(&self.db, &dim_key(&self.name), &dim.to_string()).await?;
            ensure_table(&self.db, &self.name, build_chunk_schema(dim_i32(dim)?)).await?;
            info!(collection = %self.name, dim, "created collection");
        }
        Ok(())
    }

    fn to_record_batch(&self, ids: &[String], texts: &[String], metadatas: &[ChunkMetadata], vectors: Vec<Vec<f32>>) -> Result<RecordBatch> {
        let dim = dim_i32(self.embedder.dim())?;
        let schema = build_chunk_schema(dim);
        let mut extras = Vec::with_capacity(metadatas.len());
        for m in metadatas {
            extras.push(serde_json::to_string(&m.extra)?);
        }
        let vectors: Vec<Option<Vec<Option<f32>>>> =
            vectors.into_iter().map(|v| Some(v.into_iter().map(Some).collect())).collect();
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ids.to_vec())),
                Arc::new(StringArray::from(texts.to_vec())),
                Arc::new(StringArray::from(metadatas.iter().map(|m| m.path.clone()).collect::<Vec<_>>())),
                Arc::new(StringArray::from(metadatas.iter().map(|m| m.file.clone()).collect::<Vec<_>>())),
                Arc::new(StringArray::from(metadatas.iter().map(|m| m.stem.clone()).collect::<Vec<_>>())),
                Arc::new(StringArray::from(extras)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(
                    vectors.into_iter(),
                    dim,
                )),
            ],
        )?;
        Ok(batch)
    }

    async fn upsert_async(&self, batch: RecordBatch) -> Result<usize> {
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        let table = self.db.open_table(&self.name).execute().await?;
        let mut mi = table.merge_insert(&["id"]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        let res = mi.execute(reader).await?;
        Ok((res.num_inserted_rows + res.num_updated_rows) as usize)
    }

    async fn query_async(&self, vector: Vec<f32>, n: usize) -> Result<QueryResult> {
        let table = self.db.open_table(&self.name).execute().await?;
        if table.count_rows(None).await? == 0 {
            return Ok(QueryResult::default());
        }
        let mut stream = table
            .vector_search(vector)?
            .distance_type(DistanceType::Cosine)
            .limit(n)
            .execute()
            .await?;
        let mut out = QueryResult::default();
        while let Some(batch) = stream.try_next().await? {
            append_rows(&batch, &mut out)?;
        }
        Ok(out)
    }
}

fn dim_i32(dim: usize) -> Result<i32> {
    i32::try_from(dim).map_err(|_| anyhow!("vector width {dim} too large"))
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("column '{name}' missing or not utf8"))
}

fn append_rows(batch: &RecordBatch, out: &mut QueryResult) -> Result<()> {
    let ids = string_col(batch, "id")?;
    let texts = string_col(batch, "text")?;
    let paths = string_col(batch, "path")?;
    let files = string_col(batch, "file")?;
    let stems = string_col(batch, "stem")?;
    let extras = string_col(batch, "extra")?;
    let distances = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| anyhow!("_distance column missing"))?;
    for i in 0..batch.num_rows() {
        let extra: BTreeMap<String, String> = serde_json::from_str(extras.value(i)).unwrap_or_default();
        out.ids.push(ids.value(i).to_string());
        out.texts.push(texts.value(i).to_string());
        out.metadatas.push(ChunkMetadata {
            path: paths.value(i).to_string(),
            file: files.value(i).to_string(),
            stem: stems.value(i).to_string(),
            extra,
        });
        out.distances.push(if distances.is_null(i) { f32::MAX } else { distances.value(i) });
    }
    Ok(())
}

impl VectorCollection for LanceCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn upsert(&self, ids: &[String], texts: &[String], metadatas: &[ChunkMetadata]) -> Result<usize> {
        if ids.len() != texts.len() || ids.len() != metadatas.len() {
            return Err(anyhow!(
                "upsert arrays differ in length: {} ids, {} texts, {} metadatas",
                ids.len(),
                texts.len(),
                metadatas.len()
            ));
        }
        if ids.is_empty() {
            return Ok(0);
        }
        let vectors = self.embedder.embed_batch(texts)?;
        let batch = self.to_record_batch(ids, texts, metadatas, vectors)?;
        let written = self.rt.block_on(self.upsert_async(batch))?;
        debug!(collection = %self.name, written, "upserted batch");
        Ok(written)
    }

    fn query(&self, text: &str, n: usize) -> Result<QueryResult> {
        if n == 0 {
            return Ok(QueryResult::default());
        }
        let vector = self
            .embedder
            .embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow!("embedder returned no vector"))?;
        self.rt.block_on(self.query_async(vector, n))
    }

    fn count(&self) -> Result<usize> {
        self.rt.block_on(async {
            let table = self.db.open_table(&self.name).execute().await?;
            Ok::<usize, anyhow::Error>(table.count_rows(None).await?)
        })
    }
}
