use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ragline_core::{decode_vector, Chunk, CorpusStats, RaglineError, RaglineResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::bm25::Bm25Index;

/// File holding one [`PageRecord`] per line inside a corpus directory.
pub const PAGES_FILE: &str = "pages.jsonl";
/// File holding one [`ChunkRecord`] per line inside a corpus directory.
pub const CHUNKS_FILE: &str = "chunks.jsonl";

/// A source page as written by ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    /// Page identifier referenced by chunks.
    pub id: String,
    /// Canonical page URL.
    pub url: String,
    /// Page title, when the scraper found one.
    #[serde(default)]
    pub title: Option<String>,
    /// Raw page markup, used for meta-description excerpts.
    #[serde(default, alias = "rawHtml")]
    pub raw_html: Option<String>,
}

/// A chunk as persisted by ingestion, before decoding and page join.
///
/// `vector` and `metadata` are kept as raw JSON because older corpora store
/// both as JSON-encoded strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Chunk identifier.
    pub id: String,
    /// Owning page identifier.
    #[serde(alias = "pageId")]
    pub page_id: String,
    /// Chunk text.
    pub content: String,
    /// Embedding as an array or a JSON-encoded string.
    #[serde(default)]
    pub vector: Value,
    /// Metadata as an object or a JSON-encoded string.
    #[serde(default)]
    pub metadata: Value,
    /// Position within the page.
    #[serde(default, alias = "chunkIndex")]
    pub chunk_index: Option<u32>,
    /// Creation timestamp.
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ChunkRecord {
    /// Build a record with a native vector and no metadata.
    pub fn new(
        id: impl Into<String>,
        page_id: impl Into<String>,
        content: impl Into<String>,
        vector: Vec<f32>,
    ) -> Self {
        Self {
            id: id.into(),
            page_id: page_id.into(),
            content: content.into(),
            vector: Value::from(vector),
            metadata: Value::Null,
            chunk_index: None,
            created_at: None,
        }
    }
}

/// Read-side contract the retrieval engine needs from chunk storage.
///
/// Every returned [`Chunk`] is joined with its page's `url` and `title`;
/// chunks whose page is missing are not returned.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Every stored chunk, in corpus order. No server-side filtering.
    async fn scan(&self) -> RaglineResult<Vec<Chunk>>;

    /// Up to `limit` chunks matching `query` lexically, with their raw
    /// relevance score, highest first.
    async fn text_search(&self, query: &str, limit: usize) -> RaglineResult<Vec<(Chunk, f32)>>;

    /// Raw markup for each requested URL that has any. Unknown URLs are
    /// simply absent from the map.
    async fn raw_markup(&self, urls: &HashSet<String>) -> RaglineResult<HashMap<String, String>>;

    /// All chunks of one page ordered by `chunk_index`.
    async fn chunks_for_page(&self, page_id: &str) -> RaglineResult<Vec<Chunk>>;

    /// Aggregate corpus statistics.
    async fn stats(&self) -> RaglineResult<CorpusStats>;
}

/// A chunk after decoding, without the page join.
#[derive(Debug, Clone)]
struct StoredChunk {
    id: String,
    page_id: String,
    content: String,
    vector: Vec<f32>,
    metadata: HashMap<String, Value>,
    chunk_index: Option<u32>,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Corpus {
    pages: HashMap<String, PageRecord>,
    chunks: Vec<StoredChunk>,
    chunk_ids: HashSet<String>,
    index: Bm25Index,
}

impl Corpus {
    fn join(&self, stored: &StoredChunk) -> Option<Chunk> {
        let page = self.pages.get(&stored.page_id)?;
        Some(Chunk {
            id: stored.id.clone(),
            page_id: stored.page_id.clone(),
            url: page.url.clone(),
            title: page.title.clone(),
            content: stored.content.clone(),
            vector: stored.vector.clone(),
            metadata: stored.metadata.clone(),
            chunk_index: stored.chunk_index,
            created_at: stored.created_at,
        })
    }
}

/// In-memory chunk store with a BM25 text index.
///
/// The `add_*` methods belong to the ingestion side; the retrieval engine
/// only uses the [`ChunkStore`] read methods.
pub struct InMemoryChunkStore {
    corpus: RwLock<Corpus>,
}

impl InMemoryChunkStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            corpus: RwLock::new(Corpus::default()),
        }
    }

    /// Insert or replace a page.
    pub async fn add_page(&self, page: PageRecord) {
        let mut corpus = self.corpus.write().await;
        corpus.pages.insert(page.id.clone(), page);
    }

    /// Insert a chunk.
    ///
    /// Chunks are immutable: a duplicate id or blank content is rejected. A
    /// corrupt vector is logged and stored as empty, which keeps the chunk
    /// out of similarity scoring but still lexically searchable.
    pub async fn add_chunk(&self, record: ChunkRecord) -> RaglineResult<()> {
        if record.content.trim().is_empty() {
            return Err(RaglineError::Store(format!(
                "chunk {} has empty content",
                record.id
            )));
        }

        let vector = match decode_vector(&record.vector) {
            Ok(v) => v,
            Err(e) => {
                warn!(chunk_id = %record.id, error = %e, "Skipping corrupt vector");
                Vec::new()
            }
        };
        let metadata = decode_metadata(&record.id, record.metadata);

        let mut corpus = self.corpus.write().await;
        if !corpus.chunk_ids.insert(record.id.clone()) {
            return Err(RaglineError::Store(format!(
                "chunk {} already exists",
                record.id
            )));
        }
        let position = corpus.chunks.len();
        corpus.index.add_document(position, &record.content);
        corpus.chunks.push(StoredChunk {
            id: record.id,
            page_id: record.page_id,
            content: record.content,
            vector,
            metadata,
            chunk_index: record.chunk_index,
            created_at: record.created_at,
        });
        Ok(())
    }
}

impl Default for InMemoryChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize metadata stored as an object or a JSON-encoded object string.
fn decode_metadata(chunk_id: &str, raw: Value) -> HashMap<String, Value> {
    let object = match raw {
        Value::Object(map) => Some(map),
        Value::String(encoded) => match serde_json::from_str::<Value>(&encoded) {
            Ok(Value::Object(map)) => Some(map),
            _ => {
                debug!(chunk_id, "Ignoring non-object metadata string");
                None
            }
        },
        _ => None,
    };
    object
        .map(|map| map.into_iter().collect())
        .unwrap_or_default()
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    async fn scan(&self) -> RaglineResult<Vec<Chunk>> {
        let corpus = self.corpus.read().await;
        Ok(corpus.chunks.iter().filter_map(|c| corpus.join(c)).collect())
    }

    async fn text_search(&self, query: &str, limit: usize) -> RaglineResult<Vec<(Chunk, f32)>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let corpus = self.corpus.read().await;
        let hits = corpus.index.search(query, corpus.chunks.len());
        Ok(hits
            .into_iter()
            .filter_map(|(position, score)| {
                corpus
                    .chunks
                    .get(position)
                    .and_then(|c| corpus.join(c))
                    .map(|chunk| (chunk, score))
            })
            .take(limit)
            .collect())
    }

    async fn raw_markup(&self, urls: &HashSet<String>) -> RaglineResult<HashMap<String, String>> {
        let corpus = self.corpus.read().await;
        Ok(corpus
            .pages
            .values()
            .filter(|p| urls.contains(&p.url))
            .filter_map(|p| p.raw_html.clone().map(|html| (p.url.clone(), html)))
            .collect())
    }

    async fn chunks_for_page(&self, page_id: &str) -> RaglineResult<Vec<Chunk>> {
        let corpus = self.corpus.read().await;
        let mut chunks: Vec<Chunk> = corpus
            .chunks
            .iter()
            .filter(|c| c.page_id == page_id)
            .filter_map(|c| corpus.join(c))
            .collect();
        chunks.sort_by_key(|c| c.chunk_index.unwrap_or(u32::MAX));
        Ok(chunks)
    }

    async fn stats(&self) -> RaglineResult<CorpusStats> {
        let corpus = self.corpus.read().await;
        let unique_pages: HashSet<&str> =
            corpus.chunks.iter().map(|c| c.page_id.as_str()).collect();
        let vector_dimensions = corpus
            .chunks
            .iter()
            .find(|c| !c.vector.is_empty())
            .map(|c| c.vector.len())
            .unwrap_or(0);
        Ok(CorpusStats {
            total_chunks: corpus.chunks.len(),
            unique_pages: unique_pages.len(),
            vector_dimensions,
        })
    }
}

/// Read-only corpus snapshot loaded from a directory of JSONL files.
///
/// Expects [`PAGES_FILE`] and [`CHUNKS_FILE`] in `dir`. Malformed lines and
/// rejected chunks are logged and skipped; only a missing or unreadable file
/// fails the load.
pub struct FileChunkStore {
    dir: PathBuf,
    inner: InMemoryChunkStore,
}

impl FileChunkStore {
    /// Load the corpus in `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> RaglineResult<Self> {
        let dir = dir.into();
        let inner = InMemoryChunkStore::new();

        let pages: Vec<PageRecord> = read_jsonl(&dir.join(PAGES_FILE)).await?;
        let page_count = pages.len();
        for page in pages {
            inner.add_page(page).await;
        }

        let records: Vec<ChunkRecord> = read_jsonl(&dir.join(CHUNKS_FILE)).await?;
        let mut rejected = 0usize;
        for record in records {
            let id = record.id.clone();
            if let Err(e) = inner.add_chunk(record).await {
                warn!(chunk_id = %id, error = %e, "Rejected chunk");
                rejected += 1;
            }
        }

        info!(
            dir = %dir.display(),
            pages = page_count,
            rejected,
            "Loaded corpus snapshot"
        );
        Ok(Self { dir, inner })
    }

    /// Directory the snapshot was loaded from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

async fn read_jsonl<T: serde::de::DeserializeOwned>(path: &Path) -> RaglineResult<Vec<T>> {
    let data = tokio::fs::read_to_string(path).await.map_err(|e| {
        RaglineError::Store(format!("Failed to read {}: {e}", path.display()))
    })?;
    let mut out = Vec::new();
    for (line_no, line) in data.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(item) => out.push(item),
            Err(e) => warn!(
                file = %path.display(),
                line = line_no + 1,
                error = %e,
                "Skipping malformed JSONL line"
            ),
        }
    }
    Ok(out)
}

#[async_trait]
impl ChunkStore for FileChunkStore {
    async fn scan(&self) -> RaglineResult<Vec<Chunk>> {
        self.inner.scan().await
    }

    async fn text_search(&self, query: &str, limit: usize) -> RaglineResult<Vec<(Chunk, f32)>> {
        self.inner.text_search(query, limit).await
    }

    async fn raw_markup(&self, urls: &HashSet<String>) -> RaglineResult<HashMap<String, String>> {
        self.inner.raw_markup(urls).await
    }

    async fn chunks_for_page(&self, page_id: &str) -> RaglineResult<Vec<Chunk>> {
        self.inner.chunks_for_page(page_id).await
    }

    async fn stats(&self) -> RaglineResult<CorpusStats> {
        self.inner.stats().await
    }
}
