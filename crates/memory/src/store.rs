//! The memory store: vector index, row-ordered id list and metadata map,
//! kept in lockstep and persisted as one unit.

use std::collections::{HashMap, HashSet};

use {
    tokio::sync::RwLock,
    tracing::{debug, info, warn},
};

use crate::{
    error::{MemoryError, Result},
    index::{VectorIndex, similarity_from_distance},
    persist::{SnapshotDir, SnapshotRef},
    schema::{ChunkRecord, MemoryStats, SearchHit, now_ms},
};

/// The aligned triple. Row `i` of `index` belongs to `ids[i]`, and `ids[i]` is
/// a key of `metadata`. Only `append` and `retain` mutate it, and both keep
/// the three structures aligned.
#[derive(Debug)]
struct StoreState {
    index: VectorIndex,
    ids: Vec<String>,
    metadata: HashMap<String, ChunkRecord>,
    generation: u64,
    last_update: Option<i64>,
}

impl StoreState {
    fn empty(dimensions: usize) -> Self {
        Self {
            index: VectorIndex::new(dimensions),
            ids: Vec::new(),
            metadata: HashMap::new(),
            generation: 0,
            last_update: None,
        }
    }

    /// Check a batch before any of it is applied so that a rejected batch
    /// leaves the state untouched.
    fn check_batch(&self, rows: &[(Vec<f32>, ChunkRecord)]) -> Result<()> {
        let mut batch_ids = HashSet::with_capacity(rows.len());
        for (vector, record) in rows {
            self.index.check_dimensions(vector)?;
            if self.metadata.contains_key(&record.id) || !batch_ids.insert(record.id.as_str()) {
                return Err(MemoryError::validation(format!(
                    "duplicate memory id {}",
                    record.id
                )));
            }
        }
        Ok(())
    }

    fn append(&mut self, rows: Vec<(Vec<f32>, ChunkRecord)>) -> Result<()> {
        self.check_batch(&rows)?;
        for (vector, record) in rows {
            self.index.add(&vector)?;
            self.ids.push(record.id.clone());
            self.metadata.insert(record.id.clone(), record);
        }
        self.last_update = Some(now_ms());
        Ok(())
    }

    /// Drop every row whose record fails `keep`. Returns the number removed.
    fn retain(&mut self, keep: impl Fn(&ChunkRecord) -> bool) -> usize {
        let mask: Vec<bool> = self
            .ids
            .iter()
            .map(|id| self.metadata.get(id).is_some_and(&keep))
            .collect();
        let removed = mask.iter().filter(|k| !**k).count();
        if removed == 0 {
            return 0;
        }
        self.index.retain_rows(&mask);
        let mut kept_ids = Vec::with_capacity(self.ids.len() - removed);
        for (id, keep_row) in self.ids.drain(..).zip(&mask) {
            if *keep_row {
                kept_ids.push(id);
            } else {
                self.metadata.remove(&id);
            }
        }
        self.ids = kept_ids;
        self.last_update = Some(now_ms());
        removed
    }

    fn check_alignment(&self) -> Result<()> {
        let rows = self.index.len();
        if self.ids.len() != rows || self.metadata.len() != rows {
            return Err(MemoryError::Corrupt(format!(
                "misaligned store: {rows} vectors, {} ids, {} metadata entries",
                self.ids.len(),
                self.metadata.len()
            )));
        }
        if let Some(missing) = self.ids.iter().find(|id| !self.metadata.contains_key(*id)) {
            return Err(MemoryError::Corrupt(format!(
                "id {missing} has no metadata entry"
            )));
        }
        Ok(())
    }

    fn snapshot<'a>(&'a self, model: &'a str) -> SnapshotRef<'a> {
        SnapshotRef {
            ids: &self.ids,
            metadata: &self.metadata,
            dimensions: self.index.dimensions(),
            model,
            vectors: self.index.as_matrix(),
        }
    }
}

/// Thread-safe store handle.
///
/// Writers hold the write lock across append and persist, so mutations are
/// serialized and readers never observe a half-applied write. A failed
/// persist is returned to the caller; the in-memory state stays valid.
pub struct MemoryStore {
    state: RwLock<StoreState>,
    dir: SnapshotDir,
    dimensions: usize,
    model: String,
}

impl MemoryStore {
    /// Open the store persisted in `dir` for vectors of `model`. Missing or
    /// unusable state yields an empty store; it is never a startup failure.
    /// An unusable snapshot is moved aside first so later writes cannot
    /// clobber it.
    pub async fn open(
        dir: impl Into<std::path::PathBuf>,
        dimensions: usize,
        model: impl Into<String>,
    ) -> Self {
        let dir = SnapshotDir::new(dir);
        let model = model.into();
        let state = match load_state(&dir, dimensions, &model).await {
            Ok(Some(state)) => {
                info!(
                    rows = state.ids.len(),
                    generation = state.generation,
                    dir = %dir.path().display(),
                    "loaded memory store"
                );
                state
            },
            Ok(None) => {
                info!(dir = %dir.path().display(), "created new memory store");
                StoreState::empty(dimensions)
            },
            Err(e) => {
                warn!(
                    dir = %dir.path().display(),
                    error = %e,
                    "failed to load memory store, starting empty"
                );
                match dir.quarantine().await {
                    Ok(Some(moved)) => {
                        warn!(path = %moved.display(), "moved unusable snapshot aside")
                    },
                    Ok(None) => {},
                    Err(e) => warn!(error = %e, "failed to move unusable snapshot aside"),
                }
                StoreState::empty(dimensions)
            },
        };
        Self {
            state: RwLock::new(state),
            dir,
            dimensions,
            model,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Append one vector with its metadata, then persist the whole store.
    pub async fn add(&self, vector: Vec<f32>, record: ChunkRecord) -> Result<()> {
        self.add_many(vec![(vector, record)]).await
    }

    /// Append a batch under a single write lock and a single persist. Either
    /// the whole batch is appended or, if validation fails, none of it.
    pub async fn add_many(&self, rows: Vec<(Vec<f32>, ChunkRecord)>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let count = rows.len();
        let mut state = self.state.write().await;
        state.append(rows)?;
        debug!(added = count, rows = state.ids.len(), "appended to memory store");
        self.persist(&mut state).await
    }

    /// Up to `k` records nearest to `query`, most similar first.
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let state = self.state.read().await;
        let hits = state.index.search(query, k)?;
        Ok(hits
            .into_iter()
            .filter_map(|(row, distance)| {
                let id = state.ids.get(row)?;
                let record = state.metadata.get(id)?;
                Some(SearchHit {
                    record: record.clone(),
                    similarity: similarity_from_distance(distance),
                })
            })
            .collect())
    }

    pub async fn get(&self, id: &str) -> Result<ChunkRecord> {
        self.state
            .read()
            .await
            .metadata
            .get(id)
            .cloned()
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))
    }

    /// Records sorted by timestamp, newest first (ties by id), paginated.
    pub async fn list(&self, limit: usize, offset: usize) -> Vec<ChunkRecord> {
        let state = self.state.read().await;
        let mut records: Vec<&ChunkRecord> = state.metadata.values().collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        records
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Delete the page `id` belongs to. `id` may be a chunk id or a parent id;
    /// every chunk of that page is removed and the index is compacted.
    pub async fn delete(&self, id: &str) -> Result<usize> {
        let mut state = self.state.write().await;
        let parent = match state.metadata.get(id) {
            Some(record) => record.parent_id.clone(),
            None if state.metadata.values().any(|r| r.parent_id == id) => id.to_string(),
            None => return Err(MemoryError::NotFound(id.to_string())),
        };
        let removed = state.retain(|r| r.parent_id != parent);
        info!(parent_id = %parent, removed, "deleted memory");
        self.persist(&mut state).await?;
        Ok(removed)
    }

    pub async fn stats(&self) -> MemoryStats {
        let state = self.state.read().await;
        let urls: HashSet<&str> = state.metadata.values().map(|r| r.url.as_str()).collect();
        MemoryStats {
            total_memories: urls.len(),
            total_chunks: state.metadata.len(),
            last_update: state.last_update,
        }
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.ids.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Verify that index rows, ids and metadata are aligned.
    pub async fn check_alignment(&self) -> Result<()> {
        self.state.read().await.check_alignment()
    }

    /// Persist the current state as a new generation.
    pub async fn save(&self) -> Result<()> {
        let mut state = self.state.write().await;
        self.persist(&mut state).await
    }

    async fn persist(&self, state: &mut StoreState) -> Result<()> {
        let next = state.generation + 1;
        self.dir.save(next, state.snapshot(&self.model)).await?;
        state.generation = next;
        Ok(())
    }
}

async fn load_state(
    dir: &SnapshotDir,
    dimensions: usize,
    model: &str,
) -> Result<Option<StoreState>> {
    let Some(snapshot) = dir.load(dimensions, model).await? else {
        return Ok(None);
    };
    let state = StoreState {
        index: VectorIndex::from_matrix(dimensions, snapshot.vectors)?,
        ids: snapshot.ids,
        metadata: snapshot.metadata,
        generation: snapshot.manifest.generation,
        last_update: Some(snapshot.manifest.saved_at),
    };
    state.check_alignment()?;
    Ok(Some(state))
}
