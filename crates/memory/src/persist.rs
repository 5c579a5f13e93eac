//! On-disk snapshots of the store.
//!
//! A snapshot is three artifacts written side by side for one generation:
//!
//! - `ids-<gen>.json`: ids in row order
//! - `metadata-<gen>.json`: id → [`ChunkRecord`]
//! - `vectors-<gen>.f32`: the row-major vector matrix
//!
//! `manifest.json` names the current generation together with row count,
//! dimension and a sha256 of each artifact. It is written to a temporary file
//! and renamed into place after the artifacts are synced, so the rename is the
//! commit point: a crash at any earlier step leaves the previous generation
//! current.
//!
//! A snapshot that cannot be used is moved into a `corrupt-<ms>` subdirectory
//! by [`SnapshotDir::quarantine`] rather than overwritten.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use {
    serde::{Deserialize, Serialize},
    sha2::{Digest, Sha256},
    tokio::io::AsyncWriteExt,
    tracing::{debug, warn},
};

use crate::{
    error::{MemoryError, Result},
    schema::{ChunkRecord, now_ms},
};

const MANIFEST_FILE: &str = "manifest.json";
const MANIFEST_TMP_FILE: &str = "manifest.json.tmp";
const FORMAT_VERSION: u32 = 1;
const VECTOR_MAGIC: &[u8; 4] = b"SVEC";
const VECTOR_HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// Points at the committed generation and records how to verify it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub generation: u64,
    pub rows: usize,
    pub dimensions: usize,
    /// Provider key of the embedding model the vectors came from. Empty in
    /// snapshots written before the key was recorded.
    #[serde(default)]
    pub model: String,
    pub ids_sha256: String,
    pub metadata_sha256: String,
    pub vectors_sha256: String,
    pub saved_at: i64,
}

/// Borrowed view of the state being written.
pub struct SnapshotRef<'a> {
    pub ids: &'a [String],
    pub metadata: &'a HashMap<String, ChunkRecord>,
    pub dimensions: usize,
    pub model: &'a str,
    pub vectors: &'a [f32],
}

/// A snapshot read back from disk, already verified.
#[derive(Debug)]
pub struct LoadedSnapshot {
    pub manifest: Manifest,
    pub ids: Vec<String>,
    pub metadata: HashMap<String, ChunkRecord>,
    pub vectors: Vec<f32>,
}

/// The directory a store persists into.
#[derive(Debug, Clone)]
pub struct SnapshotDir {
    dir: PathBuf,
}

impl SnapshotDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn artifact(&self, stem: &str, generation: u64, ext: &str) -> PathBuf {
        self.dir.join(format!("{stem}-{generation}.{ext}"))
    }

    fn ids_path(&self, generation: u64) -> PathBuf {
        self.artifact("ids", generation, "json")
    }

    fn metadata_path(&self, generation: u64) -> PathBuf {
        self.artifact("metadata", generation, "json")
    }

    fn vectors_path(&self, generation: u64) -> PathBuf {
        self.artifact("vectors", generation, "f32")
    }

    /// Write `snapshot` as `generation` and make it current.
    pub async fn save(&self, generation: u64, snapshot: SnapshotRef<'_>) -> Result<Manifest> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| MemoryError::io(&self.dir, e))?;

        let ids = serde_json::to_vec(snapshot.ids)
            .map_err(|e| MemoryError::Corrupt(format!("encoding ids: {e}")))?;
        let metadata = serde_json::to_vec(snapshot.metadata)
            .map_err(|e| MemoryError::Corrupt(format!("encoding metadata: {e}")))?;
        let vectors = encode_vectors(snapshot.dimensions, snapshot.vectors);

        write_synced(&self.ids_path(generation), &ids).await?;
        write_synced(&self.metadata_path(generation), &metadata).await?;
        write_synced(&self.vectors_path(generation), &vectors).await?;

        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            generation,
            rows: snapshot.ids.len(),
            dimensions: snapshot.dimensions,
            model: snapshot.model.to_string(),
            ids_sha256: sha256_hex(&ids),
            metadata_sha256: sha256_hex(&metadata),
            vectors_sha256: sha256_hex(&vectors),
            saved_at: now_ms(),
        };
        let manifest_bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| MemoryError::Corrupt(format!("encoding manifest: {e}")))?;
        let tmp = self.dir.join(MANIFEST_TMP_FILE);
        let target = self.dir.join(MANIFEST_FILE);
        write_synced(&tmp, &manifest_bytes).await?;
        tokio::fs::rename(&tmp, &target)
            .await
            .map_err(|e| MemoryError::io(&target, e))?;

        debug!(generation, rows = manifest.rows, dir = %self.dir.display(), "snapshot committed");
        self.remove_stale(generation).await;
        Ok(manifest)
    }

    /// Read the current snapshot. `Ok(None)` when nothing has been saved yet.
    pub async fn load(
        &self,
        expected_dimensions: usize,
        expected_model: &str,
    ) -> Result<Option<LoadedSnapshot>> {
        let manifest_path = self.dir.join(MANIFEST_FILE);
        let manifest_bytes = match tokio::fs::read(&manifest_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(MemoryError::io(&manifest_path, e)),
        };
        let manifest: Manifest = serde_json::from_slice(&manifest_bytes)
            .map_err(|e| MemoryError::Corrupt(format!("manifest: {e}")))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(MemoryError::Corrupt(format!(
                "unsupported format version {}",
                manifest.format_version
            )));
        }
        if manifest.dimensions != expected_dimensions {
            return Err(MemoryError::DimensionMismatch {
                expected: expected_dimensions,
                actual: manifest.dimensions,
            });
        }
        if !manifest.model.is_empty() && manifest.model != expected_model {
            return Err(MemoryError::Config(format!(
                "store was written by embedding model {}, configured {expected_model}",
                manifest.model
            )));
        }

        let generation = manifest.generation;
        let ids_bytes = read_verified(&self.ids_path(generation), &manifest.ids_sha256).await?;
        let metadata_bytes =
            read_verified(&self.metadata_path(generation), &manifest.metadata_sha256).await?;
        let vector_bytes =
            read_verified(&self.vectors_path(generation), &manifest.vectors_sha256).await?;

        let ids: Vec<String> = serde_json::from_slice(&ids_bytes)
            .map_err(|e| MemoryError::Corrupt(format!("ids: {e}")))?;
        let metadata: HashMap<String, ChunkRecord> = serde_json::from_slice(&metadata_bytes)
            .map_err(|e| MemoryError::Corrupt(format!("metadata: {e}")))?;
        let (dimensions, vectors) = decode_vectors(&vector_bytes)?;

        if dimensions != manifest.dimensions {
            return Err(MemoryError::Corrupt(format!(
                "vector file has {dimensions} dimensions, manifest says {}",
                manifest.dimensions
            )));
        }
        if ids.len() != manifest.rows || vectors.len() != manifest.rows * dimensions {
            return Err(MemoryError::Corrupt(format!(
                "row count mismatch: manifest {}, ids {}, vectors {}",
                manifest.rows,
                ids.len(),
                vectors.len() / dimensions.max(1)
            )));
        }

        Ok(Some(LoadedSnapshot {
            manifest,
            ids,
            metadata,
            vectors,
        }))
    }

    /// Move the manifest and every generation artifact into a fresh
    /// `corrupt-<ms>` subdirectory. Returns where they went, or `None` when
    /// there was nothing to move.
    pub async fn quarantine(&self) -> Result<Option<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(MemoryError::io(&self.dir, e)),
        };
        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MemoryError::io(&self.dir, e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name == MANIFEST_FILE || artifact_generation(name).is_some() {
                files.push((entry.path(), name.to_string()));
            }
        }
        if files.is_empty() {
            return Ok(None);
        }

        let target = self.dir.join(format!("corrupt-{}", now_ms()));
        tokio::fs::create_dir_all(&target)
            .await
            .map_err(|e| MemoryError::io(&target, e))?;
        for (path, name) in files {
            tokio::fs::rename(&path, target.join(&name))
                .await
                .map_err(|e| MemoryError::io(&path, e))?;
        }
        Ok(Some(target))
    }

    /// Best-effort removal of artifacts from other generations.
    async fn remove_stale(&self, current: u64) {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "cannot list snapshot dir");
                return;
            },
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let Some(generation) = name.to_str().and_then(artifact_generation) else {
                continue;
            };
            if generation == current {
                continue;
            }
            if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                warn!(
                    path = %entry.path().display(),
                    error = %e,
                    "failed to remove stale snapshot file"
                );
            }
        }
    }
}

/// Generation number of a snapshot artifact file name, if it is one.
fn artifact_generation(name: &str) -> Option<u64> {
    let (stem, rest) = name.split_once('-')?;
    if !matches!(stem, "ids" | "metadata" | "vectors") {
        return None;
    }
    let (generation, ext) = rest.split_once('.')?;
    if !matches!(ext, "json" | "f32") {
        return None;
    }
    generation.parse().ok()
}

async fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| MemoryError::io(path, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| MemoryError::io(path, e))?;
    file.sync_all().await.map_err(|e| MemoryError::io(path, e))?;
    Ok(())
}

async fn read_verified(path: &Path, expected_sha256: &str) -> Result<Vec<u8>> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| MemoryError::io(path, e))?;
    let actual = sha256_hex(&bytes);
    if actual != expected_sha256 {
        return Err(MemoryError::Corrupt(format!(
            "checksum mismatch for {}",
            path.display()
        )));
    }
    Ok(bytes)
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// `SVEC` | version u32 | dims u32 | rows u64 | rows*dims f32, all little-endian.
pub fn encode_vectors(dimensions: usize, data: &[f32]) -> Vec<u8> {
    let rows = if dimensions == 0 {
        0
    } else {
        data.len() / dimensions
    };
    let mut out = Vec::with_capacity(VECTOR_HEADER_LEN + data.len() * 4);
    out.extend_from_slice(VECTOR_MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(dimensions as u32).to_le_bytes());
    out.extend_from_slice(&(rows as u64).to_le_bytes());
    for x in data {
        out.extend_from_slice(&x.to_le_bytes());
    }
    out
}

/// Inverse of [`encode_vectors`]: returns `(dimensions, matrix)`.
pub fn decode_vectors(bytes: &[u8]) -> Result<(usize, Vec<f32>)> {
    let corrupt = |what: &str| MemoryError::Corrupt(format!("vector file: {what}"));
    if bytes.len() < VECTOR_HEADER_LEN || &bytes[..4] != VECTOR_MAGIC {
        return Err(corrupt("bad header"));
    }
    let u32_at = |at: usize| -> Result<u32> {
        let raw: [u8; 4] = bytes[at..at + 4]
            .try_into()
            .map_err(|_| corrupt("truncated header"))?;
        Ok(u32::from_le_bytes(raw))
    };
    let version = u32_at(4)?;
    if version != FORMAT_VERSION {
        return Err(corrupt("unsupported version"));
    }
    let dimensions = u32_at(8)? as usize;
    let rows_raw: [u8; 8] = bytes[12..20]
        .try_into()
        .map_err(|_| corrupt("truncated header"))?;
    let rows = u64::from_le_bytes(rows_raw) as usize;

    let body = &bytes[VECTOR_HEADER_LEN..];
    let expected = rows
        .checked_mul(dimensions)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| corrupt("size overflow"))?;
    if body.len() != expected {
        return Err(corrupt("body length does not match header"));
    }
    let data = body
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok((dimensions, data))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, tempfile::TempDir};

    fn record(id: &str) -> ChunkRecord {
        ChunkRecord {
            id: id.into(),
            parent_id: "p".into(),
            url: "https://example.com".into(),
            title: "t".into(),
            summary: "s".into(),
            content: "c".into(),
            engagement_score: 1.0,
            timestamp: 1,
            chunk_index: 0,
            total_chunks: 1,
        }
    }

    fn sample() -> (Vec<String>, HashMap<String, ChunkRecord>, Vec<f32>) {
        let ids = vec!["a".to_string(), "b".to_string()];
        let metadata = ids.iter().map(|id| (id.clone(), record(id))).collect();
        let vectors = vec![0.1, 0.2, 0.3, -0.4, 0.5, 1.0e-7];
        (ids, metadata, vectors)
    }

    #[test]
    fn vector_codec_preserves_bits() {
        let data = vec![1.0, -0.0, f32::MIN_POSITIVE, 0.333_333_34, 7.5, -2.25];
        let (dims, back) = decode_vectors(&encode_vectors(3, &data)).unwrap();
        assert_eq!(dims, 3);
        let bits: Vec<u32> = back.iter().map(|x| x.to_bits()).collect();
        let expected: Vec<u32> = data.iter().map(|x| x.to_bits()).collect();
        assert_eq!(bits, expected);
    }

    #[test]
    fn decode_rejects_truncated_body() {
        let mut bytes = encode_vectors(2, &[1.0, 2.0, 3.0, 4.0]);
        bytes.pop();
        assert!(decode_vectors(&bytes).is_err());
    }

    #[test]
    fn artifact_names_parse() {
        assert_eq!(artifact_generation("ids-12.json"), Some(12));
        assert_eq!(artifact_generation("vectors-3.f32"), Some(3));
        assert_eq!(artifact_generation("manifest.json"), None);
        assert_eq!(artifact_generation("notes-1.json"), None);
    }

    #[tokio::test]
    async fn missing_dir_loads_as_none() {
        let tmp = TempDir::new().unwrap();
        let dir = SnapshotDir::new(tmp.path().join("nope"));
        assert!(dir.load(3, "bge").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let dir = SnapshotDir::new(tmp.path());
        let (ids, metadata, vectors) = sample();
        dir.save(1, SnapshotRef {
            ids: &ids,
            metadata: &metadata,
            dimensions: 3,
            model: "bge",
            vectors: &vectors,
        })
        .await
        .unwrap();

        let loaded = dir.load(3, "bge").await.unwrap().unwrap();
        assert_eq!(loaded.manifest.generation, 1);
        assert_eq!(loaded.ids, ids);
        assert_eq!(loaded.metadata, metadata);
        assert_eq!(loaded.vectors, vectors);
        assert_eq!(loaded.manifest.model, "bge");
    }

    #[tokio::test]
    async fn new_generation_replaces_old_files() {
        let tmp = TempDir::new().unwrap();
        let dir = SnapshotDir::new(tmp.path());
        let (ids, metadata, vectors) = sample();
        for generation in 1..=3 {
            dir.save(generation, SnapshotRef {
                ids: &ids,
                metadata: &metadata,
                dimensions: 3,
                model: "bge",
                vectors: &vectors,
            })
            .await
            .unwrap();
        }
        assert!(tmp.path().join("ids-3.json").exists());
        assert!(!tmp.path().join("ids-1.json").exists());
        assert!(!tmp.path().join("vectors-2.f32").exists());
        assert_eq!(dir.load(3, "bge").await.unwrap().unwrap().manifest.generation, 3);
    }

    #[tokio::test]
    async fn tampered_artifact_is_detected() {
        let tmp = TempDir::new().unwrap();
        let dir = SnapshotDir::new(tmp.path());
        let (ids, metadata, vectors) = sample();
        dir.save(1, SnapshotRef {
            ids: &ids,
            metadata: &metadata,
            dimensions: 3,
            model: "bge",
            vectors: &vectors,
        })
        .await
        .unwrap();
        std::fs::write(tmp.path().join("ids-1.json"), br#"["a"]"#).unwrap();
        assert!(matches!(dir.load(3, "bge").await, Err(MemoryError::Corrupt(_))));
    }

    #[tokio::test]
    async fn wrong_dimension_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let dir = SnapshotDir::new(tmp.path());
        let (ids, metadata, vectors) = sample();
        dir.save(1, SnapshotRef {
            ids: &ids,
            metadata: &metadata,
            dimensions: 3,
            model: "bge",
            vectors: &vectors,
        })
        .await
        .unwrap();
        assert!(matches!(
            dir.load(768, "bge").await,
            Err(MemoryError::DimensionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn other_model_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let dir = SnapshotDir::new(tmp.path());
        let (ids, metadata, vectors) = sample();
        dir.save(1, SnapshotRef {
            ids: &ids,
            metadata: &metadata,
            dimensions: 3,
            model: "bge",
            vectors: &vectors,
        })
        .await
        .unwrap();
        assert!(matches!(dir.load(3, "e5").await, Err(MemoryError::Config(_))));
    }

    #[tokio::test]
    async fn quarantine_moves_snapshot_aside_intact() {
        let tmp = TempDir::new().unwrap();
        let dir = SnapshotDir::new(tmp.path());
        let (ids, metadata, vectors) = sample();
        dir.save(2, SnapshotRef {
            ids: &ids,
            metadata: &metadata,
            dimensions: 3,
            model: "bge",
            vectors: &vectors,
        })
        .await
        .unwrap();

        let moved = dir.quarantine().await.unwrap().unwrap();
        assert!(!tmp.path().join("manifest.json").exists());
        assert!(!tmp.path().join("ids-2.json").exists());
        let recovered = SnapshotDir::new(&moved).load(3, "bge").await.unwrap().unwrap();
        assert_eq!(recovered.ids, ids);
        assert_eq!(recovered.vectors, vectors);

        assert!(dir.quarantine().await.unwrap().is_none());
    }
}
