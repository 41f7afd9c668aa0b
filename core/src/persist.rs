use crate::error::SnapshotError;
use crate::index::BooleanIndex;
use crate::postings::PostingsStore;
use crate::{CorpusIndex, DocId, DocMeta};
use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{create_dir_all, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: usize,
    pub created_at: String,
    pub version: u32,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn idf(&self) -> PathBuf { self.root.join("idf.bin") }
    fn postings(&self) -> PathBuf { self.root.join("postings.bin") }
    fn boolean(&self) -> PathBuf { self.root.join("boolean.bin") }
    fn docs(&self) -> PathBuf { self.root.join("docs.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

fn save_bin<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut f = File::create(path)?;
    let bytes = bincode::serialize(value)?;
    f.write_all(&bytes)?;
    Ok(())
}

fn read_part(path: &Path) -> Result<Vec<u8>, SnapshotError> {
    let mut f = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => SnapshotError::Missing(path.to_path_buf()),
        _ => SnapshotError::Io(e),
    })?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    Ok(buf)
}

fn load_bin<T: DeserializeOwned>(path: &Path, part: &'static str) -> Result<T, SnapshotError> {
    let buf = read_part(path)?;
    bincode::deserialize(&buf).map_err(|e| SnapshotError::Corrupt { part, reason: e.to_string() })
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile, SnapshotError> {
    let buf = read_part(&paths.meta())?;
    serde_json::from_slice(&buf).map_err(|e| SnapshotError::Corrupt { part: "meta", reason: e.to_string() })
}

/// Write every part of the snapshot. `created_at` is supplied by the caller so
/// rebuilding an unchanged corpus can reproduce identical files.
pub fn save_snapshot(paths: &IndexPaths, index: &CorpusIndex, created_at: &str) -> Result<()> {
    create_dir_all(&paths.root)?;
    save_bin(&paths.idf(), index.idf_table())?;
    save_bin(&paths.postings(), index.postings())?;
    save_bin(&paths.boolean(), index.boolean_index())?;
    save_bin(&paths.docs(), index.doc_table())?;
    let meta = MetaFile {
        num_docs: index.num_docs(),
        num_terms: index.num_terms(),
        created_at: created_at.to_string(),
        version: SNAPSHOT_VERSION,
    };
    save_meta(paths, &meta)?;
    tracing::info!(root = %paths.root.display(), num_docs = meta.num_docs, "saved index snapshot");
    Ok(())
}

/// Load a whole snapshot. Any missing, undecodable or inconsistent part fails
/// the load; there is no partial snapshot.
pub fn load_snapshot(paths: &IndexPaths) -> Result<CorpusIndex, SnapshotError> {
    let meta = load_meta(paths)?;
    if meta.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::Inconsistent(format!(
            "snapshot version {} is not supported (expected {SNAPSHOT_VERSION})",
            meta.version
        )));
    }
    let idf: BTreeMap<String, f64> = load_bin(&paths.idf(), "idf")?;
    let postings: PostingsStore = load_bin(&paths.postings(), "postings")?;
    let boolean: BooleanIndex = load_bin(&paths.boolean(), "boolean")?;
    let docs: BTreeMap<DocId, DocMeta> = load_bin(&paths.docs(), "docs")?;
    if idf.len() != meta.num_terms {
        return Err(SnapshotError::Inconsistent(format!(
            "meta lists {} terms but the idf table holds {}",
            meta.num_terms,
            idf.len()
        )));
    }
    let index = CorpusIndex::from_parts(meta.num_docs, idf, postings, boolean, docs)?;
    tracing::info!(
        root = %paths.root.display(),
        num_docs = index.num_docs(),
        num_terms = index.num_terms(),
        "loaded index snapshot"
    );
    Ok(index)
}
