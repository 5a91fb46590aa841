//! Knowledge base persistence.
//!
//! A built knowledge base is the vector store together with the passage corpus
//! its payloads point into and the embedding configuration it was built with.
//! The three are saved and loaded as one file so the positional payloads can
//! never drift away from the corpus they index.
//!
//! Saving goes through a temporary file in the destination directory that is
//! renamed over the target only after it has been fully written, so a reader
//! sees either the previous file or the new one.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{EmbeddingConfig, Passage};
use crate::store::persist::{read_framed, write_framed};
use crate::store::{StoreError, VectorStore};

/// Magic bytes opening a knowledge base file.
pub const KB_MAGIC: [u8; 4] = *b"SKB1";

/// Errors that can occur while saving or loading a knowledge base.
#[derive(Debug, Error)]
pub enum StorageError {
    /// File could not be created, written, renamed or opened
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File content is malformed, truncated or internally inconsistent
    #[error("Corrupt persisted state: {0}")]
    CorruptPersistedState(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StoreError> for StorageError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io(e) => StorageError::Io(e),
            StoreError::CorruptPersistedState(msg) => StorageError::CorruptPersistedState(msg),
            other => StorageError::CorruptPersistedState(other.to_string()),
        }
    }
}

/// A vector store bundled with the corpus it indexes.
///
/// Payload `i` in the store refers to `passages[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    /// Embedding model the vectors were produced with
    pub config: EmbeddingConfig,

    /// Passage corpus, in build order
    pub passages: Vec<Passage>,

    /// One vector per passage, payload = passage index
    pub store: VectorStore<usize>,
}

impl KnowledgeBase {
    /// Bundle parts into a knowledge base, checking that they agree.
    ///
    /// # Errors
    /// Returns `StorageError::CorruptPersistedState` if the parts are inconsistent
    /// (see [`validate`](Self::validate))
    pub fn new(
        config: EmbeddingConfig,
        passages: Vec<Passage>,
        store: VectorStore<usize>,
    ) -> StorageResult<Self> {
        let kb = Self {
            config,
            passages,
            store,
        };
        kb.validate()?;
        Ok(kb)
    }

    /// Number of indexed passages.
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Resolve a store payload back into its passage.
    pub fn passage(&self, index: usize) -> Option<&Passage> {
        self.passages.get(index)
    }

    /// Check the corpus/store coupling.
    ///
    /// The store dimension must equal the configured dimension, the store must
    /// hold exactly one entry per passage, and every payload must be a valid
    /// passage index.
    pub fn validate(&self) -> StorageResult<()> {
        if self.store.dim() != self.config.dimension {
            return Err(StorageError::CorruptPersistedState(format!(
                "store dimension {} does not match configured dimension {}",
                self.store.dim(),
                self.config.dimension
            )));
        }

        if self.store.len() != self.passages.len() {
            return Err(StorageError::CorruptPersistedState(format!(
                "store holds {} vectors but corpus has {} passages",
                self.store.len(),
                self.passages.len()
            )));
        }

        if let Some(bad) = self.store.payloads().find(|&&i| i >= self.passages.len()) {
            return Err(StorageError::CorruptPersistedState(format!(
                "payload {} is out of range for {} passages",
                bad,
                self.passages.len()
            )));
        }

        Ok(())
    }

    /// Serialize the knowledge base to a writer.
    pub fn write_to<W: std::io::Write>(&self, writer: &mut W) -> StorageResult<()> {
        write_framed(writer, KB_MAGIC, self)?;
        Ok(())
    }

    /// Deserialize and validate a knowledge base from a reader.
    ///
    /// # Errors
    /// Returns `StorageError::CorruptPersistedState` for a malformed or
    /// inconsistent stream
    pub fn read_from<R: std::io::Read>(reader: &mut R) -> StorageResult<Self> {
        let kb: KnowledgeBase = read_framed(reader, KB_MAGIC)?;
        kb.validate()?;
        Ok(kb)
    }

    /// Atomically write the knowledge base to `path`.
    ///
    /// The content is written to a temporary file next to `path`, synced, and
    /// renamed over the destination. On any failure the temporary file is
    /// removed and an existing file at `path` is left untouched.
    ///
    /// # Errors
    /// Returns `StorageError::Io` if the file cannot be written or renamed
    pub fn save(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            self.write_to(&mut writer)?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| StorageError::Io(e.error))?;

        tracing::info!(
            path = %path.display(),
            passages = self.passages.len(),
            dimension = self.store.dim(),
            "Saved knowledge base"
        );
        Ok(())
    }

    /// Load and validate a knowledge base written by [`save`](Self::save).
    ///
    /// # Errors
    /// Returns `StorageError::Io` if the file cannot be opened and
    /// `StorageError::CorruptPersistedState` if its content is invalid
    pub fn load(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let kb = Self::read_from(&mut reader)?;

        tracing::debug!(
            path = %path.display(),
            passages = kb.passages.len(),
            model = %kb.config.model_name,
            "Loaded knowledge base"
        );
        Ok(kb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_kb() -> KnowledgeBase {
        let passages = vec![
            Passage::new("Digital Democracy", "Digital democracy refers to...", 2),
            Passage::new("Participatory Budgeting", "PB involves citizens directly...", 14),
            Passage::new("Collective Intelligence", "Collective intelligence is...", 15),
        ];
        let mut store = VectorStore::new(3).unwrap();
        store.insert(vec![1.0, 0.0, 0.0], 0).unwrap();
        store.insert(vec![0.0, 1.0, 0.0], 1).unwrap();
        store.insert(vec![0.0, 0.0, 1.0], 2).unwrap();

        KnowledgeBase::new(
            EmbeddingConfig {
                model_name: "test-model".to_string(),
                dimension: 3,
            },
            passages,
            store,
        )
        .unwrap()
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.bin");

        let kb = sample_kb();
        kb.save(&path).unwrap();
        let loaded = KnowledgeBase::load(&path).unwrap();

        assert_eq!(loaded, kb);
        assert_eq!(loaded.passage(1).unwrap().page, 14);
    }

    #[test]
    fn test_save_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.bin");
        std::fs::write(&path, b"old content").unwrap();

        sample_kb().save(&path).unwrap();
        assert_eq!(KnowledgeBase::load(&path).unwrap(), sample_kb());

        // no temp files left behind
        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("kb.bin");
        assert!(matches!(sample_kb().save(&path), Err(StorageError::Io(_))));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            KnowledgeBase::load("/nonexistent/kb.bin"),
            Err(StorageError::Io(_))
        ));
    }

    #[test]
    fn test_load_garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.bin");
        std::fs::write(&path, b"definitely not a knowledge base").unwrap();
        assert!(matches!(
            KnowledgeBase::load(&path),
            Err(StorageError::CorruptPersistedState(_))
        ));
    }

    #[test]
    fn test_load_truncated_is_corrupt() {
        let mut bytes = Vec::new();
        sample_kb().write_to(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 4);
        assert!(matches!(
            KnowledgeBase::read_from(&mut bytes.as_slice()),
            Err(StorageError::CorruptPersistedState(_))
        ));
    }

    #[test]
    fn test_store_file_is_not_a_knowledge_base() {
        let bytes = sample_kb().store.to_bytes().unwrap();
        assert!(matches!(
            KnowledgeBase::read_from(&mut bytes.as_slice()),
            Err(StorageError::CorruptPersistedState(_))
        ));
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let mut kb = sample_kb();
        kb.passages.pop();
        match kb.validate() {
            Err(StorageError::CorruptPersistedState(msg)) => assert!(msg.contains("3 vectors")),
            other => panic!("Expected CorruptPersistedState, got {:?}", other),
        }

        // the same check runs on load
        let mut bytes = Vec::new();
        write_framed(&mut bytes, KB_MAGIC, &kb).unwrap();
        assert!(matches!(
            KnowledgeBase::read_from(&mut bytes.as_slice()),
            Err(StorageError::CorruptPersistedState(_))
        ));
    }

    #[test]
    fn test_out_of_range_payload_is_rejected() {
        let mut kb = sample_kb();
        let mut store = VectorStore::new(3).unwrap();
        store.insert(vec![1.0, 0.0, 0.0], 0).unwrap();
        store.insert(vec![0.0, 1.0, 0.0], 1).unwrap();
        store.insert(vec![0.0, 0.0, 1.0], 7).unwrap();
        kb.store = store;

        assert!(matches!(
            kb.validate(),
            Err(StorageError::CorruptPersistedState(_))
        ));
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let kb = sample_kb();
        let result = KnowledgeBase::new(
            EmbeddingConfig {
                model_name: "test-model".to_string(),
                dimension: 768,
            },
            kb.passages,
            kb.store,
        );
        assert!(matches!(result, Err(StorageError::CorruptPersistedState(_))));
    }
}
