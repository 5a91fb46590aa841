//! Byte-stream persistence for vector stores.
//!
//! A persisted store is a single framed blob:
//!
//! ```text
//! +-----------+------------------+-------------------------------+
//! | magic (4) | version (u32 LE) | bincode { dim, entries[...] } |
//! +-----------+------------------+-------------------------------+
//! ```
//!
//! Loading validates the frame, the dimension and every vector length, and
//! rejects trailing bytes. There is no partial recovery: anything malformed is
//! `StoreError::CorruptPersistedState`.

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{Entry, StoreError, StoreResult, VectorStore};

/// Magic bytes opening a persisted vector store.
pub const STORE_MAGIC: [u8; 4] = *b"SKBV";

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

/// Owned mirror of a `VectorStore`, validated on conversion.
#[derive(Deserialize)]
pub(crate) struct PersistedStore<P> {
    dim: usize,
    entries: Vec<Entry<P>>,
}

impl<P> TryFrom<PersistedStore<P>> for VectorStore<P> {
    type Error = StoreError;

    fn try_from(persisted: PersistedStore<P>) -> Result<Self, Self::Error> {
        VectorStore::from_entries(persisted.dim, persisted.entries)
            .map_err(|e| StoreError::CorruptPersistedState(e.to_string()))
    }
}

impl<P: Serialize> VectorStore<P> {
    /// Serialize the whole store (dim and all entries) to `writer`.
    ///
    /// # Errors
    /// Returns `StoreError::Io` if writing fails
    pub fn persist<W: Write>(&self, writer: &mut W) -> StoreResult<()> {
        write_framed(writer, STORE_MAGIC, self)
    }

    /// Serialize the store into a new byte vector.
    pub fn to_bytes(&self) -> StoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.persist(&mut buf)?;
        Ok(buf)
    }
}

impl<P: DeserializeOwned> VectorStore<P> {
    /// Deserialize a store previously written by [`persist`](Self::persist).
    ///
    /// # Errors
    /// Returns `StoreError::CorruptPersistedState` for a bad frame, a
    /// truncated or malformed body, trailing bytes, `dim == 0`, or a vector
    /// whose length differs from `dim` or that holds a NaN or infinite component
    pub fn load<R: Read>(reader: &mut R) -> StoreResult<Self> {
        read_framed(reader, STORE_MAGIC)
    }

    /// Deserialize a store from a byte slice.
    pub fn from_bytes(mut bytes: &[u8]) -> StoreResult<Self> {
        Self::load(&mut bytes)
    }
}

/// Write `magic`, the format version, and the bincode body of `value`.
pub(crate) fn write_framed<W, T>(writer: &mut W, magic: [u8; 4], value: &T) -> StoreResult<()>
where
    W: Write,
    T: Serialize + ?Sized,
{
    writer.write_all(&magic)?;
    writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
    bincode::serde::encode_into_std_write(value, writer, bincode::config::standard())
        .map_err(|e| StoreError::Io(std::io::Error::other(e.to_string())))?;
    writer.flush()?;
    Ok(())
}

/// Read a frame written by [`write_framed`] and decode its body.
pub(crate) fn read_framed<R, T>(reader: &mut R, magic: [u8; 4]) -> StoreResult<T>
where
    R: Read,
    T: DeserializeOwned,
{
    let mut header = [0u8; 8];
    reader
        .read_exact(&mut header)
        .map_err(|e| StoreError::CorruptPersistedState(format!("missing header: {}", e)))?;

    if header[..4] != magic {
        return Err(StoreError::CorruptPersistedState(format!(
            "bad magic bytes {:?}, expected {:?}",
            &header[..4],
            magic
        )));
    }

    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if version != FORMAT_VERSION {
        return Err(StoreError::CorruptPersistedState(format!(
            "unsupported format version {} (expected {})",
            version, FORMAT_VERSION
        )));
    }

    let value: T = bincode::serde::decode_from_std_read(reader, bincode::config::standard())
        .map_err(|e| StoreError::CorruptPersistedState(e.to_string()))?;

    let mut trailing = [0u8; 1];
    match reader.read(&mut trailing) {
        Ok(0) => Ok(value),
        Ok(_) => Err(StoreError::CorruptPersistedState(
            "unexpected trailing bytes after body".to_string(),
        )),
        Err(e) => Err(StoreError::Io(e)),
    }
}
