//! Storage sessions - the explicit seam between planning and the filesystem
//!
//! All header reads and container writes go through a [`StorageSession`]
//! instance threaded into the catalog and assembler. Nothing in this crate
//! keeps library-global handle state; two sessions never share a cache.
//!
//! Raw frame-stack files carry a 4-byte magic, a little-endian `u32` header
//! length, a bincode-encoded [`DatasetHeader`], then row-major frame data.

use crate::error::{Result, StitchError};
use crate::metadata::VirtualContainer;
use crate::types::DatasetHeader;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::SeekFrom;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use uuid::Uuid;

/// Trait for the storage operations stitching needs
#[async_trait]
pub trait StorageSession: Send + Sync {
    /// List the files of a directory
    async fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    /// Read only the dataset header of a raw file - never the pixel data
    async fn open_dataset(&self, path: &Path) -> Result<DatasetHeader>;

    /// Read a contiguous, full-width row range of one frame
    async fn read_frame_rows(&self, path: &Path, frame: usize, rows: Range<usize>)
        -> Result<Bytes>;

    /// Atomically write a virtual-mapping container at `path`
    async fn create_virtual_dataset(
        &self,
        path: &Path,
        container: &VirtualContainer,
    ) -> Result<PathBuf>;

    /// Read back a virtual-mapping container
    async fn open_virtual_dataset(&self, path: &Path) -> Result<VirtualContainer>;
}

#[derive(Debug, Clone)]
struct CachedHeader {
    data_offset: u64,
    header: DatasetHeader,
}

/// Local filesystem session with a per-instance header cache
pub struct FileStorageSession {
    headers: RwLock<HashMap<PathBuf, CachedHeader>>,
}

impl FileStorageSession {
    pub fn new() -> Self {
        Self {
            headers: RwLock::new(HashMap::new()),
        }
    }

    async fn cached_header(&self, path: &Path) -> Result<CachedHeader> {
        if let Some(cached) = self.headers.read().get(path) {
            return Ok(cached.clone());
        }

        let mut file = fs::File::open(path).await.map_err(StitchError::Io)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic).await.map_err(StitchError::Io)?;
        if &magic != crate::RAW_MAGIC {
            return Err(StitchError::InvalidFormat(format!(
                "{}: bad magic {:?}",
                path.display(),
                magic
            )));
        }

        let mut len_bytes = [0u8; 4];
        file.read_exact(&mut len_bytes)
            .await
            .map_err(StitchError::Io)?;
        let header_len = u32::from_le_bytes(len_bytes) as usize;

        let mut encoded = vec![0u8; header_len];
        file.read_exact(&mut encoded)
            .await
            .map_err(StitchError::Io)?;
        let header: DatasetHeader = bincode::deserialize(&encoded)?;

        let cached = CachedHeader {
            data_offset: (8 + header_len) as u64,
            header,
        };
        self.headers
            .write()
            .insert(path.to_path_buf(), cached.clone());
        Ok(cached)
    }
}

impl Default for FileStorageSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageSession for FileStorageSession {
    async fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(dir).await.map_err(StitchError::Io)?;

        while let Some(entry) = read_dir.next_entry().await.map_err(StitchError::Io)? {
            let file_type = entry.file_type().await.map_err(StitchError::Io)?;
            if file_type.is_file() {
                entries.push(entry.path());
            }
        }

        Ok(entries)
    }

    async fn open_dataset(&self, path: &Path) -> Result<DatasetHeader> {
        Ok(self.cached_header(path).await?.header)
    }

    async fn read_frame_rows(
        &self,
        path: &Path,
        frame: usize,
        rows: Range<usize>,
    ) -> Result<Bytes> {
        let cached = self.cached_header(path).await?;
        let (frames, height, width) = match cached.header.shape.as_slice() {
            [frames, height, width] => (*frames, *height, *width),
            other => {
                return Err(StitchError::InvalidFormat(format!(
                    "{}: expected a rank-3 frame stack, got rank {}",
                    path.display(),
                    other.len()
                )))
            }
        };

        if frame >= frames || rows.start > rows.end || rows.end > height {
            return Err(StitchError::OutOfBounds(format!(
                "{}: frame {} rows {}..{} outside [{}, {}, {}]",
                path.display(),
                frame,
                rows.start,
                rows.end,
                frames,
                height,
                width
            )));
        }

        let elem = cached.header.data_type.size_in_bytes();
        let offset = cached.data_offset + ((frame * height + rows.start) * width * elem) as u64;
        let len = (rows.end - rows.start) * width * elem;

        let mut file = fs::File::open(path).await.map_err(StitchError::Io)?;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(StitchError::Io)?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).await.map_err(StitchError::Io)?;
        Ok(Bytes::from(buf))
    }

    async fn create_virtual_dataset(
        &self,
        path: &Path,
        container: &VirtualContainer,
    ) -> Result<PathBuf> {
        let json = serde_json::to_vec_pretty(container)?;

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).await.map_err(StitchError::Io)?;

        let file_name = path.file_name().ok_or_else(|| {
            StitchError::Assembly(format!("output path {} has no file name", path.display()))
        })?;

        // Write next to the final path, then rename: the container is either
        // fully valid under its final name or absent.
        let temp_path = parent.join(format!(
            "{}.tmp-{}",
            file_name.to_string_lossy(),
            Uuid::new_v4().simple()
        ));

        let mut file = fs::File::create(&temp_path).await.map_err(StitchError::Io)?;
        file.write_all(&json).await.map_err(StitchError::Io)?;
        file.flush().await.map_err(StitchError::Io)?;
        drop(file);

        fs::rename(&temp_path, path).await.map_err(StitchError::Io)?;
        tracing::debug!(path = %path.display(), bytes = json.len(), "wrote virtual container");
        Ok(path.to_path_buf())
    }

    async fn open_virtual_dataset(&self, path: &Path) -> Result<VirtualContainer> {
        let bytes = fs::read(path).await.map_err(StitchError::Io)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Write a raw frame-stack file.
///
/// `data` must be the full row-major payload matching the header's shape and
/// element type. Used by acquisition simulators and tests; the stitching core
/// itself never writes raw files.
pub async fn write_raw_dataset(
    path: impl AsRef<Path>,
    header: &DatasetHeader,
    data: &[u8],
) -> Result<()> {
    let path = path.as_ref();
    let expected = header.data_size_bytes();
    if data.len() != expected {
        return Err(StitchError::InvalidFormat(format!(
            "{}: payload is {} bytes, header declares {}",
            path.display(),
            data.len(),
            expected
        )));
    }

    let encoded = bincode::serialize(header)?;

    let mut file = fs::File::create(path).await.map_err(StitchError::Io)?;
    file.write_all(crate::RAW_MAGIC)
        .await
        .map_err(StitchError::Io)?;
    file.write_all(&(encoded.len() as u32).to_le_bytes())
        .await
        .map_err(StitchError::Io)?;
    file.write_all(&encoded).await.map_err(StitchError::Io)?;
    file.write_all(data).await.map_err(StitchError::Io)?;
    file.flush().await.map_err(StitchError::Io)?;
    Ok(())
}
