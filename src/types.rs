//! Core data types for framestitch

use crate::error::{Result, StitchError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Element types supported for raw frame data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataType {
    /// Unsigned 8-bit integer
    U8 = 0,
    /// Unsigned 16-bit integer
    U16 = 1,
    /// Unsigned 32-bit integer
    U32 = 2,
    /// Unsigned 64-bit integer
    U64 = 3,
    /// Signed 8-bit integer
    I8 = 4,
    /// Signed 16-bit integer
    I16 = 5,
    /// Signed 32-bit integer
    I32 = 6,
    /// Signed 64-bit integer
    I64 = 7,
    /// 32-bit floating point
    F32 = 8,
    /// 64-bit floating point
    F64 = 9,
}

impl DataType {
    /// Size in bytes of this element type
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DataType::U8 | DataType::I8 => 1,
            DataType::U16 | DataType::I16 => 2,
            DataType::U32 | DataType::I32 | DataType::F32 => 4,
            DataType::U64 | DataType::I64 | DataType::F64 => 8,
        }
    }

    /// Check if this is a floating point type
    pub fn is_float(&self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Marker tying a Rust scalar to its on-disk element type
pub trait PixelValue: Copy + 'static {
    const DATA_TYPE: DataType;
}

macro_rules! impl_pixel_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl PixelValue for $ty {
            const DATA_TYPE: DataType = DataType::$variant;
        })*
    };
}

impl_pixel_value!(
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
);

/// Metadata carried by a raw dataset header - shape and element type only.
///
/// This is everything a metadata-only read yields; pixel bytes are never
/// loaded during discovery, validation or planning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetHeader {
    /// Internal dataset path within the file (e.g. "data")
    pub dataset_path: String,
    /// Dimension sizes, outermost first
    pub shape: Vec<usize>,
    /// Element type of the stored data
    pub data_type: DataType,
}

impl DatasetHeader {
    pub fn new(dataset_path: impl Into<String>, shape: Vec<usize>, data_type: DataType) -> Self {
        Self {
            dataset_path: dataset_path.into(),
            shape,
            data_type,
        }
    }

    /// Total number of elements described by the header
    pub fn total_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// Total payload size in bytes
    pub fn data_size_bytes(&self) -> usize {
        self.total_elements() * self.data_type.size_in_bytes()
    }
}

/// One raw acquisition file feeding a stitching plan.
///
/// Frame stacks are rank-3: `[frame_count, height, width]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSource {
    pub file_path: PathBuf,
    pub dataset_path: String,
    pub frame_shape: (usize, usize),
    pub frame_count: usize,
    pub data_type: DataType,
}

impl RawSource {
    /// Build a source descriptor from a header read off disk.
    ///
    /// Fails with `Validation` if the dataset is not a rank-3 frame stack.
    pub fn from_header(file_path: impl AsRef<Path>, header: &DatasetHeader) -> Result<Self> {
        let file_path = file_path.as_ref().to_path_buf();
        match header.shape.as_slice() {
            [frames, height, width] => Ok(Self {
                file_path,
                dataset_path: header.dataset_path.clone(),
                frame_shape: (*height, *width),
                frame_count: *frames,
                data_type: header.data_type,
            }),
            other => Err(StitchError::Validation(format!(
                "{}: expected a [frames, height, width] dataset, got rank {}",
                file_path.display(),
                other.len()
            ))),
        }
    }

    /// Full on-disk shape, outermost axis first
    pub fn shape(&self) -> [usize; 3] {
        [self.frame_count, self.frame_shape.0, self.frame_shape.1]
    }

    pub fn frame_height(&self) -> usize {
        self.frame_shape.0
    }

    pub fn frame_width(&self) -> usize {
        self.frame_shape.1
    }
}

/// Stitching geometry for one virtual dataset.
///
/// A closed set of strategies dispatched by exhaustive matching; adding a
/// mode is a compile-time-checked, localized change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    /// Weave frames from all sources in round-robin blocks along the frame
    /// axis.
    Interleave { block_size: usize },
    /// Stack per-source stripes along the row axis, with filler rows between
    /// stripes and extra filler at every `stripes_per_module`-th boundary.
    SubFrame {
        stripe_spacing: usize,
        module_spacing: usize,
        stripes_per_module: usize,
    },
    /// Spread the packed module/chip cells of a single source apart to match
    /// physical sensor geometry.
    GapFill {
        chip_spacing: usize,
        module_spacing: usize,
        modules: usize,
    },
}

impl LayoutMode {
    /// Short name used in log events and error messages
    pub fn name(&self) -> &'static str {
        match self {
            LayoutMode::Interleave { .. } => "interleave",
            LayoutMode::SubFrame { .. } => "sub-frame",
            LayoutMode::GapFill { .. } => "gap-fill",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_sizes() {
        assert_eq!(DataType::U8.size_in_bytes(), 1);
        assert_eq!(DataType::U16.size_in_bytes(), 2);
        assert_eq!(DataType::F32.size_in_bytes(), 4);
        assert_eq!(DataType::F64.size_in_bytes(), 8);
        assert!(DataType::F64.is_float());
        assert!(!DataType::U16.is_float());
    }

    #[test]
    fn test_pixel_value_mapping() {
        assert_eq!(<u16 as PixelValue>::DATA_TYPE, DataType::U16);
        assert_eq!(<f32 as PixelValue>::DATA_TYPE, DataType::F32);
    }

    #[test]
    fn test_raw_source_from_header() {
        let header = DatasetHeader::new("data", vec![100, 2048, 1536], DataType::U16);
        let source = RawSource::from_header("/scratch/run_0.rfs", &header).unwrap();
        assert_eq!(source.frame_count, 100);
        assert_eq!(source.frame_shape, (2048, 1536));
        assert_eq!(source.shape(), [100, 2048, 1536]);
    }

    #[test]
    fn test_raw_source_rejects_wrong_rank() {
        let header = DatasetHeader::new("data", vec![2048, 1536], DataType::U16);
        let err = RawSource::from_header("/scratch/run_0.rfs", &header).unwrap_err();
        assert!(matches!(err, StitchError::Validation(_)));
    }

    #[test]
    fn test_header_sizes() {
        let header = DatasetHeader::new("data", vec![4, 8, 16], DataType::U32);
        assert_eq!(header.total_elements(), 512);
        assert_eq!(header.data_size_bytes(), 2048);
    }
}
