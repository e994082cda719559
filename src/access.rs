//! Read-back access to an assembled virtual dataset
//!
//! The container never materializes pixel bytes; this module is where a
//! downstream reader dereferences the mapping, pulling each mapped region
//! from its raw source file and filling uncovered cells with the recorded
//! fill value.

use crate::error::{Result, StitchError};
use crate::io::StorageSession;
use crate::metadata::{SourceMapping, VirtualContainer};
use crate::types::{DataType, PixelValue};
use crate::utils::bytes_to_typed_data;
use ndarray::{s, Array2, ArrayView1};
use num_traits::NumCast;
use std::path::Path;
use std::sync::Arc;

/// Reader over one virtual-mapping container
pub struct VirtualDataAccess {
    session: Arc<dyn StorageSession>,
    container: VirtualContainer,
}

impl VirtualDataAccess {
    /// Open a container and verify its format marker and version
    pub async fn open(session: Arc<dyn StorageSession>, path: &Path) -> Result<Self> {
        let container = session.open_virtual_dataset(path).await?;
        container.validate_format()?;
        if container.shape.len() != 3 {
            return Err(StitchError::InvalidFormat(format!(
                "{}: expected a rank-3 virtual dataset, got rank {}",
                path.display(),
                container.shape.len()
            )));
        }
        Ok(Self { session, container })
    }

    pub fn container(&self) -> &VirtualContainer {
        &self.container
    }

    pub fn shape(&self) -> &[usize] {
        &self.container.shape
    }

    pub fn data_type(&self) -> DataType {
        self.container.data_type
    }

    pub fn fill_value(&self) -> f64 {
        self.container.fill_value
    }

    /// Read virtual frame `frame` into a freshly allocated array.
    ///
    /// Cells no mapping covers hold the container's fill value cast to `T`.
    pub async fn read_frame<T>(&self, frame: usize) -> Result<Array2<T>>
    where
        T: PixelValue + NumCast,
    {
        if T::DATA_TYPE != self.container.data_type {
            return Err(StitchError::InvalidFormat(format!(
                "requested element type {} but container holds {}",
                T::DATA_TYPE,
                self.container.data_type
            )));
        }
        if frame >= self.container.shape[0] {
            return Err(StitchError::OutOfBounds(format!(
                "frame {} outside virtual dataset of {} frames",
                frame, self.container.shape[0]
            )));
        }

        let fill: T = NumCast::from(self.container.fill_value).ok_or_else(|| {
            StitchError::InvalidFormat(format!(
                "fill value {} is not representable as {}",
                self.container.fill_value,
                T::DATA_TYPE
            ))
        })?;

        let (height, width) = (self.container.shape[1], self.container.shape[2]);
        let mut out = Array2::from_elem((height, width), fill);

        for mapping in &self.container.mappings {
            self.apply_mapping(mapping, frame, &mut out).await?;
        }

        Ok(out)
    }

    async fn apply_mapping<T>(
        &self,
        mapping: &SourceMapping,
        frame: usize,
        out: &mut Array2<T>,
    ) -> Result<()>
    where
        T: PixelValue + NumCast,
    {
        if mapping.source.len() != 3 || mapping.target.len() != 3 {
            return Err(StitchError::InvalidFormat(
                "expected rank-3 mappings".to_string(),
            ));
        }
        if mapping
            .source
            .iter()
            .chain(mapping.target.iter())
            .any(|span| span.stride.is_some())
        {
            return Err(StitchError::InvalidFormat(
                "strided mappings are not supported by the reader".to_string(),
            ));
        }

        let frame_span = mapping.target[0];
        if frame < frame_span.start || frame >= frame_span.end() {
            return Ok(());
        }

        let source_frame = mapping.source[0].start + (frame - frame_span.start);
        let source_rows = mapping.source[1];
        let source_cols = mapping.source[2];
        let target_rows = mapping.target[1];
        let target_cols = mapping.target[2];

        let header = self.session.open_dataset(&mapping.source_file).await?;
        let source_width = match header.shape.as_slice() {
            [_, _, width] => *width,
            other => {
                return Err(StitchError::InvalidFormat(format!(
                    "{}: expected a rank-3 frame stack, got rank {}",
                    mapping.source_file.display(),
                    other.len()
                )))
            }
        };

        let bytes = self
            .session
            .read_frame_rows(
                &mapping.source_file,
                source_frame,
                source_rows.start..source_rows.end(),
            )
            .await?;
        let values: Vec<T> = bytes_to_typed_data(&bytes)?;

        for (row, row_values) in values.chunks(source_width).enumerate() {
            let target_row = target_rows.start + row;
            let window = &row_values[source_cols.start..source_cols.start + source_cols.count];
            out.slice_mut(s![
                target_row,
                target_cols.start..target_cols.start + target_cols.count
            ])
            .assign(&ArrayView1::from(window));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::VdsAssembler;
    use crate::io::{write_raw_dataset, FileStorageSession};
    use crate::layout::plan_layout;
    use crate::types::{DatasetHeader, LayoutMode, RawSource};
    use crate::utils::typed_data_to_bytes;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_back_gap_fill_frame() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("stack_0.rfs");

        // one frame, 8 rows of 4 columns, each row filled with its row index
        let header = DatasetHeader::new("data", vec![1, 8, 4], DataType::U16);
        let data: Vec<u16> = (0..8u16).flat_map(|r| [r; 4]).collect();
        write_raw_dataset(&path, &header, &typed_data_to_bytes(&data))
            .await
            .unwrap();

        let session = Arc::new(FileStorageSession::new());
        let source = RawSource {
            file_path: path,
            dataset_path: "data".to_string(),
            frame_shape: (8, 4),
            frame_count: 1,
            data_type: DataType::U16,
        };
        let plan = plan_layout(
            &[source],
            &LayoutMode::GapFill {
                chip_spacing: 1,
                module_spacing: 3,
                modules: 2,
            },
            9999.0,
        )
        .unwrap();

        let output = temp_dir.path().join("stack_vds.vds");
        VdsAssembler::new(session.clone())
            .create(&plan, &output)
            .await
            .unwrap();

        let access = VirtualDataAccess::open(session, &output).await.unwrap();
        // 8 rows + 1 module gap of 3 extra + 1 chip gap of 1 per module
        assert_eq!(access.shape(), &[1, 12, 4]);

        let frame = access.read_frame::<u16>(0).await.unwrap();
        // chips land at rows 0-1, 3-4, 7-8, 10-11; the rest is fill
        let expected: [u16; 12] = [0, 1, 9999, 2, 3, 9999, 9999, 4, 5, 9999, 6, 7];
        for (row, &value) in expected.iter().enumerate() {
            assert_eq!(frame[[row, 0]], value, "row {}", row);
            assert_eq!(frame[[row, 3]], value, "row {}", row);
        }
    }

    #[tokio::test]
    async fn test_read_frame_rejects_wrong_type() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("stack_0.rfs");

        let header = DatasetHeader::new("data", vec![1, 2, 2], DataType::U16);
        let data: Vec<u16> = vec![0; 4];
        write_raw_dataset(&path, &header, &typed_data_to_bytes(&data))
            .await
            .unwrap();

        let session = Arc::new(FileStorageSession::new());
        let source = RawSource {
            file_path: path,
            dataset_path: "data".to_string(),
            frame_shape: (2, 2),
            frame_count: 1,
            data_type: DataType::U16,
        };
        let plan = plan_layout(&[source], &LayoutMode::Interleave { block_size: 1 }, 0.0).unwrap();
        let output = temp_dir.path().join("stack_vds.vds");
        VdsAssembler::new(session.clone())
            .create(&plan, &output)
            .await
            .unwrap();

        let access = VirtualDataAccess::open(session, &output).await.unwrap();
        let err = access.read_frame::<f32>(0).await.unwrap_err();
        assert!(matches!(err, StitchError::InvalidFormat(_)));
        let err = access.read_frame::<u16>(1).await.unwrap_err();
        assert!(matches!(err, StitchError::OutOfBounds(_)));
    }
}
