//! Atomic assembly of the virtual-mapping container

use crate::error::{Result, StitchError};
use crate::io::StorageSession;
use crate::layout::VdsPlan;
use crate::metadata::VirtualContainer;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Writes a finished plan as a virtual-mapping container.
///
/// Before writing, every selection is checked against a fresh header read of
/// its source file, so a plan computed from stale metadata cannot reference
/// data that is not on disk.
pub struct VdsAssembler {
    session: Arc<dyn StorageSession>,
    dataset_name: String,
}

impl VdsAssembler {
    pub fn new(session: Arc<dyn StorageSession>) -> Self {
        Self {
            session,
            dataset_name: "data".to_string(),
        }
    }

    /// Name of the virtual dataset inside the container
    pub fn with_dataset_name(mut self, dataset_name: impl Into<String>) -> Self {
        self.dataset_name = dataset_name.into();
        self
    }

    /// Write the container for `plan` at `output_path` and return the path.
    ///
    /// The write goes to a temporary sibling first and is renamed into
    /// place; re-running an unchanged plan produces byte-identical output.
    pub async fn create(&self, plan: &VdsPlan, output_path: &Path) -> Result<PathBuf> {
        for source in &plan.sources {
            if source.data_type != plan.data_type {
                return Err(StitchError::Assembly(format!(
                    "{}: element type {} disagrees with plan type {}",
                    source.file_path.display(),
                    source.data_type,
                    plan.data_type
                )));
            }
        }

        for selection in &plan.selections {
            let source = plan.sources.get(selection.source_index).ok_or_else(|| {
                StitchError::Assembly(format!(
                    "selection references source {} of {}",
                    selection.source_index,
                    plan.sources.len()
                ))
            })?;

            let header = self.session.open_dataset(&source.file_path).await?;
            if header.data_type != plan.data_type {
                return Err(StitchError::Assembly(format!(
                    "{}: on-disk element type {} disagrees with plan type {}",
                    source.file_path.display(),
                    header.data_type,
                    plan.data_type
                )));
            }
            if !selection.source.fits_within(&header.shape) {
                return Err(StitchError::Assembly(format!(
                    "{}: selection {:?} exceeds on-disk shape {:?}",
                    source.file_path.display(),
                    selection.source.spans(),
                    header.shape
                )));
            }
            if !selection.target.fits_within(&plan.target_shape) {
                return Err(StitchError::Assembly(format!(
                    "selection {:?} exceeds target shape {:?}",
                    selection.target.spans(),
                    plan.target_shape
                )));
            }
        }

        let container = VirtualContainer::from_plan(plan, &self.dataset_name);
        tracing::info!(
            output = %output_path.display(),
            summary = %container.summary(),
            "assembling virtual dataset"
        );
        self.session
            .create_virtual_dataset(output_path, &container)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{write_raw_dataset, FileStorageSession};
    use crate::layout::plan_layout;
    use crate::types::{DataType, DatasetHeader, LayoutMode, RawSource};
    use crate::utils::typed_data_to_bytes;
    use tempfile::TempDir;

    async fn write_stack(dir: &Path, name: &str, frames: usize, height: usize, width: usize) {
        let header = DatasetHeader::new("data", vec![frames, height, width], DataType::U16);
        let data: Vec<u16> = (0..frames * height * width).map(|v| v as u16).collect();
        write_raw_dataset(dir.join(name), &header, &typed_data_to_bytes(&data))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_writes_container() {
        let temp_dir = TempDir::new().unwrap();
        write_stack(temp_dir.path(), "stack_0.rfs", 4, 8, 8).await;

        let session = Arc::new(FileStorageSession::new());
        let source = RawSource {
            file_path: temp_dir.path().join("stack_0.rfs"),
            dataset_path: "data".to_string(),
            frame_shape: (8, 8),
            frame_count: 4,
            data_type: DataType::U16,
        };
        let plan = plan_layout(
            &[source],
            &LayoutMode::Interleave { block_size: 2 },
            0.0,
        )
        .unwrap();

        let assembler = VdsAssembler::new(session.clone());
        let output = temp_dir.path().join("stack_vds.vds");
        let written = assembler.create(&plan, &output).await.unwrap();
        assert_eq!(written, output);

        let container = session.open_virtual_dataset(&output).await.unwrap();
        assert_eq!(container.shape, vec![4, 8, 8]);
        assert_eq!(container.dataset_name, "data");
    }

    #[tokio::test]
    async fn test_create_rejects_out_of_bounds_selection() {
        let temp_dir = TempDir::new().unwrap();
        // on disk: only 3 frames
        write_stack(temp_dir.path(), "stack_0.rfs", 3, 8, 8).await;

        let session = Arc::new(FileStorageSession::new());
        // plan built from a stale descriptor claiming 4 frames
        let source = RawSource {
            file_path: temp_dir.path().join("stack_0.rfs"),
            dataset_path: "data".to_string(),
            frame_shape: (8, 8),
            frame_count: 4,
            data_type: DataType::U16,
        };
        let plan = plan_layout(
            &[source],
            &LayoutMode::Interleave { block_size: 2 },
            0.0,
        )
        .unwrap();

        let assembler = VdsAssembler::new(session);
        let output = temp_dir.path().join("stack_vds.vds");
        let err = assembler.create(&plan, &output).await.unwrap_err();
        assert!(matches!(err, StitchError::Assembly(_)));
        assert!(!output.exists());
    }
}
