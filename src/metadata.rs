//! Container metadata - the durable artifact of a stitching run
//!
//! The container is a small JSON document describing one virtual dataset:
//! its shape, element type, fill value, and the list of region-to-region
//! mappings into the raw source files. Serialization is deliberately
//! deterministic (fixed field order, no timestamps, no maps) so an unchanged
//! plan always produces byte-identical output.

use crate::error::{Result, StitchError};
use crate::layout::VdsPlan;
use crate::selection::AxisSpan;
use crate::types::DataType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Format marker stored in every container
pub const CONTAINER_FORMAT: &str = "framestitch.vds";

/// Container format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VdsVersion {
    pub major: u16,
    pub minor: u16,
}

impl VdsVersion {
    pub const CURRENT: Self = Self { major: 1, minor: 0 };

    pub fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    pub fn is_compatible(&self, other: &Self) -> bool {
        self.major == other.major
    }
}

impl Default for VdsVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// One serialized region-to-region mapping.
///
/// `source` selects within the raw dataset, `target` within the virtual
/// array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMapping {
    pub source_file: PathBuf,
    pub source_dataset: String,
    pub source: Vec<AxisSpan>,
    pub target: Vec<AxisSpan>,
}

/// Everything a reader needs to dereference the virtual dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualContainer {
    pub format: String,
    pub version: VdsVersion,
    pub dataset_name: String,
    pub shape: Vec<usize>,
    pub data_type: DataType,
    pub fill_value: f64,
    pub mappings: Vec<SourceMapping>,
}

impl VirtualContainer {
    /// Build the serializable container from a finished plan.
    ///
    /// Mapping order follows the plan's selection order exactly.
    pub fn from_plan(plan: &VdsPlan, dataset_name: impl Into<String>) -> Self {
        let mappings = plan
            .selections
            .iter()
            .map(|sel| {
                let source = &plan.sources[sel.source_index];
                SourceMapping {
                    source_file: source.file_path.clone(),
                    source_dataset: source.dataset_path.clone(),
                    source: sel.source.spans().to_vec(),
                    target: sel.target.spans().to_vec(),
                }
            })
            .collect();

        Self {
            format: CONTAINER_FORMAT.to_string(),
            version: VdsVersion::default(),
            dataset_name: dataset_name.into(),
            shape: plan.target_shape.clone(),
            data_type: plan.data_type,
            fill_value: plan.fill_value,
            mappings,
        }
    }

    /// Verify the format marker and version compatibility of an opened file
    pub fn validate_format(&self) -> Result<()> {
        if self.format != CONTAINER_FORMAT {
            return Err(StitchError::InvalidFormat(format!(
                "unknown container format '{}'",
                self.format
            )));
        }
        if !self.version.is_compatible(&VdsVersion::CURRENT) {
            return Err(StitchError::InvalidFormat(format!(
                "container version {}.{} is not compatible with {}.{}",
                self.version.major,
                self.version.minor,
                VdsVersion::CURRENT.major,
                VdsVersion::CURRENT.minor
            )));
        }
        Ok(())
    }

    /// One-line description of the virtual dataset
    pub fn summary(&self) -> String {
        let shape = self
            .shape
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" x ");
        format!(
            "{} ({}), {} mappings, fill {}",
            shape,
            self.data_type,
            self.mappings.len(),
            self.fill_value
        )
    }
}
