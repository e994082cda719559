//! Raw source discovery and per-mode validation

use crate::error::{Result, StitchError};
use crate::io::StorageSession;
use crate::types::{LayoutMode, RawSource};
use futures::future::try_join_all;
use std::path::Path;
use std::sync::Arc;

/// Discovers raw sources and checks the homogeneity a mode requires.
///
/// Only dataset headers are ever read; pixel data stays on disk.
pub struct RawSourceCatalog {
    session: Arc<dyn StorageSession>,
}

impl RawSourceCatalog {
    pub fn new(session: Arc<dyn StorageSession>) -> Self {
        Self { session }
    }

    /// Find raw files named `{prefix}_{index}.{ext}` under `root_dir`,
    /// ordered by the numeric index embedded in each filename.
    pub async fn discover(&self, root_dir: &Path, prefix: &str) -> Result<Vec<RawSource>> {
        let entries = self.session.list_dir(root_dir).await?;

        let mut matched: Vec<(u64, std::path::PathBuf)> = entries
            .into_iter()
            .filter_map(|path| {
                let index = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .and_then(|name| parse_source_index(name, prefix))?;
                Some((index, path))
            })
            .collect();

        if matched.is_empty() {
            return Err(StitchError::Discovery(format!(
                "no raw files matching '{}_<index>' under {}",
                prefix,
                root_dir.display()
            )));
        }

        matched.sort();

        let headers = try_join_all(
            matched
                .iter()
                .map(|(_, path)| self.session.open_dataset(path)),
        )
        .await?;

        matched
            .iter()
            .zip(headers.iter())
            .map(|((_, path), header)| RawSource::from_header(path, header))
            .collect()
    }

    /// Check dtype equality across all sources, plus the shape and
    /// frame-count homogeneity `mode` relies on.
    pub fn validate(&self, sources: &[RawSource], mode: &LayoutMode) -> Result<()> {
        let Some(first) = sources.first() else {
            return Err(StitchError::Validation(
                "no sources to validate".to_string(),
            ));
        };

        let dtype_offenders: Vec<String> = sources
            .iter()
            .filter(|s| s.data_type != first.data_type)
            .map(|s| s.file_path.display().to_string())
            .collect();
        if !dtype_offenders.is_empty() {
            return Err(StitchError::Validation(format!(
                "element type mismatch: {} differ from {} ({})",
                dtype_offenders.join(", "),
                first.file_path.display(),
                first.data_type
            )));
        }

        match mode {
            LayoutMode::Interleave { .. } => {
                // frame counts may differ; frame geometry may not
                let offenders: Vec<String> = sources
                    .iter()
                    .filter(|s| s.frame_shape != first.frame_shape)
                    .map(|s| s.file_path.display().to_string())
                    .collect();
                if !offenders.is_empty() {
                    return Err(StitchError::Validation(format!(
                        "frame shape mismatch for interleaving: {} differ from {:?}",
                        offenders.join(", "),
                        first.frame_shape
                    )));
                }
            }
            LayoutMode::SubFrame { .. } => {
                self.check_equal_frame_counts(sources, first)?;
                let offenders: Vec<String> = sources
                    .iter()
                    .filter(|s| s.frame_width() != first.frame_width())
                    .map(|s| s.file_path.display().to_string())
                    .collect();
                if !offenders.is_empty() {
                    return Err(StitchError::Validation(format!(
                        "stripe width mismatch: {} differ from {}",
                        offenders.join(", "),
                        first.frame_width()
                    )));
                }
            }
            LayoutMode::GapFill { .. } => {
                self.check_equal_frame_counts(sources, first)?;
            }
        }

        Ok(())
    }

    fn check_equal_frame_counts(&self, sources: &[RawSource], first: &RawSource) -> Result<()> {
        let offenders: Vec<String> = sources
            .iter()
            .filter(|s| s.frame_count != first.frame_count)
            .map(|s| format!("{} ({} frames)", s.file_path.display(), s.frame_count))
            .collect();
        if !offenders.is_empty() {
            return Err(StitchError::Validation(format!(
                "frame count mismatch: {} differ from {} frames",
                offenders.join(", "),
                first.frame_count
            )));
        }
        Ok(())
    }
}

/// Extract the numeric index from a `{prefix}_{index}.{ext}` file name
fn parse_source_index(file_name: &str, prefix: &str) -> Option<u64> {
    let rest = file_name.strip_prefix(prefix)?;
    let rest = rest.strip_prefix('_')?;
    let digits = rest.split('.').next()?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;
    use std::path::PathBuf;

    fn source(name: &str, frame_count: usize, shape: (usize, usize), dtype: DataType) -> RawSource {
        RawSource {
            file_path: PathBuf::from(name),
            dataset_path: "data".to_string(),
            frame_shape: shape,
            frame_count,
            data_type: dtype,
        }
    }

    fn catalog() -> RawSourceCatalog {
        RawSourceCatalog::new(Arc::new(crate::io::FileStorageSession::new()))
    }

    #[test]
    fn test_parse_source_index() {
        assert_eq!(parse_source_index("stack_0.rfs", "stack"), Some(0));
        assert_eq!(parse_source_index("stack_017.rfs", "stack"), Some(17));
        assert_eq!(parse_source_index("run_a_3.rfs", "run_a"), Some(3));
        assert_eq!(parse_source_index("stack_vds.vds", "stack"), None);
        assert_eq!(parse_source_index("other_1.rfs", "stack"), None);
        assert_eq!(parse_source_index("stack1.rfs", "stack"), None);
        assert_eq!(parse_source_index("stack_.rfs", "stack"), None);
    }

    #[test]
    fn test_validate_rejects_dtype_mismatch() {
        let sources = vec![
            source("a_0.rfs", 10, (32, 32), DataType::U16),
            source("a_1.rfs", 10, (32, 32), DataType::F32),
        ];
        let err = catalog()
            .validate(&sources, &LayoutMode::Interleave { block_size: 2 })
            .unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, StitchError::Validation(_)));
        assert!(message.contains("a_1.rfs"));
    }

    #[test]
    fn test_validate_interleave_allows_uneven_counts() {
        let sources = vec![
            source("a_0.rfs", 30, (32, 32), DataType::U16),
            source("a_1.rfs", 5, (32, 32), DataType::U16),
        ];
        catalog()
            .validate(&sources, &LayoutMode::Interleave { block_size: 2 })
            .unwrap();
    }

    #[test]
    fn test_validate_interleave_rejects_shape_mismatch() {
        let sources = vec![
            source("a_0.rfs", 10, (32, 32), DataType::U16),
            source("a_1.rfs", 10, (32, 48), DataType::U16),
        ];
        let err = catalog()
            .validate(&sources, &LayoutMode::Interleave { block_size: 2 })
            .unwrap_err();
        assert!(matches!(err, StitchError::Validation(_)));
    }

    #[test]
    fn test_validate_sub_frame_rejects_count_mismatch() {
        let sources = vec![
            source("a_0.rfs", 10, (32, 32), DataType::U16),
            source("a_1.rfs", 12, (32, 32), DataType::U16),
        ];
        let err = catalog()
            .validate(
                &sources,
                &LayoutMode::SubFrame {
                    stripe_spacing: 0,
                    module_spacing: 0,
                    stripes_per_module: 2,
                },
            )
            .unwrap_err();
        assert!(err.to_string().contains("a_1.rfs"));
    }

    #[test]
    fn test_validate_sub_frame_allows_uneven_heights() {
        let sources = vec![
            source("a_0.rfs", 10, (100, 32), DataType::U16),
            source("a_1.rfs", 10, (50, 32), DataType::U16),
        ];
        catalog()
            .validate(
                &sources,
                &LayoutMode::SubFrame {
                    stripe_spacing: 1,
                    module_spacing: 1,
                    stripes_per_module: 2,
                },
            )
            .unwrap();
    }
}
