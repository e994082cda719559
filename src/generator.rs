//! Generation entry points - discovery, validation, planning and assembly
//! wired together for one output file

use crate::assembler::VdsAssembler;
use crate::catalog::RawSourceCatalog;
use crate::error::Result;
use crate::io::{FileStorageSession, StorageSession};
use crate::layout::plan_layout;
use crate::types::LayoutMode;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default stripes per module used by [`VdsGenerator::sub_frame`]
pub const DEFAULT_STRIPES_PER_MODULE: usize = 2;

/// One-shot generator for a virtual dataset.
///
/// Holds no state between runs; every [`generate_vds`](Self::generate_vds)
/// call rediscovers sources and plans from scratch, so distinct generators
/// targeting distinct outputs can run in parallel without coordination.
pub struct VdsGenerator {
    session: Arc<dyn StorageSession>,
    root_dir: PathBuf,
    prefix: String,
    mode: LayoutMode,
    fill_value: f64,
    output_path: Option<PathBuf>,
    dataset_name: String,
}

impl VdsGenerator {
    /// Generator over `{root_dir}/{prefix}_<index>.<ext>` raw files.
    ///
    /// `fill_value` is recorded in the container and read back from every
    /// virtual region no selection covers; there is no implicit default.
    pub fn new(
        root_dir: impl AsRef<Path>,
        prefix: impl Into<String>,
        mode: LayoutMode,
        fill_value: f64,
    ) -> Self {
        Self {
            session: Arc::new(FileStorageSession::new()),
            root_dir: root_dir.as_ref().to_path_buf(),
            prefix: prefix.into(),
            mode,
            fill_value,
            output_path: None,
            dataset_name: "data".to_string(),
        }
    }

    /// Interleave generator weaving round-robin blocks of `block_size` frames
    pub fn interleave(
        root_dir: impl AsRef<Path>,
        prefix: impl Into<String>,
        block_size: usize,
        fill_value: f64,
    ) -> Self {
        Self::new(
            root_dir,
            prefix,
            LayoutMode::Interleave { block_size },
            fill_value,
        )
    }

    /// Sub-frame generator stacking stripes with the default module grouping
    pub fn sub_frame(
        root_dir: impl AsRef<Path>,
        prefix: impl Into<String>,
        stripe_spacing: usize,
        module_spacing: usize,
        fill_value: f64,
    ) -> Self {
        Self::new(
            root_dir,
            prefix,
            LayoutMode::SubFrame {
                stripe_spacing,
                module_spacing,
                stripes_per_module: DEFAULT_STRIPES_PER_MODULE,
            },
            fill_value,
        )
    }

    /// Gap-fill generator spreading packed module/chip cells apart
    pub fn gap_fill(
        root_dir: impl AsRef<Path>,
        prefix: impl Into<String>,
        chip_spacing: usize,
        module_spacing: usize,
        modules: usize,
        fill_value: f64,
    ) -> Self {
        Self::new(
            root_dir,
            prefix,
            LayoutMode::GapFill {
                chip_spacing,
                module_spacing,
                modules,
            },
            fill_value,
        )
    }

    /// Use a specific storage session instead of a fresh filesystem one
    pub fn with_session(mut self, session: Arc<dyn StorageSession>) -> Self {
        self.session = session;
        self
    }

    /// Override the output path
    pub fn with_output_path(mut self, output_path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(output_path.into());
        self
    }

    /// Name of the virtual dataset inside the container
    pub fn with_dataset_name(mut self, dataset_name: impl Into<String>) -> Self {
        self.dataset_name = dataset_name.into();
        self
    }

    /// Where the container will be written
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .clone()
            .unwrap_or_else(|| self.root_dir.join(format!("{}_vds.vds", self.prefix)))
    }

    /// Discover, validate, plan and assemble; returns the container path.
    ///
    /// Errors surface synchronously and are never retried here; an aborted
    /// run leaves any previous output untouched.
    pub async fn generate_vds(&self) -> Result<PathBuf> {
        let catalog = RawSourceCatalog::new(self.session.clone());
        let sources = catalog.discover(&self.root_dir, &self.prefix).await?;
        catalog.validate(&sources, &self.mode)?;

        let plan = plan_layout(&sources, &self.mode, self.fill_value)?;
        tracing::info!(
            mode = self.mode.name(),
            sources = sources.len(),
            summary = %plan.summary(),
            "planned virtual layout"
        );

        let assembler =
            VdsAssembler::new(self.session.clone()).with_dataset_name(&self.dataset_name);
        assembler.create(&plan, &self.output_path()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        let generator = VdsGenerator::interleave("/scratch/run42", "stack", 10, 0.0);
        assert_eq!(
            generator.output_path(),
            PathBuf::from("/scratch/run42/stack_vds.vds")
        );
    }

    #[test]
    fn test_output_path_override() {
        let generator = VdsGenerator::interleave("/scratch/run42", "stack", 10, 0.0)
            .with_output_path("/out/combined.vds");
        assert_eq!(generator.output_path(), PathBuf::from("/out/combined.vds"));
    }
}
