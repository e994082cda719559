//! Framestitch - virtual stitching of split detector frame stacks
//!
//! Assembles multiple physically separate raw frame files into one logical
//! array container using virtual (zero-copy) mapping: the output stores only
//! a description of which regions of which source files occupy which regions
//! of a single logical array, never a copy of the pixel data.
//!
//! # Features
//!
//! - Three stitching geometries: round-robin frame interleaving, stripe
//!   stacking with module spacing, and module/chip gap filling
//! - Metadata-only planning: headers are read, pixel bytes never move
//! - Atomic container writes: the output is fully valid or absent
//! - Deterministic plans: unchanged inputs produce byte-identical output
//! - Read-back access resolving mapped regions and fill values
//!
//! # Example
//!
//! ```rust,ignore
//! use framestitch::VdsGenerator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Weave stack_0.rfs, stack_1.rfs, ... into one virtual dataset,
//! // ten frames at a time from each source in turn.
//! let output = VdsGenerator::interleave("/data/run42", "stack", 10, 0.0)
//!     .generate_vds()
//!     .await?;
//! println!("wrote {}", output.display());
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod assembler;
pub mod catalog;
pub mod error;
pub mod generator;
pub mod io;
pub mod layout;
pub mod metadata;
pub mod selection;
pub mod types;
pub mod utils;

// Re-exports
pub use access::VirtualDataAccess;
pub use assembler::VdsAssembler;
pub use catalog::RawSourceCatalog;
pub use error::{Result, StitchError};
pub use generator::VdsGenerator;
pub use io::{FileStorageSession, StorageSession};
pub use layout::{plan_layout, VdsPlan};
pub use metadata::{VdsVersion, VirtualContainer};
pub use selection::{AxisSpan, Hyperslab, Selection};
pub use types::{DataType, DatasetHeader, LayoutMode, RawSource};

/// Version of the framestitch implementation
pub const FRAMESTITCH_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Magic number for raw frame-stack files
pub const RAW_MAGIC: &[u8; 4] = b"RFS\0";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!FRAMESTITCH_VERSION.is_empty());
    }
}
