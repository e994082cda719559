//! Layout planning - turns validated raw sources plus a stitching mode into
//! an ordered, non-overlapping, fully-covering list of selections
//!
//! Each planner guarantees exact tiling of the mapped region: no source frame
//! is duplicated or skipped, and target regions never overlap. Rows left
//! unmapped by the sub-frame and gap-fill geometries read back as the plan's
//! fill value.

use crate::error::{Result, StitchError};
use crate::selection::{stack_offsets, tile_offsets, AxisSpan, Hyperslab, Selection};
use crate::types::{DataType, LayoutMode, RawSource};

/// Chip rows per module in gap-filled sensor geometry
pub const CHIPS_PER_MODULE: usize = 2;

/// Complete description of one virtual dataset to assemble.
///
/// Produced fresh on every generation run and never persisted between runs;
/// the only durable artifact is the container the assembler writes from it.
#[derive(Debug, Clone, PartialEq)]
pub struct VdsPlan {
    /// Raw sources referenced by the selections, in discovery order
    pub sources: Vec<RawSource>,
    /// Region mappings in deterministic output order
    pub selections: Vec<Selection>,
    /// Shape of the virtual dataset, outermost axis first
    pub target_shape: Vec<usize>,
    pub data_type: DataType,
    /// Value read back from virtual regions no selection covers
    pub fill_value: f64,
}

impl VdsPlan {
    /// Number of elements covered by the selections (excluding fill regions)
    pub fn mapped_elements(&self) -> usize {
        self.selections.iter().map(|s| s.target.total_count()).sum()
    }

    /// One-line description of the planned dataset
    pub fn summary(&self) -> String {
        let shape = self
            .target_shape
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" x ");
        format!(
            "{} ({}), {} selections over {} sources",
            shape,
            self.data_type,
            self.selections.len(),
            self.sources.len()
        )
    }
}

/// Compute the selection list for the given sources and mode.
///
/// Sources are assumed to have passed catalog validation for `mode`; the
/// planners still re-check the constraints their own arithmetic relies on.
pub fn plan_layout(sources: &[RawSource], mode: &LayoutMode, fill_value: f64) -> Result<VdsPlan> {
    if sources.is_empty() {
        return Err(StitchError::Layout(
            "cannot plan a layout over an empty source list".to_string(),
        ));
    }

    match *mode {
        LayoutMode::Interleave { block_size } => plan_interleave(sources, block_size, fill_value),
        LayoutMode::SubFrame {
            stripe_spacing,
            module_spacing,
            stripes_per_module,
        } => plan_sub_frame(
            sources,
            stripe_spacing,
            module_spacing,
            stripes_per_module,
            fill_value,
        ),
        LayoutMode::GapFill {
            chip_spacing,
            module_spacing,
            modules,
        } => plan_gap_fill(sources, chip_spacing, module_spacing, modules, fill_value),
    }
}

/// Weave frames from all sources into one sequence in round-robin block
/// order.
///
/// Each round visits the sources in index order; a source contributes its
/// next run of up to `block_size` unread frames (shorter on its final
/// partial block) and is skipped once exhausted. Frame geometry passes
/// through unchanged.
fn plan_interleave(sources: &[RawSource], block_size: usize, fill_value: f64) -> Result<VdsPlan> {
    if block_size == 0 {
        return Err(StitchError::Layout(
            "interleave block size must be at least 1".to_string(),
        ));
    }

    let (height, width) = sources[0].frame_shape;
    let total_frames: usize = sources.iter().map(|s| s.frame_count).sum();

    // Emit (source, source-start, length) blocks in virtual order, then let
    // stack_offsets place them end to end along the frame axis.
    let mut drawn = vec![0usize; sources.len()];
    let mut blocks = Vec::new();
    let mut remaining = total_frames;
    while remaining > 0 {
        for (index, source) in sources.iter().enumerate() {
            let unread = source.frame_count - drawn[index];
            if unread == 0 {
                continue;
            }
            let take = unread.min(block_size);
            blocks.push((index, drawn[index], take));
            drawn[index] += take;
            remaining -= take;
        }
    }

    let lengths: Vec<usize> = blocks.iter().map(|b| b.2).collect();
    let gaps = vec![0usize; lengths.len().saturating_sub(1)];
    let offsets = stack_offsets(&lengths, &gaps)?;

    let selections = blocks
        .iter()
        .zip(offsets.iter())
        .map(|(&(index, start, length), &offset)| {
            Selection::new(
                index,
                Hyperslab::new(vec![
                    AxisSpan::new(start, length),
                    AxisSpan::full(height),
                    AxisSpan::full(width),
                ]),
                Hyperslab::new(vec![
                    AxisSpan::new(offset, length),
                    AxisSpan::full(height),
                    AxisSpan::full(width),
                ]),
            )
        })
        .collect();

    Ok(VdsPlan {
        sources: sources.to_vec(),
        selections,
        target_shape: vec![total_frames, height, width],
        data_type: sources[0].data_type,
        fill_value,
    })
}

/// Stack per-source stripes along the row axis.
///
/// Boundary `k` (1-based) between stripes `k-1` and `k` receives
/// `stripe_spacing` filler rows, plus `module_spacing` more when
/// `k % stripes_per_module == 0`. The frame axis passes through unchanged.
fn plan_sub_frame(
    sources: &[RawSource],
    stripe_spacing: usize,
    module_spacing: usize,
    stripes_per_module: usize,
    fill_value: f64,
) -> Result<VdsPlan> {
    if stripes_per_module == 0 {
        return Err(StitchError::Layout(
            "stripes per module must be at least 1".to_string(),
        ));
    }

    let frame_count = sources[0].frame_count;
    let width = sources[0].frame_width();
    for source in sources {
        if source.frame_count != frame_count {
            return Err(StitchError::Validation(format!(
                "{}: frame count {} differs from {} required for stripe stacking",
                source.file_path.display(),
                source.frame_count,
                frame_count
            )));
        }
    }

    let heights: Vec<usize> = sources.iter().map(|s| s.frame_height()).collect();
    let gaps: Vec<usize> = (1..sources.len())
        .map(|k| {
            if k % stripes_per_module == 0 {
                stripe_spacing + module_spacing
            } else {
                stripe_spacing
            }
        })
        .collect();
    let offsets = stack_offsets(&heights, &gaps)?;

    let target_height = match (offsets.last(), heights.last()) {
        (Some(&offset), Some(&height)) => offset + height,
        _ => 0,
    };

    let selections = sources
        .iter()
        .enumerate()
        .map(|(index, source)| {
            Selection::new(
                index,
                Hyperslab::new(vec![
                    AxisSpan::full(frame_count),
                    AxisSpan::full(source.frame_height()),
                    AxisSpan::full(width),
                ]),
                Hyperslab::new(vec![
                    AxisSpan::full(frame_count),
                    AxisSpan::new(offsets[index], source.frame_height()),
                    AxisSpan::full(width),
                ]),
            )
        })
        .collect();

    Ok(VdsPlan {
        sources: sources.to_vec(),
        selections,
        target_shape: vec![frame_count, target_height, width],
        data_type: sources[0].data_type,
        fill_value,
    })
}

/// Spread the packed module/chip cells of a single source apart to match
/// physical sensor geometry.
///
/// The frame height splits into `modules` equal module cells, each holding
/// two chip rows. Cell `(m, c)` keeps its packed position shifted by
/// `m * module_spacing + c * chip_spacing`. One plan covers exactly one raw
/// source; batching several files through the same geometry belongs to the
/// caller.
fn plan_gap_fill(
    sources: &[RawSource],
    chip_spacing: usize,
    module_spacing: usize,
    modules: usize,
    fill_value: f64,
) -> Result<VdsPlan> {
    if modules == 0 {
        return Err(StitchError::Layout(
            "module count must be at least 1".to_string(),
        ));
    }
    if sources.len() != 1 {
        return Err(StitchError::Layout(format!(
            "gap-fill plans cover exactly one raw source, got {}",
            sources.len()
        )));
    }

    let source = &sources[0];
    let (height, width) = source.frame_shape;
    if height % modules != 0 {
        return Err(StitchError::Validation(format!(
            "{}: frame height {} is not divisible into {} modules",
            source.file_path.display(),
            height,
            modules
        )));
    }
    let module_height = height / modules;
    if module_height % CHIPS_PER_MODULE != 0 {
        return Err(StitchError::Validation(format!(
            "{}: module height {} is not divisible into {} chip rows",
            source.file_path.display(),
            module_height,
            CHIPS_PER_MODULE
        )));
    }
    let chip_height = module_height / CHIPS_PER_MODULE;

    let cells = modules * CHIPS_PER_MODULE;
    let counts = vec![chip_height; cells];
    let shifts: Vec<usize> = (0..modules)
        .flat_map(|m| (0..CHIPS_PER_MODULE).map(move |c| m * module_spacing + c * chip_spacing))
        .collect();
    let offsets = tile_offsets(&counts, &shifts)?;

    let target_height = height + (modules - 1) * module_spacing + (CHIPS_PER_MODULE - 1) * chip_spacing;

    let selections = offsets
        .iter()
        .enumerate()
        .map(|(cell, &offset)| {
            Selection::new(
                0,
                Hyperslab::new(vec![
                    AxisSpan::full(source.frame_count),
                    AxisSpan::new(cell * chip_height, chip_height),
                    AxisSpan::full(width),
                ]),
                Hyperslab::new(vec![
                    AxisSpan::full(source.frame_count),
                    AxisSpan::new(offset, chip_height),
                    AxisSpan::full(width),
                ]),
            )
        })
        .collect();

    Ok(VdsPlan {
        sources: sources.to_vec(),
        selections,
        target_shape: vec![source.frame_count, target_height, width],
        data_type: source.data_type,
        fill_value,
    })
}
