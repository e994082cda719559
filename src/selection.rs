//! Selection arithmetic for rectangular sub-regions of N-dimensional arrays
//!
//! Everything here is pure: spans and hyperslabs describe regions, and the
//! two composition functions compute where regions land along one axis. The
//! code is rank-agnostic even though the stitching planners only ever build
//! rank-3 (frame, row, column) selections.

use crate::error::{Result, StitchError};
use serde::{Deserialize, Serialize};

/// Per-axis `(start, count, stride)` region descriptor.
///
/// A missing stride means contiguous (stride 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisSpan {
    pub start: usize,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stride: Option<usize>,
}

impl AxisSpan {
    /// Contiguous span of `count` elements beginning at `start`
    pub fn new(start: usize, count: usize) -> Self {
        Self {
            start,
            count,
            stride: None,
        }
    }

    /// Strided span; `stride` is the step between selected elements
    pub fn with_stride(start: usize, count: usize, stride: usize) -> Self {
        Self {
            start,
            count,
            stride: Some(stride),
        }
    }

    /// Span covering `0..count` of an axis
    pub fn full(count: usize) -> Self {
        Self::new(0, count)
    }

    /// Exclusive end of the span in index space
    pub fn end(&self) -> usize {
        if self.count == 0 {
            return self.start;
        }
        match self.stride {
            Some(stride) => self.start + (self.count - 1) * stride + 1,
            None => self.start + self.count,
        }
    }

    /// Whether `index` is one of the selected positions
    pub fn contains(&self, index: usize) -> bool {
        if index < self.start || index >= self.end() {
            return false;
        }
        match self.stride {
            Some(stride) => (index - self.start) % stride == 0,
            None => true,
        }
    }
}

/// Rectangular, possibly strided selection over an N-dimensional array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hyperslab {
    spans: Vec<AxisSpan>,
}

impl Hyperslab {
    pub fn new(spans: Vec<AxisSpan>) -> Self {
        Self { spans }
    }

    pub fn rank(&self) -> usize {
        self.spans.len()
    }

    pub fn spans(&self) -> &[AxisSpan] {
        &self.spans
    }

    pub fn span(&self, axis: usize) -> AxisSpan {
        self.spans[axis]
    }

    /// Number of selected elements
    pub fn total_count(&self) -> usize {
        self.spans.iter().map(|s| s.count).product()
    }

    /// Check that every span stays within `shape` and ranks agree
    pub fn fits_within(&self, shape: &[usize]) -> bool {
        self.spans.len() == shape.len()
            && self
                .spans
                .iter()
                .zip(shape.iter())
                .all(|(span, &dim)| span.end() <= dim)
    }
}

/// One region-to-region mapping: a contiguous region of one raw source's
/// dataset occupying a region of the virtual array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Index into the plan's source list
    pub source_index: usize,
    /// Region of the source dataset
    pub source: Hyperslab,
    /// Region of the virtual array
    pub target: Hyperslab,
}

impl Selection {
    pub fn new(source_index: usize, source: Hyperslab, target: Hyperslab) -> Self {
        Self {
            source_index,
            source,
            target,
        }
    }
}

/// Start offsets for regions packed end-to-end along one axis.
///
/// `gaps[i]` is inserted after region `i`, so `gaps` must hold one entry per
/// boundary (`counts.len() - 1`). Used for frame-axis concatenation (zero
/// gaps) and stripe stacking (spacing gaps).
pub fn stack_offsets(counts: &[usize], gaps: &[usize]) -> Result<Vec<usize>> {
    let boundaries = counts.len().saturating_sub(1);
    if gaps.len() != boundaries {
        return Err(StitchError::Layout(format!(
            "expected {} boundary gaps for {} regions, got {}",
            boundaries,
            counts.len(),
            gaps.len()
        )));
    }

    let mut offsets = Vec::with_capacity(counts.len());
    let mut cursor = 0;
    for (i, &count) in counts.iter().enumerate() {
        offsets.push(cursor);
        cursor += count;
        if i < boundaries {
            cursor += gaps[i];
        }
    }
    Ok(offsets)
}

/// Start offsets for regions that keep their native packed position but are
/// shifted per cell.
///
/// `shifts[i]` is the absolute displacement of region `i` from its packed
/// position. The resulting regions must not overlap; a shift sequence that
/// would fold a region back over its predecessor is rejected.
pub fn tile_offsets(counts: &[usize], shifts: &[usize]) -> Result<Vec<usize>> {
    if shifts.len() != counts.len() {
        return Err(StitchError::Layout(format!(
            "expected {} shifts for {} regions, got {}",
            counts.len(),
            counts.len(),
            shifts.len()
        )));
    }

    let mut offsets = Vec::with_capacity(counts.len());
    let mut packed = 0;
    let mut prev_end = 0;
    for (&count, &shift) in counts.iter().zip(shifts.iter()) {
        let offset = packed + shift;
        if offset < prev_end {
            return Err(StitchError::Layout(format!(
                "tile at packed offset {} shifted to {} overlaps previous region ending at {}",
                packed, offset, prev_end
            )));
        }
        offsets.push(offset);
        prev_end = offset + count;
        packed += count;
    }
    Ok(offsets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_span_end() {
        assert_eq!(AxisSpan::new(10, 5).end(), 15);
        assert_eq!(AxisSpan::with_stride(10, 3, 4).end(), 19);
        assert_eq!(AxisSpan::new(7, 0).end(), 7);
    }

    #[test]
    fn test_axis_span_contains() {
        let span = AxisSpan::with_stride(2, 3, 4); // 2, 6, 10
        assert!(span.contains(2));
        assert!(span.contains(6));
        assert!(span.contains(10));
        assert!(!span.contains(4));
        assert!(!span.contains(14));
    }

    #[test]
    fn test_hyperslab_fits_within() {
        let slab = Hyperslab::new(vec![AxisSpan::new(0, 10), AxisSpan::new(4, 4)]);
        assert!(slab.fits_within(&[10, 8]));
        assert!(!slab.fits_within(&[10, 7]));
        assert!(!slab.fits_within(&[10, 8, 2]));
        assert_eq!(slab.total_count(), 40);
    }

    #[test]
    fn test_stack_offsets_contiguous() {
        let offsets = stack_offsets(&[10, 10, 5], &[0, 0]).unwrap();
        assert_eq!(offsets, vec![0, 10, 20]);
    }

    #[test]
    fn test_stack_offsets_with_gaps() {
        let offsets = stack_offsets(&[256, 256, 256], &[3, 126]).unwrap();
        assert_eq!(offsets, vec![0, 259, 641]);
    }

    #[test]
    fn test_stack_offsets_gap_count_mismatch() {
        let err = stack_offsets(&[10, 10], &[0, 0]).unwrap_err();
        assert!(matches!(err, StitchError::Layout(_)));
    }

    #[test]
    fn test_tile_offsets_shifted() {
        // two modules of two chips each, chip height 4
        let offsets = tile_offsets(&[4, 4, 4, 4], &[0, 3, 123, 126]).unwrap();
        assert_eq!(offsets, vec![0, 7, 131, 138]);
    }

    #[test]
    fn test_tile_offsets_rejects_overlap() {
        // second region shifted backwards over the first
        let err = tile_offsets(&[4, 4], &[3, 0]).unwrap_err();
        assert!(matches!(err, StitchError::Layout(_)));
    }
}
