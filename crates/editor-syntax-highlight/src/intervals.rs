//! Document-level output types: formatted ranges and fold regions.

use editor_syntax::FormatId;

/// A formatted range of a document, in character offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    /// Start offset
    pub start: usize,
    /// End offset (exclusive)
    pub end: usize,
    /// Repository-wide format id
    pub format: FormatId,
}

impl Interval {
    /// Create a new interval with `[start, end)` offsets and a format id.
    pub fn new(start: usize, end: usize, format: FormatId) -> Self {
        Self { start, end, format }
    }

    /// Check if interval contains a specific position
    pub fn contains(&self, pos: usize) -> bool {
        self.start <= pos && pos < self.end
    }

    /// Check if two intervals overlap
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Format at `pos` in sorted, non-overlapping intervals.
pub fn format_at(intervals: &[Interval], pos: usize) -> Option<FormatId> {
    let index = intervals.partition_point(|i| i.end <= pos);
    intervals
        .get(index)
        .filter(|i| i.contains(pos))
        .map(|i| i.format)
}

/// Fold region
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FoldRegion {
    /// Start line number
    pub start_line: usize,
    /// End line number (inclusive)
    pub end_line: usize,
}

impl FoldRegion {
    /// Create a folding region for an inclusive line range.
    pub fn new(start_line: usize, end_line: usize) -> Self {
        Self {
            start_line,
            end_line,
        }
    }

    /// Check if line number is within fold region
    pub fn contains_line(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line
    }

    /// Lines hidden when the region is collapsed.
    pub fn hidden_lines(&self) -> usize {
        self.end_line - self.start_line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_contains() {
        let interval = Interval::new(10, 20, 1);
        assert!(interval.contains(10));
        assert!(interval.contains(19));
        assert!(!interval.contains(20));
        assert!(!interval.contains(9));
        assert_eq!(interval.len(), 10);
    }

    #[test]
    fn test_interval_overlaps() {
        let i1 = Interval::new(10, 20, 1);
        let i2 = Interval::new(15, 25, 2);
        let i3 = Interval::new(20, 30, 3);

        assert!(i1.overlaps(&i2));
        assert!(i2.overlaps(&i1));
        assert!(!i1.overlaps(&i3));
    }

    #[test]
    fn test_format_at() {
        let intervals = [
            Interval::new(0, 2, 1),
            Interval::new(4, 6, 2),
            Interval::new(6, 7, 3),
        ];
        assert_eq!(format_at(&intervals, 1), Some(1));
        assert_eq!(format_at(&intervals, 3), None);
        assert_eq!(format_at(&intervals, 5), Some(2));
        assert_eq!(format_at(&intervals, 6), Some(3));
        assert_eq!(format_at(&intervals, 7), None);
        assert_eq!(format_at(&[], 0), None);
    }

    #[test]
    fn test_fold_region_lines() {
        let region = FoldRegion::new(2, 5);
        assert!(region.contains_line(2));
        assert!(region.contains_line(5));
        assert!(!region.contains_line(6));
        assert_eq!(region.hidden_lines(), 3);
    }
}
