//! Series indexing for curve fitting

use crate::models::Sample;

/// Samples of one pod keyed by their position in the query window.
///
/// Absent samples are dropped from `points` but still count towards `len`,
/// so each point keeps the position it had in the original window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexedSeries {
    pub points: Vec<(f64, f64)>,
    pub len: usize,
}

impl IndexedSeries {
    /// Position one step past the end of the window
    pub fn next_index(&self) -> f64 {
        self.len as f64
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Convert an ordered sample sequence into `(index, value)` pairs.
pub fn index_series(samples: &[Sample]) -> IndexedSeries {
    let points = samples
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.value.map(|v| (i as f64, v)))
        .collect();

    IndexedSeries {
        points,
        len: samples.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_uses_position_not_timestamp() {
        let samples = vec![
            Sample::new(1_700_000_000.0, 5.0),
            Sample::new(1_700_000_360.0, 6.0),
            Sample::new(1_700_000_720.0, 7.0),
        ];
        let indexed = index_series(&samples);
        assert_eq!(indexed.points, vec![(0.0, 5.0), (1.0, 6.0), (2.0, 7.0)]);
        assert_eq!(indexed.next_index(), 3.0);
    }

    #[test]
    fn test_absent_values_excluded() {
        let samples = vec![
            Sample::new(0.0, 1.0),
            Sample::absent(1.0),
            Sample::new(2.0, 0.0),
        ];
        let indexed = index_series(&samples);
        // Zero is a real value, the absent one is gone
        assert_eq!(indexed.points, vec![(0.0, 1.0), (2.0, 0.0)]);
        assert_eq!(indexed.len, 3);
    }

    #[test]
    fn test_empty_input() {
        let indexed = index_series(&[]);
        assert!(indexed.is_empty());
        assert_eq!(indexed.next_index(), 0.0);
    }
}
