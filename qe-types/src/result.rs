//! The result matrix `R` (§3): a row-major `n x d` grid of aggregated
//! points, plus the column/row metadata the group-by post-aggregator and
//! the external JSON formatter both need.

use std::collections::BTreeMap;

bitflags::bitflags! {
    /// Per-cell option flags (§3).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CellFlags: u8 {
        /// No contributing samples; `value` is meaningless.
        const EMPTY   = 0b0000_0001;
        /// At least one contributing sample carried the collector's reset flag.
        const RESET   = 0b0000_0010;
        /// Fewer metrics contributed to this cell than the column expects (group-by only).
        const PARTIAL = 0b0000_0100;
    }
}

bitflags::bitflags! {
    /// Per-column bookkeeping flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ColumnFlags: u16 {
        const QUERIED = 0b0000_0001;
        const NON_ZERO = 0b0000_0010;
        const HIDDEN  = 0b0000_0100;
        const GROUPED = 0b0000_1000;
        const FAILED  = 0b0001_0000;
    }
}

/// Running statistics accumulated for a column as the per-dimension loop
/// writes bucket values into it (§3: "aggregated statistics").
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ColumnStats {
    pub sum: f64,
    /// `sum(|value| * view_update_every)` across all buckets written.
    pub volume: f64,
    pub anomaly_sum: f64,
    pub min: f64,
    pub max: f64,
    pub bucket_count: u64,
}

impl ColumnStats {
    pub fn average(&self) -> f64 {
        if self.bucket_count == 0 {
            0.0
        } else {
            self.sum / self.bucket_count as f64
        }
    }

    /// Fold one bucket's `|value|` into the running min/max/sum/volume.
    pub fn add_bucket(&mut self, value: f64, anomaly_rate: f64, view_update_every: i64) {
        let abs_value = value.abs();
        if self.bucket_count == 0 {
            self.min = abs_value;
            self.max = abs_value;
        } else {
            if abs_value < self.min {
                self.min = abs_value;
            }
            if abs_value > self.max {
                self.max = abs_value;
            }
        }
        self.anomaly_sum += anomaly_rate;
        self.sum += abs_value;
        self.volume += abs_value * view_update_every as f64;
        self.bucket_count += 1;
    }
}

/// Per-output-column metadata: identity, display info and the running
/// statistics above. One per column of `R`, whether a column is a bare
/// input metric (no grouping) or a group-by bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMeta {
    pub id: String,
    pub name: String,
    pub units: String,
    pub priority: u32,
    pub flags: ColumnFlags,
    pub stats: ColumnStats,
    /// Distinct label key -> observed value set, populated only when
    /// `QueryOptions::GROUP_BY_LABELS` is set.
    pub labels: Option<BTreeMap<String, Vec<String>>>,
    /// The number of input metrics expected to land in this column
    /// (group-by's `dgbc`); `1` for an ungrouped column.
    pub expected_group_count: u32,
}

/// Markers recorded by the group-by post-aggregator's partial-row trimming
/// pass (§4.5 step 2).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PartialTrimming {
    pub expected_after: i64,
    pub trimmed_after: i64,
    pub max_update_every: i64,
}

/// The result matrix `R` (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct ResultMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
    flags: Vec<CellFlags>,
    anomaly_rate: Vec<f64>,
    /// Per-cell group-by contributor count; empty when there is no grouping.
    group_by_count: Vec<u32>,
    timestamps: Vec<i64>,
    pub columns: Vec<ColumnMeta>,

    pub view_min: f64,
    pub view_max: f64,
    /// The actual covered range, which may be narrower than requested after
    /// trimming or a short plan.
    pub after: i64,
    pub before: i64,
    pub partial_trimming: PartialTrimming,
    /// Set by the engine when cancellation fired mid-query (§5).
    pub cancelled: bool,
}

impl ResultMatrix {
    pub fn new(rows: usize, cols: usize) -> Self {
        ResultMatrix {
            rows,
            cols,
            values: vec![0.0; rows * cols],
            flags: vec![CellFlags::EMPTY; rows * cols],
            anomaly_rate: vec![0.0; rows * cols],
            group_by_count: Vec::new(),
            timestamps: vec![0; rows],
            columns: vec![ColumnMeta::default(); cols],
            view_min: f64::NAN,
            view_max: f64::NAN,
            after: 0,
            before: 0,
            partial_trimming: PartialTrimming::default(),
            cancelled: false,
        }
    }

    /// Allocate the per-cell group-by contributor counter. Only called when
    /// grouping is active.
    pub fn enable_group_by_counts(&mut self) {
        self.group_by_count = vec![0; self.rows * self.cols];
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Shrink the matrix to `rows` rows in place (partial-row trimming).
    /// Columns and per-column stats are untouched.
    pub fn truncate_rows(&mut self, rows: usize) {
        assert!(rows <= self.rows);
        self.rows = rows;
        self.timestamps.truncate(rows);
        self.values.truncate(rows * self.cols);
        self.flags.truncate(rows * self.cols);
        self.anomaly_rate.truncate(rows * self.cols);
        if !self.group_by_count.is_empty() {
            self.group_by_count.truncate(rows * self.cols);
        }
    }

    #[inline]
    fn index(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.rows && col < self.cols);
        row * self.cols + col
    }

    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.values[self.index(row, col)]
    }

    pub fn set_value(&mut self, row: usize, col: usize, v: f64) {
        let idx = self.index(row, col);
        self.values[idx] = v;
    }

    pub fn cell_flags(&self, row: usize, col: usize) -> CellFlags {
        self.flags[self.index(row, col)]
    }

    pub fn set_cell_flags(&mut self, row: usize, col: usize, flags: CellFlags) {
        let idx = self.index(row, col);
        self.flags[idx] = flags;
    }

    pub fn anomaly_rate(&self, row: usize, col: usize) -> f64 {
        self.anomaly_rate[self.index(row, col)]
    }

    pub fn set_anomaly_rate(&mut self, row: usize, col: usize, v: f64) {
        let idx = self.index(row, col);
        self.anomaly_rate[idx] = v;
    }

    pub fn group_by_count(&self, row: usize, col: usize) -> u32 {
        if self.group_by_count.is_empty() {
            0
        } else {
            self.group_by_count[self.index(row, col)]
        }
    }

    pub fn set_group_by_count(&mut self, row: usize, col: usize, v: u32) {
        let idx = self.index(row, col);
        self.group_by_count[idx] = v;
    }

    pub fn increment_group_by_count(&mut self, row: usize, col: usize) {
        let idx = self.index(row, col);
        self.group_by_count[idx] += 1;
    }

    pub fn timestamp(&self, row: usize) -> i64 {
        self.timestamps[row]
    }

    pub fn set_timestamp(&mut self, row: usize, t: i64) {
        self.timestamps[row] = t;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_matrix_is_all_empty() {
        let r = ResultMatrix::new(3, 2);
        for row in 0..3 {
            for col in 0..2 {
                assert!(r.cell_flags(row, col).contains(CellFlags::EMPTY));
                assert_eq!(r.value(row, col), 0.0);
            }
        }
    }

    #[test]
    fn truncate_rows_drops_tail() {
        let mut r = ResultMatrix::new(5, 2);
        for row in 0..5 {
            r.set_timestamp(row, row as i64);
        }
        r.truncate_rows(3);
        assert_eq!(r.rows(), 3);
        assert_eq!(r.timestamp(2), 2);
    }

    #[test]
    fn column_stats_track_abs_min_max() {
        let mut s = ColumnStats::default();
        s.add_bucket(-5.0, 10.0, 2);
        s.add_bucket(3.0, 0.0, 2);
        assert_eq!(s.min, 3.0);
        assert_eq!(s.max, 5.0);
        assert_eq!(s.sum, 8.0);
        assert_eq!(s.volume, 16.0);
        assert_eq!(s.bucket_count, 2);
    }
}
