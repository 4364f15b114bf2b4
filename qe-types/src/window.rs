//! The canonical, post-calculation query window (§3, §4.1).

use crate::options::QueryOptions;
use crate::tier::Tier;

/// The named time-bucket aggregation kernel a query requests. Several
/// variants are legacy v1 aliases of another variant (§9): resolving a
/// request string to a `TimeGrouping` folds the alias away, so downstream
/// code only ever sees the canonical name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeGrouping {
    Average,
    TrimmedMean(TrimmedMeanPercent),
    Median,
    TrimmedMedian(TrimmedMeanPercent),
    Percentile(PercentileRank),
    Min,
    Max,
    Sum,
    IncrementalSum,
    StdDev,
    CoefficientOfVariation,
    Ses,
    Des,
    CountIf,
}

/// The trim percentage accepted by `trimmed-mean<N>` / `trimmed-median<N>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrimmedMeanPercent {
    P1,
    P2,
    P3,
    P5,
    P10,
    P15,
    P20,
    P25,
}

impl TrimmedMeanPercent {
    pub fn as_fraction(self) -> f64 {
        use TrimmedMeanPercent::*;
        match self {
            P1 => 0.01,
            P2 => 0.02,
            P3 => 0.03,
            P5 => 0.05,
            P10 => 0.10,
            P15 => 0.15,
            P20 => 0.20,
            P25 => 0.25,
        }
    }
}

/// The percentile rank accepted by `percentile<N>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PercentileRank(pub u8);

impl Default for PercentileRank {
    fn default() -> Self {
        // `percentile` with no suffix is an alias of `percentile95`.
        PercentileRank(95)
    }
}

/// The tier-level statistic a kernel prefers to read from a `StoragePoint`
/// (§4.4): most kernels average over the point's `sum/count`, but `min`,
/// `max` and `sum` prefer their namesake field directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierFetch {
    Average,
    Min,
    Max,
    Sum,
}

/// The canonical, immutable query window produced by `qe_core::window::calculate_window`.
///
/// All fields are plain integers or bools, so this type is `Copy` and can be
/// threaded through the per-dimension loop by value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryWindow {
    /// Inclusive start of the covered range, in seconds.
    pub after: i64,
    /// Inclusive end of the covered range, in seconds.
    pub before: i64,
    /// Number of output rows (buckets).
    pub points: usize,
    /// Raw source points grouped into one output bucket.
    pub group: usize,
    /// Seconds per sub-bucket step; may differ from the source tier's own update-every.
    pub query_granularity: i64,
    /// Coarsening factor forced by resampling; `group` is always a multiple of this when > 1.
    pub resampling_group: usize,
    /// `group * query_granularity / resampling_time`, used to scale resampled sums.
    pub resampling_divisor: f64,
    pub group_method: TimeGrouping,
    /// Whether bucket boundaries were snapped to nice multiples of `group * query_granularity`.
    pub aligned: bool,
    pub options: QueryOptions,
    /// A tier forced by the caller (`QueryOptions::SELECTED_TIER`), if any.
    pub forced_tier: Option<Tier>,
    /// Whether any relative (`|offset| <= RELATIVE_MAX`) time was seen during normalisation.
    pub relative: bool,
    /// The wall-clock "now" used while normalising relative offsets, for partial-row trimming.
    pub now: i64,
}

impl QueryWindow {
    /// Row `i`'s bucket end timestamp (§3 invariant): inclusive-end semantics.
    pub fn row_timestamp(&self, row: usize) -> i64 {
        self.after + ((row as i64 + 1) * self.group as i64 * self.query_granularity)
            - self.query_granularity
    }

    /// Seconds covered by one output bucket.
    pub fn view_update_every(&self) -> i64 {
        self.group as i64 * self.query_granularity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> QueryWindow {
        QueryWindow {
            after: 0,
            before: 59,
            points: 60,
            group: 1,
            query_granularity: 1,
            resampling_group: 1,
            resampling_divisor: 1.0,
            group_method: TimeGrouping::Average,
            aligned: true,
            options: QueryOptions::default(),
            forced_tier: None,
            relative: false,
            now: 1000,
        }
    }

    #[test]
    fn row_timestamps_step_by_group() {
        let w = window();
        assert_eq!(w.row_timestamp(0), 0);
        assert_eq!(w.row_timestamp(1), 1);
        assert_eq!(w.row_timestamp(59), 59);
    }

    #[test]
    fn percentile_alias_defaults_to_95() {
        assert_eq!(PercentileRank::default(), PercentileRank(95));
    }
}
