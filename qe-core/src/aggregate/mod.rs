//! The time-bucket aggregator family (§4.4).
//!
//! Every kernel implements [`GroupingKernel`]: `create`/`reset`/`add`/
//! `flush` plus a declared [`TierFetch`] preference. The per-dimension loop
//! (`qe_core::query_loop`) only ever calls through this trait — matching
//! the source's function-pointer dispatch table (§9) without reaching for
//! raw function pointers, which Rust has no ergonomic equivalent for.

mod average;
mod countif;
mod des;
mod minmax;
mod percentile;
mod ses;
mod stddev;
mod sum;
mod trimmed_mean;

use qe_types::window::{TierFetch, TimeGrouping};

/// One time-bucket aggregation kernel.
pub trait GroupingKernel: Send {
    /// Clear accumulated state between dimensions of the same query (§4.4).
    fn reset(&mut self);

    /// Fold one finite, non-gap value into the kernel's state.
    fn add(&mut self, value: f64);

    /// Emit the bucket's scalar, or `None` if no values were added
    /// (the bucket is empty).
    fn flush(&mut self) -> Option<f64>;
}

/// Build the kernel for a requested grouping method, parsing any
/// per-query parameters out of `options` (countif's comparator/threshold,
/// ses/des's smoothing coefficients — §4.4, "supplemented from
/// original_source").
pub fn create_kernel(grouping: TimeGrouping, options: &str) -> Box<dyn GroupingKernel> {
    use TimeGrouping::*;
    match grouping {
        Average => Box::new(average::Average::default()),
        IncrementalSum => Box::new(sum::IncrementalSum::default()),
        TrimmedMean(p) => Box::new(trimmed_mean::TrimmedMean::new(p.as_fraction(), false)),
        Median => Box::new(trimmed_mean::TrimmedMean::new(0.0, true)),
        TrimmedMedian(p) => Box::new(trimmed_mean::TrimmedMean::new(p.as_fraction(), true)),
        Percentile(rank) => Box::new(percentile::Percentile::new(rank.0)),
        Min => Box::new(minmax::MinMax::new(minmax::Kind::Min)),
        Max => Box::new(minmax::MinMax::new(minmax::Kind::Max)),
        Sum => Box::new(sum::Sum::default()),
        StdDev => Box::new(stddev::StdDev::new(false)),
        CoefficientOfVariation => Box::new(stddev::StdDev::new(true)),
        Ses => Box::new(ses::Ses::from_options(options)),
        Des => Box::new(des::Des::from_options(options)),
        CountIf => Box::new(countif::CountIf::from_options(options)),
    }
}

/// The raw tier-level statistic this grouping method prefers (§4.4).
pub fn tier_fetch(grouping: TimeGrouping) -> TierFetch {
    use TimeGrouping::*;
    match grouping {
        Min => TierFetch::Min,
        Max => TierFetch::Max,
        Sum => TierFetch::Sum,
        _ => TierFetch::Average,
    }
}

/// Resolve a request string (including legacy v1 aliases, §9) to a
/// canonical [`TimeGrouping`].
pub fn parse_grouping_name(name: &str) -> Option<TimeGrouping> {
    use qe_types::window::{PercentileRank, TrimmedMeanPercent as TMP};
    use TimeGrouping::*;

    Some(match name {
        "average" | "avg" | "mean" => Average,
        "trimmed-mean1" => TrimmedMean(TMP::P1),
        "trimmed-mean2" => TrimmedMean(TMP::P2),
        "trimmed-mean3" => TrimmedMean(TMP::P3),
        "trimmed-mean5" | "trimmed-mean" => TrimmedMean(TMP::P5),
        "trimmed-mean10" => TrimmedMean(TMP::P10),
        "trimmed-mean15" => TrimmedMean(TMP::P15),
        "trimmed-mean20" => TrimmedMean(TMP::P20),
        "trimmed-mean25" => TrimmedMean(TMP::P25),
        "median" => Median,
        "trimmed-median1" => TrimmedMedian(TMP::P1),
        "trimmed-median2" => TrimmedMedian(TMP::P2),
        "trimmed-median3" => TrimmedMedian(TMP::P3),
        "trimmed-median5" | "trimmed-median" => TrimmedMedian(TMP::P5),
        "trimmed-median10" => TrimmedMedian(TMP::P10),
        "trimmed-median15" => TrimmedMedian(TMP::P15),
        "trimmed-median20" => TrimmedMedian(TMP::P20),
        "trimmed-median25" => TrimmedMedian(TMP::P25),
        "percentile" => Percentile(PercentileRank::default()),
        "percentile25" => Percentile(PercentileRank(25)),
        "percentile50" => Percentile(PercentileRank(50)),
        "percentile75" => Percentile(PercentileRank(75)),
        "percentile80" => Percentile(PercentileRank(80)),
        "percentile90" => Percentile(PercentileRank(90)),
        "percentile95" => Percentile(PercentileRank(95)),
        "percentile97" => Percentile(PercentileRank(97)),
        "percentile98" => Percentile(PercentileRank(98)),
        "percentile99" => Percentile(PercentileRank(99)),
        "min" => Min,
        "max" => Max,
        "sum" => Sum,
        "incremental-sum" | "incremental_sum" => IncrementalSum,
        "stddev" => StdDev,
        "cv" | "rsd" => CoefficientOfVariation,
        "ses" | "ema" | "ewma" => Ses,
        "des" => Des,
        "countif" => CountIf,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_aliases_resolve_to_canonical_names() {
        assert_eq!(parse_grouping_name("avg"), parse_grouping_name("average"));
        assert_eq!(parse_grouping_name("percentile"), parse_grouping_name("percentile95"));
        assert_eq!(parse_grouping_name("trimmed-mean"), parse_grouping_name("trimmed-mean5"));
        assert_eq!(parse_grouping_name("ema"), parse_grouping_name("ses"));
        assert_eq!(parse_grouping_name("ewma"), parse_grouping_name("ses"));
        assert_eq!(parse_grouping_name("rsd"), parse_grouping_name("cv"));
    }

    #[test]
    fn unknown_name_is_none() {
        assert!(parse_grouping_name("not-a-grouping").is_none());
    }

    #[test]
    fn tier_fetch_matches_declared_preference() {
        assert_eq!(tier_fetch(TimeGrouping::Min), TierFetch::Min);
        assert_eq!(tier_fetch(TimeGrouping::Max), TierFetch::Max);
        assert_eq!(tier_fetch(TimeGrouping::Sum), TierFetch::Sum);
        assert_eq!(tier_fetch(TimeGrouping::Average), TierFetch::Average);
        assert_eq!(tier_fetch(TimeGrouping::StdDev), TierFetch::Average);
    }
}
