//! Per-query option bitset.
//!
//! Mirrors the source's `RRDR_OPTION_*` flags that affect window
//! calculation, tier selection, per-dimension accumulation and group-by
//! finalisation. Kept as one flat bitset (rather than one bool field per
//! flag) because several components only care whether a handful of bits are
//! set and pass the whole set through unexamined otherwise.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct QueryOptions: u32 {
        /// Snap bucket boundaries to nice multiples of `group * query_granularity`.
        const NOT_ALIGNED        = 0b0000_0000_0001;
        /// Force grouping to the database's natural sampling interval.
        const NATURAL_POINTS     = 0b0000_0000_0010;
        /// Force virtual (query-granularity = 1s) points even if natural would apply.
        const VIRTUAL_POINTS     = 0b0000_0000_0100;
        /// Report the per-point anomaly rate as the cell value instead of the raw statistic.
        const ANOMALY_BIT        = 0b0000_0000_1000;
        /// Use `QueryWindow::tier` as a forced tier rather than letting the planner choose.
        const SELECTED_TIER      = 0b0000_0001_0000;
        /// Treat empty cells as `0` during group-by accumulation.
        const NULL2ZERO          = 0b0000_0010_0000;
        /// Take the absolute value of a cell before group-by accumulation.
        const ABSOLUTE           = 0b0000_0100_0000;
        /// Skip partial-row trimming; return every row the plan produced.
        const RETURN_RAW         = 0b0000_1000_0000;
        /// Populate per-output-column label-key dictionaries during group-by.
        const GROUP_BY_LABELS    = 0b0001_0000_0000;
        /// Debug-only: include extra diagnostic fields in responses.
        const DEBUG              = 0b0010_0000_0000;
    }
}
