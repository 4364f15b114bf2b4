//! Error taxonomy for the query engine (§7).
//!
//! Per-metric failures (`NoData`, `IteratorStuck`) never abort the overall
//! query — the caller marks the offending column failed and moves on; see
//! `qe_core::engine`. Only window-calculation and fatal-invariant errors
//! abort before any result is populated.

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum QueryError {
    /// The calculated window, points or group parameters are not valid
    /// after normalisation (e.g. no database extent available).
    #[snafu(display("bad request: {}", reason))]
    BadRequest { reason: String },

    /// The tier planner could not form a valid plan for a metric. Note that
    /// this, reaching the engine's public API, means *every* metric in the
    /// query failed to plan; a single metric's `NoData` is absorbed into
    /// that metric's column instead (see `ColumnFlags::FAILED`).
    #[snafu(display("no data available for metric '{}'", metric_id))]
    NoData { metric_id: String },

    /// A storage iterator made no forward progress for `RETRY_LIMIT`
    /// consecutive pulls on one bucket (§4.3 "Edge policies"). Like
    /// `NoData`, this is absorbed into the offending column's
    /// `ColumnFlags::FAILED` rather than aborting the query.
    #[snafu(display("storage iterator stuck for metric '{}'", metric_id))]
    IteratorStuck { metric_id: String },

    /// The caller's interrupt predicate fired, or the timeout elapsed,
    /// between metrics (§5). The engine returns the partial result with
    /// `ResultMatrix::cancelled` set rather than this error reaching the
    /// caller as a hard failure; it exists for internal plumbing and for
    /// embedders that want to distinguish cancellation from a clean result.
    #[snafu(display("query cancelled or timed out"))]
    Cancelled,

    /// Only constructible in debug builds (`debug_assertions`), mirroring
    /// the source's `NETDATA_INTERNAL_CHECKS`-gated `internal_fatal()`
    /// calls: a plan ordering, tier range or row-timestamp invariant was
    /// violated.
    #[snafu(display("internal invariant violated: {}", detail))]
    FatalInvariant { detail: String },
}

pub type Result<T, E = QueryError> = std::result::Result<T, E>;

/// Panics with a `FatalInvariant`-shaped message in debug builds; compiles
/// to nothing in release builds, exactly as the source's internal checks
/// are compiled out outside `NETDATA_INTERNAL_CHECKS` builds.
#[macro_export]
macro_rules! internal_fatal {
    ($cond:expr, $($arg:tt)*) => {
        if cfg!(debug_assertions) && $cond {
            panic!("internal invariant violated: {}", format!($($arg)*));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_displays_reason() {
        let e = QueryError::BadRequest { reason: "empty-database".into() };
        assert_eq!(e.to_string(), "bad request: empty-database");
    }

    #[test]
    #[should_panic(expected = "internal invariant violated")]
    fn internal_fatal_panics_in_debug() {
        internal_fatal!(true, "plan out of order");
    }
}
