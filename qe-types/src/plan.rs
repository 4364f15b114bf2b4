//! Plan segments: the static, cursor-free description of a `(tier, after,
//! before)` slice of a metric's query plan (§3, §4.2).
//!
//! The live iterator handle that reads a segment's data belongs to
//! `qe_core::plan::LivePlanSegment`, not here — this crate carries no
//! dependency on the storage-cursor trait, so `PlanSegment` stays a plain,
//! cheaply cloned data type.

use smallvec::SmallVec;

use crate::tier::Tier;

/// A compile-time cap on the number of plan segments a single metric's
/// query plan may hold (the source's `QUERY_PLANS_MAX`). [`PlanSegments`]
/// inlines up to this many segments; a plan that stitches in more finer-tier
/// segments at either end of the window spills to the heap rather than
/// failing — see `qe_core::plan::TierPlanner`.
pub const QUERY_PLANS_MAX: usize = 10;

/// One metric's ordered, non-overlapping plan segments. Backed by a
/// [`SmallVec`] inlining `QUERY_PLANS_MAX` segments, matching the source's
/// fixed-size per-metric plan array (§3) without this port's planner having
/// to fail or truncate when that many aren't enough.
pub type PlanSegments = SmallVec<[PlanSegment; QUERY_PLANS_MAX]>;

/// One non-overlapping `(tier, after, before)` slice of a metric's plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanSegment {
    pub tier: Tier,
    /// The segment's own time range, clamped to what the tier/window intersect to.
    pub after: i64,
    pub before: i64,
    /// `after`/`before` widened by a few points of neighbouring granularity,
    /// so the per-dimension loop has a point on each side to interpolate
    /// across plan boundaries (§4.2 "Expansion for interpolation continuity").
    pub expanded_after: i64,
    pub expanded_before: i64,
}

impl PlanSegment {
    pub fn duration(&self) -> i64 {
        self.before - self.after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_is_before_minus_after() {
        let s = PlanSegment {
            tier: Tier(0),
            after: 10,
            before: 20,
            expanded_after: 5,
            expanded_before: 25,
        };
        assert_eq!(s.duration(), 10);
    }
}
