//! Storage resolution tiers.
//!
//! Tier `0` is the finest (shortest `update_every`); higher indices are
//! progressively coarser. The tier planner's fitness bias (see
//! `qe_core::plan`) assumes this direction — it is a documented open
//! question in DESIGN.md, not an accident of indexing.

use std::fmt;

/// A storage resolution tier index. `0` is the finest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tier(pub usize);

impl Tier {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier{}", self.0)
    }
}

impl From<usize> for Tier {
    fn from(v: usize) -> Self {
        Tier(v)
    }
}

/// The per-metric, per-tier extent probe a storage engine reports: the
/// oldest and newest point it holds for a metric at this tier, and the
/// tier's sampling interval (its "update every"), in seconds.
///
/// A tier with any field zero/unset is not valid for planning (see
/// `qe_core::plan::TierPlanner::plan`, which filters on `is_set`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierExtent {
    pub first_time_s: i64,
    pub last_time_s: i64,
    pub update_every_s: i64,
}

impl TierExtent {
    pub fn is_set(&self) -> bool {
        self.first_time_s != 0 && self.last_time_s != 0 && self.update_every_s != 0
    }
}
