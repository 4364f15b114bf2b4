#![deny(rust_2018_idioms)]
#![allow(clippy::too_many_arguments)]

//! Shared data model for the tiered time-series query engine.
//!
//! This crate holds no query logic. It defines the shapes that flow between
//! the window calculator, tier planner, per-dimension query loop and
//! group-by post-aggregator that live in `qe-core`, so that those stages can
//! be developed, tested and versioned independently of each other.

pub mod groupby;
pub mod options;
pub mod plan;
pub mod point;
pub mod result;
pub mod tier;
pub mod window;

pub use groupby::{GroupByAggregate, GroupByFields};
pub use options::QueryOptions;
pub use plan::{PlanSegment, PlanSegments};
pub use point::{QueryPoint, StoragePoint};
pub use result::{CellFlags, ColumnStats, ResultMatrix};
pub use tier::{Tier, TierExtent};
pub use window::{QueryWindow, TimeGrouping};
