//! The storage iterator contract (§6): the only way the engine talks to a
//! tier's on-disk/in-memory data. Storage engines themselves are out of
//! scope (§1) — this crate only depends on this trait.

use qe_types::point::StoragePoint;

/// A resumable cursor over one metric at one tier, producing zero or more
/// storage points in non-decreasing `end_time_s` order.
///
/// Implementors decide how `init` is parameterised (memory-mapped pages,
/// network round-trips, etc.); the engine only ever calls the four methods
/// below, synchronously, from the query's own task (§5 — no async
/// suspension is allowed across query state).
pub trait StorageCursor {
    /// Returns the next point, or a gap point (`count == 0`) if there is
    /// none for the stepped-over range. Never called again after
    /// `is_finished` returns `true`.
    fn next_point(&mut self) -> StoragePoint;

    fn is_finished(&self) -> bool;

    /// Releases resources. The engine calls this at most once per cursor.
    fn finalize(&mut self);
}

/// Extent probe a storage engine reports for one metric at one tier,
/// independent of any particular query's window.
pub trait StorageExtentProbe {
    fn oldest_time_s(&self) -> i64;
    fn latest_time_s(&self) -> i64;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use qe_types::point::SampleFlags;

    /// A cursor over an in-memory, fixed step series, for use by every
    /// other module's tests. Emits `count` points of `step` seconds each,
    /// starting at `start`, all carrying `value`.
    pub struct FixedSeriesCursor {
        pub next_start: i64,
        pub step: i64,
        pub remaining: usize,
        pub value: f64,
    }

    impl FixedSeriesCursor {
        pub fn new(start: i64, step: i64, count: usize, value: f64) -> Self {
            FixedSeriesCursor { next_start: start, step, remaining: count, value }
        }
    }

    impl StorageCursor for FixedSeriesCursor {
        fn next_point(&mut self) -> StoragePoint {
            let start = self.next_start;
            let end = start + self.step;
            self.next_start = end;
            self.remaining = self.remaining.saturating_sub(1);
            StoragePoint {
                start_time_s: start,
                end_time_s: end,
                min: self.value,
                max: self.value,
                sum: self.value,
                count: 1,
                anomaly_count: 0,
                flags: SampleFlags::empty(),
            }
        }

        fn is_finished(&self) -> bool {
            self.remaining == 0
        }

        fn finalize(&mut self) {}
    }

    /// A cursor that serves points from a pre-built `Vec`, for irregular or
    /// gapped series.
    pub struct ScriptedCursor {
        pub points: std::collections::VecDeque<StoragePoint>,
    }

    impl ScriptedCursor {
        pub fn new(points: Vec<StoragePoint>) -> Self {
            ScriptedCursor { points: points.into() }
        }
    }

    impl StorageCursor for ScriptedCursor {
        fn next_point(&mut self) -> StoragePoint {
            self.points.pop_front().unwrap_or(StoragePoint {
                start_time_s: 0,
                end_time_s: 0,
                min: f64::NAN,
                max: f64::NAN,
                sum: f64::NAN,
                count: 0,
                anomaly_count: 0,
                flags: SampleFlags::GAP,
            })
        }

        fn is_finished(&self) -> bool {
            self.points.is_empty()
        }

        fn finalize(&mut self) {}
    }
}
