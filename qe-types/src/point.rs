//! Storage points (as read from a tier) and query points (the in-engine
//! projection the per-dimension loop actually interpolates and aggregates).

bitflags::bitflags! {
    /// Per-sample flags carried by a `StoragePoint`, analogous to the
    /// source's `SN_FLAGS`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SampleFlags: u8 {
        const RESET = 0b0000_0001;
        const GAP   = 0b0000_0010;
    }
}

/// One raw sample as read from a storage tier (§3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoragePoint {
    pub start_time_s: i64,
    pub end_time_s: i64,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub count: u32,
    pub anomaly_count: u32,
    pub flags: SampleFlags,
}

impl StoragePoint {
    /// The sentinel used for "no point read ahead yet" (the source's
    /// `STORAGE_POINT_UNSET`). `count == u32::MAX` marks the sentinel so
    /// that a genuine empty/gap point (`count == 0`) is never confused with
    /// "unset".
    pub const UNSET: StoragePoint = StoragePoint {
        start_time_s: 0,
        end_time_s: 0,
        min: f64::NAN,
        max: f64::NAN,
        sum: f64::NAN,
        count: u32::MAX,
        anomaly_count: 0,
        flags: SampleFlags::empty(),
    };

    pub fn is_unset(&self) -> bool {
        self.count == u32::MAX
    }

    /// A point is a gap if it carries no samples, or is explicitly flagged so.
    pub fn is_gap(&self) -> bool {
        self.count == 0 || self.flags.contains(SampleFlags::GAP)
    }
}

/// The in-engine projection of a point the query loop interpolates and
/// aggregates (§3). `value` is `NaN` for an empty/gap point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryPoint {
    pub start_time: i64,
    pub end_time: i64,
    pub value: f64,
    pub anomaly_outlier_points: u32,
    pub anomaly_all_points: u32,
    pub flags: SampleFlags,
}

impl QueryPoint {
    pub const EMPTY: QueryPoint = QueryPoint {
        start_time: 0,
        end_time: 0,
        value: f64::NAN,
        anomaly_outlier_points: 0,
        anomaly_all_points: 0,
        flags: SampleFlags::empty(),
    };

    pub fn is_number(&self) -> bool {
        self.value.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_storage_point_is_unset_only_by_sentinel_count() {
        assert!(StoragePoint::UNSET.is_unset());
        let mut gap = StoragePoint::UNSET;
        gap.count = 0;
        assert!(!gap.is_unset());
        assert!(gap.is_gap());
    }

    #[test]
    fn empty_query_point_is_not_a_number() {
        assert!(!QueryPoint::EMPTY.is_number());
    }
}
