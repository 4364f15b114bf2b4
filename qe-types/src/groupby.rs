//! Group-by request shape (§4.5): which facets to key output columns by,
//! and how to combine the input columns that land in the same bucket.

bitflags::bitflags! {
    /// Which facets participate in a group-by key, in the fixed order the
    /// key string is built: dimension, instance, label, node, context, units.
    /// `SELECTED` and hidden dimensions collapse to reserved keys and take
    /// priority over the rest of the bitset (§4.5).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GroupByFields: u16 {
        const NONE       = 0;
        const SELECTED   = 0b0000_0001;
        const DIMENSION  = 0b0000_0010;
        const INSTANCE   = 0b0000_0100;
        const LABEL      = 0b0000_1000;
        const NODE       = 0b0001_0000;
        const CONTEXT    = 0b0010_0000;
        const UNITS      = 0b0100_0000;
    }
}

/// How values from multiple input columns landing in the same group-by
/// bucket are combined (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupByAggregate {
    #[default]
    Average,
    Sum,
    Min,
    Max,
}
