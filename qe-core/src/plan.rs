//! The tier planner (§4.2): picks a primary tier per metric and builds an
//! ordered, non-overlapping sequence of plan segments, expanded at their
//! boundaries for interpolation continuity.

use qe_types::plan::{PlanSegment, PlanSegments, QUERY_PLANS_MAX};
use qe_types::tier::{Tier, TierExtent};

use crate::storage::StorageCursor;

/// A plan segment paired with the live cursor that reads it, and the tier's
/// own sampling interval (needed to reshape zero-duration samples into a
/// `start = end - tier_update_every_s` span, §4.3 "Edge policies"). Built by
/// the engine from `TierPlanner::plan` plus per-segment cursor construction,
/// which is storage-engine-specific and out of this crate's scope.
pub struct LivePlanSegment {
    pub segment: PlanSegment,
    pub tier_update_every_s: i64,
    pub cursor: Box<dyn StorageCursor>,
}

/// Points of the neighbouring segment's granularity a segment's bounds are
/// widened by, at minimum (§4.2).
pub const EXPAND_POINTS: i64 = 5;

/// `-inf`-like sentinel weight for a tier that cannot serve the window at all.
const INVALID_WEIGHT: i64 = i64::MIN;

/// Per-tier fitness weight for a candidate tier, given the metric(s)'
/// combined extent at that tier (§4.2 "Tier-fitness weight").
///
/// Higher is better. A 2.5% bonus per tier index biases ties towards
/// coarser (higher-indexed) tiers, on the stated assumption that higher
/// indices are coarser — see DESIGN.md for why this direction was kept.
pub fn tier_fitness_weight(
    extent: TierExtent,
    after: i64,
    before: i64,
    points_wanted: usize,
    tier: Tier,
) -> i64 {
    if !extent.is_set() || extent.first_time_s > before || extent.last_time_s < after {
        return INVALID_WEIGHT;
    }

    let common_first = extent.first_time_s.max(after);
    let common_last = extent.last_time_s.min(before);

    let time_coverage = (common_last - common_first) * 1_000_000 / (before - after).max(1);
    let points_in_coverage = points_wanted as i64 * time_coverage / 1_000_000;

    let points_available = (common_last - common_first) / extent.update_every_s.max(1);
    if points_available <= 0 {
        return INVALID_WEIGHT;
    }

    let delta = points_available - points_in_coverage;
    let points_coverage = if delta < 0 && points_in_coverage != 0 {
        points_available * time_coverage / points_in_coverage
    } else {
        time_coverage
    };

    points_coverage + 25_000 * tier.index() as i64
}

/// Select the best tier across a metric's per-tier extents, or `None` if
/// every tier is invalid for this window.
pub fn select_best_tier(
    extents: &[TierExtent],
    after: i64,
    before: i64,
    points_wanted: usize,
) -> Option<Tier> {
    if extents.is_empty() || after == before || points_wanted == 0 {
        return extents.iter().position(|e| e.is_set()).map(Tier);
    }

    let mut best: Option<(Tier, i64)> = None;
    for (idx, extent) in extents.iter().enumerate() {
        let tier = Tier(idx);
        let weight = tier_fitness_weight(*extent, after, before, points_wanted, tier);
        if weight == INVALID_WEIGHT {
            continue;
        }
        match best {
            Some((_, best_weight)) if weight < best_weight => {}
            _ => best = Some((tier, weight)),
        }
    }
    best.map(|(tier, _)| tier)
}

fn expand_duration_in_points(this_update_every: i64, next_update_every: i64) -> i64 {
    let delta = (this_update_every - next_update_every).abs();
    if delta < this_update_every * EXPAND_POINTS {
        EXPAND_POINTS
    } else {
        (delta + this_update_every - 1) / this_update_every
    }
}

/// Builds the ordered, expanded plan segment sequence for one metric (§4.2).
pub struct TierPlanner;

impl TierPlanner {
    /// Construct the plan for one metric given its per-tier extents, the
    /// requested window and an optional forced tier.
    ///
    /// Returns `None` ("no-data", §7) if no tier is valid or the chosen
    /// tier's range misses the window entirely.
    pub fn plan(
        extents: &[TierExtent],
        after_wanted: i64,
        before_wanted: i64,
        points_wanted: usize,
        forced_tier: Option<Tier>,
    ) -> Option<PlanSegments> {
        let forced = forced_tier.filter(|t| extents.get(t.index()).is_some_and(TierExtent::is_set));

        let selected_tier = match forced {
            Some(t) => t,
            None => select_best_tier(extents, after_wanted, before_wanted, points_wanted)?,
        };

        let selected_extent = extents.get(selected_tier.index())?;
        if !selected_extent.is_set() {
            return None;
        }
        if selected_extent.first_time_s > before_wanted || selected_extent.last_time_s < after_wanted {
            return None;
        }

        let mut raw: Vec<(Tier, i64, i64)> = Vec::with_capacity(QUERY_PLANS_MAX);
        let seg0_after = selected_extent.first_time_s.max(after_wanted);
        let seg0_before = selected_extent.last_time_s.min(before_wanted);
        raw.push((selected_tier, seg0_after, seg0_before));

        if forced.is_none() {
            // extend at the start with finer history from other tiers.
            let mut boundary = seg0_after;
            if boundary > after_wanted {
                for (idx, extent) in extents.iter().enumerate() {
                    if raw.len() >= QUERY_PLANS_MAX {
                        break;
                    }
                    if idx == selected_tier.index() || !extent.is_set() {
                        continue;
                    }
                    if extent.first_time_s < boundary {
                        let seg_after = extent.first_time_s.max(after_wanted);
                        raw.push((Tier(idx), seg_after, boundary));
                        boundary = seg_after;
                        if boundary <= after_wanted {
                            break;
                        }
                    }
                }
            }

            // extend at the end with finer tiers.
            let mut boundary = seg0_before;
            if boundary < before_wanted {
                for (idx, extent) in extents.iter().enumerate() {
                    if raw.len() >= QUERY_PLANS_MAX {
                        break;
                    }
                    if idx == selected_tier.index() || !extent.is_set() {
                        continue;
                    }
                    if extent.last_time_s > boundary {
                        let seg_before = extent.last_time_s.min(before_wanted);
                        raw.push((Tier(idx), boundary, seg_before));
                        boundary = seg_before;
                        if boundary >= before_wanted {
                            break;
                        }
                    }
                }
            }
        }

        raw.sort_by_key(|(_, after, _)| *after);

        if raw.iter().any(|(_, after, before)| after > before) {
            return None;
        }

        let n = raw.len();
        let segments: PlanSegments = raw
            .iter()
            .enumerate()
            .map(|(i, &(tier, after, before))| {
                let update_every = extents[tier.index()].update_every_s.max(1);

                let points_before = if i > 0 {
                    let prev_update_every = extents[raw[i - 1].0.index()].update_every_s.max(1);
                    expand_duration_in_points(update_every, prev_update_every)
                } else if tier.index() == 0 {
                    0
                } else {
                    EXPAND_POINTS
                };

                let points_after = if i + 1 < n {
                    let next_update_every = extents[raw[i + 1].0.index()].update_every_s.max(1);
                    expand_duration_in_points(update_every, next_update_every)
                } else {
                    EXPAND_POINTS
                };

                PlanSegment {
                    tier,
                    after,
                    before,
                    expanded_after: after - update_every * points_before,
                    expanded_before: before + update_every * points_after,
                }
            })
            .collect();

        Some(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(first: i64, last: i64, update_every: i64) -> TierExtent {
        TierExtent { first_time_s: first, last_time_s: last, update_every_s: update_every }
    }

    #[test]
    fn single_tier_covers_whole_window() {
        let extents = vec![extent(0, 1000, 1)];
        let plan = TierPlanner::plan(&extents, 0, 999, 60, None).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].tier, Tier(0));
    }

    #[test]
    fn forced_tier_skips_weight_selection() {
        let extents = vec![extent(0, 1000, 1), extent(0, 1000, 60)];
        let plan = TierPlanner::plan(&extents, 0, 999, 60, Some(Tier(1))).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].tier, Tier(1));
    }

    #[test]
    fn two_tiers_stitch_when_selected_tier_starts_late() {
        // tier 1 (coarse) only has data from t=500 onward; tier 0 (fine) covers from 0.
        let extents = vec![extent(0, 1000, 1), extent(500, 1000, 60)];
        // weight formula favours tier 1 due to the coarse-tier bonus when it can
        // cover most of the window; force tier 0 out of the running by asking
        // for a window that starts before tier 1's data.
        let plan = TierPlanner::plan(&extents, 0, 999, 17, None).unwrap();
        assert!(plan.iter().any(|s| s.tier == Tier(0)));
        // segments are sorted ascending and non-overlapping at their raw bounds.
        for w in plan.windows(2) {
            assert!(w[0].after <= w[1].after);
        }
    }

    #[test]
    fn no_valid_tier_is_no_data() {
        let extents = vec![extent(2000, 3000, 1)];
        assert!(TierPlanner::plan(&extents, 0, 999, 60, None).is_none());
    }

    #[test]
    fn expand_points_minimum_is_five() {
        assert_eq!(expand_duration_in_points(60, 55), EXPAND_POINTS);
    }

    #[test]
    fn expand_points_scales_with_delta() {
        // delta=540, this_update_every*5 = 300, so delta >= threshold -> scaled.
        assert_eq!(expand_duration_in_points(60, 600), (540 + 59) / 60);
    }

    #[test]
    fn weight_is_invalid_outside_range() {
        let e = extent(0, 100, 1);
        assert_eq!(tier_fitness_weight(e, 200, 300, 10, Tier(0)), INVALID_WEIGHT);
    }
}
