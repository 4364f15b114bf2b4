//! The per-dimension query loop (§4.3): walks an ordered, already-expanded
//! plan segment sequence, interpolates across point and plan boundaries, and
//! folds the result into one time-bucket aggregation kernel per output row.

use qe_types::options::QueryOptions;
use qe_types::point::{QueryPoint, SampleFlags, StoragePoint};
use qe_types::result::{CellFlags, ResultMatrix};
use qe_types::window::{QueryWindow, TierFetch};

use crate::aggregate::GroupingKernel;
use crate::plan::LivePlanSegment;

/// A storage iterator made no forward progress after this many consecutive
/// pulls within one bucket; the point is considered bad and the bucket is
/// left empty (§4.3 "Edge policies").
const RETRY_LIMIT: u32 = 100;

/// The plan ran out of segments this many times in a row without the outer
/// loop completing; give up and finalise (§4.3).
const FINISHED_LIMIT: u32 = 10;

/// Projects a raw storage sample onto the scalar this query actually reads,
/// per the kernel's declared tier-fetch preference (§4.4) — overridden
/// wholesale when `ANOMALY_BIT` mode is requested, in which case every
/// kernel reads the point's anomaly rate instead of its own preference.
fn project(sp: StoragePoint, tier_fetch: TierFetch, options: QueryOptions) -> QueryPoint {
    let flags = if sp.flags.contains(SampleFlags::RESET) {
        SampleFlags::RESET
    } else {
        SampleFlags::empty()
    };

    if sp.is_gap() {
        return QueryPoint {
            start_time: sp.start_time_s,
            end_time: sp.end_time_s,
            value: f64::NAN,
            anomaly_outlier_points: sp.anomaly_count,
            anomaly_all_points: sp.count,
            flags,
        };
    }

    let value = if options.contains(QueryOptions::ANOMALY_BIT) {
        sp.anomaly_count as f64 * 100.0 / sp.count.max(1) as f64
    } else {
        match tier_fetch {
            TierFetch::Average => sp.sum / sp.count.max(1) as f64,
            TierFetch::Min => sp.min,
            TierFetch::Max => sp.max,
            TierFetch::Sum => sp.sum,
        }
    };

    QueryPoint {
        start_time: sp.start_time_s,
        end_time: sp.end_time_s,
        value,
        anomaly_outlier_points: sp.anomaly_count,
        anomaly_all_points: sp.count,
        flags,
    }
}

/// The interpolation law (§4.3 step 3): linearly interpolate `current`'s
/// value against `prior` at timestamp `at`, provided both values are
/// finite, the two points are exactly contiguous, and `current` spans more
/// than one second. Otherwise `current`'s own value is used verbatim.
fn interpolate(prior: QueryPoint, current: QueryPoint, at: i64) -> QueryPoint {
    let duration = current.end_time - current.start_time;
    let contiguous = prior.end_time == current.start_time;

    if contiguous && duration > 1 && prior.is_number() && current.is_number() {
        let fraction = 1.0 - ((current.end_time - at) as f64 / duration as f64);
        let value = prior.value + (current.value - prior.value) * fraction;
        QueryPoint { start_time: current.start_time, end_time: at, value, ..current }
    } else {
        current
    }
}

/// Pulls the next raw sample off the plan: the read-ahead slot first, else
/// the current segment's cursor, skipping over segments that are already
/// finished. Zero-duration samples are reshaped to span their tier's own
/// update-every. Returns `None` once every remaining segment is exhausted.
fn pull_next(
    plan: &mut [LivePlanSegment],
    plan_idx: &mut usize,
    next1: &mut Option<StoragePoint>,
) -> Option<StoragePoint> {
    if let Some(p) = next1.take() {
        return Some(p);
    }

    while *plan_idx < plan.len() {
        let segment = &mut plan[*plan_idx];
        if segment.cursor.is_finished() {
            *plan_idx += 1;
            continue;
        }

        let mut sp = segment.cursor.next_point();
        if sp.start_time_s == sp.end_time_s {
            sp.start_time_s = sp.end_time_s - segment.tier_update_every_s.max(1);
        }
        return Some(sp);
    }

    None
}

/// If the sample just pulled crosses into the next plan segment's range,
/// peek that segment's first point. When the peeked point starts no later
/// than the one in hand, the old plan segment is considered exhausted early
/// and the peeked point replaces it; otherwise the peeked point is cached in
/// `next1` so it rejoins smoothly once the loop actually reaches it.
fn reconcile_plan_boundary(
    plan: &mut [LivePlanSegment],
    plan_idx: &mut usize,
    next1: &mut Option<StoragePoint>,
    pulled: StoragePoint,
) -> StoragePoint {
    let crossed = *plan_idx + 1 < plan.len()
        && pulled.end_time_s > plan[*plan_idx].segment.expanded_before;

    if !crossed {
        return pulled;
    }

    let next_segment = &mut plan[*plan_idx + 1];
    if next_segment.cursor.is_finished() {
        return pulled;
    }

    let candidate = next_segment.cursor.next_point();
    if candidate.start_time_s <= pulled.start_time_s {
        *plan_idx += 1;
        candidate
    } else {
        *next1 = Some(candidate);
        pulled
    }
}

/// Runs the per-dimension query loop, writing `window.points` rows into
/// `matrix`'s column `col` and folding per-column statistics as it goes.
/// `plan` must already be ordered ascending by `segment.after` (the tier
/// planner's output contract).
pub fn run_dimension(
    metric_id: &str,
    window: &QueryWindow,
    mut plan: Vec<LivePlanSegment>,
    tier_fetch: TierFetch,
    kernel: &mut dyn GroupingKernel,
    matrix: &mut ResultMatrix,
    col: usize,
) {
    kernel.reset();

    let update_every_view = window.view_update_every();
    let mut now_end = window.after + update_every_view - window.query_granularity;

    let mut last2 = QueryPoint::EMPTY;
    let mut last1 = QueryPoint::EMPTY;
    let mut new = QueryPoint::EMPTY;
    let mut next1: Option<StoragePoint> = None;

    let mut plan_idx: usize = 0;
    let mut row: usize = 0;
    let mut carried_reset = false;

    let mut finished_counter: u32 = 0;

    'outer: while row < window.points && finished_counter <= FINISHED_LIMIT {
        // RESET flags seen while consuming points for the *previous* bucket
        // land on this one (§4.3 step 4); reset the carry for what this
        // iteration itself observes.
        let this_row_reset = carried_reset;
        carried_reset = false;

        let now_start = now_end - update_every_view;

        // Step 2: inner refill loop — pull samples until one reaches or
        // crosses now_end, feeding everything fully inside the bucket to
        // the kernel directly.
        let mut retries: u32 = 0;
        let mut stuck_retries: u32 = 0;
        let mut reached_bucket_end = false;

        while retries < RETRY_LIMIT {
            let pulled = match pull_next(&mut plan, &mut plan_idx, &mut next1) {
                Some(p) => p,
                None => {
                    finished_counter += 1;
                    break;
                }
            };
            let pulled = reconcile_plan_boundary(&mut plan, &mut plan_idx, &mut next1, pulled);

            if pulled.end_time_s <= last1.end_time && last1.end_time != 0 {
                // no forward progress; retry rather than looping forever on
                // a misbehaving cursor.
                retries += 1;
                stuck_retries += 1;
                continue;
            }
            stuck_retries = 0;

            let qp = project(pulled, tier_fetch, window.options);
            if qp.flags.contains(SampleFlags::RESET) {
                carried_reset = true;
            }

            if qp.end_time < now_start {
                // entirely before the bucket: discard and keep pulling.
                retries += 1;
                continue;
            }

            last2 = last1;
            last1 = new;
            new = qp;

            if new.end_time >= now_end {
                reached_bucket_end = true;
                break;
            }

            // fully inside [now_start, now_end): feed it straight in.
            if new.is_number() {
                kernel.add(new.value);
            }
            retries += 1;
        }

        if !reached_bucket_end {
            if stuck_retries >= RETRY_LIMIT {
                // §7 "iterator-stuck": a cursor made no forward progress for
                // RETRY_LIMIT consecutive pulls; the offending point is
                // discarded and the bucket is left empty rather than
                // blocking the query on a misbehaving iterator.
                tracing::warn!(
                    metric_id,
                    row,
                    now_end,
                    "storage iterator stuck, discarding point and leaving bucket empty"
                );
            }
            if finished_counter > FINISHED_LIMIT {
                break 'outer;
            }
        }

        // Step 3: interpolation and bucket emission.
        let selected = if now_end > new.start_time && new.is_number() {
            interpolate(last1, new, now_end)
        } else if now_end <= last1.end_time && last1.is_number() {
            interpolate(last2, last1, now_end)
        } else {
            QueryPoint::EMPTY
        };

        if selected.is_number() {
            kernel.add(selected.value);
        }

        let value = kernel.flush().unwrap_or(f64::NAN);
        let mut flags = if value.is_nan() { CellFlags::EMPTY } else { CellFlags::empty() };
        if this_row_reset {
            flags |= CellFlags::RESET;
        }

        matrix.set_value(row, col, if value.is_nan() { 0.0 } else { value });
        matrix.set_cell_flags(row, col, flags);
        let anomaly_rate = if selected.anomaly_all_points > 0 {
            selected.anomaly_outlier_points as f64 * 100.0 / selected.anomaly_all_points as f64
        } else {
            0.0
        };
        matrix.set_anomaly_rate(row, col, anomaly_rate);
        matrix.set_timestamp(row, now_end);

        if !value.is_nan() {
            matrix.columns[col].stats.add_bucket(value, anomaly_rate, update_every_view);
            if matrix.view_min.is_nan() || value < matrix.view_min {
                matrix.view_min = value;
            }
            if matrix.view_max.is_nan() || value > matrix.view_max {
                matrix.view_max = value;
            }
        }

        row += 1;
        now_end += update_every_view;
    }

    // fill any remaining rows with empty buckets.
    while row < matrix.rows() {
        matrix.set_value(row, col, 0.0);
        matrix.set_cell_flags(row, col, CellFlags::EMPTY);
        matrix.set_anomaly_rate(row, col, 0.0);
        matrix.set_timestamp(row, now_end);
        row += 1;
        now_end += update_every_view;
    }

    for segment in &mut plan {
        segment.cursor.finalize();
    }
}
