//! The window calculator (§4.1): negotiates the final `(after, before,
//! points, group, query_granularity, resampling_group, resampling_divisor,
//! aligned)` tuple from a raw request.

use qe_types::options::QueryOptions;
use qe_types::tier::Tier;
use qe_types::window::{QueryWindow, TimeGrouping};

use crate::error::{QueryError, Result};

/// Any value with magnitude at or below this many seconds (three years,
/// accounting for leap years) is a relative offset from `now` rather than
/// an absolute unix timestamp.
pub const RELATIVE_MAX: i64 = 3 * 366 * 86_400;

const ABSOLUTE_MIN_SECONDS: i64 = 10 * 365 * 86_400;
const ABSOLUTE_MAX_SECONDS: i64 = 365 * 86_400;
const ABSOLUTE_POINTS_CAP: usize = 86_400;

/// The raw, caller-supplied request fields the window calculator normalises.
#[derive(Debug, Clone, Copy)]
pub struct WindowRequest {
    pub after: i64,
    pub before: i64,
    /// `0` means "however many natural points the database has".
    pub points: usize,
    pub group_method: TimeGrouping,
    pub resampling_time: i64,
    pub options: QueryOptions,
    pub forced_tier: Option<Tier>,
    /// The metric set's minimum natural update interval (source:
    /// `qt->db.minimum_latest_update_every_s`), used as `query_granularity`
    /// when natural points are active and no tier is forced.
    pub update_every_min: i64,
    /// The database's extent, used to resolve `after == 0` / `before == 0`.
    pub db_first_time_s: i64,
    pub db_last_time_s: i64,
    /// Wall-clock "now", passed in rather than read from a clock so window
    /// calculation stays a pure function.
    pub now: i64,
}

/// Resolve `after`/`before` relative offsets to absolute unix timestamps
/// (§4.1 step 1-3). Returns whether an absolute period was requested.
fn relative_window_to_absolute(after: &mut i64, before: &mut i64, now: i64, unittest_running: bool) -> bool {
    let mut absolute_period_requested = true;

    let mut before_requested = *before;
    let mut after_requested = *after;

    if before_requested.abs() <= RELATIVE_MAX {
        if before_requested > 0 {
            before_requested = -before_requested;
        }
        before_requested += now;
        absolute_period_requested = false;
    }

    if after_requested.abs() <= RELATIVE_MAX {
        if after_requested > 0 {
            after_requested = -after_requested;
        }
        if after_requested == 0 {
            after_requested = -600;
        }
        // +1 so relative queries return a predictable point count (§4.1 note).
        after_requested = before_requested + after_requested + 1;
        absolute_period_requested = false;
    }

    if after_requested > before_requested {
        std::mem::swap(&mut after_requested, &mut before_requested);
    }

    if before_requested > now {
        let delta = before_requested - now;
        before_requested -= delta;
        after_requested -= delta;
    }

    if !unittest_running {
        let min_t = now - ABSOLUTE_MIN_SECONDS;
        let max_t = now + ABSOLUTE_MAX_SECONDS;
        after_requested = after_requested.clamp(min_t, max_t);
        before_requested = before_requested.clamp(min_t, max_t);
    }

    *before = before_requested;
    *after = after_requested;
    !absolute_period_requested
}

/// Round-half-up integer division, matching the source's
/// `points_available % points_wanted > points_wanted / 2` rounding rule.
fn round_group(points_available: usize, points_wanted: usize) -> usize {
    if points_wanted == 0 {
        return 1;
    }
    let mut group = points_available / points_wanted;
    if group == 0 {
        group = 1;
    }
    if points_available % points_wanted > points_wanted / 2 {
        group += 1;
    }
    group
}

/// Run the full window calculation (§4.1, steps 1-10).
pub fn calculate_window(req: &WindowRequest, unittest_running: bool) -> Result<QueryWindow> {
    let mut options = req.options;
    let mut points_wanted = req.points;
    let mut after_wanted = req.after;
    let mut before_wanted = req.before;

    let aligned = !options.contains(QueryOptions::NOT_ALIGNED);
    let automatic_natural_points = points_wanted == 0;
    let mut relative_period_requested = false;
    let mut natural_points = options.contains(QueryOptions::NATURAL_POINTS) || automatic_natural_points;
    let mut before_is_aligned_to_db_end = false;

    if after_wanted.abs() <= RELATIVE_MAX || before_wanted.abs() <= RELATIVE_MAX {
        relative_period_requested = true;
        natural_points = true;
        options |= QueryOptions::NATURAL_POINTS;
    }

    if options.contains(QueryOptions::VIRTUAL_POINTS) {
        natural_points = false;
    }

    if natural_points {
        options |= QueryOptions::NATURAL_POINTS;
        options.remove(QueryOptions::VIRTUAL_POINTS);
    } else {
        options |= QueryOptions::VIRTUAL_POINTS;
        options.remove(QueryOptions::NATURAL_POINTS);
    }

    if after_wanted == 0 || before_wanted == 0 {
        relative_period_requested = true;

        if req.db_first_time_s == 0 || req.db_last_time_s == 0 {
            return Err(QueryError::BadRequest { reason: "empty-database".into() });
        }

        if after_wanted == 0 {
            after_wanted = req.db_first_time_s;
        }
        if before_wanted == 0 {
            before_wanted = req.db_last_time_s;
            before_is_aligned_to_db_end = true;
        }
        if points_wanted == 0 {
            points_wanted =
                ((req.db_last_time_s - req.db_first_time_s) / req.update_every_min.max(1)) as usize;
        }
    }

    if points_wanted == 0 {
        points_wanted = 600;
    }

    relative_window_to_absolute(&mut after_wanted, &mut before_wanted, req.now, unittest_running);

    let mut update_every = req.update_every_min.max(1);
    if options.contains(QueryOptions::SELECTED_TIER) {
        if let Some(tier) = req.forced_tier {
            let _ = tier; // the tier's own common update-every is resolved by the caller via req.update_every_min
        }
    }

    let query_granularity = if natural_points { update_every.max(1) } else { 1 };

    if before_wanted % query_granularity != 0 {
        before_wanted -= before_wanted.rem_euclid(query_granularity);
    }
    if after_wanted % query_granularity != 0 {
        after_wanted -= after_wanted.rem_euclid(query_granularity);
    }

    if automatic_natural_points {
        points_wanted = ((before_wanted - after_wanted + 1) / query_granularity).max(1) as usize;
    }

    let mut duration = before_wanted - after_wanted;

    if req.resampling_time > duration {
        after_wanted = before_wanted - req.resampling_time;
        duration = before_wanted - after_wanted;
    }

    if req.resampling_time > query_granularity && duration % req.resampling_time != 0 {
        let delta = duration % req.resampling_time;
        if delta > req.resampling_time / 10 {
            after_wanted -= req.resampling_time - delta;
            duration = before_wanted - after_wanted;
        }
    }

    let mut points_available = ((duration + 1) / query_granularity).max(1) as usize;
    if points_available == 0 {
        points_available = 1;
    }

    if points_wanted > points_available {
        points_wanted = points_available;
    }

    if points_wanted > ABSOLUTE_POINTS_CAP && !unittest_running {
        points_wanted = ABSOLUTE_POINTS_CAP;
    }

    let mut group = round_group(points_available, points_wanted);

    if (points_wanted * group) as i64 * query_granularity < duration {
        points_wanted = points_available / group;
        if points_wanted * group < points_available {
            points_wanted += 1;
        }
        if points_wanted == 0 {
            points_wanted = 1;
        }
    }

    let mut resampling_divisor = 1.0f64;
    let mut resampling_group = 1usize;
    if req.resampling_time > query_granularity {
        resampling_group = (req.resampling_time / query_granularity) as usize;
        if req.resampling_time % query_granularity != 0 {
            resampling_group += 1;
        }

        if group < resampling_group {
            group = resampling_group;
        }
        if group % resampling_group != 0 {
            group += resampling_group - (group % resampling_group);
        }

        resampling_divisor = (group as i64 * query_granularity) as f64 / req.resampling_time as f64;
    }

    if aligned && before_wanted % (group as i64 * query_granularity) != 0 {
        let modulus = group as i64 * query_granularity;
        if before_is_aligned_to_db_end {
            before_wanted -= before_wanted.rem_euclid(modulus);
        } else {
            before_wanted += modulus - before_wanted.rem_euclid(modulus);
        }
    }

    after_wanted = before_wanted - (points_wanted as i64 * group as i64 * query_granularity) + query_granularity;

    Ok(QueryWindow {
        after: after_wanted,
        before: before_wanted,
        points: points_wanted,
        group,
        query_granularity,
        resampling_group,
        resampling_divisor,
        group_method: req.group_method,
        aligned,
        options,
        forced_tier: req.forced_tier,
        relative: relative_period_requested,
        now: req.now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_req() -> WindowRequest {
        WindowRequest {
            after: -600,
            before: 0,
            points: 60,
            group_method: TimeGrouping::Average,
            resampling_time: 0,
            options: QueryOptions::default(),
            forced_tier: None,
            update_every_min: 1,
            db_first_time_s: 1_000_000,
            db_last_time_s: 2_000_000,
            now: 2_000_000,
        }
    }

    #[test]
    fn simple_relative_window_yields_requested_points() {
        let w = calculate_window(&base_req(), true).unwrap();
        assert_eq!(w.points, 60);
        assert_eq!(w.group, 1);
        assert_eq!(w.before - w.after + w.query_granularity, 600);
    }

    #[test]
    fn zero_points_falls_back_to_database_extent() {
        let mut req = base_req();
        req.after = 0;
        req.before = 0;
        req.points = 0;
        let w = calculate_window(&req, true).unwrap();
        assert!(w.points > 0);
        assert!(w.relative);
    }

    #[test]
    fn empty_database_is_bad_request() {
        let mut req = base_req();
        req.after = 0;
        req.before = 0;
        req.db_first_time_s = 0;
        req.db_last_time_s = 0;
        let err = calculate_window(&req, true).unwrap_err();
        matches!(err, QueryError::BadRequest { .. });
    }

    #[test]
    fn after_before_swap_when_flipped() {
        let mut req = base_req();
        req.after = -10;
        req.before = -600;
        let w = calculate_window(&req, true).unwrap();
        assert!(w.after <= w.before);
    }

    #[test]
    fn resampling_forces_group_multiple() {
        let mut req = base_req();
        req.resampling_time = 5;
        req.points = 60;
        req.after = -600;
        req.before = 0;
        let w = calculate_window(&req, true).unwrap();
        assert_eq!(w.group % w.resampling_group, 0);
        assert!(w.resampling_group >= 1);
    }

    #[test]
    fn row_count_matches_points_wanted() {
        let w = calculate_window(&base_req(), true).unwrap();
        let duration = w.before - w.after + w.query_granularity;
        assert_eq!(w.points as i64, duration / (w.query_granularity * w.group as i64));
    }
}
