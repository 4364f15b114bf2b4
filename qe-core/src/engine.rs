//! The top-level entry point (§5, §6): ties the window calculator, tier
//! planner, per-dimension loop and group-by post-aggregator together over a
//! set of metrics, with per-metric failure isolation and cooperative
//! cancellation.

use std::collections::HashMap;
use std::time::Instant;

use qe_types::groupby::{GroupByAggregate, GroupByFields};
use qe_types::options::QueryOptions;
use qe_types::result::{ColumnFlags, ColumnMeta, ResultMatrix};
use qe_types::tier::{Tier, TierExtent};
use qe_types::window::TierFetch;

use crate::aggregate::{create_kernel, tier_fetch};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::group_by::{self, MetricFacets};
use crate::plan::{LivePlanSegment, TierPlanner};
use crate::query_loop::run_dimension;
use crate::storage::StorageCursor;
use crate::window::{calculate_window, WindowRequest};

/// One input metric's catalog-side data, supplied by the embedder. Storage
/// itself is out of scope (§1) — this crate only needs extents to plan and
/// a way to open a cursor per planned segment.
pub trait MetricSource {
    fn metric_id(&self) -> &str;
    fn tier_extents(&self) -> &[TierExtent];
    fn open_cursor(&self, tier: Tier, after: i64, before: i64) -> Box<dyn StorageCursor>;
    fn facets(&self) -> MetricFacets;
}

/// Group-by configuration for a query (§4.5). `selected` collapses every
/// metric into the single `group_by::SELECTED_KEY` bucket, overriding
/// `fields` entirely.
#[derive(Debug, Clone, Copy)]
pub struct GroupBySpec {
    pub fields: GroupByFields,
    pub aggregate: GroupByAggregate,
    pub selected: bool,
}

/// One query's full request: the window parameters, the metrics to read,
/// optional grouping, and the time-bucket kernel's options string (countif
/// comparator, ses/des coefficients — §4.4).
pub struct QueryRequest<'a> {
    pub window: WindowRequest,
    pub metrics: &'a [Box<dyn MetricSource>],
    pub group_by: Option<GroupBySpec>,
    pub grouping_options: String,
}

/// Caller-supplied cooperative cancellation (§5): polled between metrics.
pub struct Cancellation<'a> {
    pub interrupt: &'a dyn Fn() -> bool,
    pub deadline: Option<Instant>,
}

impl Cancellation<'_> {
    fn fired(&self) -> bool {
        (self.interrupt)() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Engine { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs one query end to end (§5, §6).
    ///
    /// Window-calculation and "every tier invalid for every metric"
    /// failures abort before any result is populated; a single metric's
    /// missing plan or stuck iterator is absorbed into that column's
    /// `ColumnFlags::FAILED` instead (§7).
    pub fn query(&self, req: &QueryRequest<'_>, cancellation: &Cancellation<'_>) -> Result<ResultMatrix> {
        let window = calculate_window(&req.window, self.config.unittest_running)?;

        let (mut output, dictionary): (ResultMatrix, Option<HashMap<String, usize>>) = match &req.group_by {
            None => {
                let mut matrix = ResultMatrix::new(window.points, req.metrics.len());
                for (idx, metric) in req.metrics.iter().enumerate() {
                    matrix.columns[idx] = ColumnMeta {
                        id: metric.metric_id().to_string(),
                        name: metric.metric_id().to_string(),
                        expected_group_count: 1,
                        ..Default::default()
                    };
                }
                (matrix, None)
            }
            Some(spec) => {
                let mut dictionary: HashMap<String, usize> = HashMap::new();
                let mut columns: Vec<ColumnMeta> = Vec::new();

                for metric in req.metrics {
                    let facets = metric.facets();
                    let (key, id, name) = group_by::build_key(spec.fields, spec.selected, &facets);
                    let col = *dictionary.entry(key).or_insert_with(|| {
                        columns.push(ColumnMeta { id, name, units: facets.units.clone(), ..Default::default() });
                        columns.len() - 1
                    });
                    columns[col].expected_group_count += 1;
                }

                let mut matrix = ResultMatrix::new(window.points, columns.len());
                matrix.columns = columns;
                matrix.enable_group_by_counts();
                (matrix, Some(dictionary))
            }
        };

        output.after = window.after;
        output.before = window.before;

        let fetch_preference = tier_fetch(window.group_method);

        for (idx, metric) in req.metrics.iter().enumerate() {
            if cancellation.fired() {
                tracing::info!(
                    metrics_queried = idx,
                    metrics_total = req.metrics.len(),
                    "query cancelled, returning partial result"
                );
                output.cancelled = true;
                break;
            }

            let plan_result = TierPlanner::plan(
                metric.tier_extents(),
                window.after,
                window.before,
                window.points,
                window.forced_tier,
            );

            let plan = match plan_result {
                Some(segments) => segments,
                None => {
                    tracing::debug!(metric_id = metric.metric_id(), "no valid tier for metric, column marked failed");
                    self.mark_failed(&mut output, &req.group_by, &dictionary, metric.as_ref(), idx);
                    continue;
                }
            };

            let live_plan: Vec<LivePlanSegment> = plan
                .iter()
                .map(|segment| LivePlanSegment {
                    segment: *segment,
                    tier_update_every_s: metric
                        .tier_extents()
                        .get(segment.tier.index())
                        .map(|e| e.update_every_s)
                        .unwrap_or(window.query_granularity),
                    cursor: metric.open_cursor(segment.tier, segment.expanded_after, segment.expanded_before),
                })
                .collect();

            let mut kernel = create_kernel(window.group_method, &req.grouping_options);

            match &req.group_by {
                None => {
                    run_dimension(metric.metric_id(), &window, live_plan, fetch_preference, kernel.as_mut(), &mut output, idx);
                    output.columns[idx].flags |= ColumnFlags::QUERIED;
                }
                Some(spec) => {
                    let mut r_tmp = ResultMatrix::new(window.points, 1);
                    run_dimension(metric.metric_id(), &window, live_plan, fetch_preference, kernel.as_mut(), &mut r_tmp, 0);

                    let facets = metric.facets();
                    let (key, _, _) = group_by::build_key(spec.fields, spec.selected, &facets);
                    let col = dictionary.as_ref().and_then(|d| d.get(&key).copied()).unwrap_or(0);

                    group_by::accumulate(&r_tmp, &mut output, col, spec.aggregate, window.options);
                    output.columns[col].flags |= ColumnFlags::QUERIED;
                }
            }
        }

        if let Some(spec) = &req.group_by {
            let view_update_every = window.view_update_every();
            group_by::finalize(
                &mut output,
                spec.aggregate,
                window.options,
                view_update_every,
                view_update_every,
                window.now,
            );
        }

        Ok(output)
    }

    fn mark_failed(
        &self,
        output: &mut ResultMatrix,
        group_by: &Option<GroupBySpec>,
        dictionary: &Option<HashMap<String, usize>>,
        metric: &dyn MetricSource,
        fallback_col: usize,
    ) {
        let col = match (group_by, dictionary) {
            (Some(spec), Some(dict)) => {
                let facets = metric.facets();
                let (key, _, _) = group_by::build_key(spec.fields, spec.selected, &facets);
                dict.get(&key).copied().unwrap_or(fallback_col)
            }
            _ => fallback_col,
        };
        if col < output.columns.len() {
            output.columns[col].flags |= ColumnFlags::FAILED;
        }
    }
}

/// No-op cancellation: never interrupts, never times out.
pub fn no_cancellation() -> Cancellation<'static> {
    Cancellation { interrupt: &|| false, deadline: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::FixedSeriesCursor;
    use qe_types::window::TimeGrouping;

    struct FlatMetric {
        id: String,
        extents: Vec<TierExtent>,
    }

    impl MetricSource for FlatMetric {
        fn metric_id(&self) -> &str {
            &self.id
        }

        fn tier_extents(&self) -> &[TierExtent] {
            &self.extents
        }

        fn open_cursor(&self, _tier: Tier, after: i64, before: i64) -> Box<dyn StorageCursor> {
            let count = ((before - after).max(0) + 2) as usize;
            Box::new(FixedSeriesCursor::new(after - 1, 1, count, 7.0))
        }

        fn facets(&self) -> MetricFacets {
            MetricFacets {
                dimension_id: self.id.clone(),
                dimension_name: self.id.clone(),
                units: "ops".into(),
                ..Default::default()
            }
        }
    }

    fn metric(id: &str) -> Box<dyn MetricSource> {
        Box::new(FlatMetric {
            id: id.to_string(),
            extents: vec![TierExtent { first_time_s: 0, last_time_s: 1_000, update_every_s: 1 }],
        })
    }

    fn window_request() -> WindowRequest {
        WindowRequest {
            after: -60,
            before: 0,
            points: 10,
            group_method: TimeGrouping::Average,
            resampling_time: 0,
            options: QueryOptions::default(),
            forced_tier: None,
            update_every_min: 1,
            db_first_time_s: 1,
            db_last_time_s: 1_000,
            now: 1_000,
        }
    }

    #[test]
    fn ungrouped_query_fills_one_column_per_metric() {
        let metrics = vec![metric("a"), metric("b")];
        let engine = Engine::new(EngineConfig { unittest_running: true, ..Default::default() });
        let req = QueryRequest {
            window: window_request(),
            metrics: &metrics,
            group_by: None,
            grouping_options: String::new(),
        };

        let result = engine.query(&req, &no_cancellation()).unwrap();
        assert_eq!(result.cols(), 2);
        for col in 0..2 {
            assert!(result.columns[col].flags.contains(ColumnFlags::QUERIED));
        }
    }

    #[test]
    fn grouped_query_merges_metrics_into_shared_columns() {
        let metrics = vec![metric("a"), metric("b")];
        let engine = Engine::new(EngineConfig { unittest_running: true, ..Default::default() });
        let req = QueryRequest {
            window: window_request(),
            metrics: &metrics,
            group_by: Some(GroupBySpec {
                fields: GroupByFields::NONE,
                aggregate: GroupByAggregate::Sum,
                selected: true,
            }),
            grouping_options: String::new(),
        };

        let result = engine.query(&req, &no_cancellation()).unwrap();
        assert_eq!(result.cols(), 1);
    }

    #[test]
    fn cancellation_before_any_metric_marks_result_cancelled() {
        let metrics = vec![metric("a")];
        let engine = Engine::new(EngineConfig { unittest_running: true, ..Default::default() });
        let req = QueryRequest {
            window: window_request(),
            metrics: &metrics,
            group_by: None,
            grouping_options: String::new(),
        };

        let cancellation = Cancellation { interrupt: &|| true, deadline: None };
        let result = engine.query(&req, &cancellation).unwrap();
        assert!(result.cancelled);
    }

    #[test]
    fn metric_with_no_valid_tier_is_marked_failed_not_aborted() {
        let broken = Box::new(FlatMetric { id: "broken".into(), extents: vec![] }) as Box<dyn MetricSource>;
        let metrics = vec![broken, metric("ok")];
        let engine = Engine::new(EngineConfig { unittest_running: true, ..Default::default() });
        let req = QueryRequest {
            window: window_request(),
            metrics: &metrics,
            group_by: None,
            grouping_options: String::new(),
        };

        let result = engine.query(&req, &no_cancellation()).unwrap();
        assert!(result.columns[0].flags.contains(ColumnFlags::FAILED));
        assert!(result.columns[1].flags.contains(ColumnFlags::QUERIED));
    }
}
