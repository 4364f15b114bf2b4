//! The group-by post-aggregator (§4.5): folds per-metric result columns
//! into shared output buckets keyed by a selected set of facets.

use qe_types::groupby::{GroupByAggregate, GroupByFields};
use qe_types::options::QueryOptions;
use qe_types::result::{CellFlags, ColumnFlags, ColumnMeta, PartialTrimming, ResultMatrix};

/// The reserved key every dimension collapses to in selected-mode,
/// overriding every other facet (§4.5).
pub const SELECTED_KEY: &str = "selected";
/// The reserved key a metric collapses to when its dimension is hidden
/// from group-by keys (§4.5).
pub const HIDDEN_DIMENSIONS_KEY: &str = "__hidden_dimensions__";

/// The facet values one input metric carries for group-by key construction
/// (§4.5: "for each input metric build a synthetic key").
#[derive(Debug, Clone, Default)]
pub struct MetricFacets {
    pub dimension_id: String,
    pub dimension_name: String,
    pub dimension_hidden: bool,
    pub instance_id: String,
    pub instance_name: String,
    pub labels: Vec<(String, String)>,
    pub node_id: String,
    pub node_name: String,
    pub context_id: String,
    pub units: String,
}

/// Builds `(group_key, id, name)` for one metric given the selected facet
/// set, in the fixed key-build order `dimension, instance, label, node,
/// context, units`. `selected` wins over everything; a hidden dimension
/// collapses to its own reserved key before the rest of the bitset applies.
pub fn build_key(fields: GroupByFields, selected: bool, facets: &MetricFacets) -> (String, String, String) {
    if selected {
        return (SELECTED_KEY.into(), SELECTED_KEY.into(), SELECTED_KEY.into());
    }
    if fields.contains(GroupByFields::DIMENSION) && facets.dimension_hidden {
        return (HIDDEN_DIMENSIONS_KEY.into(), HIDDEN_DIMENSIONS_KEY.into(), HIDDEN_DIMENSIONS_KEY.into());
    }

    let mut key_parts = Vec::new();
    let mut id_parts = Vec::new();
    let mut name_parts = Vec::new();

    if fields.contains(GroupByFields::DIMENSION) {
        key_parts.push(facets.dimension_id.clone());
        id_parts.push(facets.dimension_id.clone());
        name_parts.push(facets.dimension_name.clone());
    }
    if fields.contains(GroupByFields::INSTANCE) {
        key_parts.push(facets.instance_id.clone());
        id_parts.push(facets.instance_id.clone());
        name_parts.push(facets.instance_name.clone());
    }
    if fields.contains(GroupByFields::LABEL) {
        for (k, v) in &facets.labels {
            let joined = format!("{k}:{v}");
            key_parts.push(joined.clone());
            id_parts.push(joined.clone());
            name_parts.push(joined);
        }
    }
    if fields.contains(GroupByFields::NODE) {
        key_parts.push(facets.node_id.clone());
        id_parts.push(facets.node_id.clone());
        name_parts.push(facets.node_name.clone());
    }
    if fields.contains(GroupByFields::CONTEXT) {
        key_parts.push(facets.context_id.clone());
        id_parts.push(facets.context_id.clone());
        name_parts.push(facets.context_id.clone());
    }
    if fields.contains(GroupByFields::UNITS) {
        key_parts.push(facets.units.clone());
        id_parts.push(facets.units.clone());
        name_parts.push(facets.units.clone());
    }

    (key_parts.join("|"), id_parts.join(","), name_parts.join(","))
}

/// Appends `,units` to an id/name pair when two group buckets share a key
/// but disagree on units (§4.5: "If two group buckets have different
/// units, append `,units` to ids to disambiguate").
pub fn disambiguate_units(id: &str, units: &str) -> String {
    format!("{id},{units}")
}

/// Folds one input metric's single-column result (`r_tmp`) into output
/// column `d` of the shared `output` matrix (§4.5 "Accumulation").
pub fn accumulate(
    r_tmp: &ResultMatrix,
    output: &mut ResultMatrix,
    d: usize,
    aggregate: GroupByAggregate,
    options: QueryOptions,
) {
    let rows = r_tmp.rows().min(output.rows());
    for row in 0..rows {
        let src_flags = r_tmp.cell_flags(row, 0);
        let is_empty = src_flags.contains(CellFlags::EMPTY);

        if is_empty && !options.contains(QueryOptions::NULL2ZERO) {
            continue;
        }

        let mut value = if is_empty { 0.0 } else { r_tmp.value(row, 0) };
        if options.contains(QueryOptions::ABSOLUTE) {
            value = value.abs();
        }

        let gbc = output.group_by_count(row, d);
        let combined = if gbc == 0 {
            value
        } else {
            let current = output.value(row, d);
            match aggregate {
                GroupByAggregate::Average | GroupByAggregate::Sum => current + value,
                GroupByAggregate::Min => current.min(value),
                GroupByAggregate::Max => current.max(value),
            }
        };

        output.set_value(row, d, combined);

        let carry = src_flags & (CellFlags::RESET | CellFlags::PARTIAL);
        let updated_flags = (output.cell_flags(row, d) & !CellFlags::EMPTY) | carry;
        output.set_cell_flags(row, d, updated_flags);

        output.set_anomaly_rate(row, d, output.anomaly_rate(row, d) + r_tmp.anomaly_rate(row, 0));
        output.increment_group_by_count(row, d);
    }
}

/// Walks rows forward looking for the first row past `expected_after`
/// whose cumulative group-by count across all columns dropped relative to
/// the previous row, and truncates the matrix there (§4.5 step 2).
fn trim_partial_rows(output: &mut ResultMatrix, max_update_every: i64, now: i64) {
    let expected_after = if output.before >= now - max_update_every {
        output.before - max_update_every
    } else {
        output.before
    };

    let mut prev_total: Option<u32> = None;
    let mut trimmed_at = None;

    for row in 0..output.rows() {
        let total: u32 = (0..output.cols()).map(|c| output.group_by_count(row, c)).sum();
        if output.timestamp(row) > expected_after {
            if let Some(prev) = prev_total {
                if total < prev {
                    trimmed_at = Some(row);
                    break;
                }
            }
        }
        prev_total = Some(total);
    }

    if let Some(row) = trimmed_at {
        output.partial_trimming = PartialTrimming { expected_after, trimmed_after: output.timestamp(row), max_update_every };
        output.truncate_rows(row);
    }
}

/// Finalises the group-by output matrix (§4.5 "Finalisation"): optional
/// partial-row trimming, per-column averaging (for the `avg` aggregate),
/// `PARTIAL`-flag bookkeeping against each column's expected contributor
/// count, and running column statistics.
pub fn finalize(
    output: &mut ResultMatrix,
    aggregate: GroupByAggregate,
    options: QueryOptions,
    max_update_every: i64,
    view_update_every: i64,
    now: i64,
) {
    if !options.contains(QueryOptions::RETURN_RAW) {
        trim_partial_rows(output, max_update_every, now);
    }

    for col in 0..output.cols() {
        let expected = output.columns[col].expected_group_count;
        for row in 0..output.rows() {
            let gbc = output.group_by_count(row, col);
            if gbc == 0 {
                continue;
            }

            let mut flags = output.cell_flags(row, col);
            flags &= !CellFlags::EMPTY;
            if gbc != expected {
                flags |= CellFlags::PARTIAL;
            }
            output.set_cell_flags(row, col, flags);

            let mut value = output.value(row, col);
            let mut anomaly = output.anomaly_rate(row, col);
            if matches!(aggregate, GroupByAggregate::Average) {
                value /= gbc as f64;
                anomaly /= gbc as f64;
            }
            output.set_value(row, col, value);
            output.set_anomaly_rate(row, col, anomaly);

            if value != 0.0 {
                output.columns[col].flags |= ColumnFlags::NON_ZERO;
            }
            output.columns[col].stats.add_bucket(value, anomaly, view_update_every);

            if output.view_min.is_nan() || value < output.view_min {
                output.view_min = value;
            }
            if output.view_max.is_nan() || value > output.view_max {
                output.view_max = value;
            }
        }
    }
}

/// Per-instance queried/failed counters rolled up to their owning context
/// and node (§4.5 step 4). The instance/context/node hierarchy itself is
/// the catalog's concern (out of scope, §1); this only folds the
/// `QUERIED`/`FAILED` flags the per-dimension loop already recorded on
/// each column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueriedFailedCounts {
    pub queried: u32,
    pub failed: u32,
}

pub fn rollup_queried_failed(columns: &[ColumnMeta]) -> QueriedFailedCounts {
    let mut counts = QueriedFailedCounts::default();
    for column in columns {
        if column.flags.contains(ColumnFlags::QUERIED) {
            counts.queried += 1;
        }
        if column.flags.contains(ColumnFlags::FAILED) {
            counts.failed += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facets() -> MetricFacets {
        MetricFacets {
            dimension_id: "used".into(),
            dimension_name: "Used".into(),
            dimension_hidden: false,
            instance_id: "disk1".into(),
            instance_name: "disk1".into(),
            labels: vec![("mount".into(), "/".into())],
            node_id: "node-a".into(),
            node_name: "node-a".into(),
            context_id: "disk.space".into(),
            units: "bytes".into(),
        }
    }

    #[test]
    fn selected_mode_collapses_everything() {
        let (key, id, name) = build_key(GroupByFields::DIMENSION | GroupByFields::NODE, true, &facets());
        assert_eq!(key, SELECTED_KEY);
        assert_eq!(id, SELECTED_KEY);
        assert_eq!(name, SELECTED_KEY);
    }

    #[test]
    fn hidden_dimension_collapses_to_reserved_key() {
        let mut f = facets();
        f.dimension_hidden = true;
        let (key, _, _) = build_key(GroupByFields::DIMENSION, false, &f);
        assert_eq!(key, HIDDEN_DIMENSIONS_KEY);
    }

    #[test]
    fn key_joins_selected_facets_in_fixed_order() {
        let fields = GroupByFields::DIMENSION | GroupByFields::NODE | GroupByFields::UNITS;
        let (key, id, _) = build_key(fields, false, &facets());
        assert_eq!(key, "used|node-a|bytes");
        assert_eq!(id, "used,node-a,bytes");
    }

    #[test]
    fn labels_append_key_value_pairs() {
        let (key, _, _) = build_key(GroupByFields::LABEL, false, &facets());
        assert_eq!(key, "mount:/");
    }

    #[test]
    fn accumulate_sums_and_counts_contributors() {
        let mut r_tmp = ResultMatrix::new(2, 1);
        r_tmp.set_value(0, 0, 10.0);
        r_tmp.set_value(1, 0, 20.0);

        let mut output = ResultMatrix::new(2, 1);
        output.enable_group_by_counts();

        accumulate(&r_tmp, &mut output, 0, GroupByAggregate::Sum, QueryOptions::default());
        accumulate(&r_tmp, &mut output, 0, GroupByAggregate::Sum, QueryOptions::default());

        assert_eq!(output.value(0, 0), 20.0);
        assert_eq!(output.group_by_count(0, 0), 2);
    }

    #[test]
    fn accumulate_skips_empty_unless_null2zero() {
        let mut r_tmp = ResultMatrix::new(1, 1);
        r_tmp.set_cell_flags(0, 0, CellFlags::EMPTY);

        let mut output = ResultMatrix::new(1, 1);
        output.enable_group_by_counts();

        accumulate(&r_tmp, &mut output, 0, GroupByAggregate::Sum, QueryOptions::default());
        assert_eq!(output.group_by_count(0, 0), 0);

        accumulate(&r_tmp, &mut output, 0, GroupByAggregate::Sum, QueryOptions::NULL2ZERO);
        assert_eq!(output.group_by_count(0, 0), 1);
        assert_eq!(output.value(0, 0), 0.0);
    }

    #[test]
    fn finalize_averages_for_avg_aggregate() {
        let mut output = ResultMatrix::new(1, 1);
        output.enable_group_by_counts();
        output.columns[0].expected_group_count = 2;
        output.before = 100;
        output.set_value(0, 0, 30.0);
        output.set_group_by_count(0, 0, 2);
        output.set_timestamp(0, 100);

        finalize(&mut output, GroupByAggregate::Average, QueryOptions::RETURN_RAW, 60, 10, 1_000_000);

        assert_eq!(output.value(0, 0), 15.0);
        assert!(!output.cell_flags(0, 0).contains(CellFlags::PARTIAL));
    }

    #[test]
    fn finalize_flags_partial_when_contributor_count_short() {
        let mut output = ResultMatrix::new(1, 1);
        output.enable_group_by_counts();
        output.columns[0].expected_group_count = 3;
        output.before = 100;
        output.set_value(0, 0, 10.0);
        output.set_group_by_count(0, 0, 2);
        output.set_timestamp(0, 100);

        finalize(&mut output, GroupByAggregate::Sum, QueryOptions::RETURN_RAW, 60, 10, 1_000_000);

        assert!(output.cell_flags(0, 0).contains(CellFlags::PARTIAL));
    }

    #[test]
    fn rollup_counts_queried_and_failed_columns() {
        let mut columns = vec![ColumnMeta::default(), ColumnMeta::default()];
        columns[0].flags |= ColumnFlags::QUERIED;
        columns[1].flags |= ColumnFlags::QUERIED | ColumnFlags::FAILED;

        let counts = rollup_queried_failed(&columns);
        assert_eq!(counts.queried, 2);
        assert_eq!(counts.failed, 1);
    }
}
