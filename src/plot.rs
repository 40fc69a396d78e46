use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::axis::{AxisOrder, Field, Metric};
use crate::models::{GraphPlot, IssueRecord, PlotGroup, PlotRow};

pub const PRIORITY_ORDER: [&str; 5] = ["low", "medium", "high", "urgent", "None"];

/// Key used for rows whose dimension is null.
pub const NULL_KEY: &str = "None";

#[derive(Debug, Clone, Copy, Default)]
pub struct PlotOptions {
    /// Drop rows whose temporal x-axis value is null instead of grouping
    /// them under the `"-"` month key.
    pub exclude_null_dates: bool,
}

#[derive(Debug, Clone)]
struct Derived {
    dimension: Option<String>,
    order: Option<AxisOrder>,
    /// Outer `None` when the plot is not segmented.
    segment: Option<Option<String>>,
    estimate: i64,
}

pub fn build_graph_plot(
    rows: &[IssueRecord],
    x_axis: Field,
    y_axis: &str,
    segment: Option<Field>,
) -> GraphPlot {
    build_graph_plot_with(rows, x_axis, y_axis, segment, &PlotOptions::default())
}

/// Buckets `rows` by `x_axis` (and `segment`), aggregates `y_axis` per bucket
/// and returns the buckets in display order.
pub fn build_graph_plot_with(
    rows: &[IssueRecord],
    x_axis: Field,
    y_axis: &str,
    segment: Option<Field>,
    options: &PlotOptions,
) -> GraphPlot {
    let mut derived: Vec<Derived> = rows
        .iter()
        .map(|issue| Derived {
            dimension: x_axis.key(issue),
            order: x_axis.order(issue),
            segment: segment.map(|field| field.key(issue)),
            estimate: issue.estimate_point.map(i64::from).unwrap_or(0),
        })
        .collect();

    if options.exclude_null_dates && x_axis.is_temporal() {
        derived.retain(|row| row.order.is_some());
    }

    let aggregated = match Metric::parse(y_axis) {
        Some(Metric::IssueCount) => count_rows(&derived),
        Some(Metric::Estimate) => estimate_rows(&derived),
        None => {
            debug!(y_axis, "unsupported y-axis, rows are not aggregated");
            derived
                .iter()
                .map(|row| PlotRow {
                    dimension: row.dimension.clone(),
                    ..PlotRow::default()
                })
                .collect()
        }
    };

    let groups = group_runs(aggregated);
    debug!(
        x_axis = %x_axis,
        segment = ?segment.map(Field::as_str),
        input = rows.len(),
        groups = groups.len(),
        "built graph plot"
    );

    GraphPlot {
        groups: order_groups(groups, x_axis),
    }
}

pub fn dimension_key(dimension: &Option<String>) -> String {
    dimension.clone().unwrap_or_else(|| NULL_KEY.to_string())
}

type SegmentOrder = Option<(bool, Option<String>)>;

/// Null segment values sort after the others.
fn segment_order(segment: &Option<Option<String>>) -> SegmentOrder {
    segment.as_ref().map(|value| (value.is_none(), value.clone()))
}

/// Counts rows per (dimension, segment), ordered by the dimension string
/// with nulls last.
fn count_rows(rows: &[Derived]) -> Vec<PlotRow> {
    let mut counts: BTreeMap<(bool, Option<String>, SegmentOrder), i64> = BTreeMap::new();

    for row in rows {
        let key = (
            row.dimension.is_none(),
            row.dimension.clone(),
            segment_order(&row.segment),
        );
        *counts.entry(key).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|((_, dimension, segment), count)| PlotRow {
            dimension,
            segment: segment.map(|(_, value)| value),
            count: Some(count),
            estimate: None,
        })
        .collect()
}

/// Sums estimate points per (dimension, segment), ordered by the x-axis
/// value itself: calendar order for months, numeric order for numbers.
fn estimate_rows(rows: &[Derived]) -> Vec<PlotRow> {
    let mut sums: BTreeMap<(bool, Option<AxisOrder>, SegmentOrder), PlotRow> = BTreeMap::new();

    for row in rows {
        let key = (
            row.order.is_none(),
            row.order.clone(),
            segment_order(&row.segment),
        );
        let entry = sums.entry(key).or_insert_with(|| PlotRow {
            dimension: row.dimension.clone(),
            segment: row.segment.clone(),
            count: None,
            estimate: Some(0),
        });
        entry.estimate = Some(entry.estimate.unwrap_or(0) + row.estimate);
    }

    sums.into_values().collect()
}

/// Groups runs of adjacent rows sharing a key. A later run with a key seen
/// before replaces the earlier run's rows but keeps its position.
fn group_runs(rows: Vec<PlotRow>) -> Vec<PlotGroup> {
    let mut runs: Vec<PlotGroup> = Vec::new();
    for row in rows {
        let key = dimension_key(&row.dimension);
        match runs.last_mut() {
            Some(run) if run.key == key => run.rows.push(row),
            _ => runs.push(PlotGroup {
                key,
                rows: vec![row],
            }),
        }
    }

    let mut groups: Vec<PlotGroup> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for run in runs {
        match positions.get(&run.key) {
            Some(&index) => groups[index].rows = run.rows,
            None => {
                positions.insert(run.key.clone(), groups.len());
                groups.push(run);
            }
        }
    }

    groups
}

fn order_groups(mut groups: Vec<PlotGroup>, x_axis: Field) -> Vec<PlotGroup> {
    if x_axis == Field::Priority {
        let mut by_key: HashMap<String, PlotGroup> = groups
            .into_iter()
            .map(|group| (group.key.clone(), group))
            .collect();
        return PRIORITY_ORDER
            .iter()
            .filter_map(|key| by_key.remove(*key))
            .collect();
    }

    groups.sort_by(|a, b| (a.key == NULL_KEY, &a.key).cmp(&(b.key == NULL_KEY, &b.key)));
    groups
}
