use chrono::{DateTime, NaiveDate, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IssueRecord {
    pub id: Uuid,
    pub workspace_slug: String,
    pub project_id: Uuid,
    pub cycle_id: Option<Uuid>,
    pub name: String,
    pub priority: Option<String>,
    pub state: Option<String>,
    pub state_group: Option<String>,
    pub assignee: Option<String>,
    pub label: Option<String>,
    pub estimate_point: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
    pub start_date: Option<NaiveDate>,
    pub target_date: Option<NaiveDate>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Rows a plot is built from.
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub workspace_slug: String,
    pub project_id: Option<Uuid>,
    pub cycle_id: Option<Uuid>,
}

impl IssueFilter {
    pub fn matches(&self, issue: &IssueRecord) -> bool {
        issue.workspace_slug == self.workspace_slug
            && self.project_id.map_or(true, |id| issue.project_id == id)
            && self.cycle_id.map_or(true, |id| issue.cycle_id == Some(id))
    }
}

/// Identifies the issues of one cycle.
#[derive(Debug, Clone)]
pub struct CycleScope {
    pub workspace_slug: String,
    pub project_id: Uuid,
    pub cycle_id: Uuid,
}

impl CycleScope {
    pub fn matches(&self, issue: &IssueRecord) -> bool {
        issue.workspace_slug == self.workspace_slug
            && issue.project_id == self.project_id
            && issue.cycle_id == Some(self.cycle_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_issues: i64,
}

/// Completions on one UTC day. `date` is `None` for issues still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedDay {
    pub date: Option<NaiveDate>,
    pub total_completed: i64,
}

/// One aggregated row of a graph plot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlotRow {
    pub dimension: Option<String>,
    /// `None` when the plot has no segment, `Some(None)` for a null
    /// segment value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotGroup {
    pub key: String,
    pub rows: Vec<PlotRow>,
}

/// Ordered mapping from dimension key to the rows sharing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphPlot {
    pub groups: Vec<PlotGroup>,
}

impl GraphPlot {
    pub fn keys(&self) -> Vec<&str> {
        self.groups.iter().map(|group| group.key.as_str()).collect()
    }

    pub fn get(&self, key: &str) -> Option<&[PlotRow]> {
        self.groups
            .iter()
            .find(|group| group.key == key)
            .map(|group| group.rows.as_slice())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl Serialize for GraphPlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for group in &self.groups {
            map.serialize_entry(&group.key, &group.rows)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurndownPoint {
    pub date: NaiveDate,
    pub remaining: i64,
}

/// Remaining issues per day, in date order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BurndownChart {
    pub points: Vec<BurndownPoint>,
}

impl BurndownChart {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn remaining_on(&self, date: NaiveDate) -> Option<i64> {
        self.points
            .iter()
            .find(|point| point.date == date)
            .map(|point| point.remaining)
    }
}

impl Serialize for BurndownChart {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.points.len()))?;
        for point in &self.points {
            map.serialize_entry(&point.date.to_string(), &point.remaining)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_plot_serializes_in_group_order() {
        let plot = GraphPlot {
            groups: vec![
                PlotGroup {
                    key: "low".to_string(),
                    rows: vec![PlotRow {
                        dimension: Some("low".to_string()),
                        count: Some(2),
                        ..PlotRow::default()
                    }],
                },
                PlotGroup {
                    key: "None".to_string(),
                    rows: vec![PlotRow {
                        count: Some(1),
                        ..PlotRow::default()
                    }],
                },
            ],
        };

        let json = serde_json::to_string(&plot).unwrap();
        assert_eq!(
            json,
            r#"{"low":[{"dimension":"low","count":2}],"None":[{"dimension":null,"count":1}]}"#
        );
    }

    #[test]
    fn burndown_serializes_iso_dates() {
        let chart = BurndownChart {
            points: vec![
                BurndownPoint {
                    date: NaiveDate::from_ymd_opt(2024, 1, 9).unwrap(),
                    remaining: 4,
                },
                BurndownPoint {
                    date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
                    remaining: 3,
                },
            ],
        };

        let json = serde_json::to_string(&chart).unwrap();
        assert_eq!(json, r#"{"2024-01-09":4,"2024-01-10":3}"#);
    }

    #[test]
    fn cycle_scope_requires_cycle_membership() {
        let project_id = Uuid::new_v4();
        let cycle_id = Uuid::new_v4();
        let scope = CycleScope {
            workspace_slug: "acme".to_string(),
            project_id,
            cycle_id,
        };
        let mut issue = IssueRecord {
            workspace_slug: "acme".to_string(),
            project_id,
            ..IssueRecord::default()
        };

        assert!(!scope.matches(&issue));
        issue.cycle_id = Some(cycle_id);
        assert!(scope.matches(&issue));
    }
}
