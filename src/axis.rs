use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};

use crate::error::AnalyticsError;
use crate::models::IssueRecord;

/// Month key of a null date.
pub const NULL_MONTH_KEY: &str = "-";

/// An issue field that can be used as an x-axis or a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    CreatedAt,
    StartDate,
    TargetDate,
    CompletedAt,
    Priority,
    State,
    StateGroup,
    Assignee,
    Label,
    ProjectId,
    EstimatePoint,
}

/// Sort position of a raw axis value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum AxisOrder {
    Month(i32, u32),
    Number(i64),
    Text(String),
}

impl Field {
    pub const ALL: [Field; 11] = [
        Field::CreatedAt,
        Field::StartDate,
        Field::TargetDate,
        Field::CompletedAt,
        Field::Priority,
        Field::State,
        Field::StateGroup,
        Field::Assignee,
        Field::Label,
        Field::ProjectId,
        Field::EstimatePoint,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::CreatedAt => "created_at",
            Field::StartDate => "start_date",
            Field::TargetDate => "target_date",
            Field::CompletedAt => "completed_at",
            Field::Priority => "priority",
            Field::State => "state",
            Field::StateGroup => "state_group",
            Field::Assignee => "assignee",
            Field::Label => "label",
            Field::ProjectId => "project_id",
            Field::EstimatePoint => "estimate_point",
        }
    }

    /// Temporal fields are bucketed by month.
    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            Field::CreatedAt | Field::StartDate | Field::TargetDate | Field::CompletedAt
        )
    }

    fn date(self, issue: &IssueRecord) -> Option<NaiveDate> {
        match self {
            Field::CreatedAt => issue.created_at.map(|at| at.date_naive()),
            Field::StartDate => issue.start_date,
            Field::TargetDate => issue.target_date,
            Field::CompletedAt => issue.completed_at.map(|at| at.date_naive()),
            _ => None,
        }
    }

    /// Grouping key for this field: `"<year>-<month>"` without zero padding
    /// for temporal fields, the stringified raw value otherwise.
    ///
    /// A null date still yields a key, [`NULL_MONTH_KEY`]: the month key is
    /// a SQL `CONCAT(year, '-', month)`, which drops null arguments.
    pub fn key(self, issue: &IssueRecord) -> Option<String> {
        if self.is_temporal() {
            return Some(match self.date(issue) {
                Some(date) => format!("{}-{}", date.year(), date.month()),
                None => NULL_MONTH_KEY.to_string(),
            });
        }

        match self {
            Field::Priority => issue.priority.clone(),
            Field::State => issue.state.clone(),
            Field::StateGroup => issue.state_group.clone(),
            Field::Assignee => issue.assignee.clone(),
            Field::Label => issue.label.clone(),
            Field::ProjectId => Some(issue.project_id.to_string()),
            Field::EstimatePoint => issue.estimate_point.map(|points| points.to_string()),
            _ => None,
        }
    }

    /// Order of the underlying value, as a database would sort the column.
    pub fn order(self, issue: &IssueRecord) -> Option<AxisOrder> {
        if self.is_temporal() {
            return self
                .date(issue)
                .map(|date| AxisOrder::Month(date.year(), date.month()));
        }

        match self {
            Field::EstimatePoint => issue
                .estimate_point
                .map(|points| AxisOrder::Number(i64::from(points))),
            _ => self.key(issue).map(AxisOrder::Text),
        }
    }
}

impl FromStr for Field {
    type Err = AnalyticsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|field| field.as_str() == value)
            .ok_or_else(|| AnalyticsError::UnknownField(value.to_string()))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The y-axis aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    IssueCount,
    Estimate,
}

impl Metric {
    /// Unsupported names yield `None`, meaning no aggregation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "issue_count" => Some(Metric::IssueCount),
            "estimate" => Some(Metric::Estimate),
            _ => None,
        }
    }
}
