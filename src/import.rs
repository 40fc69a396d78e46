use std::path::Path;

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::models::IssueRecord;

/// An issue read from CSV, with the dates of the cycle it belongs to when
/// the export carries them.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedIssue {
    pub issue: IssueRecord,
    pub cycle_start_date: Option<NaiveDate>,
    pub cycle_end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    id: Uuid,
    workspace_slug: String,
    project_id: Uuid,
    cycle_id: Option<Uuid>,
    name: String,
    priority: Option<String>,
    state: Option<String>,
    state_group: Option<String>,
    assignee: Option<String>,
    label: Option<String>,
    estimate_point: Option<i32>,
    created_at: Option<DateTime<Utc>>,
    start_date: Option<NaiveDate>,
    target_date: Option<NaiveDate>,
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    cycle_start_date: Option<NaiveDate>,
    #[serde(default)]
    cycle_end_date: Option<NaiveDate>,
}

impl CsvRow {
    fn into_imported(self) -> anyhow::Result<ImportedIssue> {
        let has_cycle_dates = self.cycle_start_date.is_some() || self.cycle_end_date.is_some();
        if has_cycle_dates && self.cycle_id.is_none() {
            bail!("issue {} has cycle dates but no cycle_id", self.id);
        }
        if let (Some(start), Some(end)) = (self.cycle_start_date, self.cycle_end_date) {
            if start > end {
                bail!("cycle {:?} ends ({end}) before it starts ({start})", self.cycle_id);
            }
        }

        Ok(ImportedIssue {
            issue: IssueRecord {
                id: self.id,
                workspace_slug: self.workspace_slug,
                project_id: self.project_id,
                cycle_id: self.cycle_id,
                name: self.name,
                priority: self.priority,
                state: self.state,
                state_group: self.state_group,
                assignee: self.assignee,
                label: self.label,
                estimate_point: self.estimate_point,
                created_at: self.created_at,
                start_date: self.start_date,
                target_date: self.target_date,
                completed_at: self.completed_at,
            },
            cycle_start_date: self.cycle_start_date,
            cycle_end_date: self.cycle_end_date,
        })
    }
}

/// Reads a CSV export whose header names the `IssueRecord` fields, plus the
/// optional `cycle_start_date` and `cycle_end_date` columns. Empty cells are
/// nulls; timestamps are RFC 3339.
pub fn read_import(csv_path: &Path) -> anyhow::Result<Vec<ImportedIssue>> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut issues = Vec::new();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let issue = result
            .map_err(anyhow::Error::from)
            .and_then(CsvRow::into_imported)
            .with_context(|| {
                format!("invalid issue on row {} of {}", line + 1, csv_path.display())
            })?;
        issues.push(issue);
    }

    Ok(issues)
}

/// Issue rows only, for plotting straight from a file.
pub fn read_issues(csv_path: &Path) -> anyhow::Result<Vec<IssueRecord>> {
    Ok(read_import(csv_path)?
        .into_iter()
        .map(|imported| imported.issue)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    const HEADER: &str = "id,workspace_slug,project_id,cycle_id,name,priority,state,state_group,assignee,label,estimate_point,created_at,start_date,target_date,completed_at";

    fn csv_file(header: &str, lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{header}").unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[test]
    fn reads_rows_with_nulls() {
        let file = csv_file(
            HEADER,
            &["6f1c2a0e-8d7b-4c61-9a53-0b7a0f0c1d11,acme,2b0f8c6e-1f5d-4c0a-8a8e-3c3d1b2a4e55,,Fix login,high,Todo,unstarted,amy,bug,3,2024-03-04T10:00:00Z,2024-03-05,,"],
        );

        let issues = read_issues(file.path()).unwrap();

        assert_eq!(issues.len(), 1);
        let issue = &issues[0];
        assert_eq!(issue.workspace_slug, "acme");
        assert_eq!(issue.cycle_id, None);
        assert_eq!(issue.priority.as_deref(), Some("high"));
        assert_eq!(issue.estimate_point, Some(3));
        assert_eq!(
            issue.created_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap())
        );
        assert_eq!(issue.start_date, NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(issue.target_date, None);
        assert_eq!(issue.completed_at, None);
    }

    #[test]
    fn reads_cycle_dates_when_present() {
        let header = format!("{HEADER},cycle_start_date,cycle_end_date");
        let file = csv_file(
            &header,
            &["6f1c2a0e-8d7b-4c61-9a53-0b7a0f0c1d11,acme,2b0f8c6e-1f5d-4c0a-8a8e-3c3d1b2a4e55,9a4e7d21-5c3b-4f8a-b1d6-7e2c0f9a8b34,Fix login,high,,,,,,,,,,2026-01-05,2026-01-16"],
        );

        let imported = read_import(file.path()).unwrap();

        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].cycle_start_date, NaiveDate::from_ymd_opt(2026, 1, 5));
        assert_eq!(imported[0].cycle_end_date, NaiveDate::from_ymd_opt(2026, 1, 16));
        assert!(imported[0].issue.cycle_id.is_some());
    }

    #[test]
    fn cycle_dates_need_a_cycle() {
        let header = format!("{HEADER},cycle_start_date,cycle_end_date");
        let file = csv_file(
            &header,
            &["6f1c2a0e-8d7b-4c61-9a53-0b7a0f0c1d11,acme,2b0f8c6e-1f5d-4c0a-8a8e-3c3d1b2a4e55,,Orphan,,,,,,,,,,,2026-01-05,2026-01-16"],
        );

        let err = read_import(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("no cycle_id"));
    }

    #[test]
    fn inverted_cycle_dates_are_rejected() {
        let header = format!("{HEADER},cycle_start_date,cycle_end_date");
        let file = csv_file(
            &header,
            &["6f1c2a0e-8d7b-4c61-9a53-0b7a0f0c1d11,acme,2b0f8c6e-1f5d-4c0a-8a8e-3c3d1b2a4e55,9a4e7d21-5c3b-4f8a-b1d6-7e2c0f9a8b34,Late,,,,,,,,,,,2026-01-16,2026-01-05"],
        );

        let err = read_import(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("before it starts"));
    }

    #[test]
    fn reports_the_bad_row() {
        let file = csv_file(
            HEADER,
            &["not-a-uuid,acme,2b0f8c6e-1f5d-4c0a-8a8e-3c3d1b2a4e55,,Broken,,,,,,,,,,"],
        );

        let err = read_import(file.path()).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }
}
