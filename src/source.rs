use std::collections::BTreeMap;
use std::future::Future;

use crate::models::{CompletedDay, CycleScope, IssueFilter, IssueRecord};

/// Where issue rows come from: Postgres in production, a slice in tests or
/// when plotting a CSV export.
pub trait IssueSource {
    fn fetch_issues(
        &self,
        filter: &IssueFilter,
    ) -> impl Future<Output = anyhow::Result<Vec<IssueRecord>>> + Send;

    /// Completed issues per UTC day for the cycle, ordered by date with the
    /// bucket of still-open issues (no date) last.
    fn completions_by_day(
        &self,
        scope: &CycleScope,
    ) -> impl Future<Output = anyhow::Result<Vec<CompletedDay>>> + Send;
}

pub struct MemorySource<'a> {
    issues: &'a [IssueRecord],
}

impl<'a> MemorySource<'a> {
    pub fn new(issues: &'a [IssueRecord]) -> Self {
        Self { issues }
    }
}

impl IssueSource for MemorySource<'_> {
    async fn fetch_issues(&self, filter: &IssueFilter) -> anyhow::Result<Vec<IssueRecord>> {
        Ok(self
            .issues
            .iter()
            .filter(|issue| filter.matches(issue))
            .cloned()
            .collect())
    }

    async fn completions_by_day(&self, scope: &CycleScope) -> anyhow::Result<Vec<CompletedDay>> {
        let mut buckets: BTreeMap<(bool, Option<chrono::NaiveDate>), i64> = BTreeMap::new();

        for issue in self.issues.iter().filter(|issue| scope.matches(issue)) {
            let date = issue.completed_at.map(|at| at.date_naive());
            *buckets.entry((date.is_none(), date)).or_insert(0) += 1;
        }

        Ok(buckets
            .into_iter()
            .map(|((_, date), total_completed)| CompletedDay {
                date,
                total_completed,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn cycle_issue(scope: &CycleScope, completed_day: Option<u32>) -> IssueRecord {
        IssueRecord {
            id: Uuid::new_v4(),
            workspace_slug: scope.workspace_slug.clone(),
            project_id: scope.project_id,
            cycle_id: Some(scope.cycle_id),
            completed_at: completed_day
                .map(|day| Utc.with_ymd_and_hms(2024, 1, day, 18, 45, 0).unwrap()),
            ..IssueRecord::default()
        }
    }

    fn scope() -> CycleScope {
        CycleScope {
            workspace_slug: "acme".to_string(),
            project_id: Uuid::new_v4(),
            cycle_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn completions_are_bucketed_by_day_with_open_issues_last() {
        let scope = scope();
        let mut other_cycle = cycle_issue(&scope, Some(2));
        other_cycle.cycle_id = Some(Uuid::new_v4());
        let issues = vec![
            cycle_issue(&scope, None),
            cycle_issue(&scope, Some(3)),
            cycle_issue(&scope, Some(2)),
            cycle_issue(&scope, Some(2)),
            other_cycle,
        ];

        let buckets = MemorySource::new(&issues)
            .completions_by_day(&scope)
            .await
            .unwrap();

        assert_eq!(
            buckets,
            vec![
                CompletedDay {
                    date: NaiveDate::from_ymd_opt(2024, 1, 2),
                    total_completed: 2,
                },
                CompletedDay {
                    date: NaiveDate::from_ymd_opt(2024, 1, 3),
                    total_completed: 1,
                },
                CompletedDay {
                    date: None,
                    total_completed: 1,
                },
            ]
        );
    }

    #[tokio::test]
    async fn fetch_applies_filter() {
        let scope = scope();
        let mut foreign = cycle_issue(&scope, None);
        foreign.workspace_slug = "globex".to_string();
        let issues = vec![cycle_issue(&scope, None), cycle_issue(&scope, Some(4)), foreign];

        let filter = IssueFilter {
            workspace_slug: "acme".to_string(),
            project_id: Some(scope.project_id),
            cycle_id: None,
        };
        let fetched = MemorySource::new(&issues).fetch_issues(&filter).await.unwrap();

        assert_eq!(fetched.len(), 2);
        assert!(fetched.iter().all(|issue| issue.workspace_slug == "acme"));
    }
}
