use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::models::{BurndownChart, BurndownPoint, CompletedDay, CycleScope, CycleSummary};
use crate::source::IssueSource;

/// Every day from `start` to `end` inclusive; empty when `start > end`.
pub fn cycle_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|day| *day <= end).collect()
}

/// Remaining issues per day: `total_issues` minus every completion dated on
/// or before that day. Buckets without a date are ignored.
pub fn burndown_chart(summary: &CycleSummary, completions: &[CompletedDay]) -> BurndownChart {
    let mut dated: Vec<(NaiveDate, i64)> = completions
        .iter()
        .filter_map(|bucket| bucket.date.map(|date| (date, bucket.total_completed)))
        .collect();
    dated.sort_by_key(|(date, _)| *date);

    let mut completed = 0;
    let mut next = 0;
    let mut points = Vec::new();

    for date in cycle_days(summary.start_date, summary.end_date) {
        while next < dated.len() && dated[next].0 <= date {
            completed += dated[next].1;
            next += 1;
        }

        let remaining = summary.total_issues - completed;
        if remaining < 0 {
            warn!(%date, remaining, "more completions than issues in cycle");
        }
        points.push(BurndownPoint { date, remaining });
    }

    BurndownChart { points }
}

/// Queries `source` for the cycle's completions and builds its burndown.
pub async fn burndown_plot<S: IssueSource>(
    summary: &CycleSummary,
    scope: &CycleScope,
    source: &S,
) -> anyhow::Result<BurndownChart> {
    let completions = source.completions_by_day(scope).await?;
    debug!(
        cycle_id = %scope.cycle_id,
        buckets = completions.len(),
        "loaded completion distribution"
    );

    Ok(burndown_chart(summary, &completions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IssueRecord;
    use crate::source::MemorySource;
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn day(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    fn summary(start: NaiveDate, end: NaiveDate, total_issues: i64) -> CycleSummary {
        CycleSummary {
            start_date: start,
            end_date: end,
            total_issues,
        }
    }

    fn values(chart: &BurndownChart) -> Vec<i64> {
        chart.points.iter().map(|point| point.remaining).collect()
    }

    #[test]
    fn one_completion_reduces_following_days() {
        let completions = vec![CompletedDay {
            date: Some(day(1, 2)),
            total_completed: 1,
        }];

        let chart = burndown_chart(&summary(day(1, 1), day(1, 3), 10), &completions);

        assert_eq!(
            serde_json::to_string(&chart).unwrap(),
            r#"{"2024-01-01":10,"2024-01-02":9,"2024-01-03":9}"#
        );
    }

    #[test]
    fn no_completions_keeps_total() {
        let chart = burndown_chart(&summary(day(2, 27), day(3, 2), 7), &[]);

        assert_eq!(chart.len(), 5);
        assert_eq!(values(&chart), vec![7; 5]);
        assert_eq!(chart.points[2].date, day(2, 29));
    }

    #[test]
    fn inverted_range_is_empty() {
        let chart = burndown_chart(&summary(day(5, 10), day(5, 1), 3), &[]);
        assert!(chart.is_empty());
    }

    #[test]
    fn single_day_cycle() {
        let chart = burndown_chart(&summary(day(6, 1), day(6, 1), 4), &[]);
        assert_eq!(chart.len(), 1);
        assert_eq!(chart.remaining_on(day(6, 1)), Some(4));
    }

    #[test]
    fn completions_outside_range_and_open_bucket() {
        let completions = vec![
            CompletedDay {
                date: None,
                total_completed: 12,
            },
            CompletedDay {
                date: Some(day(4, 20)),
                total_completed: 3,
            },
            CompletedDay {
                date: Some(day(4, 1)),
                total_completed: 2,
            },
            CompletedDay {
                date: Some(day(3, 28)),
                total_completed: 1,
            },
        ];

        let chart = burndown_chart(&summary(day(3, 31), day(4, 2), 20), &completions);

        assert_eq!(values(&chart), vec![19, 17, 17]);
    }

    #[test]
    fn length_and_monotonicity_hold() {
        let start = day(1, 1);
        let end = day(1, 31);
        let completions: Vec<CompletedDay> = (0..10)
            .map(|offset| CompletedDay {
                date: Some(start + Duration::days(offset * 3)),
                total_completed: offset % 3,
            })
            .collect();

        let chart = burndown_chart(&summary(start, end, 40), &completions);

        assert_eq!(chart.len() as i64, (end - start).num_days() + 1);
        assert!(chart.points[0].remaining <= 40);
        assert!(chart
            .points
            .windows(2)
            .all(|pair| pair[1].remaining <= pair[0].remaining));
    }

    #[tokio::test]
    async fn plots_from_issue_source() {
        let scope = CycleScope {
            workspace_slug: "acme".to_string(),
            project_id: Uuid::new_v4(),
            cycle_id: Uuid::new_v4(),
        };
        let issue = |completed_at| IssueRecord {
            workspace_slug: scope.workspace_slug.clone(),
            project_id: scope.project_id,
            cycle_id: Some(scope.cycle_id),
            completed_at,
            ..IssueRecord::default()
        };
        let issues = vec![
            issue(Some(Utc.with_ymd_and_hms(2024, 1, 2, 23, 59, 0).unwrap())),
            issue(Some(Utc.with_ymd_and_hms(2024, 1, 3, 0, 1, 0).unwrap())),
            issue(None),
        ];

        let chart = burndown_plot(
            &summary(day(1, 1), day(1, 4), 3),
            &scope,
            &MemorySource::new(&issues),
        )
        .await
        .unwrap();

        assert_eq!(values(&chart), vec![3, 2, 1, 1]);
    }
}
