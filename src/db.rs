use anyhow::Context;
use chrono::{NaiveDate, TimeZone, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::AnalyticsError;
use crate::import::ImportedIssue;
use crate::models::{CompletedDay, CycleScope, CycleSummary, IssueFilter, IssueRecord};
use crate::source::IssueSource;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let project_id = Uuid::parse_str("2b0f8c6e-1f5d-4c0a-8a8e-3c3d1b2a4e55")?;
    let cycle_id = Uuid::parse_str("9a4e7d21-5c3b-4f8a-b1d6-7e2c0f9a8b34")?;

    let mut tx = pool.begin().await?;
    let workspace_id = upsert_workspace(&mut tx, "acme").await?;
    upsert_project(&mut tx, project_id, workspace_id, "acme", "Web App").await?;
    upsert_cycle(
        &mut tx,
        cycle_id,
        project_id,
        "Sprint 12",
        NaiveDate::from_ymd_opt(2026, 1, 5),
        NaiveDate::from_ymd_opt(2026, 1, 16),
    )
    .await?;

    let issues = vec![
        (
            "5e0c8a2f-1d3b-4a6e-9f7c-2b8d4e6a0c11",
            "Login form rejects valid emails",
            "urgent",
            "Done",
            "completed",
            "avery",
            Some(3),
            Some((2026, 1, 7)),
        ),
        (
            "7b2d9c4e-3f5a-4c8b-a1e9-4d0f6b8c2e22",
            "Add dark mode toggle",
            "medium",
            "In Progress",
            "started",
            "jules",
            Some(5),
            None,
        ),
        (
            "9c4f1e6a-5b7d-4e0c-b3a1-6f2b8d0e4a33",
            "Cache project list",
            "high",
            "Done",
            "completed",
            "kiara",
            Some(2),
            Some((2026, 1, 9)),
        ),
        (
            "1e6a3b8c-7d9f-4a2e-85c3-8b4d0f2a6c44",
            "Audit dependency licenses",
            "low",
            "Todo",
            "unstarted",
            "avery",
            None,
            None,
        ),
        (
            "3a8c5d0e-9f1b-4c4a-97e5-0d6f2b4c8e55",
            "Fix flaky checkout test",
            "high",
            "Done",
            "completed",
            "jules",
            Some(1),
            Some((2026, 1, 9)),
        ),
    ];

    let mut inserted = 0usize;
    for (id, name, priority, state, state_group, assignee, estimate_point, completed_on) in issues
    {
        let completed_at = match completed_on {
            Some((year, month, day)) => Some(
                Utc.with_ymd_and_hms(year, month, day, 16, 30, 0)
                    .single()
                    .context("invalid completion time")?,
            ),
            None => None,
        };

        let issue = IssueRecord {
            id: Uuid::parse_str(id)?,
            workspace_slug: "acme".to_string(),
            project_id,
            cycle_id: Some(cycle_id),
            name: name.to_string(),
            priority: Some(priority.to_string()),
            state: Some(state.to_string()),
            state_group: Some(state_group.to_string()),
            assignee: Some(assignee.to_string()),
            label: None,
            estimate_point,
            created_at: Utc.with_ymd_and_hms(2026, 1, 2, 9, 0, 0).single(),
            start_date: NaiveDate::from_ymd_opt(2026, 1, 5),
            target_date: NaiveDate::from_ymd_opt(2026, 1, 16),
            completed_at,
        };

        if insert_issue(&mut tx, &issue).await? {
            inserted += 1;
        }
    }

    tx.commit().await?;
    Ok(inserted)
}

/// Inserts issues read from a CSV export, creating the workspace, project
/// and cycle rows they reference, in one transaction. A project that already
/// belongs to another workspace, or a cycle of another project, aborts the
/// import. Returns the number of new issues.
pub async fn import_issues(pool: &PgPool, issues: &[ImportedIssue]) -> anyhow::Result<usize> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for imported in issues {
        let issue = &imported.issue;
        let workspace_id = upsert_workspace(&mut tx, &issue.workspace_slug).await?;
        upsert_project(
            &mut tx,
            issue.project_id,
            workspace_id,
            &issue.workspace_slug,
            "Imported project",
        )
        .await?;

        if let Some(cycle_id) = issue.cycle_id {
            upsert_cycle(
                &mut tx,
                cycle_id,
                issue.project_id,
                "Imported cycle",
                imported.cycle_start_date,
                imported.cycle_end_date,
            )
            .await?;
        }

        if insert_issue(&mut tx, issue).await? {
            inserted += 1;
        }
    }

    tx.commit().await?;
    debug!(rows = issues.len(), inserted, "imported issues");
    Ok(inserted)
}

async fn upsert_workspace(conn: &mut PgConnection, slug: &str) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO issue_analytics.workspaces (id, slug, name)
        VALUES ($1, $2, $2)
        ON CONFLICT (slug) DO UPDATE SET slug = EXCLUDED.slug
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(slug)
    .fetch_one(&mut *conn)
    .await?
    .try_get("id")?;

    Ok(id)
}

/// The conflict update only matches a project of the same workspace, so no
/// row comes back for a project owned by another workspace.
async fn upsert_project(
    conn: &mut PgConnection,
    project_id: Uuid,
    workspace_id: Uuid,
    workspace_slug: &str,
    name: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO issue_analytics.projects AS p (id, workspace_id, name)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO UPDATE SET name = p.name
        WHERE p.workspace_id = EXCLUDED.workspace_id
        RETURNING id
        "#,
    )
    .bind(project_id)
    .bind(workspace_id)
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AnalyticsError::ProjectWorkspaceMismatch {
        project_id,
        workspace_slug: workspace_slug.to_string(),
    })?;

    Ok(())
}

/// Known dates are kept when the new row leaves them empty.
async fn upsert_cycle(
    conn: &mut PgConnection,
    cycle_id: Uuid,
    project_id: Uuid,
    name: &str,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO issue_analytics.cycles AS c (id, project_id, name, start_date, end_date)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (id) DO UPDATE
        SET start_date = COALESCE(EXCLUDED.start_date, c.start_date),
            end_date = COALESCE(EXCLUDED.end_date, c.end_date)
        WHERE c.project_id = EXCLUDED.project_id
        RETURNING id
        "#,
    )
    .bind(cycle_id)
    .bind(project_id)
    .bind(name)
    .bind(start_date)
    .bind(end_date)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AnalyticsError::CycleProjectMismatch {
        cycle_id,
        project_id,
    })?;

    Ok(())
}

async fn insert_issue(conn: &mut PgConnection, issue: &IssueRecord) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO issue_analytics.issues
        (id, project_id, name, priority, state, state_group, assignee, label,
         estimate_point, created_at, start_date, target_date, completed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(issue.id)
    .bind(issue.project_id)
    .bind(&issue.name)
    .bind(&issue.priority)
    .bind(&issue.state)
    .bind(&issue.state_group)
    .bind(&issue.assignee)
    .bind(&issue.label)
    .bind(issue.estimate_point)
    .bind(issue.created_at)
    .bind(issue.start_date)
    .bind(issue.target_date)
    .bind(issue.completed_at)
    .execute(&mut *conn)
    .await?;

    if let Some(cycle_id) = issue.cycle_id {
        sqlx::query(
            r#"
            INSERT INTO issue_analytics.cycle_issues (issue_id, cycle_id)
            VALUES ($1, $2)
            ON CONFLICT (issue_id) DO UPDATE SET cycle_id = EXCLUDED.cycle_id
            "#,
        )
        .bind(issue.id)
        .bind(cycle_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(result.rows_affected() > 0)
}


#[instrument(skip(pool))]
pub async fn fetch_issues(pool: &PgPool, filter: &IssueFilter) -> anyhow::Result<Vec<IssueRecord>> {
    let mut query = String::from(
        "SELECT i.id, w.slug AS workspace_slug, i.project_id, ci.cycle_id, i.name, \
         i.priority, i.state, i.state_group, i.assignee, i.label, i.estimate_point, \
         i.created_at, i.start_date, i.target_date, i.completed_at \
         FROM issue_analytics.issues i \
         JOIN issue_analytics.projects p ON p.id = i.project_id \
         JOIN issue_analytics.workspaces w ON w.id = p.workspace_id \
         LEFT JOIN issue_analytics.cycle_issues ci ON ci.issue_id = i.id \
         WHERE w.slug = $1",
    );

    let mut position = 1;
    if filter.project_id.is_some() {
        position += 1;
        query.push_str(&format!(" AND i.project_id = ${position}"));
    }
    if filter.cycle_id.is_some() {
        position += 1;
        query.push_str(&format!(" AND ci.cycle_id = ${position}"));
    }

    let mut rows = sqlx::query(&query).bind(&filter.workspace_slug);
    if let Some(project_id) = filter.project_id {
        rows = rows.bind(project_id);
    }
    if let Some(cycle_id) = filter.cycle_id {
        rows = rows.bind(cycle_id);
    }

    let records = rows
        .fetch_all(pool)
        .await
        .context("failed to fetch issues")?;
    debug!(rows = records.len(), "fetched issues");

    records.iter().map(issue_from_row).collect()
}

fn issue_from_row(row: &PgRow) -> anyhow::Result<IssueRecord> {
    Ok(IssueRecord {
        id: row.try_get("id")?,
        workspace_slug: row.try_get("workspace_slug")?,
        project_id: row.try_get("project_id")?,
        cycle_id: row.try_get("cycle_id")?,
        name: row.try_get("name")?,
        priority: row.try_get("priority")?,
        state: row.try_get("state")?,
        state_group: row.try_get("state_group")?,
        assignee: row.try_get("assignee")?,
        label: row.try_get("label")?,
        estimate_point: row.try_get("estimate_point")?,
        created_at: row.try_get("created_at")?,
        start_date: row.try_get("start_date")?,
        target_date: row.try_get("target_date")?,
        completed_at: row.try_get("completed_at")?,
    })
}

/// Completed issues of a cycle grouped by UTC completion date. Issues that
/// are still open form one bucket with no date, sorted last.
#[instrument(skip(pool))]
pub async fn fetch_completion_distribution(
    pool: &PgPool,
    scope: &CycleScope,
) -> anyhow::Result<Vec<CompletedDay>> {
    let records = sqlx::query(
        r#"
        SELECT (i.completed_at AT TIME ZONE 'UTC')::date AS date,
               COUNT(i.id) AS total_completed
        FROM issue_analytics.issues i
        JOIN issue_analytics.projects p ON p.id = i.project_id
        JOIN issue_analytics.workspaces w ON w.id = p.workspace_id
        JOIN issue_analytics.cycle_issues ci ON ci.issue_id = i.id
        WHERE w.slug = $1 AND i.project_id = $2 AND ci.cycle_id = $3
        GROUP BY 1
        ORDER BY 1
        "#,
    )
    .bind(&scope.workspace_slug)
    .bind(scope.project_id)
    .bind(scope.cycle_id)
    .fetch_all(pool)
    .await
    .context("failed to fetch completion distribution")?;

    records
        .iter()
        .map(|row| {
            Ok(CompletedDay {
                date: row.try_get("date")?,
                total_completed: row.try_get("total_completed")?,
            })
        })
        .collect()
}

#[instrument(skip(pool))]
pub async fn fetch_cycle_summary(pool: &PgPool, scope: &CycleScope) -> anyhow::Result<CycleSummary> {
    let row = sqlx::query(
        r#"
        SELECT c.start_date, c.end_date,
               (SELECT COUNT(*) FROM issue_analytics.cycle_issues ci
                WHERE ci.cycle_id = c.id) AS total_issues
        FROM issue_analytics.cycles c
        JOIN issue_analytics.projects p ON p.id = c.project_id
        JOIN issue_analytics.workspaces w ON w.id = p.workspace_id
        WHERE c.id = $1 AND c.project_id = $2 AND w.slug = $3
        "#,
    )
    .bind(scope.cycle_id)
    .bind(scope.project_id)
    .bind(&scope.workspace_slug)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AnalyticsError::CycleNotFound {
        workspace_slug: scope.workspace_slug.clone(),
        project_id: scope.project_id,
        cycle_id: scope.cycle_id,
    })?;

    let start_date: Option<NaiveDate> = row.try_get("start_date")?;
    let end_date: Option<NaiveDate> = row.try_get("end_date")?;

    Ok(CycleSummary {
        start_date: start_date.ok_or(AnalyticsError::MissingCycleDate {
            cycle_id: scope.cycle_id,
            field: "start date",
        })?,
        end_date: end_date.ok_or(AnalyticsError::MissingCycleDate {
            cycle_id: scope.cycle_id,
            field: "end date",
        })?,
        total_issues: row.try_get("total_issues")?,
    })
}

/// Postgres-backed row source.
#[derive(Clone)]
pub struct PgIssueSource {
    pool: PgPool,
}

impl PgIssueSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl IssueSource for PgIssueSource {
    async fn fetch_issues(&self, filter: &IssueFilter) -> anyhow::Result<Vec<IssueRecord>> {
        fetch_issues(&self.pool, filter).await
    }

    async fn completions_by_day(&self, scope: &CycleScope) -> anyhow::Result<Vec<CompletedDay>> {
        fetch_completion_distribution(&self.pool, scope).await
    }
}
