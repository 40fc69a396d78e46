use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use issue_analytics::db::{self, PgIssueSource};
use issue_analytics::{
    burndown_plot, build_graph_plot, build_graph_plot_with, import, logging, report, CycleScope,
    Field, IssueFilter, IssueSource, MemorySource, PlotOptions,
};

#[derive(Parser)]
#[command(name = "issue-analytics")]
#[command(about = "Grouped plots and cycle burndowns over project issues", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, default_value_t = 5, global = true)]
    max_connections: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import issues from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Group issues by a field and print the plot as JSON
    Plot {
        #[arg(long)]
        workspace: String,
        #[arg(long)]
        project: Option<Uuid>,
        #[arg(long)]
        cycle: Option<Uuid>,
        #[arg(long)]
        x_axis: Field,
        #[arg(long, default_value = "issue_count")]
        y_axis: String,
        #[arg(long)]
        segment: Option<Field>,
        /// Leave out issues with no value for a date x-axis
        #[arg(long)]
        exclude_null_dates: bool,
        /// Read issues from a CSV export instead of the database
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Print the burndown of a cycle as JSON
    Burndown {
        #[arg(long)]
        workspace: String,
        #[arg(long)]
        project: Uuid,
        #[arg(long)]
        cycle: Uuid,
    },
    /// Generate a markdown cycle report
    Report {
        #[arg(long)]
        workspace: String,
        #[arg(long)]
        project: Uuid,
        #[arg(long)]
        cycle: Uuid,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

async fn connect(max_connections: u32) -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match cli.command {
        Commands::InitDb => {
            let pool = connect(cli.max_connections).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(cli.max_connections).await?;
            let inserted = db::seed(&pool).await?;
            println!("Seed data inserted ({inserted} new issues).");
        }
        Commands::Import { csv } => {
            let issues = import::read_import(&csv)?;
            let pool = connect(cli.max_connections).await?;
            let inserted = db::import_issues(&pool, &issues).await?;
            println!("Inserted {inserted} issues from {}.", csv.display());
        }
        Commands::Plot {
            workspace,
            project,
            cycle,
            x_axis,
            y_axis,
            segment,
            exclude_null_dates,
            csv,
        } => {
            let filter = IssueFilter {
                workspace_slug: workspace,
                project_id: project,
                cycle_id: cycle,
            };
            let rows = match csv {
                Some(path) => {
                    let issues = import::read_issues(&path)?;
                    MemorySource::new(&issues).fetch_issues(&filter).await?
                }
                None => {
                    let pool = connect(cli.max_connections).await?;
                    PgIssueSource::new(pool).fetch_issues(&filter).await?
                }
            };
            info!(rows = rows.len(), x_axis = %x_axis, y_axis = %y_axis, "building plot");

            let options = PlotOptions { exclude_null_dates };
            let plot = build_graph_plot_with(&rows, x_axis, &y_axis, segment, &options);
            println!("{}", serde_json::to_string_pretty(&plot)?);
        }
        Commands::Burndown {
            workspace,
            project,
            cycle,
        } => {
            let pool = connect(cli.max_connections).await?;
            let scope = CycleScope {
                workspace_slug: workspace,
                project_id: project,
                cycle_id: cycle,
            };
            let summary = db::fetch_cycle_summary(&pool, &scope).await?;
            let chart = burndown_plot(&summary, &scope, &PgIssueSource::new(pool)).await?;
            println!("{}", serde_json::to_string_pretty(&chart)?);
        }
        Commands::Report {
            workspace,
            project,
            cycle,
            out,
        } => {
            let pool = connect(cli.max_connections).await?;
            let scope = CycleScope {
                workspace_slug: workspace.clone(),
                project_id: project,
                cycle_id: cycle,
            };
            let source = PgIssueSource::new(pool.clone());
            let summary = db::fetch_cycle_summary(&pool, &scope).await?;
            let chart = burndown_plot(&summary, &scope, &source).await?;

            let filter = IssueFilter {
                workspace_slug: workspace,
                project_id: Some(project),
                cycle_id: Some(cycle),
            };
            let rows = source.fetch_issues(&filter).await?;
            let by_priority = build_graph_plot(&rows, Field::Priority, "issue_count", None);

            let label = format!("cycle {cycle}");
            let report = report::build_report(&label, &summary, &chart, &by_priority);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
