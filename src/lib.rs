//! Chart data for project-management issues: grouped plots over any issue
//! field and per-cycle burndowns, computed from rows fetched out of Postgres
//! or any other [`source::IssueSource`].

pub mod axis;
pub mod burndown;
pub mod db;
pub mod error;
pub mod import;
pub mod logging;
pub mod models;
pub mod plot;
pub mod report;
pub mod source;

pub use axis::{Field, Metric};
pub use burndown::{burndown_chart, burndown_plot};
pub use error::AnalyticsError;
pub use models::{BurndownChart, CycleScope, CycleSummary, GraphPlot, IssueFilter, IssueRecord};
pub use plot::{build_graph_plot, build_graph_plot_with, PlotOptions};
pub use source::{IssueSource, MemorySource};
