use std::fmt::Write;

use crate::models::{BurndownChart, CycleSummary, GraphPlot};

/// Total of the aggregate carried by each group's rows.
pub fn group_totals(plot: &GraphPlot) -> Vec<(String, i64)> {
    plot.groups
        .iter()
        .map(|group| {
            let total = group
                .rows
                .iter()
                .map(|row| row.count.or(row.estimate).unwrap_or(0))
                .sum::<i64>();
            (group.key.clone(), total)
        })
        .collect()
}

pub fn build_report(
    cycle_label: &str,
    summary: &CycleSummary,
    burndown: &BurndownChart,
    by_priority: &GraphPlot,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Cycle Analytics Report");
    let _ = writeln!(
        output,
        "Generated for {} ({} to {}, {} issues in scope)",
        cycle_label, summary.start_date, summary.end_date, summary.total_issues
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Burndown");

    if burndown.is_empty() {
        let _ = writeln!(output, "No days in this cycle.");
    } else {
        let _ = writeln!(output, "| Date | Open issues |");
        let _ = writeln!(output, "| --- | ---: |");
        for point in burndown.points.iter() {
            let _ = writeln!(output, "| {} | {} |", point.date, point.remaining);
        }

        if let Some(last) = burndown.points.last() {
            let completed = summary.total_issues - last.remaining;
            let _ = writeln!(output);
            let _ = writeln!(
                output,
                "{} of {} issues completed by {}.",
                completed, summary.total_issues, last.date
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Issues by Priority");

    if by_priority.is_empty() {
        let _ = writeln!(output, "No issues recorded for this cycle.");
    } else {
        for (priority, count) in group_totals(by_priority) {
            let _ = writeln!(output, "- {}: {} issues", priority, count);
        }
    }

    output
}
