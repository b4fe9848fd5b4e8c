//! Top gaining and losing dimension values

use crate::entry::CostEntry;
use crate::summary::{contribution_change, overall_change_percent, percentage_change, round_up};
use rca_types::{Amounts, GainerLoserRow, MetricKind};

/// Most rows kept on each side
pub const MAX_GAINER_LOSER_COUNT: usize = 5;

/// Split cost-sorted entries into gainers and losers
///
/// Only entries with a positive cost are kept, in the order given.
pub fn gainers_and_losers(
    sorted_entries: &[CostEntry],
    totals: &Amounts,
) -> (Vec<GainerLoserRow>, Vec<GainerLoserRow>) {
    let mut gainers = Vec::new();
    let mut losers = Vec::new();

    for entry in sorted_entries.iter().filter(|e| e.cost() > 0.0) {
        if entry.current_value() >= entry.baseline_value() {
            if gainers.len() < MAX_GAINER_LOSER_COUNT {
                gainers.push(build_row(entry, totals));
            }
        } else if losers.len() < MAX_GAINER_LOSER_COUNT {
            losers.push(build_row(entry, totals));
        }
        if gainers.len() >= MAX_GAINER_LOSER_COUNT && losers.len() >= MAX_GAINER_LOSER_COUNT {
            break;
        }
    }
    (gainers, losers)
}

fn build_row(entry: &CostEntry, totals: &Amounts) -> GainerLoserRow {
    let (baseline, current) = (entry.baseline_value(), entry.current_value());
    // A ratio's share moves with its population, not with its quotient
    let share_change = match totals.kind() {
        MetricKind::Additive => contribution_change(baseline, current, totals.baseline, totals.current),
        MetricKind::Ratio => contribution_change(
            entry.baseline_size(),
            entry.current_size(),
            totals.baseline_size(),
            totals.current_size(),
        ),
    };
    GainerLoserRow {
        dimension_name: entry.dimension_name().to_string(),
        dimension_value: entry.dimension_value().to_string(),
        baseline_value: baseline,
        current_value: current,
        percentage_change: percentage_change(baseline, current),
        contribution_change: share_change,
        contribution_to_overall_change: overall_change_percent(entry.amounts(), totals),
        cost: round_up(entry.cost()),
    }
}
