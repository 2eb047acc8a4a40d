use std::fmt::Write as _;

use crate::model::RunResult;

/// Renders the operator-facing per-target report for a run.
pub fn render_report(result: &RunResult) -> String {
    let total = result.outcomes.len();
    let failed = result.failed_targets().count();

    let mut out = String::new();
    let _ = writeln!(
        out,
        "run {}: {} ({} passed, {} failed, {} total)",
        result.run_id,
        if result.success { "PASS" } else { "FAIL" },
        total - failed,
        failed,
        total
    );

    for outcome in result.outcomes.values() {
        let verdict = if outcome.success { "PASS" } else { "FAIL" };
        let _ = writeln!(out, "  {verdict} {}: {}", outcome.target, outcome.diagnostic);
        for f in &outcome.failures {
            match &f.detail {
                Some(detail) => {
                    let _ = writeln!(out, "      stage {:?}: {} ({detail})", f.stage, f.reason);
                }
                None => {
                    let _ = writeln!(out, "      stage {:?}: {}", f.stage, f.reason);
                }
            }
        }
    }
    out
}
