use console::Style;
use itertools::Itertools;

use crate::run::tracker::RunTracker;

/// Prints the end-of-run report and returns the process exit code:
/// zero only when every task succeeded, eagerly or lazily.
pub fn report(tracker: &RunTracker, interrupted: bool) -> i32 {
    let counts = tracker.counts();
    let failures = tracker.failures();

    let mut parts = Vec::new();
    if counts.eager > 0 {
        parts.push(format!("{} executed", counts.eager));
    }
    if counts.lazy > 0 {
        parts.push(format!("{} cached", counts.lazy));
    }
    if counts.failed > 0 {
        parts.push(format!("{} failed", counts.failed));
    }
    if counts.skipped > 0 {
        parts.push(format!("{} skipped", counts.skipped));
    }
    if parts.is_empty() {
        parts.push("no tasks".to_owned());
    }
    println!("\n{}", parts.join(", "));

    if !failures.is_empty() {
        let red = Style::new().red();
        let keys = failures.iter().map(|(key, _)| key.to_string()).join(", ");
        eprintln!("{}", red.apply_to(format!("failed tasks: {keys}")));
    }

    if interrupted || !failures.is_empty() {
        1
    } else {
        0
    }
}
