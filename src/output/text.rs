//! Human-readable run summary

use crate::coordinator::RunSummary;

/// Print the run summary to the console
///
/// Shows line and key totals, both completion counters, failed workers and
/// where (or whether) the solution was written.
pub fn print_summary(summary: &RunSummary) {
    println!("═══════════════════════════════════════════════════════════");
    println!("                    RUN SUMMARY");
    println!("═══════════════════════════════════════════════════════════");
    println!();
    println!("Elapsed Time: {:.3}s", summary.elapsed.as_secs_f64());
    println!();

    println!("Input:");
    println!("  Lines:   {}", format_number(summary.total_lines as u64));
    println!("  Workers: {}", summary.workers);
    println!();

    println!("Completion:");
    println!("  Results received: {} / {}", summary.results_received, summary.workers);
    println!("  Workers exited:   {} / {}", summary.workers_exited, summary.workers);
    if !summary.failed_workers.is_empty() {
        println!("  Failed workers:   {}", format_ids(&summary.failed_workers));
    }
    println!();

    match summary.output {
        Some(ref path) => {
            println!("Result:");
            println!("  Distinct keys: {}", format_number(summary.distinct_keys as u64));
            println!("  Total count:   {}", format_number(summary.total_count));
            println!("  Written to:    {}", path.display());
        }
        None => {
            println!("Result:");
            println!("  No solution written: not every worker delivered its counts");
        }
    }

    println!();
    println!("═══════════════════════════════════════════════════════════");
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let lead = match digits.len() % 3 {
        0 => 3,
        r => r,
    };

    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    out.push_str(&digits[..lead]);
    for group in (lead..digits.len()).step_by(3) {
        out.push(',');
        out.push_str(&digits[group..group + 3]);
    }
    out
}

fn format_ids(ids: &[usize]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(123456), "123,456");
        assert_eq!(format_number(u64::MAX), "18,446,744,073,709,551,615");
    }

    #[test]
    fn test_format_ids() {
        assert_eq!(format_ids(&[1, 4, 7]), "1, 4, 7");
        assert_eq!(format_ids(&[]), "");
    }

    #[test]
    fn test_print_summary_both_outcomes() {
        let mut summary = RunSummary {
            workers: 2,
            total_lines: 4,
            output: Some(PathBuf::from("solution-1.txt")),
            results_received: 2,
            workers_exited: 2,
            failed_workers: vec![],
            distinct_keys: 3,
            total_count: 4,
            elapsed: Duration::from_millis(12),
        };
        print_summary(&summary);

        summary.output = None;
        summary.results_received = 1;
        summary.failed_workers = vec![1];
        print_summary(&summary);
    }
}
