//! Status reports and the verbose per-query display.

use std::collections::HashMap;

use clap::ValueEnum;

use crate::response::decode_response;
use crate::stats::{QueryStats, Reservoir};

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";
pub const WHITE: &str = "\x1b[37m";
pub const RESET: &str = "\x1b[39m";

/// Ranking key for the status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortKey {
    Count,
    Avg,
    Max,
    Maxbytes,
    Avgbytes,
}

/// Process-lifetime counters for the report header.
pub struct Totals {
    pub queries: u64,
    pub elapsed_secs: f64,
    pub packets: u64,
    pub packets_synced: u64,
    pub desyncs: u64,
    pub streams: u64,
}

/// Print the periodic status report: totals, packet counters, global
/// latency, and the top fingerprints ranked by the chosen key.
pub fn print_status(
    totals: &Totals,
    global_times: &Reservoir,
    queries: &HashMap<String, QueryStats>,
    display_count: usize,
    sort: SortKey,
    cutoff: u64,
) {
    let qps = if totals.elapsed_secs > 0.0 {
        totals.queries as f64 / totals.elapsed_secs
    } else {
        0.0
    };
    let synced_pct = if totals.packets > 0 {
        totals.packets_synced as f64 / totals.packets as f64 * 100.0
    } else {
        0.0
    };
    let global = global_times.summary();

    println!();
    println!(
        "{RED}{} {} total queries, {:.2} per second{RESET}",
        chrono::Local::now().format("%Y/%m/%d %H:%M:%S"),
        totals.queries,
        qps,
    );
    println!(
        "{} packets ({:.2}% on synchronized streams) / {} desyncs / {} streams",
        totals.packets, synced_pct, totals.desyncs, totals.streams,
    );
    println!(
        "{:.2}ms min / {:.2}ms avg / {:.2}ms max query times",
        global.min_ms, global.avg_ms, global.max_ms,
    );
    println!("{} unique fingerprints in this filter", queries.len());
    println!();
    println!(
        "{YELLOW} count     {CYAN}qps     {YELLOW}  min    avg   max      {GREEN}bytes      per qry{RESET}",
    );

    let rows = fingerprint_rows(queries, totals.elapsed_secs, sort, cutoff);
    let shown = display_count.min(rows.len());
    // Sorted ascending, so walk from the end to print largest first.
    for (_, line) in rows.iter().rev().take(shown) {
        println!("{}", line);
    }
}

/// Build one report row per fingerprint passing the qps cutoff, sorted
/// ascending by the chosen key.
fn fingerprint_rows(
    queries: &HashMap<String, QueryStats>,
    elapsed_secs: f64,
    sort: SortKey,
    cutoff: u64,
) -> Vec<(f64, String)> {
    let mut rows = Vec::with_capacity(queries.len());
    for (key, stats) in queries {
        let qps = if elapsed_secs > 0.0 {
            stats.count as f64 / elapsed_secs
        } else {
            0.0
        };
        if qps < cutoff as f64 {
            continue;
        }

        let times = stats.times.summary();
        let bytes_per_query = if stats.count > 0 {
            (stats.bytes as f64 / stats.count as f64) as u64
        } else {
            0
        };

        let value = match sort {
            SortKey::Count => stats.count as f64,
            SortKey::Avg => times.avg_ms,
            SortKey::Max => times.max_ms,
            SortKey::Maxbytes => stats.bytes as f64,
            SortKey::Avgbytes => bytes_per_query as f64,
        };

        rows.push((
            value,
            format!(
                "{YELLOW}{:6}  {CYAN}{:7.2}/s  {YELLOW}{:6.2} {:6.2} {:6.2}  {GREEN}{:9}b {:6}b {WHITE}{}{RESET}",
                stats.count,
                qps,
                times.min_ms,
                times.avg_ms,
                times.max_ms,
                stats.bytes,
                bytes_per_query,
                key,
            ),
        ));
    }
    rows.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    rows
}

/// Verbose display of one paired request/response.
pub fn print_query_result(
    endpoint: &str,
    query: &str,
    response: &[u8],
    latency_nanos: u64,
    query_bytes: u64,
    show_rows: bool,
) {
    println!(
        "\n{CYAN}[{endpoint}]{RESET} {YELLOW}COM_QUERY{RESET} ({GREEN}{:.2}ms{RESET}, {CYAN}{} bytes{RESET})",
        latency_nanos as f64 / 1_000_000.0,
        query_bytes,
    );
    println!("  {YELLOW}Query:{RESET} {WHITE}{query}{RESET}");
    if !response.is_empty() {
        println!(
            "  {YELLOW}Result:{RESET} {}",
            decode_response(response, show_rows)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(count: u64, bytes: u64, latency_slot_ns: u64) -> QueryStats {
        let mut s = QueryStats {
            count,
            bytes,
            ..Default::default()
        };
        if latency_slot_ns > 0 {
            s.times.set(0, latency_slot_ns);
        }
        s
    }

    #[test]
    fn test_rows_sorted_ascending_by_count() {
        let mut queries = HashMap::new();
        queries.insert("hot".to_string(), stats(90, 100, 1_000_000));
        queries.insert("cold".to_string(), stats(2, 100, 1_000_000));
        queries.insert("warm".to_string(), stats(40, 100, 1_000_000));

        let rows = fingerprint_rows(&queries, 10.0, SortKey::Count, 0);
        assert_eq!(rows.len(), 3);
        assert!(rows[0].1.contains("cold"));
        assert!(rows[1].1.contains("warm"));
        assert!(rows[2].1.contains("hot"));
    }

    #[test]
    fn test_rows_sorted_by_max_latency() {
        let mut queries = HashMap::new();
        queries.insert("slow".to_string(), stats(1, 10, 900_000_000));
        queries.insert("fast".to_string(), stats(100, 10, 1_000_000));

        let rows = fingerprint_rows(&queries, 10.0, SortKey::Max, 0);
        assert!(rows.last().unwrap().1.contains("slow"));
    }

    #[test]
    fn test_rows_sorted_by_total_bytes() {
        let mut queries = HashMap::new();
        queries.insert("big".to_string(), stats(1, 9_000, 1_000_000));
        queries.insert("small".to_string(), stats(50, 100, 1_000_000));

        let rows = fingerprint_rows(&queries, 10.0, SortKey::Maxbytes, 0);
        assert!(rows.last().unwrap().1.contains("big"));
    }

    #[test]
    fn test_cutoff_filters_low_qps() {
        let mut queries = HashMap::new();
        queries.insert("busy".to_string(), stats(1000, 10, 1_000_000));
        queries.insert("quiet".to_string(), stats(5, 10, 1_000_000));

        // 10 seconds elapsed: busy is 100 qps, quiet is 0.5 qps.
        let rows = fingerprint_rows(&queries, 10.0, SortKey::Count, 1);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].1.contains("busy"));
    }
}
