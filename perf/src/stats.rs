//! Latency statistics over elapsed seconds.

use std::fmt;

/// Histogram edges in seconds: tenths up to 1.9, then 2.0 and 10.0.
pub fn default_edges() -> Vec<f64> {
    (0..20).map(|i| i as f64 / 10.0).chain([2.0, 10.0]).collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "min: {:.4} max: {:.4} avg: {:.4}", self.min, self.max, self.avg)
    }
}

/// `None` when there is nothing to summarize.
pub fn summarize(times: &[f64]) -> Option<Summary> {
    if times.is_empty() {
        return None;
    }
    let min = times.iter().copied().fold(f64::INFINITY, f64::min);
    let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let avg = times.iter().sum::<f64>() / times.len() as f64;
    Some(Summary { min, max, avg })
}

/// Count `times` into the buckets between consecutive `edges`.
///
/// Buckets are half-open `[lo, hi)` except the last, which includes its upper
/// edge. Values outside `[first, last]` are not counted.
pub fn histogram(times: &[f64], edges: &[f64]) -> Vec<usize> {
    let buckets = edges.len().saturating_sub(1);
    let mut counts = vec![0; buckets];
    if buckets == 0 {
        return counts;
    }
    for &t in times {
        if t < edges[0] || t > edges[buckets] {
            continue;
        }
        // first edge strictly above t, minus one
        let upper = edges.partition_point(|&e| e <= t);
        let index = upper.saturating_sub(1).min(buckets - 1);
        counts[index] += 1;
    }
    counts
}

/// One line per bucket: lower edge, count, and a bar of `=`.
pub fn render_histogram(edges: &[f64], counts: &[usize]) -> String {
    let mut out = String::new();
    for (edge, count) in edges.iter().zip(counts) {
        out.push_str(&format!("{edge:.1}s\t{count}\t{}\n", "=".repeat(*count)));
    }
    if let Some(last) = edges.last().filter(|_| edges.len() > counts.len()) {
        out.push_str(&format!("{last:.1}s\n"));
    }
    out
}
