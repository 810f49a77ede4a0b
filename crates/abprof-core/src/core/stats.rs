use serde::{Deserialize, Serialize};

/// Mean and sample standard deviation of one metric over successful repeats.
/// `std_dev` is `None` for fewer than two observations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub std_dev: Option<f64>,
}

/// Summarizes a set of observations. Returns `None` for an empty set so that
/// "no data" stays distinguishable from a metric whose value is exactly zero.
pub fn summarize(values: &[f64]) -> Option<MetricSummary> {
    if values.is_empty() {
        return None;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;

    let std_dev = if values.len() >= 2 {
        let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        Some((sum_sq / (n - 1.0)).sqrt())
    } else {
        None
    };

    Some(MetricSummary { mean, std_dev })
}
