/// Quantile targets and their tolerated rank error for the worker summaries.
pub const SUMMARY_OBJECTIVES: [(f64, f64); 4] =
    [(0.5, 0.05), (0.75, 0.025), (0.9, 0.01), (0.99, 0.001)];

/// Observations of one quantity across the worker blocks of a single scrape.
///
/// Samples are kept in full and sorted, so quantiles are exact nearest-rank
/// values and always within the objectives' tolerance. A fresh instance is
/// built for every cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunningSummary {
    samples: Vec<f64>,
    sum: f64,
}

impl RunningSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, value: f64) {
        let idx = self.samples.partition_point(|s| *s <= value);
        self.samples.insert(idx, value);
        self.sum += value;
    }

    pub fn count(&self) -> u64 {
        self.samples.len() as u64
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Observed values in ascending order.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// NaN when nothing was observed.
    pub fn quantile(&self, q: f64) -> f64 {
        if self.samples.is_empty() {
            return f64::NAN;
        }
        let rank = (q * self.samples.len() as f64).ceil() as usize;
        self.samples[rank.clamp(1, self.samples.len()) - 1]
    }

    /// `(quantile, value)` for every objective.
    pub fn quantiles(&self) -> Vec<(f64, f64)> {
        SUMMARY_OBJECTIVES
            .iter()
            .map(|(q, _)| (*q, self.quantile(*q)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_summary_reports_nan_quantiles() {
        let summary = RunningSummary::new();
        assert_eq!(summary.count(), 0);
        assert_eq!(summary.sum(), 0.0);
        assert_eq!(summary.quantiles().len(), SUMMARY_OBJECTIVES.len());
        assert!(summary.quantiles().iter().all(|(_, v)| v.is_nan()));
    }

    #[test]
    fn nearest_rank_quantiles() {
        let mut summary = RunningSummary::new();
        for v in [20.0, 10.0] {
            summary.observe(v);
        }
        assert_eq!(summary.samples(), &[10.0, 20.0]);
        assert_eq!(summary.sum(), 30.0);
        assert_eq!(summary.quantile(0.5), 10.0);
        assert_eq!(summary.quantile(0.75), 20.0);
        assert_eq!(summary.quantile(0.99), 20.0);
    }

    #[test]
    fn quantiles_over_many_samples() {
        let mut summary = RunningSummary::new();
        for v in (1..=100).rev() {
            summary.observe(v as f64);
        }
        assert_eq!(summary.count(), 100);
        assert_eq!(summary.quantile(0.5), 50.0);
        assert_eq!(summary.quantile(0.9), 90.0);
        assert_eq!(summary.quantile(0.99), 99.0);
    }
}
