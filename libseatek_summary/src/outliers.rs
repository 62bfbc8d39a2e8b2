//! Year-to-year `full_mean` differences and the outliers among them.
use serde::{Deserialize, Serialize};

use super::constants::{DEFAULT_ABS_THRESHOLD, DEFAULT_IQR_FACTOR, DEFAULT_ZSCORE_THRESHOLD};
use super::metrics::{channel_id, Metric};
use super::stats;
use super::year::{YearLabel, YearSlice, YearTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMethod {
    /// |difference| >= threshold
    #[default]
    Abs,
    /// |difference - mean| >= zscore * sd
    Zscore,
    /// outside [Q1 - k * IQR, Q3 + k * IQR]
    Iqr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    pub method: OutlierMethod,
    pub threshold: f64,
    pub zscore: f64,
    pub iqr_factor: f64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            method: OutlierMethod::Abs,
            threshold: DEFAULT_ABS_THRESHOLD,
            zscore: DEFAULT_ZSCORE_THRESHOLD,
            iqr_factor: DEFAULT_IQR_FACTOR,
        }
    }
}

/// Change of one channel's `full_mean` between two consecutive processed years
#[derive(Debug, Clone, PartialEq)]
pub struct YearDifference {
    pub year_pair: String,
    /// The later year of the pair, the one a correction would shift
    pub later: YearLabel,
    pub channel: usize,
    pub difference: f64,
}

impl YearDifference {
    pub fn channel_id(&self) -> String {
        channel_id(self.channel)
    }
}

/// Differences between each processed year and the one before it, for every channel where
/// both years have a value. Pairs are labeled `<later>-<earlier>`.
pub fn year_to_year_differences(
    years: &YearTable,
    channel_ceiling: usize,
) -> Vec<YearDifference> {
    let slices: Vec<_> = years.iter().collect();
    let mut differences = Vec::new();
    for pair in slices.windows(2) {
        let (earlier, later) = (pair[0], pair[1]);
        let year_pair = format!("{}-{}", later.label, earlier.label);
        for channel in 0..channel_ceiling {
            let value = |slice: &YearSlice| {
                slice
                    .metrics
                    .get(channel)
                    .and_then(|m| m.get(Metric::FullMean))
            };
            if let (Some(before), Some(after)) = (value(earlier), value(later)) {
                differences.push(YearDifference {
                    year_pair: year_pair.clone(),
                    later: later.label.clone(),
                    channel,
                    difference: after - before,
                });
            }
        }
    }
    differences
}

/// The differences flagged by the configured method, in input order
pub fn detect_outliers(
    differences: &[YearDifference],
    config: &OutlierConfig,
) -> Vec<YearDifference> {
    let values: Vec<f64> = differences.iter().map(|d| d.difference).collect();
    let is_outlier: Box<dyn Fn(f64) -> bool> = match config.method {
        OutlierMethod::Abs => {
            let threshold = config.threshold;
            Box::new(move |d: f64| d.abs() >= threshold)
        }
        OutlierMethod::Zscore => match (stats::mean(&values), stats::sample_sd(&values)) {
            (Some(mu), Some(sd)) => {
                let limit = config.zscore * sd;
                Box::new(move |d: f64| (d - mu).abs() >= limit)
            }
            _ => Box::new(|_: f64| false),
        },
        OutlierMethod::Iqr => {
            match (stats::quantile(&values, 0.25), stats::quantile(&values, 0.75)) {
                (Some(q1), Some(q3)) => {
                    let iqr = q3 - q1;
                    let lower = q1 - config.iqr_factor * iqr;
                    let upper = q3 + config.iqr_factor * iqr;
                    Box::new(move |d: f64| d < lower || d > upper)
                }
                _ => Box::new(|_: f64| false),
            }
        }
    };
    differences
        .iter()
        .filter(|d| is_outlier(d.difference))
        .cloned()
        .collect()
}
