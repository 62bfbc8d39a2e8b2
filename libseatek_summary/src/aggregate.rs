//! Cross-year roll-up of the per-file channel metrics.
//!
//! For every channel slot and every [`Metric`], the values of all processed years are gathered
//! into a sparse series (years without a value are skipped) and summarized. The unfiltered
//! table always has one row per channel slot; the sufficient table keeps the channels with
//! enough years of `full_mean` data, and the ranked extract orders those by how far their mean
//! delta strays from zero.
use std::cmp::Ordering;

use super::config::Config;
use super::constants::TRAILING_WINDOW;
use super::metrics::{channel_id, Metric};
use super::stats;
use super::year::{YearLabel, YearTable};

/// Summary statistics of one channel series
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SeriesStats {
    pub mean: Option<f64>,
    pub sd: Option<f64>,
    pub median: Option<f64>,
    pub mad: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub count: usize,
    pub trailing_3_mean: Option<f64>,
}

impl SeriesStats {
    pub const NAMES: [&'static str; 8] = [
        "mean",
        "sd",
        "median",
        "mad",
        "min",
        "max",
        "count",
        "trailing_3_mean",
    ];

    /// Summarize values given in year order
    pub fn from_values(values: &[f64]) -> Self {
        Self {
            mean: stats::mean(values),
            sd: stats::sample_sd(values),
            median: stats::median(values),
            mad: stats::mad(values),
            min: stats::min(values),
            max: stats::max(values),
            count: values.len(),
            trailing_3_mean: stats::trailing_mean(values, TRAILING_WINDOW),
        }
    }

    /// The statistics in the order of [`SeriesStats::NAMES`]; count is always present
    pub fn values(&self) -> [Option<f64>; 8] {
        [
            self.mean,
            self.sd,
            self.median,
            self.mad,
            self.min,
            self.max,
            Some(self.count as f64),
            self.trailing_3_mean,
        ]
    }
}

/// The cross-year values of one channel and metric. Only years with a value contribute.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSeries {
    pub channel: usize,
    pub metric: Metric,
    pub points: Vec<(YearLabel, f64)>,
}

impl ChannelSeries {
    pub fn gather(years: &YearTable, channel: usize, metric: Metric) -> Self {
        let points = years
            .iter()
            .filter_map(|slice| {
                slice
                    .metrics
                    .get(channel)
                    .and_then(|m| m.get(metric))
                    .filter(|v| v.is_finite())
                    .map(|v| (slice.label.clone(), v))
            })
            .collect();
        Self {
            channel,
            metric,
            points,
        }
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|(_, v)| *v).collect()
    }

    pub fn stats(&self) -> SeriesStats {
        SeriesStats::from_values(&self.values())
    }
}

/// One channel's row in an aggregate table
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub channel: usize,
    stats: [SeriesStats; 4],
    pub pct_nonmissing: Option<f64>,
}

impl AggregateRow {
    pub fn channel_id(&self) -> String {
        channel_id(self.channel)
    }

    pub fn get(&self, metric: Metric) -> &SeriesStats {
        match metric {
            Metric::LeadMean => &self.stats[0],
            Metric::TrailMean => &self.stats[1],
            Metric::FullMean => &self.stats[2],
            Metric::Delta => &self.stats[3],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateTable {
    rows: Vec<AggregateRow>,
}

impl AggregateTable {
    pub fn rows(&self) -> &[AggregateRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, channel: usize) -> Option<&AggregateRow> {
        self.rows.iter().find(|r| r.channel == channel)
    }

    /// Column titles of the long table: channel, then metric x statistic, then coverage
    pub fn header() -> Vec<String> {
        let mut header = vec![String::from("channel_id")];
        for metric in Metric::ALL {
            for stat in SeriesStats::NAMES {
                header.push(format!("{}.{}", metric.name(), stat));
            }
        }
        header.push(String::from("pct_nonmissing"));
        header
    }
}

/// A row of the most-changed-channels extract
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    pub channel: usize,
    pub delta_mean: Option<f64>,
    pub full_mean_mean: Option<f64>,
    pub full_mean_sd: Option<f64>,
    pub pct_nonmissing: Option<f64>,
}

impl RankedEntry {
    pub const HEADER: [&'static str; 5] = [
        "channel_id",
        "delta.mean",
        "full_mean.mean",
        "full_mean.sd",
        "pct_nonmissing",
    ];

    pub fn channel_id(&self) -> String {
        channel_id(self.channel)
    }
}

/// Everything the cross-year stage produces
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Aggregates {
    pub years_processed: usize,
    pub all: AggregateTable,
    pub sufficient: AggregateTable,
    pub ranked: Vec<RankedEntry>,
}

/// Roll the year table up into the unfiltered, sufficient and ranked views.
///
/// Never fails: empty series give empty statistics and an empty year table gives empty
/// sufficient and ranked views.
pub fn aggregate(years: &YearTable, config: &Config) -> Aggregates {
    let years_processed = years.len();
    let rows: Vec<AggregateRow> = (0..config.channel_ceiling)
        .map(|channel| {
            let stats =
                Metric::ALL.map(|metric| ChannelSeries::gather(years, channel, metric).stats());
            let full_count = stats[2].count;
            let pct_nonmissing = if years_processed > 0 {
                Some(100.0 * full_count as f64 / years_processed as f64)
            } else {
                None
            };
            AggregateRow {
                channel,
                stats,
                pct_nonmissing,
            }
        })
        .collect();

    let sufficient: Vec<AggregateRow> = rows
        .iter()
        .filter(|r| r.get(Metric::FullMean).count >= config.sufficiency_threshold)
        .cloned()
        .collect();

    let ranked = rank(&sufficient, config.top_n);

    Aggregates {
        years_processed,
        all: AggregateTable { rows },
        sufficient: AggregateTable { rows: sufficient },
        ranked,
    }
}

/// Top `n` rows by descending |delta.mean|; rows without one sort last, ties keep table order
fn rank(rows: &[AggregateRow], n: usize) -> Vec<RankedEntry> {
    let mut entries: Vec<RankedEntry> = rows
        .iter()
        .map(|row| {
            let full = row.get(Metric::FullMean);
            RankedEntry {
                channel: row.channel,
                delta_mean: row.get(Metric::Delta).mean,
                full_mean_mean: full.mean,
                full_mean_sd: full.sd,
                pct_nonmissing: row.pct_nonmissing,
            }
        })
        .collect();
    entries.sort_by(|a, b| match (a.delta_mean, b.delta_mean) {
        (Some(x), Some(y)) => y.abs().total_cmp(&x.abs()),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    entries.truncate(n);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{ChannelMetrics, FileMetrics};
    use crate::year::YearSlice;
    use std::path::PathBuf;

    fn close(a: Option<f64>, b: f64) -> bool {
        a.map(|a| (a - b).abs() < 1e-9).unwrap_or(false)
    }

    fn metrics(full: Option<f64>, lead: Option<f64>) -> ChannelMetrics {
        ChannelMetrics {
            lead_mean: lead,
            trail_mean: full,
            full_mean: full,
            delta: full.zip(lead).map(|(f, l)| f - l),
        }
    }

    /// One slice per year, each given as a list of channel rows
    fn years(per_year: Vec<Vec<ChannelMetrics>>) -> YearTable {
        let mut table = YearTable::new();
        for (idx, channels) in per_year.into_iter().enumerate() {
            table.insert(YearSlice {
                label: YearLabel::Calendar(1995 + idx as i32),
                source: PathBuf::from(format!("P_Y{:02}.txt", idx + 1)),
                metrics: FileMetrics::from_channels(channels, 32),
            });
        }
        table
    }

    #[test]
    fn test_three_year_scenario() {
        let table = years(vec![
            vec![metrics(Some(2.0), Some(2.0))],
            vec![metrics(Some(5.0), Some(5.0))],
            vec![metrics(Some(8.0), Some(8.0))],
        ]);
        let agg = aggregate(&table, &Config::default());
        assert_eq!(agg.years_processed, 3);
        assert_eq!(agg.all.len(), 32);
        let row = agg.all.get(0).unwrap();
        let full = row.get(Metric::FullMean);
        assert!(close(full.mean, 5.0));
        assert_eq!(full.count, 3);
        assert!(close(full.sd, 3.0));
        assert!(close(full.median, 5.0));
        assert!(close(full.mad, 3.0));
        assert!(close(full.trailing_3_mean, 5.0));
        assert!(close(row.pct_nonmissing, 100.0));
        assert!(agg.sufficient.is_empty());
        assert!(agg.ranked.is_empty());
    }

    #[test]
    fn test_sufficiency_threshold_boundary() {
        // Channel 0 has five years of data, channel 1 only four
        let mut per_year = Vec::new();
        for year in 0..5 {
            let second = if year < 4 { Some(1.0) } else { None };
            per_year.push(vec![
                metrics(Some(1.0 + year as f64), Some(1.0)),
                metrics(second, Some(1.0)),
            ]);
        }
        let agg = aggregate(&years(per_year), &Config::default());
        assert_eq!(agg.sufficient.len(), 1);
        assert!(agg.sufficient.get(0).is_some());
        assert!(agg.sufficient.get(1).is_none());
        assert!(close(agg.all.get(1).unwrap().pct_nonmissing, 80.0));
    }

    #[test]
    fn test_pct_nonmissing_is_anchored_to_full_mean() {
        // Lead is missing in two of four years, full_mean never is
        let table = years(vec![
            vec![metrics(Some(1.0), None)],
            vec![metrics(Some(1.0), Some(1.0))],
            vec![metrics(Some(1.0), None)],
            vec![metrics(Some(1.0), Some(1.0))],
        ]);
        let agg = aggregate(&table, &Config::default());
        let row = agg.all.get(0).unwrap();
        assert_eq!(row.get(Metric::LeadMean).count, 2);
        assert_eq!(row.get(Metric::Delta).count, 2);
        assert!(close(row.pct_nonmissing, 100.0));
        assert_eq!(row.get(Metric::LeadMean).trailing_3_mean, None);
    }

    #[test]
    fn test_ranking_by_absolute_delta() {
        let deltas = [0.5, -3.0, 1.0, 3.0, 2.0, -0.1, 0.0];
        let mut per_year = Vec::new();
        for _ in 0..5 {
            per_year.push(
                deltas
                    .iter()
                    .map(|d| metrics(Some(10.0 + d), Some(10.0)))
                    .collect(),
            );
        }
        let agg = aggregate(&years(per_year), &Config::default());
        assert_eq!(agg.sufficient.len(), 7);
        let order: Vec<usize> = agg.ranked.iter().map(|e| e.channel).collect();
        // |-3.0| ties with |3.0|; the earlier channel wins
        assert_eq!(order, vec![1, 3, 4, 2, 0]);
        assert_eq!(agg.ranked[0].channel_id(), "Channel02");

        let mut config = Config::default();
        config.top_n = 10;
        let agg = aggregate(&years(vec![vec![metrics(Some(1.0), Some(1.0))]; 5]), &config);
        assert_eq!(agg.ranked.len(), 1);
    }

    #[test]
    fn test_channel_without_delta_is_ranked_last() {
        // Channel 0 never had a valid lead window, so it has no delta at all
        let table = years(vec![
            vec![metrics(Some(3.0), None), metrics(Some(2.0), Some(1.0))];
            5
        ]);
        let mut config = Config::default();
        config.top_n = 5;
        let agg = aggregate(&table, &config);
        assert_eq!(agg.sufficient.len(), 2);
        assert_eq!(agg.ranked.len(), 2);
        assert_eq!(agg.ranked[0].channel, 1);
        assert!(close(agg.ranked[0].delta_mean, 1.0));
        assert_eq!(agg.ranked[1].channel, 0);
        assert_eq!(agg.ranked[1].delta_mean, None);
        assert!(close(agg.ranked[1].full_mean_mean, 3.0));

        let only_missing = years(vec![vec![metrics(Some(3.0), None)]; 5]);
        let agg = aggregate(&only_missing, &Config::default());
        assert_eq!(agg.sufficient.len(), 1);
        assert_eq!(agg.ranked.len(), 1);
    }

    #[test]
    fn test_empty_input_gives_empty_views() {
        let agg = aggregate(&YearTable::new(), &Config::default());
        assert_eq!(agg.years_processed, 0);
        assert_eq!(agg.all.len(), 32);
        assert!(agg.all.rows().iter().all(|r| r.pct_nonmissing.is_none()));
        assert!(agg.sufficient.is_empty());
        assert!(agg.ranked.is_empty());
        assert_eq!(
            agg.all.get(5).unwrap().get(Metric::FullMean),
            &SeriesStats::default()
        );
    }

    #[test]
    fn test_header_shape() {
        let header = AggregateTable::header();
        assert_eq!(header.len(), 1 + 4 * 8 + 1);
        assert_eq!(header[1], "lead_mean.mean");
        assert_eq!(header[header.len() - 1], "pct_nonmissing");
    }
}
