use std::fmt::Display;

use super::config::Config;
use super::constants::CHANNEL_PREFIX;
use super::record_file::RecordTable;
use super::stats::mean;

/// The four per-file summary values of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    LeadMean,
    TrailMean,
    FullMean,
    Delta,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::LeadMean,
        Metric::TrailMean,
        Metric::FullMean,
        Metric::Delta,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::LeadMean => "lead_mean",
            Self::TrailMean => "trail_mean",
            Self::FullMean => "full_mean",
            Self::Delta => "delta",
        }
    }
}

impl Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Standard identifier of a channel slot, `Channel01` for index 0
pub fn channel_id(index: usize) -> String {
    format!("{CHANNEL_PREFIX}{:02}", index + 1)
}

/// A reading is valid when present and strictly positive; 0.00 is the instrument's "no reading"
pub fn is_valid_reading(reading: Option<f64>) -> bool {
    matches!(reading, Some(v) if v > 0.0)
}

/// Summary of one channel over one measurement run. `None` means no valid reading contributed,
/// never a measured zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelMetrics {
    pub lead_mean: Option<f64>,
    pub trail_mean: Option<f64>,
    pub full_mean: Option<f64>,
    pub delta: Option<f64>,
}

impl ChannelMetrics {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::LeadMean => self.lead_mean,
            Metric::TrailMean => self.trail_mean,
            Metric::FullMean => self.full_mean,
            Metric::Delta => self.delta,
        }
    }

    /// Compute the metrics of a channel from its readings in row order.
    ///
    /// Windows are cut from the raw rows first and filtered for validity afterwards, so a lead
    /// window full of dropouts yields no lead mean even if later rows are valid.
    pub fn from_readings(
        readings: &[Option<f64>],
        lead_window: usize,
        trail_window: usize,
    ) -> Self {
        let valid_mean = |window: &[Option<f64>]| -> Option<f64> {
            let valid: Vec<f64> = window
                .iter()
                .copied()
                .filter(|r| is_valid_reading(*r))
                .flatten()
                .collect();
            mean(&valid)
        };

        let lead_end = lead_window.min(readings.len());
        let trail_start = readings.len().saturating_sub(trail_window);

        let lead_mean = valid_mean(&readings[..lead_end]);
        let trail_mean = valid_mean(&readings[trail_start..]);
        let full_mean = valid_mean(readings);
        let delta = match (full_mean, lead_mean) {
            (Some(full), Some(lead)) => Some(full - lead),
            _ => None,
        };

        Self {
            lead_mean,
            trail_mean,
            full_mean,
            delta,
        }
    }
}

/// Per-channel metrics of one file, always `channel_ceiling` rows long. Slots past the file's
/// detected channel count are present but empty.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetrics {
    channels: Vec<ChannelMetrics>,
    channel_count: usize,
}

impl FileMetrics {
    pub fn from_table(table: &RecordTable, config: &Config) -> Self {
        let channel_count = table.channel_count().min(config.channel_ceiling);
        let mut channels = vec![ChannelMetrics::default(); config.channel_ceiling];
        for (index, slot) in channels.iter_mut().enumerate().take(channel_count) {
            let readings: Vec<Option<f64>> = table.channel(index).to_vec();
            *slot = ChannelMetrics::from_readings(
                &readings,
                config.lead_window,
                config.trail_window,
            );
        }
        Self {
            channels,
            channel_count,
        }
    }

    /// Build directly from computed rows, padding with empty slots up to the ceiling
    pub fn from_channels(mut channels: Vec<ChannelMetrics>, channel_ceiling: usize) -> Self {
        channels.truncate(channel_ceiling);
        let channel_count = channels.len();
        channels.resize(channel_ceiling, ChannelMetrics::default());
        Self {
            channels,
            channel_count,
        }
    }

    /// Every slot, including the padded ones
    pub fn channels(&self) -> &[ChannelMetrics] {
        &self.channels
    }

    /// Only the channels the file actually had
    pub fn detected(&self) -> &[ChannelMetrics] {
        &self.channels[..self.channel_count]
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn get(&self, channel: usize) -> Option<&ChannelMetrics> {
        self.channels.get(channel)
    }

    /// Index and value of the channel with the largest absolute delta, if any delta exists
    pub fn largest_abs_delta(&self) -> Option<(usize, f64)> {
        self.channels
            .iter()
            .enumerate()
            .filter_map(|(idx, m)| m.delta.map(|d| (idx, d)))
            .fold(None, |best: Option<(usize, f64)>, (idx, d)| match best {
                Some((_, b)) if b.abs() >= d.abs() => best,
                _ => Some((idx, d)),
            })
    }
}
