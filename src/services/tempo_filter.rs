use color_eyre::eyre::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::library::track::{AudioFeatures, Track};

pub const DEFAULT_BPM_MIN: f64 = 160.0;
pub const DEFAULT_BPM_MAX: f64 = 180.0;
pub const DEFAULT_MIN_DURATION_MS: u64 = 90_000;

/// Inclusive BPM range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoRange {
    min: f64,
    max: f64,
}

impl TempoRange {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() {
            bail!("BPM range bounds must be finite numbers");
        }
        if min > max {
            bail!("Minimum BPM ({}) is greater than maximum BPM ({})", min, max);
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn contains(&self, bpm: f64) -> bool {
        self.min <= bpm && bpm <= self.max
    }
}

impl Default for TempoRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_BPM_MIN,
            max: DEFAULT_BPM_MAX,
        }
    }
}

/// Feature thresholds a track must exceed to be accepted at double its detected
/// tempo. Tempo detection often reports half the perceived tempo for
/// drum and bass, hip hop and similar genres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HalfTempoThresholds {
    pub min_energy: f64,
    pub min_loudness: f64,
    pub min_danceability: f64,
}

impl Default for HalfTempoThresholds {
    fn default() -> Self {
        Self {
            min_energy: 0.3,
            min_loudness: -12.0,
            min_danceability: 0.5,
        }
    }
}

impl HalfTempoThresholds {
    /// Missing values never pass.
    pub fn accepts(&self, features: &AudioFeatures) -> bool {
        let above = |value: Option<f64>, threshold: f64| value.is_some_and(|v| v > threshold);

        above(features.energy, self.min_energy)
            && above(features.loudness, self.min_loudness)
            && above(features.danceability, self.min_danceability)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoFilter {
    pub range: TempoRange,
    pub min_duration_ms: u64,
    pub half_tempo: HalfTempoThresholds,
}

impl TempoFilter {
    pub fn new(range: TempoRange) -> Self {
        Self {
            range,
            min_duration_ms: DEFAULT_MIN_DURATION_MS,
            half_tempo: HalfTempoThresholds::default(),
        }
    }

    pub fn with_min_duration_ms(mut self, min_duration_ms: u64) -> Self {
        self.min_duration_ms = min_duration_ms;
        self
    }

    pub fn with_half_tempo(mut self, half_tempo: HalfTempoThresholds) -> Self {
        self.half_tempo = half_tempo;
        self
    }

    pub fn matches(&self, track: &Track) -> bool {
        if track.duration_ms < self.min_duration_ms {
            return false;
        }

        let Some(bpm) = track.bpm.filter(|bpm| bpm.is_finite() && *bpm >= 0.0) else {
            return false;
        };

        if self.range.contains(bpm) {
            return true;
        }

        self.range.contains(bpm * 2.0)
            && track
                .features
                .as_ref()
                .is_some_and(|features| self.half_tempo.accepts(features))
    }

    pub fn apply<'a>(&self, tracks: impl IntoIterator<Item = &'a Track>) -> Vec<&'a Track> {
        tracks
            .into_iter()
            .filter(|track| self.matches(track))
            .collect()
    }
}
