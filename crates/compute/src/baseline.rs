//! Statistical baseline evaluator: compares a current value against a
//! sample of historical values with Z-score, EWMA or percentage change.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::algorithms::stats::{mean, sample_std};

/// Minimum number of historical samples before any comparison is made.
pub const MIN_BASELINE_SAMPLES: usize = 2;

pub const INSUFFICIENT_BASELINE: &str = "insufficient baseline data";

// ── Parameters ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZscoreParams {
    #[serde(default = "default_zscore_threshold")]
    pub threshold: f64,
}

impl Default for ZscoreParams {
    fn default() -> Self {
        Self {
            threshold: default_zscore_threshold(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EwmaParams {
    #[serde(default = "default_span")]
    pub span: f64,
    /// Shared sensitivity slider; rescaled to a relative deviation of
    /// `threshold / 10` unless `relative_threshold` is set.
    #[serde(default = "default_zscore_threshold")]
    pub threshold: f64,
    /// Relative deviation `|current - ewma| / ewma` that triggers.
    #[serde(default)]
    pub relative_threshold: Option<f64>,
}

impl EwmaParams {
    pub fn effective_threshold(&self) -> f64 {
        self.relative_threshold.unwrap_or(self.threshold / 10.0)
    }
}

impl Default for EwmaParams {
    fn default() -> Self {
        Self {
            span: default_span(),
            threshold: default_zscore_threshold(),
            relative_threshold: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PercentageChangeParams {
    /// Absolute percentage change that triggers.
    #[serde(default = "default_percentage_threshold")]
    pub threshold: f64,
}

impl Default for PercentageChangeParams {
    fn default() -> Self {
        Self {
            threshold: default_percentage_threshold(),
        }
    }
}

fn default_zscore_threshold() -> f64 {
    2.5
}

fn default_span() -> f64 {
    7.0
}

fn default_percentage_threshold() -> f64 {
    50.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatisticalAlgorithm {
    Zscore(ZscoreParams),
    Ewma(EwmaParams),
    PercentageChange(PercentageChangeParams),
}

// ── Outcome ─────────────────────────────────────────────────────────

/// Numeric outcome of a comparison, populated even when nothing triggered.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticalOutcome {
    pub triggered: bool,
    /// Z-score, or relative deviation for EWMA, or percentage for
    /// percentage change.
    pub score: Option<f64>,
    /// Expected value: mean, or EWMA level.
    pub baseline: f64,
    pub percentage_change: Option<f64>,
    pub reason: Option<String>,
    pub insufficient_data: bool,
}

/// Compare `current` against `samples`.
pub fn evaluate(current: f64, samples: &[f64], algorithm: &StatisticalAlgorithm) -> StatisticalOutcome {
    let baseline_mean = mean(samples);
    if samples.len() < MIN_BASELINE_SAMPLES {
        return StatisticalOutcome {
            triggered: false,
            score: None,
            baseline: baseline_mean,
            percentage_change: None,
            reason: Some(INSUFFICIENT_BASELINE.to_string()),
            insufficient_data: true,
        };
    }

    let percentage_change = percent_change(current, baseline_mean);

    let outcome = match algorithm {
        StatisticalAlgorithm::Zscore(params) => zscore(current, samples, params),
        StatisticalAlgorithm::Ewma(params) => ewma(current, samples, params),
        StatisticalAlgorithm::PercentageChange(params) => {
            percentage(current, baseline_mean, percentage_change, params)
        }
    };

    debug!(
        current,
        baseline = outcome.baseline,
        score = ?outcome.score,
        triggered = outcome.triggered,
        "statistical evaluation"
    );

    StatisticalOutcome {
        percentage_change,
        ..outcome
    }
}

/// `(current - mean) / mean * 100`, undefined for a non-positive mean.
pub fn percent_change(current: f64, mean: f64) -> Option<f64> {
    (mean > 0.0).then(|| (current - mean) / mean * 100.0)
}

/// Signed z-score; a flat baseline gives 0 on the mean and +/- infinity elsewhere.
pub fn zscore_of(current: f64, mean: f64, std: f64) -> f64 {
    if std > 0.0 {
        (current - mean) / std
    } else if current == mean {
        0.0
    } else if current > mean {
        f64::INFINITY
    } else {
        f64::NEG_INFINITY
    }
}

/// Exponentially weighted moving average seeded with the first sample.
pub fn ewma_level(samples: &[f64], span: f64) -> f64 {
    let alpha = 2.0 / (span + 1.0);
    let mut iter = samples.iter();
    let Some(&first) = iter.next() else {
        return 0.0;
    };
    iter.fold(first, |acc, &v| alpha * v + (1.0 - alpha) * acc)
}

fn zscore(current: f64, samples: &[f64], params: &ZscoreParams) -> StatisticalOutcome {
    let m = mean(samples);
    let std = sample_std(samples);
    let z = zscore_of(current, m, std);
    let triggered = z.abs() >= params.threshold;
    let direction = if z >= 0.0 { "above" } else { "below" };

    StatisticalOutcome {
        triggered,
        score: Some(z),
        baseline: m,
        percentage_change: None,
        reason: Some(format!(
            "Z-score {z:.2} ({direction} baseline). Current: {current}, Expected: {m:.1} ± {std:.1}"
        )),
        insufficient_data: false,
    }
}

fn ewma(current: f64, samples: &[f64], params: &EwmaParams) -> StatisticalOutcome {
    let level = ewma_level(samples, params.span);
    let deviation = if level > 0.0 {
        (current - level).abs() / level
    } else {
        0.0
    };
    let limit = params.effective_threshold();
    let triggered = deviation > limit;
    let direction = if current >= level { "above" } else { "below" };

    StatisticalOutcome {
        triggered,
        score: Some(deviation),
        baseline: level,
        percentage_change: None,
        reason: Some(format!(
            "EWMA deviation {:.1}% ({direction} trend, limit {:.1}%). Current: {current}, EWMA: {level:.1}",
            deviation * 100.0,
            limit * 100.0
        )),
        insufficient_data: false,
    }
}

fn percentage(
    current: f64,
    m: f64,
    pct: Option<f64>,
    params: &PercentageChangeParams,
) -> StatisticalOutcome {
    let Some(pct) = pct else {
        return StatisticalOutcome {
            triggered: false,
            score: None,
            baseline: m,
            percentage_change: None,
            reason: Some("baseline mean is zero".to_string()),
            insufficient_data: false,
        };
    };
    let direction = if pct >= 0.0 { "increase" } else { "decrease" };

    StatisticalOutcome {
        triggered: pct.abs() >= params.threshold,
        score: Some(pct),
        baseline: m,
        percentage_change: Some(pct),
        reason: Some(format!(
            "{:.1}% {direction} from baseline. Current: {current}, Baseline: {m:.1}",
            pct.abs()
        )),
        insufficient_data: false,
    }
}
