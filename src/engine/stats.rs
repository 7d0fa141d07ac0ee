//! Dispersion statistics over unit prices.

use serde::Serialize;

use crate::error::{Result, XrayError};

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Bessel-corrected (n - 1) standard deviation; undefined below two points.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// 100·σ/μ, or 0 when μ is not positive or σ is undefined.
pub fn coefficient_of_variation(mean: f64, std_dev: Option<f64>) -> f64 {
    match std_dev {
        Some(sd) if mean > 0.0 => 100.0 * sd / mean,
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceSummary {
    pub count: usize,
    pub min: f64,
    pub mean: f64,
    pub median: f64,
    pub max: f64,
    /// `None` for a single-record set.
    pub std_dev: Option<f64>,
    pub coefficient_of_variation: f64,
}

/// Summary of a price collection. Empty input is `InsufficientData`;
/// a single price yields `std_dev: None` and a coefficient of variation of 0.
pub fn summary(prices: &[f64]) -> Result<PriceSummary> {
    let mean = mean(prices).ok_or(XrayError::InsufficientData)?;
    let median = median(prices).ok_or(XrayError::InsufficientData)?;
    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let std_dev = sample_std(prices);
    Ok(PriceSummary {
        count: prices.len(),
        min,
        mean,
        median,
        max,
        std_dev,
        coefficient_of_variation: coefficient_of_variation(mean, std_dev),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Retention {
    pub kept: usize,
    pub baseline: usize,
    pub percentage: f64,
}

pub fn retention(kept: usize, baseline: usize) -> Result<Retention> {
    if baseline == 0 {
        return Err(XrayError::DivisionUndefined);
    }
    Ok(Retention {
        kept,
        baseline,
        percentage: 100.0 * kept as f64 / baseline as f64,
    })
}
