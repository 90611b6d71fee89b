//! Reconstruction of daily new infections from a cumulative death series.
//!
//! Deaths are smoothed with a centered triangular window, divided by the IFR to
//! estimate cumulative infections, and differentiated into a daily series. The
//! boundaries of that series are then cleaned: leading zeros are smoothing
//! artifacts, and a zero tail means the most recent days lack the death lag
//! needed to back-calculate infections, so they are cut and reported as delay.

use std::ops::RangeInclusive;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::region::DeathSeries;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructedCurve {
    /// Estimated new infections per day. Never starts or ends with zero.
    pub daily: Vec<u64>,
    /// Percentage of the population estimated infected by the end of the series.
    pub attack_rate: f64,
    /// Number of most recent days whose estimate is unreliable and was removed.
    pub delay: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurveReconstructor {
    window: usize,
}

impl Default for CurveReconstructor {
    fn default() -> Self {
        CurveReconstructor { window: 14 }
    }
}

impl CurveReconstructor {
    pub fn new(window: usize) -> Result<Self> {
        if window == 0 {
            return Err(Error::config("smoothing window must be at least 1 day"));
        }
        Ok(CurveReconstructor { window })
    }

    pub fn reconstruct(
        &self,
        deaths: &DeathSeries,
        population: u64,
        ifr: f64,
    ) -> Result<ReconstructedCurve> {
        if deaths.is_empty() {
            return Err(Error::data("death series is empty"));
        }
        if population == 0 {
            return Err(Error::data("population must be positive"));
        }
        if !(ifr > 0.0 && ifr.is_finite()) {
            return Err(Error::data(format!(
                "infection fatality rate must be positive, got {ifr}"
            )));
        }

        let raw: Vec<f64> = deaths.as_slice().iter().map(|&d| d as f64).collect();
        let smoothed = triangular_smooth(&raw, self.window);
        if smoothed.is_empty() {
            return Err(Error::data(format!(
                "{} days of deaths is shorter than the {}-day smoothing window",
                deaths.len(),
                self.window
            )));
        }

        let cumulative: Vec<i64> = smoothed.iter().map(|&d| (d / ifr) as i64).collect();
        let last = cumulative[cumulative.len() - 1];
        let attack_rate = 100.0 * last as f64 / population as f64;

        let daily: Vec<u64> = cumulative
            .iter()
            .scan(0i64, |prev, &cases| {
                let delta = cases - *prev;
                *prev = cases;
                Some(delta.max(0) as u64)
            })
            .collect();

        let (range, delay) = self.clean_boundaries(&daily)?;
        if delay > 0 {
            debug!(
                "truncated {} unreliable trailing days of a {}-day curve",
                delay,
                daily.len()
            );
        }

        Ok(ReconstructedCurve {
            daily: daily[range].to_vec(),
            attack_rate,
            delay,
        })
    }

    /// Locates the retained window of a daily series and the delay it implies.
    fn clean_boundaries(&self, daily: &[u64]) -> Result<(RangeInclusive<usize>, usize)> {
        let no_signal = || Error::data("reconstructed curve has no non-zero values");
        let first = daily.iter().position(|&v| v != 0).ok_or_else(no_signal)?;
        let last_nonzero = daily.iter().rposition(|&v| v != 0).ok_or_else(no_signal)?;

        let tail = daily.len() - 1 - last_nonzero;
        if tail == 0 {
            return Ok((first..=last_nonzero, 0));
        }

        // Drop half a window more next to the empty tail; those days were
        // smoothed against missing data.
        let half = self.window / 2;
        let mut delay = tail + half;
        let mut end = match last_nonzero.checked_sub(half + 1) {
            Some(end) if end >= first => end,
            _ => return Err(Error::data("no reliable days left after tail truncation")),
        };
        while daily[end] == 0 {
            if end == first {
                return Err(Error::data("no reliable days left after tail truncation"));
            }
            end -= 1;
            delay += 1;
        }
        Ok((first..=end, delay))
    }
}

/// Weights of a triangular window of the given width, unnormalized.
fn triangular_weights(window: usize) -> Vec<f64> {
    let half = window.div_ceil(2);
    let rising: Vec<f64> = (1..=half)
        .map(|n| {
            let weight = if window % 2 == 0 { 2 * n - 1 } else { 2 * n };
            weight as f64
        })
        .collect();
    let falling = rising.iter().rev().skip(window % 2);
    rising.iter().chain(falling).copied().collect()
}

/// Centered triangular moving average.
///
/// The value at day `i` averages days `i + (w - 1) / 2 + 1 - w ..= i + (w - 1) / 2`.
/// Days whose window falls off the start take the first defined value and days
/// whose window falls off the end are dropped, so the result is `(w - 1) / 2`
/// days shorter than the input. Series shorter than the window produce an
/// empty result.
pub fn triangular_smooth(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return Vec::new();
    }
    let weights = triangular_weights(window);
    let norm: f64 = weights.iter().sum();
    let offset = (window - 1) / 2;

    let defined: Vec<f64> = values
        .windows(window)
        .map(|w| w.iter().zip(&weights).map(|(v, k)| v * k).sum::<f64>() / norm)
        .collect();

    // The first full window is centered on day `window - 1 - offset`.
    let leading = window - 1 - offset;
    let mut smoothed = vec![defined[0]; leading];
    smoothed.extend(defined);
    smoothed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[u64]) -> DeathSeries {
        DeathSeries(values.to_vec())
    }

    #[test]
    fn test_triangular_weights() {
        assert_eq!(triangular_weights(1), vec![2.0]);
        assert_eq!(triangular_weights(4), vec![1.0, 3.0, 3.0, 1.0]);
        assert_eq!(triangular_weights(5), vec![2.0, 4.0, 6.0, 4.0, 2.0]);
        assert_eq!(triangular_weights(14).iter().sum::<f64>(), 98.0);
    }

    #[test]
    fn test_smooth_alignment() {
        // Width 2 averages each day with the one before it.
        let smoothed = triangular_smooth(&[0.0, 0.0, 2.0, 4.0, 6.0, 6.0, 6.0], 2);
        assert_eq!(smoothed, vec![0.0, 0.0, 1.0, 3.0, 5.0, 6.0, 6.0]);

        let smoothed = triangular_smooth(&[0.0, 4.0, 8.0, 12.0, 16.0], 3);
        assert_eq!(smoothed, vec![4.0, 4.0, 8.0, 12.0]);

        let flat = vec![5.0; 20];
        let smoothed = triangular_smooth(&flat, 14);
        assert_eq!(smoothed.len(), 14);
        assert!(smoothed.iter().all(|&v| v == 5.0));
    }

    #[test]
    fn test_short_series_is_an_error() {
        let reconstructor = CurveReconstructor::default();
        let result = reconstructor.reconstruct(&series(&[1, 2, 3]), 1000, 0.01);
        assert!(matches!(result, Err(Error::Data(_))));
    }

    #[test]
    fn test_invalid_inputs() {
        let reconstructor = CurveReconstructor::default();
        let deaths = series(&[1; 30]);
        assert!(matches!(
            reconstructor.reconstruct(&series(&[]), 1000, 0.01),
            Err(Error::Data(_))
        ));
        assert!(matches!(
            reconstructor.reconstruct(&deaths, 0, 0.01),
            Err(Error::Data(_))
        ));
        assert!(matches!(
            reconstructor.reconstruct(&deaths, 1000, 0.0),
            Err(Error::Data(_))
        ));
        assert!(matches!(
            reconstructor.reconstruct(&deaths, 1000, f64::NAN),
            Err(Error::Data(_))
        ));
        assert!(CurveReconstructor::new(0).is_err());
    }

    #[test]
    fn test_all_zero_series() {
        let reconstructor = CurveReconstructor::default();
        let result = reconstructor.reconstruct(&series(&[0; 40]), 1000, 0.01);
        assert!(matches!(result, Err(Error::Data(_))));
    }

    #[test]
    fn test_tail_truncation() {
        // smoothed  = [0, 0, 1, 3, 5, 6, 6]
        // infected  = [0, 0, 2, 6, 10, 12, 12]
        // daily     = [0, 0, 2, 4, 4, 2, 0]
        let reconstructor = CurveReconstructor::new(2).unwrap();
        let curve = reconstructor
            .reconstruct(&series(&[0, 0, 2, 4, 6, 6, 6]), 1200, 0.5)
            .unwrap();
        assert_eq!(curve.daily, vec![2, 4]);
        assert_eq!(curve.delay, 2);
        assert!(f64::abs(curve.attack_rate - 1.0) < 1e-12);
    }

    #[test]
    fn test_zeros_exposed_by_truncation_join_the_delay() {
        // smoothed  = [1, 1, 3, 4, 4, 4, 5, 6, 6]
        // infected  = [2, 2, 6, 8, 8, 8, 10, 12, 12]
        // daily     = [2, 0, 4, 2, 0, 0, 2, 2, 0]
        // The cut ends on day 5; days 5 and 4 are zero and go with it.
        let reconstructor = CurveReconstructor::new(2).unwrap();
        let curve = reconstructor
            .reconstruct(&series(&[0, 2, 4, 4, 4, 4, 6, 6, 6]), 1000, 0.5)
            .unwrap();
        assert_eq!(curve.daily, vec![2, 0, 4, 2]);
        assert_eq!(curve.delay, 4);
        assert!(f64::abs(curve.attack_rate - 1.2) < 1e-12);
    }

    #[test]
    fn test_no_tail_keeps_last_day() {
        let reconstructor = CurveReconstructor::new(1).unwrap();
        let curve = reconstructor
            .reconstruct(&series(&[0, 0, 1, 3, 6]), 100, 0.5)
            .unwrap();
        assert_eq!(curve.daily, vec![2, 4, 6]);
        assert_eq!(curve.delay, 0);
    }

    #[test]
    fn test_truncation_consuming_everything() {
        let reconstructor = CurveReconstructor::new(2).unwrap();
        let result = reconstructor.reconstruct(&series(&[0, 0, 0, 2, 2, 2]), 100, 0.5);
        assert!(matches!(result, Err(Error::Data(_))));
    }

    #[test]
    fn test_attack_rate() {
        let mut deaths: Vec<u64> = (0..30).map(|d| d * 3).collect();
        deaths.extend([100; 20]);
        let population = 1_000_000;
        let curve = CurveReconstructor::default()
            .reconstruct(&series(&deaths), population, 0.01)
            .unwrap();
        let expected = 100.0 * (100.0 / 0.01) / population as f64;
        assert!(f64::abs(curve.attack_rate - expected) < 1e-9);
        assert!(curve.delay >= 7);
        assert_ne!(curve.daily[0], 0);
        assert_ne!(*curve.daily.last().unwrap(), 0);
    }

    #[test]
    fn test_smooth_epidemic_is_recovered() {
        let deaths: Vec<u64> = (0..80)
            .map(|t| (10_000.0 / (1.0 + f64::exp(-(t as f64 - 40.0) / 6.0))).round() as u64)
            .collect();
        let ifr = 0.01;
        let curve = CurveReconstructor::default()
            .reconstruct(&series(&deaths), 50_000_000, ifr)
            .unwrap();
        assert_eq!(curve.delay, 0);
        assert_ne!(curve.daily[0], 0);
        assert_ne!(*curve.daily.last().unwrap(), 0);

        let raw: Vec<f64> = deaths.iter().map(|&d| d as f64).collect();
        let smoothed = triangular_smooth(&raw, 14);
        let total: u64 = curve.daily.iter().sum();
        assert_eq!(curve.daily.len(), smoothed.len());
        assert!(f64::abs(total as f64 * ifr - smoothed[smoothed.len() - 1]) < 0.05);
    }
}
