use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::statistics::Statistics;

use crate::error::{Result, SweepError};

/// Confidence level used when summarizing repeated runs.
pub const DEFAULT_CONFIDENCE: f64 = 0.95;

/// Mean and half-width of the Student-t confidence interval of `samples`.
///
/// Needs at least two samples; a single observation has no spread to estimate
/// and callers report it with a zero interval themselves.
pub fn confidence_interval(samples: &[f64], confidence: f64) -> Result<(f64, f64)> {
    let n = samples.len();
    if n < 2 {
        return Err(SweepError::InsufficientSamples(n));
    }
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(SweepError::InvalidConfidence(confidence));
    }

    let mean = samples.mean();
    let std_error = samples.std_dev() / (n as f64).sqrt();

    let t = StudentsT::new(0.0, 1.0, (n - 1) as f64)
        .map_err(|e| SweepError::InvalidInput(e.to_string()))?;
    let quantile = t.inverse_cdf((1.0 + confidence) / 2.0);

    Ok((mean, std_error * quantile))
}
