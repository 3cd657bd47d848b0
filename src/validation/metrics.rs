//! Regression skill scores.

/// Root mean squared error. `NaN` for empty input.
pub fn rmse(truth: &[f64], predicted: &[f64]) -> f64 {
    mean_of(truth, predicted, |d| d * d).sqrt()
}

/// Mean absolute error. `NaN` for empty input.
pub fn mae(truth: &[f64], predicted: &[f64]) -> f64 {
    mean_of(truth, predicted, f64::abs)
}

/// Coefficient of determination, floored at 0.
///
/// Negative skill (worse than predicting the mean) is reported as 0. For a constant
/// truth the score is 1 when every prediction is exact and 0 otherwise.
pub fn r2_floored(truth: &[f64], predicted: &[f64]) -> f64 {
    if truth.is_empty() || truth.len() != predicted.len() {
        return 0.0;
    }
    let mean = truth.iter().sum::<f64>() / truth.len() as f64;
    let ss_tot: f64 = truth.iter().map(|t| (t - mean).powi(2)).sum();
    let ss_res: f64 = truth.iter().zip(predicted).map(|(t, p)| (t - p).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    (1.0 - ss_res / ss_tot).max(0.0)
}

fn mean_of(truth: &[f64], predicted: &[f64], f: impl Fn(f64) -> f64) -> f64 {
    let n = truth.len().min(predicted.len());
    if n == 0 {
        return f64::NAN;
    }
    truth.iter().zip(predicted).map(|(t, p)| f(t - p)).sum::<f64>() / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores() {
        let truth = [1.0, 2.0, 3.0, 4.0];
        let pred = [1.0, 2.0, 3.0, 6.0];
        assert!((rmse(&truth, &pred) - 1.0).abs() < 1e-12);
        assert!((mae(&truth, &pred) - 0.5).abs() < 1e-12);
        // ss_res 4, ss_tot 5
        assert!((r2_floored(&truth, &pred) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_r2_is_floored() {
        assert_eq!(r2_floored(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]), 0.0);
    }

    #[test]
    fn test_constant_truth() {
        assert_eq!(r2_floored(&[2.0, 2.0], &[2.0, 2.0]), 1.0);
        assert_eq!(r2_floored(&[2.0, 2.0], &[2.0, 2.5]), 0.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(rmse(&[], &[]).is_nan());
        assert_eq!(r2_floored(&[], &[]), 0.0);
    }
}
