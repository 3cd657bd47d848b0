use crate::model::error::ModelError;
use serde::{Deserialize, Serialize};

/// Per-column standardization: `(x - mean) / std`.
///
/// Uses the population standard deviation. Constant columns keep a scale of 1 so
/// they pass through centred instead of dividing by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self, ModelError> {
        let first = rows.first().ok_or(ModelError::EmptyTrainingSet)?;
        let width = first.len();
        let n = rows.len() as f64;

        let mut mean = vec![0.0; width];
        for (i, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(ModelError::RaggedRow {
                    row: i,
                    expected: width,
                    actual: row.len(),
                });
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(ModelError::NonFinite(i));
            }
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut variance = vec![0.0; width];
        for row in rows {
            for ((var, v), m) in variance.iter_mut().zip(row).zip(&mean) {
                *var += (v - m).powi(2);
            }
        }
        let scale = variance
            .into_iter()
            .map(|var| {
                let std = (var / n).sqrt();
                if std > f64::EPSILON {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Ok(Self { mean, scale })
    }

    pub fn transform(&self, values: &[f64]) -> Result<Vec<f64>, ModelError> {
        if values.len() != self.mean.len() {
            return Err(ModelError::FeatureCountMismatch {
                expected: self.mean.len(),
                actual: values.len(),
            });
        }
        Ok(values
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }

    pub fn transform_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
        rows.iter().map(|r| self.transform(r)).collect()
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardizes_columns() {
        let rows = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();
        assert_eq!(scaler.transform(&[1.0, 5.0]).unwrap(), vec![-1.0, 0.0]);
        assert_eq!(scaler.transform(&[3.0, 7.0]).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(StandardScaler::fit(&[]), Err(ModelError::EmptyTrainingSet));
        assert_eq!(
            StandardScaler::fit(&[vec![1.0, 2.0], vec![1.0]]),
            Err(ModelError::RaggedRow {
                row: 1,
                expected: 2,
                actual: 1
            })
        );
        let scaler = StandardScaler::fit(&[vec![1.0, 2.0]]).unwrap();
        assert_eq!(
            scaler.transform(&[1.0]),
            Err(ModelError::FeatureCountMismatch {
                expected: 2,
                actual: 1
            })
        );
    }
}
