//! Score normalisation functions.
//!
//! Missing values are skipped when computing statistics and stay missing in
//! the output, so one failed metric never poisons the rest of a column.

/// Below this population standard deviation a column is treated as constant.
pub const ZERO_VARIANCE_EPS: f64 = 1e-12;

/// Mean of the present values.
pub fn mean(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    Some(present.iter().sum::<f64>() / present.len() as f64)
}

/// Population (ddof = 0) standard deviation of the present values.
pub fn population_std(values: &[Option<f64>]) -> Option<f64> {
    let m = mean(values)?;
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let var = present.iter().map(|v| (v - m).powi(2)).sum::<f64>() / present.len() as f64;
    Some(var.sqrt())
}

/// Z-score against the population statistics of the same column:
/// z = (x − mean) / σ.
///
/// A constant column (σ below [`ZERO_VARIANCE_EPS`]) maps every present value
/// to 0.
pub fn zscore_population(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let (m, sd) = match (mean(values), population_std(values)) {
        (Some(m), Some(sd)) => (m, sd),
        _ => return vec![None; values.len()],
    };
    values
        .iter()
        .map(|v| {
            v.map(|x| {
                if sd < ZERO_VARIANCE_EPS {
                    0.0
                } else {
                    (x - m) / sd
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zscore_population_basic() {
        let z = zscore_population(&[Some(1.0), Some(2.0), Some(3.0)]);
        // population σ of {1,2,3} is sqrt(2/3)
        let sd = (2.0f64 / 3.0).sqrt();
        assert!((z[0].unwrap() + 1.0 / sd).abs() < 1e-12);
        assert!(z[1].unwrap().abs() < 1e-12);
        assert!((z[2].unwrap() - 1.0 / sd).abs() < 1e-12);
    }

    #[test]
    fn test_zero_variance_maps_to_zero() {
        let z = zscore_population(&[Some(-7.0), Some(-7.0), Some(-7.0)]);
        assert_eq!(z, vec![Some(0.0), Some(0.0), Some(0.0)]);
    }

    #[test]
    fn test_missing_values_are_skipped() {
        let z = zscore_population(&[Some(1.0), None, Some(3.0)]);
        assert_eq!(z[1], None);
        assert!((z[0].unwrap() + 1.0).abs() < 1e-12);
        assert!((z[2].unwrap() - 1.0).abs() < 1e-12);

        assert_eq!(zscore_population(&[None, None]), vec![None, None]);
        assert_eq!(mean(&[]), None);
    }
}
