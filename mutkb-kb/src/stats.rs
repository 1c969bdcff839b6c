use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::statistics::Statistics;

use crate::errors::{KbError, Result};
use crate::services::StatisticalTest;

///
/// Welch's two-sample t-test, one-sided: is the sample mean greater than the
/// background mean.
///
#[derive(Debug, Clone, Copy, Default)]
pub struct WelchTTest;

impl StatisticalTest for WelchTTest {
    fn one_sided_p_value(&self, sample: &[f64], background: &[f64]) -> Result<f64> {
        if sample.len() < 2 || background.len() < 2 {
            return Err(KbError::ExternalService(format!(
                "t-test needs two observations per group, got {} and {}",
                sample.len(),
                background.len()
            )));
        }

        let (n1, n2) = (sample.len() as f64, background.len() as f64);
        let (m1, m2) = (sample.mean(), background.mean());
        let (v1, v2) = (sample.variance() / n1, background.variance() / n2);

        let se = (v1 + v2).sqrt();
        if se == 0.0 {
            return Ok(if m1 > m2 { 0.0 } else { 1.0 });
        }

        let t = (m1 - m2) / se;
        let df = (v1 + v2).powi(2) / (v1.powi(2) / (n1 - 1.0) + v2.powi(2) / (n2 - 1.0));
        let dist = StudentsT::new(0.0, 1.0, df).map_err(|e| KbError::ExternalService(e.to_string()))?;
        Ok(dist.sf(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clearly_greater_sample() {
        let sample = [0.9, 0.95, 0.85, 0.92];
        let background = [0.1, 0.2, 0.15, 0.3, 0.25, 0.12];
        let p = WelchTTest.one_sided_p_value(&sample, &background).unwrap();
        assert!(p < 0.001, "p = {}", p);
    }

    #[test]
    fn test_smaller_sample_is_not_significant() {
        let sample = [0.1, 0.12, 0.11];
        let background = [0.5, 0.6, 0.7, 0.4];
        let p = WelchTTest.one_sided_p_value(&sample, &background).unwrap();
        assert!(p > 0.99, "p = {}", p);
    }

    #[test]
    fn test_equal_means_is_half() {
        let sample = [1.0, 2.0, 3.0];
        let background = [1.0, 2.0, 3.0];
        let p = WelchTTest.one_sided_p_value(&sample, &background).unwrap();
        assert!((p - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_constant_groups() {
        let p = WelchTTest.one_sided_p_value(&[2.0, 2.0], &[1.0, 1.0]).unwrap();
        assert_eq!(p, 0.0);
        assert!(WelchTTest.one_sided_p_value(&[1.0], &[1.0, 2.0]).is_err());
    }
}
