//! Statistical analysis functions for A/B testing
//!
//! Two-proportion z-test for rates and Welch's t-test for means. Both work on
//! running summaries so tallies never keep raw samples.

use serde::Serialize;

use crate::domain::experiment::{SignificanceTest, StatisticalSignificance};

/// Running count, mean and variance (Welford's algorithm)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SampleSummary {
    pub count: u64,
    pub mean: f64,
    /// Sum of squared deviations from the mean
    m2: f64,
}

impl SampleSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    /// Sample variance (n-1 denominator), 0.0 below two samples
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        self.m2 / (self.count - 1) as f64
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// Two-tailed p-value of Welch's t-test between two summaries
///
/// Welch's t-test is preferred over Student's t-test when the two samples
/// may have unequal variances and/or unequal sample sizes.
///
/// # Returns
/// * `Some(p_value)` if calculation succeeds
/// * `None` if either sample has fewer than 2 elements or both have zero variance
pub fn welch_t_test(sample1: &SampleSummary, sample2: &SampleSummary) -> Option<f64> {
    if sample1.count < 2 || sample2.count < 2 {
        return None;
    }

    let n1 = sample1.count as f64;
    let n2 = sample2.count as f64;
    let var1 = sample1.variance();
    let var2 = sample2.variance();

    let se = ((var1 / n1) + (var2 / n2)).sqrt();

    if se == 0.0 || !se.is_finite() {
        return None;
    }

    let t = (sample1.mean - sample2.mean) / se;

    // Welch-Satterthwaite degrees of freedom
    let df_num = (var1 / n1 + var2 / n2).powi(2);
    let df_denom = ((var1 / n1).powi(2) / (n1 - 1.0)) + ((var2 / n2).powi(2) / (n2 - 1.0));

    if df_denom == 0.0 {
        return None;
    }

    let df = df_num / df_denom;

    Some(approximate_p_value(t.abs(), df))
}

/// Two-tailed p-value of the pooled two-proportion z-test
///
/// # Returns
/// * `None` if either group is empty or the pooled rate is 0 or 1
pub fn two_proportion_z_test(successes1: u64, n1: u64, successes2: u64, n2: u64) -> Option<f64> {
    if n1 == 0 || n2 == 0 {
        return None;
    }

    let n1 = n1 as f64;
    let n2 = n2 as f64;
    let p1 = successes1 as f64 / n1;
    let p2 = successes2 as f64 / n2;
    let pooled = (successes1 + successes2) as f64 / (n1 + n2);

    let se = (pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2)).sqrt();

    if se == 0.0 || !se.is_finite() {
        return None;
    }

    let z = (p1 - p2) / se;

    Some((2.0 * (1.0 - normal_cdf(z.abs()))).clamp(0.0, 1.0))
}

/// Approximate p-value from t-statistic and degrees of freedom
///
/// Uses normal approximation for large df, and a correction factor for
/// smaller df.
fn approximate_p_value(t: f64, df: f64) -> f64 {
    let p = if df > 30.0 {
        2.0 * (1.0 - normal_cdf(t))
    } else {
        let correction = 1.0 - 1.0 / (4.0 * df);
        2.0 * (1.0 - normal_cdf(t * correction.max(0.0).sqrt()))
    };

    p.clamp(0.0, 1.0)
}

/// Standard normal cumulative distribution function
fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Error function approximation
///
/// Uses Horner's method for the polynomial approximation.
/// Accurate to about 1.5e-7.
fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}

/// Compare success rates of control and treatment
pub fn compare_success_rates(
    control_successes: u64,
    control_n: u64,
    treatment_successes: u64,
    treatment_n: u64,
    confidence_level: f64,
) -> Option<StatisticalSignificance> {
    let p_value =
        two_proportion_z_test(control_successes, control_n, treatment_successes, treatment_n)?;

    Some(StatisticalSignificance::new(
        SignificanceTest::TwoProportionZ,
        p_value,
        confidence_level,
        control_successes as f64 / control_n as f64,
        treatment_successes as f64 / treatment_n as f64,
    ))
}

/// Compare mean values of control and treatment
pub fn compare_means(
    control: &SampleSummary,
    treatment: &SampleSummary,
    confidence_level: f64,
) -> Option<StatisticalSignificance> {
    let p_value = welch_t_test(control, treatment)?;

    Some(StatisticalSignificance::new(
        SignificanceTest::WelchT,
        p_value,
        confidence_level,
        control.mean,
        treatment.mean,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(samples: &[f64]) -> SampleSummary {
        let mut summary = SampleSummary::new();
        for &x in samples {
            summary.push(x);
        }
        summary
    }

    #[test]
    fn test_summary_of_too_few_samples_has_zero_variance() {
        assert_eq!(summary(&[]).variance(), 0.0);
        assert_eq!(summary(&[42.0]).variance(), 0.0);
        assert!((summary(&[1.0, 2.0, 3.0, 4.0, 5.0]).std_dev() - 1.5811).abs() < 0.001);
    }

    #[test]
    fn test_running_summary_matches_batch() {
        let samples = [12.0, 7.5, 3.25, 9.0, 15.5, 8.0];
        let running = summary(&samples);

        let batch_mean = samples.iter().sum::<f64>() / 6.0;

        assert_eq!(running.count, 6);
        assert!((running.mean - batch_mean).abs() < 1e-12);

        let batch_var = samples
            .iter()
            .map(|x| (x - batch_mean).powi(2))
            .sum::<f64>()
            / 5.0;
        assert!((running.variance() - batch_var).abs() < 1e-9);
    }

    #[test]
    fn test_welch_t_test_insufficient_samples() {
        assert!(welch_t_test(&summary(&[]), &summary(&[1.0, 2.0])).is_none());
        assert!(welch_t_test(&summary(&[1.0]), &summary(&[1.0, 2.0])).is_none());
        assert!(welch_t_test(&summary(&[1.0, 2.0]), &summary(&[1.0])).is_none());
    }

    #[test]
    fn test_welch_t_test_zero_variance_is_none() {
        assert!(welch_t_test(&summary(&[5.0; 10]), &summary(&[5.0; 10])).is_none());
    }

    #[test]
    fn test_welch_t_test_identical_samples() {
        let sample = summary(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let p_value = welch_t_test(&sample, &sample).unwrap();
        assert!(p_value > 0.9, "Identical samples should have high p-value");
    }

    #[test]
    fn test_welch_t_test_significantly_different() {
        let control = summary(&[100.0, 102.0, 98.0, 101.0, 99.0, 100.0, 101.0, 99.0, 100.0, 100.0]);
        let treatment =
            summary(&[150.0, 152.0, 148.0, 151.0, 149.0, 150.0, 151.0, 149.0, 150.0, 150.0]);

        let p_value = welch_t_test(&control, &treatment).unwrap();
        assert!(p_value < 0.01, "expected low p-value, got {}", p_value);
    }

    #[test]
    fn test_welch_t_test_similar_samples() {
        let control = summary(&[100.0, 102.0, 98.0, 101.0, 99.0]);
        let treatment = summary(&[101.0, 99.0, 100.0, 102.0, 98.0]);

        let p_value = welch_t_test(&control, &treatment).unwrap();
        assert!(p_value > 0.5, "expected high p-value, got {}", p_value);
    }

    #[test]
    fn test_two_proportion_z_test_clear_difference() {
        // 90% vs 60% over 200 trials each
        let p = two_proportion_z_test(180, 200, 120, 200).unwrap();
        assert!(p < 0.001, "expected tiny p-value, got {}", p);
    }

    #[test]
    fn test_two_proportion_z_test_no_difference() {
        let p = two_proportion_z_test(50, 100, 50, 100).unwrap();
        assert!((p - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_two_proportion_z_test_degenerate() {
        assert!(two_proportion_z_test(0, 0, 5, 10).is_none());
        assert!(two_proportion_z_test(10, 10, 20, 20).is_none());
        assert!(two_proportion_z_test(0, 10, 0, 20).is_none());
    }

    #[test]
    fn test_normal_cdf() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 0.001);
        assert!(normal_cdf(3.0) > 0.998);
        assert!(normal_cdf(-3.0) < 0.002);
        assert!((normal_cdf(1.96) - 0.975).abs() < 0.001);
    }

    #[test]
    fn test_erf() {
        assert!((erf(0.0)).abs() < 0.001);
        assert!(erf(3.0) > 0.999);
        assert!(erf(-3.0) < -0.999);
    }

    #[test]
    fn test_compare_means_direction() {
        let control = summary(&[100.0, 110.0, 105.0, 95.0, 100.0, 105.0, 100.0, 95.0, 110.0, 100.0]);
        let treatment = summary(&[80.0, 85.0, 90.0, 75.0, 85.0, 80.0, 90.0, 85.0, 80.0, 85.0]);

        let sig = compare_means(&control, &treatment, 0.95).unwrap();

        assert_eq!(sig.test, SignificanceTest::WelchT);
        assert!(sig.p_value >= 0.0 && sig.p_value <= 1.0);
        assert!(sig.is_significant);
        assert!(sig.treatment_mean < sig.control_mean);
        assert!(sig.relative_change < 0.0);
    }

    #[test]
    fn test_compare_success_rates() {
        let sig = compare_success_rates(60, 100, 85, 100, 0.95).unwrap();

        assert_eq!(sig.test, SignificanceTest::TwoProportionZ);
        assert!(sig.is_significant);
        assert!((sig.control_mean - 0.6).abs() < 1e-12);
        assert!((sig.treatment_mean - 0.85).abs() < 1e-12);
    }
}
