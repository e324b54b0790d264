//! Welch's two-sample t-test (unequal variances) with a Student-t tail computed
//! from the regularised incomplete beta function.

use std::f64::consts::PI;

use super::descriptive::{mean, sample_variance};

/// Welch t-test result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TTestResult {
    pub t_statistic: f64,
    pub degrees_of_freedom: f64,
    /// Two-sided p-value; NaN when a sample has fewer than two values
    pub p_value: f64,
}

impl TTestResult {
    /// Null hypothesis of equal means rejected at level `alpha`
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// Two-sided Welch t-test of equal means.
///
/// When both samples have zero variance the test degenerates: equal means give
/// p = 1, different means give p = 0.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> TTestResult {
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    if a.len() < 2 || b.len() < 2 {
        return TTestResult {
            t_statistic: f64::NAN,
            degrees_of_freedom: f64::NAN,
            p_value: f64::NAN,
        };
    }

    let (m1, m2) = (mean(a), mean(b));
    let se1 = sample_variance(a) / n1;
    let se2 = sample_variance(b) / n2;
    let se = se1 + se2;

    if se == 0.0 {
        let (t_statistic, p_value) = if m1 == m2 {
            (0.0, 1.0)
        } else {
            ((m1 - m2).signum() * f64::INFINITY, 0.0)
        };
        return TTestResult {
            t_statistic,
            degrees_of_freedom: n1 + n2 - 2.0,
            p_value,
        };
    }

    let t_statistic = (m1 - m2) / se.sqrt();
    let degrees_of_freedom = se * se / (se1 * se1 / (n1 - 1.0) + se2 * se2 / (n2 - 1.0));

    TTestResult {
        t_statistic,
        degrees_of_freedom,
        p_value: student_t_two_sided(t_statistic, degrees_of_freedom),
    }
}

/// P(|T| >= |t|) for a Student-t variable with `df` degrees of freedom
pub fn student_t_two_sided(t: f64, df: f64) -> f64 {
    if t.is_nan() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    let x = df / (df + t * t);
    regularized_incomplete_beta(df / 2.0, 0.5, x).clamp(0.0, 1.0)
}

fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_front =
        ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();

    // The continued fraction converges fastest on this side of the mode
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

/// Modified Lentz evaluation of the incomplete beta continued fraction
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITERATIONS: usize = 1000;
    const EPSILON: f64 = 1e-15;
    const TINY: f64 = 1e-300;

    let guard = |v: f64| if v.abs() < TINY { TINY } else { v };

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 / guard(1.0 - qab * x / qap);
    let mut h = d;

    for m in 1..=MAX_ITERATIONS {
        let m = m as f64;
        let m2 = 2.0 * m;

        let even = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 / guard(1.0 + even * d);
        c = guard(1.0 + even / c);
        h *= d * c;

        let odd = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 / guard(1.0 + odd * d);
        c = guard(1.0 + odd / c);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPSILON {
            break;
        }
    }

    h
}

/// Lanczos approximation of ln Γ(x)
fn ln_gamma(x: f64) -> f64 {
    const COEFFICIENTS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        // Reflection formula
        return PI.ln() - (PI * x).sin().abs().ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let t = x + 7.5;
    let mut series = COEFFICIENTS[0];
    for (i, &c) in COEFFICIENTS.iter().enumerate().skip(1) {
        series += c / (x + i as f64);
    }

    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ln_gamma_factorials() {
        assert!((ln_gamma(1.0)).abs() < 1e-12);
        assert!((ln_gamma(5.0) - 24.0_f64.ln()).abs() < 1e-10);
        assert!((ln_gamma(0.5) - PI.sqrt().ln()).abs() < 1e-10);
    }

    #[test]
    fn test_student_t_known_tails() {
        // Cauchy: P(|T| > 1) = 0.5
        assert!((student_t_two_sided(1.0, 1.0) - 0.5).abs() < 1e-9);
        // df = 2 has a closed form: 1 - t / sqrt(2 + t^2)
        let expected = 1.0 - 2.0 / 6.0_f64.sqrt();
        assert!((student_t_two_sided(2.0, 2.0) - expected).abs() < 1e-9);
        // Large df approaches the normal tail
        assert!((student_t_two_sided(1.959_963_985, 1e4) - 0.05).abs() < 1e-4);
        assert!((student_t_two_sided(0.0, 5.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_welch_statistic_and_df() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [2.0, 4.0, 6.0, 8.0, 10.0];
        let result = welch_t_test(&a, &b);
        assert!((result.t_statistic + 3.0 / 2.5_f64.sqrt()).abs() < 1e-12);
        assert!((result.degrees_of_freedom - 6.25 / 1.0625).abs() < 1e-12);
        assert!(result.p_value > 0.05 && result.p_value < 0.2);
        assert!(!result.is_significant(0.05));
    }

    #[test]
    fn test_welch_is_symmetric() {
        let a = [0.3, 1.2, 0.7, 0.9];
        let b = [1.1, 1.9, 1.4, 2.2, 1.6];
        let ab = welch_t_test(&a, &b);
        let ba = welch_t_test(&b, &a);
        assert!((ab.t_statistic + ba.t_statistic).abs() < 1e-12);
        assert!((ab.p_value - ba.p_value).abs() < 1e-12);
    }

    #[test]
    fn test_welch_degenerate_cases() {
        let same = welch_t_test(&[2.0, 2.0, 2.0], &[2.0, 2.0]);
        assert_eq!(same.p_value, 1.0);
        assert!(!same.is_significant(0.05));

        let apart = welch_t_test(&[2.0, 2.0, 2.0], &[5.0, 5.0]);
        assert_eq!(apart.p_value, 0.0);
        assert!(apart.is_significant(0.05));

        let too_small = welch_t_test(&[1.0], &[1.0, 2.0]);
        assert!(too_small.p_value.is_nan());
        assert!(!too_small.is_significant(0.05));
    }
}
