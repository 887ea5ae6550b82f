//! Special functions for fitting and goodness-of-fit.
//!
//! Numerical approximations backing the distribution CDFs, the maximum
//! likelihood fitters, and the Kolmogorov–Smirnov goodness-of-fit test.

/// √(2π) ≈ 2.5066282746310002
const SQRT_2PI: f64 = 2.506_628_274_631_000_2;

/// Standard normal CDF Φ(x) = P(Z ≤ x) for Z ~ N(0,1).
///
/// # Algorithm
/// Hart's double-precision rational approximation (as arranged by West)
/// for |x| < 5√2, and a continued fraction in the far tail.
///
/// Reference: West (2005), "Better approximations to cumulative normal
/// functions", *Wilmott Magazine*, pp. 70–76.
///
/// # Accuracy
/// Absolute error below 1e-14 across the real line.
///
/// # Examples
/// ```
/// use u_costsim::special::standard_normal_cdf;
/// assert!((standard_normal_cdf(0.0) - 0.5).abs() < 1e-14);
/// assert!((standard_normal_cdf(1.96) - 0.975).abs() < 1e-4);
/// ```
pub fn standard_normal_cdf(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    let abs_x = x.abs();
    let tail = if abs_x > 37.0 {
        0.0
    } else {
        let exponential = (-0.5 * abs_x * abs_x).exp();
        if abs_x < 7.071_067_811_865_47 {
            let num = (((((0.035_262_496_599_891_1 * abs_x + 0.700_383_064_443_688) * abs_x
                + 6.373_962_203_531_65)
                * abs_x
                + 33.912_866_078_383)
                * abs_x
                + 112.079_291_497_871)
                * abs_x
                + 221.213_596_169_931)
                * abs_x
                + 220.206_867_912_376;
            let den = ((((((0.088_388_347_648_318_4 * abs_x + 1.755_667_163_182_64)
                * abs_x
                + 16.064_177_579_207)
                * abs_x
                + 86.780_732_202_946_1)
                * abs_x
                + 296.564_248_779_674)
                * abs_x
                + 637.333_633_378_831)
                * abs_x
                + 793.826_512_519_948)
                * abs_x
                + 440.413_735_824_752;
            exponential * num / den
        } else {
            let mut cf = abs_x + 0.65;
            cf = abs_x + 4.0 / cf;
            cf = abs_x + 3.0 / cf;
            cf = abs_x + 2.0 / cf;
            cf = abs_x + 1.0 / cf;
            exponential / cf / SQRT_2PI
        }
    };
    if x > 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

/// Lanczos approximation of ln Γ(x) (g = 7, nine terms).
///
/// Reference: Lanczos (1964), *SIAM Journal on Numerical Analysis* 1(1).
///
/// # Examples
/// ```
/// use u_costsim::special::ln_gamma;
/// // Γ(6) = 120
/// assert!((ln_gamma(6.0) - 120.0_f64.ln()).abs() < 1e-10);
/// ```
pub fn ln_gamma(x: f64) -> f64 {
    #[allow(clippy::excessive_precision)]
    const LANCZOS: [f64; 9] = [
        0.99999999999980993,
        676.5203681218851,
        -1259.1392167224028,
        771.32342877765313,
        -176.61502916214059,
        12.507343278686905,
        -0.13857109526572012,
        9.9843695780195716e-6,
        1.5056327351493116e-7,
    ];
    const G: f64 = 7.0;

    if x < 0.5 {
        // Reflection: Γ(x)Γ(1−x) = π / sin(πx)
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let z = x - 1.0;
    let series = LANCZOS[1..]
        .iter()
        .enumerate()
        .fold(LANCZOS[0], |acc, (i, &c)| acc + c / (z + i as f64 + 1.0));
    let t = z + G + 0.5;
    SQRT_2PI.ln() + (z + 0.5) * t.ln() - t + series.ln()
}

/// Digamma function ψ(x) = d/dx ln Γ(x), for x > 0.
///
/// Shifts the argument above 10 with ψ(x) = ψ(x+1) − 1/x, then applies
/// the asymptotic Bernoulli expansion.
///
/// Returns `f64::NAN` for non-positive or NaN input.
pub fn digamma(x: f64) -> f64 {
    if x.is_nan() || x <= 0.0 {
        return f64::NAN;
    }
    let mut z = x;
    let mut shift = 0.0;
    while z < 10.0 {
        shift -= 1.0 / z;
        z += 1.0;
    }
    let inv = 1.0 / z;
    let inv2 = inv * inv;
    let series = inv2
        * (1.0 / 12.0
            - inv2 * (1.0 / 120.0 - inv2 * (1.0 / 252.0 - inv2 * (1.0 / 240.0 - inv2 / 132.0))));
    shift + z.ln() - 0.5 * inv - series
}

/// Trigamma function ψ′(x), for x > 0.
///
/// Same shift-then-expand scheme as [`digamma`], using
/// ψ′(x) = ψ′(x+1) + 1/x².
pub fn trigamma(x: f64) -> f64 {
    if x.is_nan() || x <= 0.0 {
        return f64::NAN;
    }
    let mut z = x;
    let mut shift = 0.0;
    while z < 10.0 {
        shift += 1.0 / (z * z);
        z += 1.0;
    }
    let inv = 1.0 / z;
    let inv2 = inv * inv;
    let series = inv
        + inv2 / 2.0
        + inv * inv2
            * (1.0 / 6.0
                - inv2 * (1.0 / 30.0 - inv2 * (1.0 / 42.0 - inv2 * (1.0 / 30.0 - inv2 * 5.0 / 66.0))));
    shift + series
}

/// ln B(a, b) = ln Γ(a) + ln Γ(b) − ln Γ(a+b).
pub fn ln_beta(a: f64, b: f64) -> f64 {
    ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b)
}

/// Regularized incomplete beta function I_x(a, b).
///
/// Evaluated by Lentz's continued fraction, switching to the symmetric
/// form I_x(a,b) = 1 − I_{1−x}(b,a) where that converges faster.
///
/// Reference: Press et al. (2007), *Numerical Recipes*, 3rd ed., §6.4.
///
/// # Examples
/// ```
/// use u_costsim::special::regularized_incomplete_beta;
/// // I_x(1, 1) = x
/// assert!((regularized_incomplete_beta(0.3, 1.0, 1.0) - 0.3).abs() < 1e-10);
/// ```
pub fn regularized_incomplete_beta(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    if x > (a + 1.0) / (a + b + 2.0) {
        return 1.0 - regularized_incomplete_beta(1.0 - x, b, a);
    }
    let ln_front = a * x.ln() + b * (1.0 - x).ln() - ln_beta(a, b);
    ln_front.exp() / a * incomplete_beta_cf(x, a, b)
}

fn incomplete_beta_cf(x: f64, a: f64, b: f64) -> f64 {
    const MAX_ITER: usize = 300;
    const EPS: f64 = 1e-14;
    const TINY: f64 = 1e-30;

    let guard = |v: f64| if v.abs() < TINY { TINY } else { v };

    let mut c = 1.0;
    let mut d = 1.0 / guard(1.0 - (a + b) * x / (a + 1.0));
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let two_m = 2.0 * m;

        let even = m * (b - m) * x / ((a + two_m - 1.0) * (a + two_m));
        d = 1.0 / guard(1.0 + even * d);
        c = guard(1.0 + even / c);
        h *= d * c;

        let odd = -(a + m) * (a + b + m) * x / ((a + two_m) * (a + two_m + 1.0));
        d = 1.0 / guard(1.0 + odd * d);
        c = guard(1.0 + odd / c);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Regularized lower incomplete gamma function P(a, x) = γ(a, x) / Γ(a).
///
/// Series expansion below `a + 1`, Lentz continued fraction for the
/// upper function above it.
///
/// # Examples
/// ```
/// use u_costsim::special::regularized_lower_gamma;
/// // P(1, x) is the unit exponential CDF
/// let p = regularized_lower_gamma(1.0, 0.7);
/// assert!((p - (1.0 - (-0.7_f64).exp())).abs() < 1e-10);
/// ```
pub fn regularized_lower_gamma(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x < a + 1.0 {
        lower_gamma_series(a, x)
    } else {
        1.0 - upper_gamma_cf(a, x)
    }
}

fn lower_gamma_series(a: f64, x: f64) -> f64 {
    let mut denom = a;
    let mut term = 1.0 / a;
    let mut sum = term;
    for _ in 0..500 {
        denom += 1.0;
        term *= x / denom;
        sum += term;
        if term.abs() < sum.abs() * 1e-15 {
            break;
        }
    }
    (sum.ln() - x + a * x.ln() - ln_gamma(a)).exp()
}

fn upper_gamma_cf(a: f64, x: f64) -> f64 {
    const TINY: f64 = 1e-30;
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / TINY;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..=500 {
        let i = i as f64;
        let an = -i * (i - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < TINY {
            d = TINY;
        }
        c = b + an / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < 1e-15 {
            break;
        }
    }
    h * (-x + a * x.ln() - ln_gamma(a)).exp()
}

/// Survival function of the Kolmogorov distribution, Q(λ) = P(K > λ).
///
/// Used to turn a KS distance into an asymptotic p-value.
///
/// # Algorithm
/// For small λ the Jacobi-theta form
/// `1 − (√(2π)/λ) Σ exp(−(2k−1)²π²/(8λ²))` converges fastest; otherwise
/// the alternating series `2 Σ (−1)^{k−1} exp(−2k²λ²)` is used.
///
/// Reference: Marsaglia, Tsang & Wang (2003), "Evaluating Kolmogorov's
/// Distribution", *Journal of Statistical Software* 8(18).
pub fn kolmogorov_survival(lambda: f64) -> f64 {
    if lambda.is_nan() {
        return f64::NAN;
    }
    if lambda <= 0.0 {
        return 1.0;
    }
    if lambda < 1.18 {
        let pi2 = std::f64::consts::PI * std::f64::consts::PI;
        let scale = -pi2 / (8.0 * lambda * lambda);
        let mut sum = 0.0;
        for k in 1..=20 {
            let odd = (2 * k - 1) as f64;
            let term = (scale * odd * odd).exp();
            sum += term;
            if term < 1e-17 {
                break;
            }
        }
        (1.0 - SQRT_2PI / lambda * sum).clamp(0.0, 1.0)
    } else {
        let mut sum = 0.0;
        let mut sign = 1.0;
        for k in 1..=100 {
            let kf = k as f64;
            let term = (-2.0 * kf * kf * lambda * lambda).exp();
            sum += sign * term;
            if term < 1e-17 {
                break;
            }
            sign = -sign;
        }
        (2.0 * sum).clamp(0.0, 1.0)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(400))]

        #[test]
        fn normal_cdf_symmetric(x in 0.0_f64..10.0) {
            let sum = standard_normal_cdf(x) + standard_normal_cdf(-x);
            prop_assert!((sum - 1.0).abs() < 1e-13);
        }

        #[test]
        fn lower_gamma_in_unit_interval(a in 0.2_f64..200.0, x in 0.0_f64..400.0) {
            let p = regularized_lower_gamma(a, x);
            prop_assert!((-1e-12..=1.0 + 1e-12).contains(&p), "P({a},{x}) = {p}");
        }

        #[test]
        fn incomplete_beta_in_unit_interval(x in 0.001_f64..0.999, a in 0.3_f64..50.0, b in 0.3_f64..50.0) {
            let v = regularized_incomplete_beta(x, a, b);
            prop_assert!((-1e-12..=1.0 + 1e-12).contains(&v), "I_{x}({a},{b}) = {v}");
        }

        #[test]
        fn kolmogorov_survival_decreasing(l1 in 0.05_f64..3.0, l2 in 0.05_f64..3.0) {
            let (lo, hi) = if l1 <= l2 { (l1, l2) } else { (l2, l1) };
            prop_assert!(kolmogorov_survival(lo) + 1e-9 >= kolmogorov_survival(hi));
        }
    }
}
