//! Small numeric reductions used across the pipeline.
//!
//! Variance is always computed in two passes (mean first, then squared
//! deviations) so long sessions with large absolute timestamps stay stable.

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn sum_sq_dev(values: &[f64], m: f64) -> f64 {
    values.iter().map(|v| (v - m) * (v - m)).sum()
}

/// Population standard deviation (divides by n).
pub fn std_population(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    Some((sum_sq_dev(values, m) / values.len() as f64).sqrt())
}

/// Sample standard deviation (divides by n - 1); needs two values.
pub fn std_sample(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    Some((sum_sq_dev(values, m) / (values.len() - 1) as f64).sqrt())
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Slope of the degree-1 least-squares fit of `ys` against `xs`.
pub fn linear_slope(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx) * (x - mx);
    }
    if sxx == 0.0 {
        return None;
    }
    Some(sxy / sxx)
}

/// Rolling sample standard deviation. A window yields `None` until it holds
/// `window` samples, and whenever one of them is missing.
pub fn rolling_std(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 {
        return out;
    }
    let mut buf = Vec::with_capacity(window);
    for i in (window - 1)..values.len() {
        buf.clear();
        buf.extend(values[i + 1 - window..=i].iter().flatten());
        if buf.len() == window {
            out[i] = if window == 1 { Some(0.0) } else { std_sample(&buf) };
        }
    }
    out
}

/// Rounds to `places` decimal digits.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
