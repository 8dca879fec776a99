pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// OLS slope of `ys` on `xs`. Zero when there are fewer than `min_samples`
/// points or the xs have no spread.
pub fn ols_slope(xs: &[f64], ys: &[f64], min_samples: usize) -> f64 {
    let n = xs.len().min(ys.len());
    if n == 0 || n < min_samples {
        return 0.0;
    }
    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;

    let mut num = 0.0_f64;
    let mut den = 0.0_f64;
    for (x, y) in xs.iter().zip(ys).take(n) {
        let dx = x - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    if den == 0.0 { 0.0 } else { num / den }
}

pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;

    let mut num = 0.0_f64;
    let mut den_x = 0.0_f64;
    let mut den_y = 0.0_f64;
    for (x, y) in xs.iter().zip(ys).take(n) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        num += dx * dy;
        den_x += dx * dx;
        den_y += dy * dy;
    }
    let den = (den_x * den_y).sqrt();
    if den == 0.0 || !den.is_finite() {
        return None;
    }
    Some(num / den)
}

/// 1 - SS_res / SS_tot. `None` when the observations have no variance.
pub fn r_squared(observed: &[f64], predicted: &[f64]) -> Option<f64> {
    let n = observed.len().min(predicted.len());
    let mean_obs = mean(&observed[..n])?;
    let mut ss_res = 0.0_f64;
    let mut ss_tot = 0.0_f64;
    for (o, p) in observed.iter().zip(predicted).take(n) {
        ss_res += (o - p).powi(2);
        ss_tot += (o - mean_obs).powi(2);
    }
    if ss_tot == 0.0 {
        return None;
    }
    Some(1.0 - ss_res / ss_tot)
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10.0_f64.powi(places);
    (value * scale).round() / scale
}

/// Ties go toward +inf (2.5 -> 3, -2.5 -> -2). Index values have always been
/// rounded this way, so stored ratings stay comparable.
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Cut point i is `sorted[floor(n * p_i / 100)]`. `sorted` must be ascending.
pub fn percentile_cut_points(sorted: &[f64], percentiles: &[f64]) -> Vec<f64> {
    if sorted.is_empty() {
        return Vec::new();
    }
    let n = sorted.len();
    percentiles
        .iter()
        .map(|p| {
            let idx = ((n as f64) * p / 100.0).floor() as usize;
            sorted[idx.min(n - 1)]
        })
        .collect()
}

/// Number of cut points the value is at or above; with k cuts the result lies
/// in `0..=k`, so the bins partition the whole line.
pub fn tier_for(value: f64, cuts: &[f64]) -> usize {
    cuts.iter().filter(|c| value >= **c).count()
}

pub fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slope_recovers_exact_line() {
        let xs: Vec<f64> = (0..20).map(|i| 60.0 + i as f64 * 0.25).collect();
        let ys: Vec<f64> = xs.iter().map(|x| -0.42 * x + 61.0).collect();
        let m = ols_slope(&xs, &ys, 2);
        assert!((m + 0.42).abs() < 1e-9);
    }

    #[test]
    fn slope_degenerate_cases_are_zero() {
        assert_eq!(ols_slope(&[1.0], &[2.0], 2), 0.0);
        assert_eq!(ols_slope(&[3.0, 3.0, 3.0], &[1.0, 2.0, 3.0], 2), 0.0);
        assert_eq!(ols_slope(&[], &[], 2), 0.0);
    }

    #[test]
    fn pearson_signs() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let up = [2.0, 4.0, 6.0, 8.0];
        let down = [8.0, 6.0, 4.0, 2.0];
        assert!((pearson(&xs, &up).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&xs, &down).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&xs, &[1.0, 1.0, 1.0, 1.0]), None);
    }

    #[test]
    fn half_up_rounding() {
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(-2.5), -2);
        assert_eq!(round_half_up(336.0009), 336);
        assert_eq!(round_half_up(-0.4), 0);
    }

    #[test]
    fn cut_points_use_floor_index() {
        let sorted: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let cuts = percentile_cut_points(&sorted, &[5.0, 15.0, 35.0, 65.0, 85.0, 95.0]);
        assert_eq!(cuts, vec![5.0, 15.0, 35.0, 65.0, 85.0, 95.0]);
        assert_eq!(tier_for(-1.0, &cuts), 0);
        assert_eq!(tier_for(5.0, &cuts), 1);
        assert_eq!(tier_for(99.0, &cuts), 6);
    }

    #[test]
    fn single_value_lands_in_top_bin() {
        let cuts = percentile_cut_points(&[0.7], &[5.0, 95.0]);
        assert_eq!(cuts, vec![0.7, 0.7]);
        assert_eq!(tier_for(0.7, &cuts), 2);
        assert!(percentile_cut_points(&[], &[5.0]).is_empty());
    }
}
