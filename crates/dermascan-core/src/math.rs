//! Shared math utilities.

/// Numerically stable softmax: subtracts the max logit before exponentiating.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        exps.into_iter().map(|e| e / sum).collect()
    } else {
        vec![0.0; logits.len()]
    }
}

/// Index and value of the largest element. Ties resolve to the lowest index.
pub fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if v <= b => best,
            _ if v.is_nan() => best,
            _ => Some((i, v)),
        })
}

/// Convert a probability to a percentage rounded to 2 decimal places,
/// clamped to [0, 100].
pub fn to_percent(probability: f32) -> f64 {
    let pct = (f64::from(probability) * 100.0).clamp(0.0, 100.0);
    (pct * 100.0).round() / 100.0
}
