//! Small dense-vector helpers used by the action policy.
//!
//! Embedding tables are tiny (a handful of rows), so everything here works on
//! plain `f32` slices instead of device tensors.

/// Euclidean length of `v`.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Returns `v` scaled to unit length. A zero vector is returned unchanged.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm = l2_norm(v);
    if norm > 0.0 && norm.is_finite() {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

/// Inner product. Both slices must have the same length.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Elementwise average of two equally sized vectors.
pub fn mean_pair(a: &[f32], b: &[f32]) -> Vec<f32> {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| (x + y) / 2.0).collect()
}

/// Index of the largest score. Ties resolve to the earliest index.
/// Returns `None` for an empty slice.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &s) in scores.iter().enumerate() {
        match best {
            Some((_, b)) if s <= b || s.is_nan() => {}
            _ => best = Some((i, s)),
        }
    }
    best.map(|(i, _)| i)
}
