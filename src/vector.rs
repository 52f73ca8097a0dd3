//! Small dense-vector helpers shared by the trainer, the ranker and the queue.

/// Cosine similarity in `[-1, 1]`; 0 when either vector has zero norm.
///
/// Mismatched lengths compare the common prefix.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0_f64, 0.0_f64, 0.0_f64), |(dot, na, nb), (&x, &y)| {
            let (x, y) = (f64::from(x), f64::from(y));
            (dot + x * y, na + x * x, nb + y * y)
        });

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

/// Scale to unit length in place. Zero vectors are left alone.
pub fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|&v| f64::from(v) * f64::from(v)).sum::<f64>().sqrt();
    if norm > 0.0 {
        for v in vec.iter_mut() {
            *v = (f64::from(*v) / norm) as f32;
        }
    }
}

/// Round every component to `decimals` places.
pub fn round_components(vec: &[f32], decimals: i32) -> Vec<f32> {
    let factor = 10_f32.powi(decimals);
    vec.iter().map(|v| (v * factor).round() / factor).collect()
}

/// Move row `target` toward row `context` by `rate`, returning the cosine
/// similarity the pair had before the step.
///
/// `target == context` is a no-op with similarity 1 (or 0 for a zero row).
pub fn pull_toward(rows: &mut [Vec<f32>], target: usize, context: usize, rate: f32) -> f64 {
    if target == context {
        return cosine_similarity(&rows[target], &rows[context]);
    }

    let (target_row, context_row) = if target < context {
        let (head, tail) = rows.split_at_mut(context);
        (&mut head[target], &tail[0])
    } else {
        let (head, tail) = rows.split_at_mut(target);
        (&mut tail[0], &head[context])
    };

    let similarity = cosine_similarity(target_row, context_row);
    for (t, &c) in target_row.iter_mut().zip(context_row.iter()) {
        *t += rate * (c - *t);
    }
    similarity
}
