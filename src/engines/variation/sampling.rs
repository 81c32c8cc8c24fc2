use rand::Rng;

/// Index drawn proportionally to `weights`; `None` when nothing has positive weight.
pub fn weighted_index<R: Rng>(weights: &[f64], rng: &mut R) -> Option<usize> {
    let total: f64 = weights.iter().filter(|w| w.is_finite() && **w > 0.0).sum();
    if total <= 0.0 {
        return None;
    }

    let mut spin = rng.gen::<f64>() * total;
    let mut last_positive = None;
    for (i, &w) in weights.iter().enumerate() {
        if !(w.is_finite() && w > 0.0) {
            continue;
        }
        last_positive = Some(i);
        spin -= w;
        if spin < 0.0 {
            return Some(i);
        }
    }
    // rounding fallback
    last_positive
}

/// Picks from `internal` with probability `p_internal`, otherwise from `leaf`,
/// switching buckets when the chosen one is empty.
pub fn biased_pick<R: Rng, T: Copy>(internal: &[T], leaf: &[T], p_internal: f64, rng: &mut R) -> Option<T> {
    let prefer_internal = rng.gen::<f64>() < p_internal;
    let (first, second) = if prefer_internal {
        (internal, leaf)
    } else {
        (leaf, internal)
    };
    if !first.is_empty() {
        Some(first[rng.gen_range(0..first.len())])
    } else if !second.is_empty() {
        Some(second[rng.gen_range(0..second.len())])
    } else {
        None
    }
}
