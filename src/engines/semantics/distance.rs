//! Type-aware distances between traced value sequences.

use super::snapshot::{SemanticSnapshot, VariableType};
use serde_json::Value;

/// Edit distance over Unicode scalar values.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

fn mismatch(a: &Value, b: &Value) -> f64 {
    if a == b {
        0.0
    } else {
        1.0
    }
}

/// Distance between two observed values of one case.
pub fn value_distance(a: &Value, b: &Value, variable_type: VariableType) -> f64 {
    match variable_type {
        VariableType::Bool => mismatch(a, b),
        VariableType::Int | VariableType::Float => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs(),
            _ => mismatch(a, b),
        },
        VariableType::Char | VariableType::String => match (a.as_str(), b.as_str()) {
            (Some(x), Some(y)) => levenshtein(x, y) as f64,
            _ => mismatch(a, b),
        },
        VariableType::ListBool | VariableType::ListInt | VariableType::ListFloat | VariableType::ListString => {
            match (a.as_array(), b.as_array()) {
                (Some(xs), Some(ys)) => {
                    let element = variable_type.element();
                    let common: f64 = xs.iter().zip(ys).map(|(x, y)| value_distance(x, y, element)).sum();
                    common + xs.len().abs_diff(ys.len()) as f64
                }
                _ => mismatch(a, b),
            }
        }
    }
}

/// Sum of per-case distances, or `None` when the case counts differ.
pub fn sequence_distance(baseline: &[Value], candidate: &[Value], variable_type: VariableType) -> Option<f64> {
    if baseline.len() != candidate.len() {
        return None;
    }
    Some(
        baseline
            .iter()
            .zip(candidate)
            .map(|(a, b)| value_distance(a, b, variable_type))
            .sum(),
    )
}

/// Per-candidate distances from `baseline` on one variable, scaled into `[0, 1]`.
///
/// Failed candidates (`None`) stay `None`. A missing trace or a case count
/// mismatch scores 1. Raw scores are divided by the largest raw score.
pub fn normalized_distances(
    baseline: &SemanticSnapshot,
    candidates: &[Option<&SemanticSnapshot>],
    variable: &str,
    variable_type: VariableType,
) -> Vec<Option<f64>> {
    let raw: Vec<Option<Option<f64>>> = candidates
        .iter()
        .map(|candidate| {
            candidate.map(|snapshot| match (baseline.get(variable), snapshot.get(variable)) {
                (Some(a), Some(b)) => sequence_distance(a, b, variable_type),
                (None, None) => Some(0.0),
                _ => None,
            })
        })
        .collect();

    let max = raw
        .iter()
        .flatten()
        .flatten()
        .copied()
        .filter(|d| d.is_finite())
        .fold(0.0_f64, f64::max);

    raw.into_iter()
        .map(|entry| {
            entry.map(|distance| match distance {
                Some(d) if !d.is_finite() => 1.0,
                Some(d) if max > 0.0 => d / max,
                Some(_) => 0.0,
                None => 1.0,
            })
        })
        .collect()
}

/// Mean normalized distance over a group of variables, per candidate.
pub fn group_distances(
    baseline: &SemanticSnapshot,
    candidates: &[Option<&SemanticSnapshot>],
    variables: &[(String, VariableType)],
) -> Vec<Option<f64>> {
    let mut totals: Vec<Option<f64>> = candidates.iter().map(|c| c.map(|_| 0.0)).collect();
    if variables.is_empty() {
        return totals;
    }
    for (name, variable_type) in variables {
        let scores = normalized_distances(baseline, candidates, name, *variable_type);
        for (total, score) in totals.iter_mut().zip(scores) {
            if let (Some(t), Some(s)) = (total.as_mut(), score) {
                *t += s;
            }
        }
    }
    let count = variables.len() as f64;
    totals.into_iter().map(|t| t.map(|sum| sum / count)).collect()
}

/// Index of the smallest strictly positive score; the earliest wins ties.
pub fn closest_different(scores: &[Option<f64>]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, score) in scores.iter().enumerate() {
        let Some(s) = *score else { continue };
        if s <= 0.0 {
            continue;
        }
        match best {
            Some((_, b)) if s >= b => {}
            _ => best = Some((i, s)),
        }
    }
    best.map(|(i, _)| i)
}
