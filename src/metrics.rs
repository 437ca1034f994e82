//! Partition evaluation metrics.
//!
//! Scores a predicted segmentation against ground truth, point by point.
//! Used by the threshold sweep to pick an operating point.
//!
//! | Metric | Range | Best | Notes |
//! |--------|-------|------|-------|
//! | [`pairwise_fscore`] | [0, 1] | 1 | Harmonic precision/recall over co-clustered pairs |
//! | [`variation_of_information`] | [0, ∞) | 0 | Information distance between partitions |
//! | [`weighted_overlap`] | [0, 1] | 1 | Size-weighted best overlap per ground-truth region |
//!
//! # References
//!
//! - Meilă (2007). "Comparing clusterings — an information based distance"
//! - Verdoja, Thomas & Frisoli (2017). "Fast 3D point cloud segmentation
//!   using supervoxels with geometry and color for 3D scene understanding"

use std::collections::HashMap;

/// Scores of one partition against ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Performance {
    /// Pairwise F-score, higher is better.
    pub fscore: f64,
    /// Variation of information, lower is better.
    pub voi: f64,
    /// Weighted overlap, higher is better.
    pub wov: f64,
}

/// Evaluate all metrics at once.
pub fn evaluate(pred: &[usize], truth: &[usize]) -> Performance {
    Performance {
        fscore: pairwise_fscore(pred, truth),
        voi: variation_of_information(pred, truth),
        wov: weighted_overlap(pred, truth),
    }
}

/// Pairwise F-score: precision and recall over point pairs placed in the
/// same cluster, combined harmonically.
pub fn pairwise_fscore(pred: &[usize], truth: &[usize]) -> f64 {
    let Some((joint, _n)) = contingency(pred, truth) else {
        return 0.0;
    };

    let choose2 = |c: usize| (c * c.saturating_sub(1)) as f64 / 2.0;

    let mut pred_sizes: HashMap<usize, usize> = HashMap::new();
    let mut truth_sizes: HashMap<usize, usize> = HashMap::new();
    for &p in pred {
        *pred_sizes.entry(p).or_insert(0) += 1;
    }
    for &t in truth {
        *truth_sizes.entry(t).or_insert(0) += 1;
    }

    let tp: f64 = joint.values().map(|&c| choose2(c)).sum();
    let pred_pairs: f64 = pred_sizes.values().map(|&c| choose2(c)).sum();
    let truth_pairs: f64 = truth_sizes.values().map(|&c| choose2(c)).sum();

    if pred_pairs == 0.0 || truth_pairs == 0.0 {
        return 0.0;
    }
    let precision = tp / pred_pairs;
    let recall = tp / truth_pairs;
    if precision + recall == 0.0 {
        return 0.0;
    }
    2.0 * precision * recall / (precision + recall)
}

/// Variation of information: `H(pred) + H(truth) − 2·I(pred; truth)`, in
/// nats. Zero iff the partitions are identical up to relabeling.
pub fn variation_of_information(pred: &[usize], truth: &[usize]) -> f64 {
    let Some((joint, n)) = contingency(pred, truth) else {
        return 0.0;
    };
    let n_f = n as f64;

    let h = |counts: &HashMap<usize, usize>| -> f64 {
        counts
            .values()
            .map(|&c| {
                let p = c as f64 / n_f;
                -p * p.ln()
            })
            .sum()
    };

    let mut pred_sizes: HashMap<usize, usize> = HashMap::new();
    let mut truth_sizes: HashMap<usize, usize> = HashMap::new();
    for &p in pred {
        *pred_sizes.entry(p).or_insert(0) += 1;
    }
    for &t in truth {
        *truth_sizes.entry(t).or_insert(0) += 1;
    }

    let mut mutual = 0.0;
    for (&(i, j), &c) in &joint {
        let p_ij = c as f64 / n_f;
        let p_i = pred_sizes[&i] as f64 / n_f;
        let p_j = truth_sizes[&j] as f64 / n_f;
        mutual += p_ij * (p_ij / (p_i * p_j)).ln();
    }

    (h(&pred_sizes) + h(&truth_sizes) - 2.0 * mutual).max(0.0)
}

/// Weighted overlap: every ground-truth region contributes the fraction of
/// its points captured by its best-matching predicted region, weighted by
/// region size. Equals `(1/n) · Σ_j max_i |pred_i ∩ truth_j|`.
pub fn weighted_overlap(pred: &[usize], truth: &[usize]) -> f64 {
    let Some((joint, n)) = contingency(pred, truth) else {
        return 0.0;
    };

    let mut best: HashMap<usize, usize> = HashMap::new();
    for (&(_, j), &c) in &joint {
        let entry = best.entry(j).or_insert(0);
        if c > *entry {
            *entry = c;
        }
    }

    best.values().sum::<usize>() as f64 / n as f64
}

/// Joint label counts. `None` for empty or mismatched inputs.
fn contingency(pred: &[usize], truth: &[usize]) -> Option<(HashMap<(usize, usize), usize>, usize)> {
    if pred.is_empty() || pred.len() != truth.len() {
        return None;
    }
    let mut joint = HashMap::new();
    for (&p, &t) in pred.iter().zip(truth.iter()) {
        *joint.entry((p, t)).or_insert(0) += 1;
    }
    Some((joint, pred.len()))
}
