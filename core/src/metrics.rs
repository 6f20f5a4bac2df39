//! Evaluation metrics.

use crate::{
    error::{HeistError, HeistResult},
    types::Label,
};
use ndarray::ArrayView2;

/// Fraction of predictions equal to the truth.
pub fn accuracy(truth: &[Label], predicted: &[Label]) -> HeistResult<f64> {
    if truth.len() != predicted.len() {
        return Err(HeistError::LengthMismatch {
            left:  truth.len(),
            right: predicted.len(),
        });
    }
    if truth.is_empty() {
        return Err(HeistError::DegenerateTarget {
            reason: "accuracy of an empty set".into(),
        });
    }
    let hits = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    Ok(hits as f64 / truth.len() as f64)
}

/// Mean and population standard deviation.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Area under the ROC curve via the rank-sum statistic (ties averaged).
pub fn roc_auc_binary(positive: &[bool], scores: &[f64]) -> HeistResult<f64> {
    if positive.len() != scores.len() {
        return Err(HeistError::LengthMismatch {
            left:  positive.len(),
            right: scores.len(),
        });
    }
    let n_pos = positive.iter().filter(|&&p| p).count();
    let n_neg = positive.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(HeistError::DegenerateTarget {
            reason: "ROC AUC needs both positive and negative rows".into(),
        });
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based; tied block shares the average rank
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        rank_sum += order[i..=j].iter().filter(|&&k| positive[k]).count() as f64 * avg_rank;
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    Ok((rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64))
}

/// One-vs-rest ROC AUC per class present in `truth`, averaged with
/// class support as weights. `proba` columns follow `classes`.
pub fn roc_auc_weighted_ovr(
    truth: &[Label],
    proba: ArrayView2<'_, f64>,
    classes: &[Label],
) -> HeistResult<f64> {
    if truth.len() != proba.nrows() {
        return Err(HeistError::LengthMismatch {
            left:  truth.len(),
            right: proba.nrows(),
        });
    }
    if let Some(unknown) = truth.iter().find(|l| !classes.contains(l)) {
        return Err(HeistError::DegenerateTarget {
            reason: format!("label {unknown} is not among the model's classes"),
        });
    }

    let mut weighted = 0.0;
    let mut support_total = 0usize;
    for (col, class) in classes.iter().enumerate() {
        let positive: Vec<bool> = truth.iter().map(|l| l == class).collect();
        let support = positive.iter().filter(|&&p| p).count();
        if support == 0 {
            continue;
        }
        let scores = proba.column(col).to_vec();
        weighted += support as f64 * roc_auc_binary(&positive, &scores)?;
        support_total += support;
    }
    if support_total == 0 {
        return Err(HeistError::DegenerateTarget {
            reason: "no held-out row belongs to a scored class".to_string(),
        });
    }
    Ok(weighted / support_total as f64)
}
