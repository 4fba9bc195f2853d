//! In-process scoring of feature vectors against a parsed linear model
//!
//! All entry points compute `-b + Σ w[i] * x[i]` in the same order: the
//! negated threshold first, then one accumulation per feature present in both
//! the input and the model, by ascending feature id. This matches the order
//! used by `svm_perf_classify`, so scores agree bit-for-bit across the sparse
//! and dense representations.

use crate::core::{Contribution, Result, SparseFeatures, SvmPerfError, WeightMap, THRESHOLD_ID};

/// Score a sparse feature vector.
///
/// Input features that have no weight in the model contribute nothing.
///
/// # Errors
/// `InvalidModel` if the model has no threshold, `InvalidInput` if the input
/// contains feature 0.
pub fn score_sparse(input: &SparseFeatures, model: &WeightMap) -> Result<f64> {
    let threshold = threshold_of(model)?;
    check_input(input)?;

    let mut result = -threshold;
    for (&feature, &value) in input {
        if let Some(weight) = model.get(feature) {
            result += weight * value;
        }
    }
    Ok(result)
}

/// Score a dense feature vector indexed by feature id.
///
/// Index 0 mirrors the threshold slot and is never read. Works for any element
/// type losslessly convertible to `f64`, so integer and float arrays holding
/// the same values give identical scores.
///
/// # Errors
/// `InvalidModel` if the model has no threshold.
pub fn score_dense<T: Copy + Into<f64>>(input: &[T], model: &WeightMap) -> Result<f64> {
    let threshold = threshold_of(model)?;

    let mut result = -threshold;
    for (feature, &value) in input.iter().enumerate().skip(1) {
        if let Some(weight) = model.get(feature) {
            result += weight * value.into();
        }
    }
    Ok(result)
}

/// The `limit` largest feature contributions to the score of `input`, by
/// absolute relevance.
pub fn explain(input: &SparseFeatures, model: &WeightMap, limit: usize) -> Result<Vec<Contribution>> {
    threshold_of(model)?;
    check_input(input)?;

    let mut contributions: Vec<Contribution> = input
        .iter()
        .filter_map(|(&feature, &value)| {
            model.get(feature).map(|weight| Contribution {
                feature,
                value,
                weight,
                relevance: weight * value,
            })
        })
        .collect();

    contributions.sort_by(|a, b| b.relevance.abs().total_cmp(&a.relevance.abs()));
    contributions.truncate(limit);
    Ok(contributions)
}

/// Convert a dense vector (index 0 unused) to sparse form, dropping zeros
pub fn sparse_from_dense<T: Copy + Into<f64>>(input: &[T]) -> SparseFeatures {
    input
        .iter()
        .enumerate()
        .skip(1)
        .map(|(feature, &value)| (feature, value.into()))
        .filter(|&(_, value)| value != 0.0)
        .collect()
}

fn threshold_of(model: &WeightMap) -> Result<f64> {
    model.threshold().ok_or_else(|| {
        SvmPerfError::InvalidModel(format!(
            "model has no threshold value (feature {THRESHOLD_ID}) among its {} entries",
            model.len()
        ))
    })
}

fn check_input(input: &SparseFeatures) -> Result<()> {
    if input.contains_key(&THRESHOLD_ID) {
        return Err(SvmPerfError::InvalidInput(format!(
            "input contains reserved feature {THRESHOLD_ID}: {input:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_model;
    use approx::assert_relative_eq;

    fn reference_model() -> WeightMap {
        vec![(0, 0.21428571), (20, 0.5714286), (10, -0.21428572), (30, -0.5)]
            .into_iter()
            .collect()
    }

    fn features(pairs: &[(usize, f64)]) -> SparseFeatures {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_score_sparse_reference_sample() {
        let model = reference_model();
        let input = features(&[(10, 1.0), (20, 1.0), (30, 1.0), (40, 1.0)]);

        let score = score_sparse(&input, &model).unwrap();
        let expected = -0.21428571 + -0.21428572 + 0.5714286 + -0.5;
        assert_eq!(score, expected);
        assert_relative_eq!(score, -0.35714283, epsilon = 1e-9);
    }

    #[test]
    fn test_representations_agree() {
        let model: WeightMap = vec![(0, 0.3), (1, 0.125), (2, -1.75), (4, 3.0e-3), (7, 0.9)]
            .into_iter()
            .collect();

        let ints: Vec<i32> = vec![0, 3, -2, 0, 11, 5, 1, 4, 9];
        let floats: Vec<f32> = ints.iter().map(|&v| v as f32).collect();
        let doubles: Vec<f64> = ints.iter().map(|&v| f64::from(v)).collect();
        let sparse = sparse_from_dense(&ints);

        let from_ints = score_dense(&ints, &model).unwrap();
        let from_floats = score_dense(&floats, &model).unwrap();
        let from_doubles = score_dense(&doubles, &model).unwrap();
        let from_sparse = score_sparse(&sparse, &model).unwrap();

        assert_eq!(from_ints, from_floats);
        assert_eq!(from_floats, from_doubles);
        assert_eq!(from_doubles, from_sparse);
    }

    #[test]
    fn test_dense_ignores_index_zero() {
        let model = reference_model();
        let mut input = vec![0.0f64; 41];
        input[10] = 1.0;
        input[20] = 1.0;

        let baseline = score_dense(&input, &model).unwrap();
        input[0] = 1_000.0;
        assert_eq!(score_dense(&input, &model).unwrap(), baseline);
    }

    #[test]
    fn test_dense_length_bounds_features() {
        let model = reference_model();
        // Only ids 1..=15 are visible, so just feature 10 contributes
        let input = vec![1u8; 16];
        let score = score_dense(&input, &model).unwrap();
        assert_eq!(score, -0.21428571 + -0.21428572);
    }

    #[test]
    fn test_bias_only_model() {
        let model = parse_model("0.75 # threshold b\n1 #\n").unwrap();

        assert_eq!(score_sparse(&features(&[(1, 4.0), (9, -2.0)]), &model).unwrap(), -0.75);
        assert_eq!(score_sparse(&SparseFeatures::new(), &model).unwrap(), -0.75);
        assert_eq!(score_dense(&[0i32, 5, 6, 7], &model).unwrap(), -0.75);
    }

    #[test]
    fn test_missing_feature_contributes_nothing() {
        let model = reference_model();
        let with_unknown = score_sparse(&features(&[(5, 100.0)]), &model).unwrap();
        let empty = score_sparse(&SparseFeatures::new(), &model).unwrap();
        assert_eq!(with_unknown, empty);
    }

    #[test]
    fn test_model_without_threshold_rejected() {
        let model: WeightMap = vec![(10, 1.0), (20, 2.0)].into_iter().collect();

        let sparse = score_sparse(&features(&[(10, 1.0)]), &model);
        assert!(matches!(sparse, Err(SvmPerfError::InvalidModel(_))));

        let dense = score_dense(&[0.0f64, 1.0, 2.0], &model);
        assert!(matches!(dense, Err(SvmPerfError::InvalidModel(_))));

        let explained = explain(&features(&[(10, 1.0)]), &model, 3);
        assert!(matches!(explained, Err(SvmPerfError::InvalidModel(_))));
    }

    #[test]
    fn test_input_with_feature_zero_rejected() {
        let model = reference_model();
        let input = features(&[(0, 1.0), (10, 1.0)]);

        assert!(matches!(
            score_sparse(&input, &model),
            Err(SvmPerfError::InvalidInput(_))
        ));
        assert!(matches!(
            explain(&input, &model, 5),
            Err(SvmPerfError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_model_checked_before_input() {
        let model = WeightMap::new();
        let input = features(&[(0, 1.0)]);
        assert!(matches!(
            score_sparse(&input, &model),
            Err(SvmPerfError::InvalidModel(_))
        ));
    }

    #[test]
    fn test_explain_orders_by_relevance() {
        let model = reference_model();
        let input = features(&[(10, 1.0), (20, 1.0), (30, 1.0), (40, 1.0)]);

        let top = explain(&input, &model, 2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].feature, 20);
        assert_eq!(top[0].relevance, 0.5714286);
        assert_eq!(top[1].feature, 30);

        let all = explain(&input, &model, 10).unwrap();
        // Feature 40 has no weight and is not reported
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].feature, 10);
    }

    #[test]
    fn test_sparse_from_dense() {
        let sparse = sparse_from_dense(&[7.0f32, 0.0, 2.5, 0.0, -1.0]);
        assert_eq!(sparse, features(&[(2, 2.5), (4, -1.0)]));
    }

    #[test]
    fn test_concurrent_scoring_shares_model() {
        let model = reference_model();
        let input = features(&[(10, 2.0), (30, 1.0)]);
        let expected = score_sparse(&input, &model).unwrap();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| score_sparse(&input, &model).unwrap()))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }
}
