//! Core type definitions for linear SVM-perf models

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Feature id under which the decision threshold is stored
pub const THRESHOLD_ID: usize = 0;

/// Sparse feature vector: feature id -> value, iterated in ascending id order.
///
/// Feature ids start at 1; id 0 is reserved for the threshold and is rejected
/// by the scorer.
pub type SparseFeatures = BTreeMap<usize, f64>;

/// Parsed linear model: feature id -> weight.
///
/// Feature 0 holds the threshold `b` of the decision function
/// `f(x) = w·x - b`. Maps produced by [`crate::model::parse_model`] always
/// contain it; hand-built maps may not, and are rejected when scored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeightMap {
    weights: HashMap<usize, f64>,
}

impl WeightMap {
    /// Create an empty map (no threshold yet)
    pub fn new() -> Self {
        Self {
            weights: HashMap::new(),
        }
    }

    /// Create a map holding only the threshold
    pub fn with_threshold(threshold: f64) -> Self {
        let mut map = Self::new();
        map.insert(THRESHOLD_ID, threshold);
        map
    }

    /// Set the weight of a feature, returning the previous weight if any
    pub fn insert(&mut self, feature: usize, weight: f64) -> Option<f64> {
        self.weights.insert(feature, weight)
    }

    /// Weight of a feature, or `None` when the model has no entry for it
    pub fn get(&self, feature: usize) -> Option<f64> {
        self.weights.get(&feature).copied()
    }

    pub fn contains(&self, feature: usize) -> bool {
        self.weights.contains_key(&feature)
    }

    /// The threshold `b`, if present
    pub fn threshold(&self) -> Option<f64> {
        self.get(THRESHOLD_ID)
    }

    /// Number of entries, threshold included
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Number of feature weights, threshold excluded
    pub fn n_features(&self) -> usize {
        self.weights.len() - usize::from(self.contains(THRESHOLD_ID))
    }

    /// Iterate over all entries in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.weights.iter().map(|(&id, &w)| (id, w))
    }

    /// Feature weights (threshold excluded) sorted by feature id
    pub fn sorted_features(&self) -> Vec<(usize, f64)> {
        let mut features: Vec<_> = self.iter().filter(|&(id, _)| id != THRESHOLD_ID).collect();
        features.sort_unstable_by_key(|&(id, _)| id);
        features
    }
}

impl FromIterator<(usize, f64)> for WeightMap {
    fn from_iter<I: IntoIterator<Item = (usize, f64)>>(iter: I) -> Self {
        Self {
            weights: iter.into_iter().collect(),
        }
    }
}

/// Labelled sample with sparse features
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Feature vector (ids start at 1)
    pub features: SparseFeatures,
    /// Class label; positive means the positive class
    pub label: f64,
}

impl Sample {
    pub fn new(features: SparseFeatures, label: f64) -> Self {
        Self { features, label }
    }
}

/// Prediction result containing label and decision value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    /// Predicted class label (+1 or -1)
    pub label: f64,
    /// Raw decision function value
    pub decision_value: f64,
}

impl Prediction {
    pub fn new(label: f64, decision_value: f64) -> Self {
        Self {
            label,
            decision_value,
        }
    }

    /// Binary prediction from a score: positive scores give +1, everything else -1
    pub fn from_score(score: f64) -> Self {
        let label = if score > 0.0 { 1.0 } else { -1.0 };
        Self::new(label, score)
    }

    /// Get confidence as absolute value of decision value
    pub fn confidence(&self) -> f64 {
        self.decision_value.abs()
    }
}

/// Contribution of a single feature to a score
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Contribution {
    pub feature: usize,
    pub value: f64,
    pub weight: f64,
    /// `weight * value`
    pub relevance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_map_threshold() {
        let map = WeightMap::with_threshold(0.5);
        assert_eq!(map.threshold(), Some(0.5));
        assert_eq!(map.len(), 1);
        assert_eq!(map.n_features(), 0);
        assert!(!map.is_empty());
    }

    #[test]
    fn test_weight_map_without_threshold() {
        let map: WeightMap = vec![(3, 1.0), (7, -2.0)].into_iter().collect();
        assert_eq!(map.threshold(), None);
        assert_eq!(map.n_features(), 2);
        assert_eq!(map.get(7), Some(-2.0));
        assert_eq!(map.get(8), None);
    }

    #[test]
    fn test_weight_map_insert_overwrites() {
        let mut map = WeightMap::with_threshold(0.0);
        assert_eq!(map.insert(4, 1.0), None);
        assert_eq!(map.insert(4, 2.0), Some(1.0));
        assert_eq!(map.get(4), Some(2.0));
    }

    #[test]
    fn test_sorted_features_excludes_threshold() {
        let map: WeightMap = vec![(0, 0.2), (30, -0.5), (10, 0.1), (20, 0.6)]
            .into_iter()
            .collect();
        assert_eq!(
            map.sorted_features(),
            vec![(10, 0.1), (20, 0.6), (30, -0.5)]
        );
    }

    #[test]
    fn test_prediction_from_score() {
        let pos = Prediction::from_score(0.3);
        assert_eq!(pos.label, 1.0);
        assert_eq!(pos.decision_value, 0.3);

        let neg = Prediction::from_score(-1.8);
        assert_eq!(neg.label, -1.0);
        assert_eq!(neg.confidence(), 1.8);

        // Zero is not a positive decision
        assert_eq!(Prediction::from_score(0.0).label, -1.0);
    }

    #[test]
    fn test_sample() {
        let features: SparseFeatures = [(1, 1.0), (3, 2.0)].into_iter().collect();
        let sample = Sample::new(features.clone(), 1.0);
        assert_eq!(sample.label, 1.0);
        assert_eq!(sample.features, features);
    }
}
