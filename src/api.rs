//! High-level interface: train through SVM-perf, score in process
//!
//! Training is delegated to the external learner; the resulting model text is
//! parsed once into a [`WeightMap`] and every later prediction is a dot product
//! computed in process, without spawning `svm_perf_classify`.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use svmperf::api::SvmPerf;
//! use svmperf::SparseFeatures;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let model = SvmPerf::new()
//!     .with_learn_args("-c 0.01 -v 0")
//!     .train_from_file("train.svmlight")?;
//!
//! let sample: SparseFeatures = [(10, 1.0), (20, 1.0)].into_iter().collect();
//! let prediction = model.predict(&sample)?;
//! println!("label {} score {}", prediction.label, prediction.decision_value);
//! # Ok(())
//! # }
//! ```

use crate::core::{Contribution, Prediction, Result, Sample, SparseFeatures, SvmPerfError, WeightMap};
use crate::data::{format_samples, format_unlabelled, SampleSet};
use crate::learner::{parse_score, Learner, SvmPerfCommand};
use crate::model::parse_model;
use crate::scoring::{explain, score_dense, score_sparse};
use log::debug;
use std::fs;
use std::path::Path;

/// SVM-perf trainer with builder-style configuration
pub struct SvmPerf<L: Learner = SvmPerfCommand> {
    learner: L,
    learn_args: String,
    classify_args: String,
}

impl SvmPerf<SvmPerfCommand> {
    /// Use the SVM-perf executables from the `PATH` with no extra arguments
    pub fn new() -> Self {
        Self::with_learner(SvmPerfCommand::new())
    }
}

impl Default for SvmPerf<SvmPerfCommand> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Learner> SvmPerf<L> {
    /// Use a custom learner implementation
    pub fn with_learner(learner: L) -> Self {
        Self {
            learner,
            learn_args: String::new(),
            classify_args: String::new(),
        }
    }

    /// Arguments passed to the learner, e.g. `-c 0.01 -v 0`
    pub fn with_learn_args(mut self, args: impl Into<String>) -> Self {
        self.learn_args = args.into();
        self
    }

    /// Arguments passed to the reference classifier, e.g. `-v 0`
    pub fn with_classify_args(mut self, args: impl Into<String>) -> Self {
        self.classify_args = args.into();
        self
    }

    pub fn learner(&self) -> &L {
        &self.learner
    }

    /// Train on labelled samples (positive label = positive class)
    pub fn train(&self, samples: &[Sample]) -> Result<TrainedModel> {
        if samples.is_empty() {
            return Err(SvmPerfError::EmptyDataset);
        }

        debug!("Training on {} samples", samples.len());
        let model_text = self
            .learner
            .learn(&self.learn_args, &format_samples(samples))?;
        TrainedModel::from_model_text(model_text)
    }

    /// Train from an SVM-light format file
    pub fn train_from_file<P: AsRef<Path>>(&self, path: P) -> Result<TrainedModel> {
        let set = SampleSet::from_file(path)?;
        self.train(set.samples())
    }

    /// Score `features` both in process and with the learner's own classifier
    pub fn cross_check(&self, model: &TrainedModel, features: &SparseFeatures) -> Result<CrossCheck> {
        let in_process = model.score(features)?;
        let output = self.learner.classify(
            &self.classify_args,
            &format_unlabelled(features),
            model.model_text(),
        )?;
        let reference = parse_score(&output)?;

        Ok(CrossCheck {
            in_process,
            reference,
        })
    }
}

/// In-process score next to the score reported by the external classifier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossCheck {
    pub in_process: f64,
    pub reference: f64,
}

impl CrossCheck {
    pub fn difference(&self) -> f64 {
        (self.in_process - self.reference).abs()
    }

    /// Whether both scores agree up to a relative tolerance.
    ///
    /// The external classifier prints a limited number of digits, so exact
    /// agreement is only possible when `tolerance` is 0 and the score is
    /// printed exactly.
    pub fn agrees(&self, tolerance: f64) -> bool {
        self.difference() <= tolerance * self.reference.abs().max(1.0)
    }
}

/// Parsed SVM-perf model ready for in-process scoring
#[derive(Debug, Clone)]
pub struct TrainedModel {
    model_text: String,
    weights: WeightMap,
    threshold: f64,
}

impl TrainedModel {
    /// Parse model text as written by `svm_perf_learn`
    pub fn from_model_text(model_text: impl Into<String>) -> Result<Self> {
        let model_text = model_text.into();
        let weights = parse_model(&model_text)?;
        let threshold = weights.threshold().ok_or_else(|| {
            SvmPerfError::InvalidModel("parsed model has no threshold".to_string())
        })?;

        Ok(Self {
            model_text,
            weights,
            threshold,
        })
    }

    /// Load and parse a model file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_model_text(text)
    }

    pub fn weights(&self) -> &WeightMap {
        &self.weights
    }

    /// The model text exactly as produced by the learner
    pub fn model_text(&self) -> &str {
        &self.model_text
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Score a sparse feature vector
    pub fn score(&self, features: &SparseFeatures) -> Result<f64> {
        score_sparse(features, &self.weights)
    }

    /// Score a dense feature vector (index 0 unused)
    pub fn score_dense<T: Copy + Into<f64>>(&self, features: &[T]) -> Result<f64> {
        score_dense(features, &self.weights)
    }

    /// Predict a single feature vector
    pub fn predict(&self, features: &SparseFeatures) -> Result<Prediction> {
        self.score(features).map(Prediction::from_score)
    }

    /// Predict multiple samples
    pub fn predict_batch(&self, samples: &[Sample]) -> Result<Vec<Prediction>> {
        samples.iter().map(|s| self.predict(&s.features)).collect()
    }

    /// The `limit` features contributing most to the score of `features`
    pub fn explain(&self, features: &SparseFeatures, limit: usize) -> Result<Vec<Contribution>> {
        explain(features, &self.weights, limit)
    }

    /// Evaluate accuracy on labelled samples
    pub fn evaluate(&self, samples: &[Sample]) -> Result<f64> {
        Ok(self.evaluate_detailed(samples)?.accuracy())
    }

    /// Get detailed evaluation metrics
    pub fn evaluate_detailed(&self, samples: &[Sample]) -> Result<EvaluationMetrics> {
        let predictions = self.predict_batch(samples)?;

        let mut tp = 0; // True positives
        let mut tn = 0; // True negatives
        let mut fp = 0; // False positives
        let mut fn_ = 0; // False negatives

        for (pred, sample) in predictions.iter().zip(samples) {
            match (pred.label > 0.0, sample.label > 0.0) {
                (true, true) => tp += 1,
                (false, false) => tn += 1,
                (true, false) => fp += 1,
                (false, true) => fn_ += 1,
            }
        }

        Ok(EvaluationMetrics::new(tp, tn, fp, fn_))
    }

    /// Get model information
    pub fn info(&self) -> ModelInfo {
        let features = self.weights.sorted_features();
        ModelInfo {
            threshold: self.threshold,
            n_features: features.len(),
            max_feature: features.last().map_or(0, |&(id, _)| id),
        }
    }
}

/// Detailed evaluation metrics
#[derive(Debug, Clone)]
pub struct EvaluationMetrics {
    pub true_positives: usize,
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl EvaluationMetrics {
    fn new(tp: usize, tn: usize, fp: usize, fn_: usize) -> Self {
        Self {
            true_positives: tp,
            true_negatives: tn,
            false_positives: fp,
            false_negatives: fn_,
        }
    }

    /// Calculate accuracy: (TP + TN) / (TP + TN + FP + FN)
    pub fn accuracy(&self) -> f64 {
        let total =
            self.true_positives + self.true_negatives + self.false_positives + self.false_negatives;
        if total == 0 {
            0.0
        } else {
            (self.true_positives + self.true_negatives) as f64 / total as f64
        }
    }

    /// Calculate precision: TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        let denominator = self.true_positives + self.false_positives;
        if denominator == 0 {
            0.0
        } else {
            self.true_positives as f64 / denominator as f64
        }
    }

    /// Calculate recall (sensitivity): TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        let denominator = self.true_positives + self.false_negatives;
        if denominator == 0 {
            0.0
        } else {
            self.true_positives as f64 / denominator as f64
        }
    }

    /// Calculate F1 score: 2 * (precision * recall) / (precision + recall)
    pub fn f1_score(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * (p * r) / (p + r)
        }
    }

    /// Calculate specificity: TN / (TN + FP)
    pub fn specificity(&self) -> f64 {
        let denominator = self.true_negatives + self.false_positives;
        if denominator == 0 {
            0.0
        } else {
            self.true_negatives as f64 / denominator as f64
        }
    }
}

/// Model information
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub threshold: f64,
    /// Number of feature weights, threshold excluded
    pub n_features: usize,
    /// Highest feature id with a weight (0 for a threshold-only model)
    pub max_feature: usize,
}

/// Convenience functions for one-off scoring
pub mod quick {
    use super::*;

    /// Parse `model_text` and score a single sparse vector
    pub fn score(model_text: &str, features: &SparseFeatures) -> Result<f64> {
        score_sparse(features, &parse_model(model_text)?)
    }

    /// Train with the default SVM-perf executables and the given arguments
    pub fn train(samples: &[Sample], learn_args: &str) -> Result<TrainedModel> {
        SvmPerf::new().with_learn_args(learn_args).train(samples)
    }
}
