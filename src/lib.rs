//! In-process scoring for linear SVM-perf models
//!
//! Parses the model text written by Thorsten Joachims' `svm_perf_learn` into a
//! sparse weight map and scores feature vectors against it, reproducing the
//! decision values of `svm_perf_classify` without spawning a process per call.

pub mod api;
pub mod core;
pub mod data;
pub mod learner;
pub mod model;
pub mod scoring;

// Re-export main types for convenience
pub use crate::api::{CrossCheck, EvaluationMetrics, ModelInfo, SvmPerf, TrainedModel};
pub use crate::core::types::*;
pub use crate::core::{Result, SvmPerfError};
pub use crate::data::SampleSet;
pub use crate::learner::{Learner, LearnerConfig, SvmPerfCommand};
pub use crate::model::parse_model;
pub use crate::scoring::{explain, score_dense, score_sparse, sparse_from_dense};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
