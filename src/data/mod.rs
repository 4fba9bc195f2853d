//! Sample loading and formatting
//!
//! Samples are read from and written to the SVM-light text format consumed by
//! the external `svm_perf` executables.

pub mod svmlight;

pub use self::svmlight::*;
