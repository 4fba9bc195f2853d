//! SVM-light sample format
//!
//! One sample per line:
//! label index:value index:value ...
//!
//! Example:
//! +1 10:1 20:2
//! -1 10:1 30:1
//!
//! Feature indices start at 1. The label `0` marks an unlabelled sample, as
//! written for `svm_perf_classify`.

use crate::core::{Result, Sample, SparseFeatures, SvmPerfError};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Samples loaded from an SVM-light file
#[derive(Debug, Clone)]
pub struct SampleSet {
    samples: Vec<Sample>,
    max_feature: usize,
}

impl SampleSet {
    /// Load samples from an SVM-light format file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(SvmPerfError::IoError)?;
        let reader = BufReader::new(file);
        Self::from_reader(reader)
    }

    /// Load samples from a reader
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut samples = Vec::new();
        let mut max_feature = 0;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(SvmPerfError::IoError)?;
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let sample = parse_sample_line(line).map_err(|e| {
                SvmPerfError::ParseError(format!("Error parsing line {}: {}", line_num + 1, e))
            })?;
            if let Some((&last, _)) = sample.features.last_key_value() {
                max_feature = max_feature.max(last);
            }
            samples.push(sample);
        }

        if samples.is_empty() {
            return Err(SvmPerfError::EmptyDataset);
        }

        Ok(SampleSet {
            samples,
            max_feature,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Highest feature index seen in any sample
    pub fn max_feature(&self) -> usize {
        self.max_feature
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn labels(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.label).collect()
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}

/// Parse a single `label index:value ...` line
pub fn parse_sample_line(line: &str) -> Result<Sample> {
    let mut parts = line.split_whitespace();

    let label_str = parts
        .next()
        .ok_or_else(|| SvmPerfError::ParseError("Empty line".to_string()))?;
    let label = label_str
        .parse::<f64>()
        .map_err(|_| SvmPerfError::ParseError(format!("Invalid label: {label_str}")))?;

    let mut features = SparseFeatures::new();
    for feature_str in parts {
        let (index, value) = feature_str.split_once(':').ok_or_else(|| {
            SvmPerfError::ParseError(format!("Invalid feature format: {feature_str}"))
        })?;

        let index = index.parse::<usize>().map_err(|_| {
            SvmPerfError::ParseError(format!("Invalid feature index: {feature_str}"))
        })?;
        if index == 0 {
            return Err(SvmPerfError::ParseError(format!(
                "Feature index must be positive: {feature_str}"
            )));
        }

        let value = value.parse::<f64>().map_err(|_| {
            SvmPerfError::ParseError(format!("Invalid feature value: {feature_str}"))
        })?;

        features.insert(index, value);
    }

    Ok(Sample::new(features, label))
}

/// Format a labelled sample for training: `1` or `-1`, then the non-zero features
pub fn format_sample(sample: &Sample) -> String {
    let label = if sample.label > 0.0 { "1" } else { "-1" };
    let mut line = label.to_string();
    push_features(&mut line, &sample.features);
    line
}

/// Format an unlabelled sample for classification
pub fn format_unlabelled(features: &SparseFeatures) -> String {
    let mut line = "0".to_string();
    push_features(&mut line, features);
    line
}

/// Format a training set, one sample per line
pub fn format_samples(samples: &[Sample]) -> String {
    let mut text = String::new();
    for sample in samples {
        text.push_str(&format_sample(sample));
        text.push('\n');
    }
    text
}

fn push_features(line: &mut String, features: &SparseFeatures) {
    for (&index, &value) in features {
        if value != 0.0 {
            // Writing to a String cannot fail
            let _ = write!(line, " {index}:{value}");
        }
    }
}
