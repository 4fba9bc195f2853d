//! SVM-perf model text parsing
//!
//! `svm_perf_learn` writes a linear model as a single "support vector" whose
//! feature weights are the primal weight vector:
//!
//! ```text
//! SVM-light Version V6.20
//! 0 # kernel type
//! ...
//! 0.21428571 # threshold b, each following line is a SV (starting with alpha*y)
//! 1 10:-0.21428572 20:0.5714286 30:-0.5 #
//! ```
//!
//! Only two lines matter: the threshold line and the weights line that
//! follows it. Everything before the threshold line and after the weights line
//! is ignored.

use crate::core::{Result, SvmPerfError, WeightMap, THRESHOLD_ID};
use log::{debug, warn};

/// Marker identifying the threshold line
pub const THRESHOLD_MARKER: &str = "# threshold b";

/// Parse SVM-perf model text into a weight map.
///
/// The returned map holds the threshold under feature 0 and one entry per
/// `featureId:weight` token of the weights line. When a feature id repeats,
/// the last weight wins.
pub fn parse_model(text: &str) -> Result<WeightMap> {
    let mut lines = text.lines();

    let threshold_line = lines
        .by_ref()
        .find(|line| line.contains(THRESHOLD_MARKER))
        .ok_or_else(|| {
            SvmPerfError::FormatError(format!("no line containing '{THRESHOLD_MARKER}'"))
        })?;
    let threshold = parse_threshold(threshold_line)?;

    let weights_line = lines
        .find(|line| line.trim_end().ends_with('#'))
        .ok_or_else(|| {
            SvmPerfError::FormatError(
                "no weights line ending in '#' after the threshold line".to_string(),
            )
        })?;

    let mut weights = WeightMap::with_threshold(threshold);
    for (feature, weight) in parse_weights(weights_line)? {
        if weights.insert(feature, weight).is_some() {
            warn!("Feature {feature} appears more than once in the model; keeping the last weight");
        }
    }

    debug!(
        "Parsed model: threshold={}, {} feature weights",
        threshold,
        weights.n_features()
    );

    Ok(weights)
}

/// Extract the threshold value written just before the marker
fn parse_threshold(line: &str) -> Result<f64> {
    let prefix = line
        .split(THRESHOLD_MARKER)
        .next()
        .unwrap_or_default()
        .trim();

    let token = prefix.split_whitespace().last().ok_or_else(|| {
        SvmPerfError::FormatError(format!("missing threshold value in '{line}'"))
    })?;

    token
        .parse::<f64>()
        .map_err(|_| SvmPerfError::FormatError(format!("invalid threshold '{token}' in '{line}'")))
}

/// Parse the `alpha*y id:weight id:weight ... #` line
fn parse_weights(line: &str) -> Result<Vec<(usize, f64)>> {
    let body = line.trim_end().trim_end_matches('#').trim();
    if body.is_empty() {
        return Ok(Vec::new());
    }

    // The leading alpha*y factor is always 1 for svm_perf linear models
    body.split(' ').skip(1).map(parse_weight_token).collect()
}

/// Parse a single `featureId:weight` token
fn parse_weight_token(token: &str) -> Result<(usize, f64)> {
    let parts: Vec<&str> = token.split(':').collect();
    if parts.len() != 2 {
        return Err(SvmPerfError::FormatError(format!(
            "expected featureId:weight, got '{token}'"
        )));
    }

    let feature = parts[0]
        .parse::<i64>()
        .map_err(|_| SvmPerfError::FormatError(format!("invalid feature id in '{token}'")))?;
    if feature <= THRESHOLD_ID as i64 {
        return Err(SvmPerfError::FormatError(format!(
            "non-positive feature id in '{token}'"
        )));
    }
    let feature = usize::try_from(feature)
        .map_err(|_| SvmPerfError::FormatError(format!("feature id out of range in '{token}'")))?;

    let weight = parts[1]
        .parse::<f64>()
        .map_err(|_| SvmPerfError::FormatError(format!("invalid weight in '{token}'")))?;

    Ok((feature, weight))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = "SVM-light Version V6.20\n\
        0 # kernel type\n\
        3 # kernel parameter -d\n\
        1 # kernel parameter -g\n\
        1 # kernel parameter -s\n\
        1 # kernel parameter -r\n\
        empty# kernel parameter -u\n\
        31 # highest feature index\n\
        2 # number of training documents\n\
        2 # number of support vectors plus 1\n\
        0.21428571 # threshold b, each following line is a SV (starting with alpha*y)\n\
        1 20:0.5714286 10:-0.21428572 30:-0.5 #\n";

    fn format_error_message(result: Result<WeightMap>) -> String {
        match result {
            Err(SvmPerfError::FormatError(msg)) => msg,
            other => panic!("expected FormatError, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_full_model() {
        let map = parse_model(MODEL).unwrap();

        assert_eq!(map.len(), 4);
        assert_eq!(map.threshold(), Some(0.21428571));
        assert_eq!(map.get(20), Some(0.5714286));
        assert_eq!(map.get(10), Some(-0.21428572));
        assert_eq!(map.get(30), Some(-0.5));
    }

    #[test]
    fn test_parse_minimal_lines() {
        let text = "... 0.21428571 # threshold b\n1 20:0.5714286 10:-0.21428572 30:-0.5 #\n";
        let map = parse_model(text).unwrap();

        let expected: WeightMap = vec![(0, 0.21428571), (20, 0.5714286), (10, -0.21428572), (30, -0.5)]
            .into_iter()
            .collect();
        assert_eq!(map, expected);
    }

    #[test]
    fn test_parse_crlf_line_endings() {
        let map = parse_model(&MODEL.replace('\n', "\r\n")).unwrap();
        assert_eq!(map.threshold(), Some(0.21428571));
        assert_eq!(map.n_features(), 3);
    }

    #[test]
    fn test_parse_ignores_trailing_content() {
        let text = format!("{MODEL}1 99:5.0 #\ntrailing garbage\n");
        let map = parse_model(&text).unwrap();
        assert_eq!(map.get(99), None);
        assert_eq!(map.n_features(), 3);
    }

    #[test]
    fn test_parse_bias_only_model() {
        let map = parse_model("-1.5 # threshold b\n1 #\n").unwrap();
        assert_eq!(map.threshold(), Some(-1.5));
        assert_eq!(map.n_features(), 0);
    }

    #[test]
    fn test_parse_negative_and_exponent_values() {
        let map = parse_model("-2.5e-3 # threshold b\n1 1:1e2 2:-4.25E-1 #\n").unwrap();
        assert_eq!(map.threshold(), Some(-2.5e-3));
        assert_eq!(map.get(1), Some(100.0));
        assert_eq!(map.get(2), Some(-0.425));
    }

    #[test]
    fn test_parse_duplicate_feature_last_wins() {
        let map = parse_model("0 # threshold b\n1 5:1.0 5:2.0 #\n").unwrap();
        assert_eq!(map.get(5), Some(2.0));
        assert_eq!(map.n_features(), 1);
    }

    #[test]
    fn test_missing_threshold_line() {
        let msg = format_error_message(parse_model("1 10:0.5 #\n"));
        assert!(msg.contains(THRESHOLD_MARKER));
    }

    #[test]
    fn test_missing_weights_line() {
        let result = parse_model("0.5 # threshold b\nno terminator here\n");
        assert!(matches!(result, Err(SvmPerfError::FormatError(_))));
    }

    #[test]
    fn test_invalid_threshold() {
        let msg = format_error_message(parse_model("abc # threshold b\n1 1:1.0 #\n"));
        assert!(msg.contains("abc"));

        let result = parse_model(" # threshold b\n1 1:1.0 #\n");
        assert!(matches!(result, Err(SvmPerfError::FormatError(_))));
    }

    #[test]
    fn test_malformed_token() {
        let msg = format_error_message(parse_model("0.5 # threshold b\n1 20:0.5 10-0.5 #\n"));
        assert!(msg.contains("10-0.5"));

        let msg = format_error_message(parse_model("0.5 # threshold b\n1 1:2:3 #\n"));
        assert!(msg.contains("1:2:3"));
    }

    #[test]
    fn test_non_positive_feature_id() {
        let msg = format_error_message(parse_model("0.5 # threshold b\n1 0:1.0 #\n"));
        assert!(msg.contains("0:1.0"));

        let msg = format_error_message(parse_model("0.5 # threshold b\n1 -3:1.0 #\n"));
        assert!(msg.contains("-3:1.0"));
    }

    #[test]
    fn test_invalid_feature_id_and_weight() {
        let msg = format_error_message(parse_model("0.5 # threshold b\n1 x:1.0 #\n"));
        assert!(msg.contains("x:1.0"));

        let msg = format_error_message(parse_model("0.5 # threshold b\n1 4:heavy #\n"));
        assert!(msg.contains("4:heavy"));
    }
}
