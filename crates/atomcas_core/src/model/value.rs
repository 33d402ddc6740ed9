//! Value annotations attachable to atoms.
//!
//! # Responsibility
//! - Define the value kinds the codec can persist.
//! - Single out the default truth pair that storage suppresses.

/// Type name of the distinguished truth-value key atom.
pub const TRUTH_KEY_TYPE: &str = "PredicateNode";
/// Name of the distinguished truth-value key atom.
pub const TRUTH_KEY_NAME: &str = "*-TruthValueKey-*";

const DEFAULT_TRUTH_STRENGTH: f64 = 1.0;
const DEFAULT_TRUTH_CONFIDENCE: f64 = 0.0;

/// A mutable annotation stored on an atom under a key atom.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Tuple of doubles.
    Float(Vec<f64>),
    /// Tuple of strings.
    Str(Vec<String>),
    /// Tuple of nested values.
    List(Vec<Value>),
    /// (strength, confidence) truth pair.
    Truth { strength: f64, confidence: f64 },
}

impl Value {
    /// The truth annotation every atom carries implicitly.
    ///
    /// Persisting it would clog storage with uninformative defaults, so the
    /// value store skips the truth key when it holds exactly this pair.
    pub fn default_truth() -> Self {
        Self::Truth {
            strength: DEFAULT_TRUTH_STRENGTH,
            confidence: DEFAULT_TRUTH_CONFIDENCE,
        }
    }

    pub fn is_default_truth(&self) -> bool {
        matches!(
            self,
            Self::Truth {
                strength,
                confidence,
            } if *strength == DEFAULT_TRUTH_STRENGTH && *confidence == DEFAULT_TRUTH_CONFIDENCE
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Value;

    #[test]
    fn default_truth_detection() {
        assert!(Value::default_truth().is_default_truth());
        assert!(!Value::Truth {
            strength: 0.5,
            confidence: 0.25
        }
        .is_default_truth());
        assert!(!Value::Float(vec![1.0, 0.0]).is_default_truth());
    }
}
