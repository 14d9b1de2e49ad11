use std::fmt;

/// Represents the different types of errors that can occur while building,
/// fitting or applying the message classification pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierError {
    /// The pipeline is wired inconsistently (category list, feature width,
    /// row counts between feature blocks). Always fatal.
    ConfigurationError(String),
    /// The training data violates the expected schema or label domain
    DataError(String),
    /// Error occurred while fitting an estimator or a feature stage
    FitError(String),
    /// Error occurred while making predictions
    PredictionError(String),
    /// Error occurred due to invalid input parameters
    ValidationError(String),
}

impl ClassifierError {
    pub(crate) fn configuration(msg: impl Into<String>) -> Self {
        Self::ConfigurationError(msg.into())
    }

    pub(crate) fn data(msg: impl Into<String>) -> Self {
        Self::DataError(msg.into())
    }

    pub(crate) fn fit(msg: impl Into<String>) -> Self {
        Self::FitError(msg.into())
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            Self::DataError(msg) => write!(f, "Data error: {}", msg),
            Self::FitError(msg) => write!(f, "Fit error: {}", msg),
            Self::PredictionError(msg) => write!(f, "Prediction error: {}", msg),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ClassifierError {}

impl From<ndarray::ShapeError> for ClassifierError {
    fn from(err: ndarray::ShapeError) -> Self {
        ClassifierError::ConfigurationError(err.to_string())
    }
}
