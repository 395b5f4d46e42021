use thiserror::Error;

/// Failure of a single scoring request.
///
/// `MissingField` / `InvalidNumber` are caller mistakes; `ModelUnavailable` /
/// `PredictionFailure` are on our side. `Display` is the user-visible message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for {field}: {value:?} ({reason})")]
    InvalidNumber {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// 固定文案：模型未加载时每个请求都返回它
    #[error("Model not loaded. Please contact administrator.")]
    ModelUnavailable,

    #[error("prediction failed: {0}")]
    PredictionFailure(String),
}

impl ScoreError {
    #[inline]
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::MissingField(_) | Self::InvalidNumber { .. })
    }

    /// Stable label for metrics / JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "missing_field",
            Self::InvalidNumber { .. } => "invalid_number",
            Self::ModelUnavailable => "model_unavailable",
            Self::PredictionFailure(_) => "prediction_failure",
        }
    }

    pub(crate) fn prediction(err: anyhow::Error) -> Self {
        Self::PredictionFailure(format!("{err:#}"))
    }
}
