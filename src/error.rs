use thiserror::Error;

/// Errors raised by the numerical core for malformed input.
///
/// "Legitimate empty" outcomes (no exponential phase, too few valid DO
/// samples) are never errors; they come back as structured negative results.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KineticsError {
    #[error("insufficient data: need at least {required} points, got {found}")]
    InsufficientData { required: usize, found: usize },
    #[error("degenerate input: {0}")]
    DegenerateInput(String),
    #[error("dimension mismatch: {left} has length {left_len}, {right} has length {right_len}")]
    DimensionMismatch {
        left: &'static str,
        left_len: usize,
        right: &'static str,
        right_len: usize,
    },
    #[error("simulation diverged at t={t:.6}: {reason}")]
    SimulationDiverged { t: f64, reason: String },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl KineticsError {
    pub(crate) fn mismatch(
        left: &'static str,
        left_len: usize,
        right: &'static str,
        right_len: usize,
    ) -> Self {
        KineticsError::DimensionMismatch {
            left,
            left_len,
            right,
            right_len,
        }
    }

    /// Process exit code used by the binary when this error ends a run.
    pub fn exit_code(&self) -> u8 {
        match self {
            KineticsError::InvalidParameter(_) | KineticsError::DimensionMismatch { .. } => 2,
            KineticsError::InsufficientData { .. } | KineticsError::DegenerateInput(_) => 3,
            KineticsError::SimulationDiverged { .. } => 4,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<KineticsError> for AppError {
    fn from(err: KineticsError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinetics_errors_map_to_exit_codes() {
        let err: AppError = KineticsError::SimulationDiverged {
            t: 1.5,
            reason: "non-finite state".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("t=1.500000"));

        let err: AppError = KineticsError::mismatch("time", 3, "biomass", 4).into();
        assert_eq!(err.exit_code(), 2);
    }
}
