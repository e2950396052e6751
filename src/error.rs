use thiserror::Error;

use crate::Float;

/// Error produced when a method name does not match any entry of the method registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown integration method `{0}`")]
pub struct UnknownMethod(pub String);

/// Errors produced while solving. All but [`Error::StepSizeUnderflow`] are configuration errors,
/// reported before any integration step is taken.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error<F: Float> {
    #[error("minimum step size {dt_min:?} exceeds maximum step size {dt_max:?}")]
    StepBounds { dt_min: F, dt_max: F },
    #[error("`{name}` must be finite and nonzero, got {value:?}")]
    NonPositive { name: &'static str, value: F },
    #[error("`{name}` must be finite, got {value:?}")]
    NonFinite { name: &'static str, value: F },
    #[error("requested sample time {0:?} is not finite")]
    NonFiniteSampleTime(F),
    #[error(transparent)]
    UnknownMethod(#[from] UnknownMethod),
    /// An accepted step of `dt` left the time `t` unchanged because `dt` is below the floating
    /// point resolution at `t`.
    #[error("step size {dt:?} does not advance the time {t:?}")]
    StepSizeUnderflow { t: F, dt: F },
}

impl<F: Float> Error<F> {
    /// Map an error from the time-reflected backward pass to the caller's time axis.
    pub(crate) fn reflect(self) -> Self {
        match self {
            Error::StepSizeUnderflow { t, dt } => Error::StepSizeUnderflow { t: -t, dt: -dt },
            error => error,
        }
    }
}
