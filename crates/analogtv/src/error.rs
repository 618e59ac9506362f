use std::{error::Error, fmt::Display};

use crate::format::Standard;

/// Every way an encode or decode call can be rejected. All of these are caller-side precondition violations; the
/// codecs themselves never fail once their inputs have been validated.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    /// A bandwidth, resonance, frame rate, or similar quantity was zero, negative, or not finite.
    NonPositive { parameter: &'static str, value: f64 },
    /// A parameter was outside of its allowed range.
    OutOfRange {
        parameter: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    /// A scanline count or width was zero, or the active scanline count exceeded the total.
    InvalidCount { parameter: &'static str, value: usize },
    /// The image handed to the encoder isn't laid out on the profile's working grid.
    ImageHeightMismatch { expected: usize, actual: usize },
    /// The boundary points don't partition the signal into one segment per scanline.
    InvalidBoundaries { expected_lines: usize, signal_len: usize },
    /// The requested demodulation path isn't offered for this standard.
    UnsupportedDemodulation(Standard),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::NonPositive { parameter, value } => {
                write!(f, "{parameter} must be positive and finite, got {value}")
            }
            CodecError::OutOfRange {
                parameter,
                value,
                min,
                max,
            } => write!(f, "{parameter} must be within [{min}, {max}], got {value}"),
            CodecError::InvalidCount { parameter, value } => {
                write!(f, "Invalid {parameter}: {value}")
            }
            CodecError::ImageHeightMismatch { expected, actual } => write!(
                f,
                "Image height must match the number of video scanlines ({expected}), got {actual}"
            ),
            CodecError::InvalidBoundaries {
                expected_lines,
                signal_len,
            } => write!(
                f,
                "Boundary points do not split a signal of length {signal_len} into {expected_lines} scanlines"
            ),
            CodecError::UnsupportedDemodulation(standard) => write!(
                f,
                "Spectral demodulation is not available for {}",
                standard.name()
            ),
        }
    }
}

impl Error for CodecError {}

pub(crate) fn ensure_positive(parameter: &'static str, value: f64) -> Result<(), CodecError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CodecError::NonPositive { parameter, value })
    }
}

pub(crate) fn ensure_range(
    parameter: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), CodecError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(CodecError::OutOfRange {
            parameter,
            value,
            min,
            max,
        })
    }
}
