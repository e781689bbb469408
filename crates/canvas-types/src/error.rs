//! Common error types

use thiserror::Error;

/// Generation request validation failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Prompt is empty after trimming
    #[error("prompt must not be empty")]
    EmptyPrompt,

    /// Prompt exceeds the character limit
    #[error("prompt too long: {actual} characters (max {max})")]
    PromptTooLong {
        /// Allowed maximum
        max: usize,
        /// Submitted length
        actual: usize,
    },

    /// Zero width or height
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// Sampling steps outside the accepted range
    #[error("steps out of range: {0}")]
    StepsOutOfRange(u32),

    /// Guidance scale outside the accepted range
    #[error("guidance out of range: {0}")]
    GuidanceOutOfRange(f32),
}
