//! Shared constants, error type and result alias for the moments pipeline.

/// Sentinel value carried by any derived field that could not be computed.
/// Interest maps and downstream consumers skip fields holding this value.
pub const MISSING: f32 = -9999.0;

/// Tests a field value against the missing sentinel with a little slack
/// so that arithmetic on propagated sentinels still reads as missing.
pub fn is_missing(value: f32) -> bool {
    value <= -9990.0
}

/// Smallest power used when clamping before a logarithm.
pub const POWER_EPSILON: f32 = 1.0e-12;

/// Common error type for the processing core.
///
/// Malformed pulse input (inconsistent gate count or PRT across a sample
/// window) is not an error: beam assembly silently defers until the stream
/// settles. Only the cases below surface as `Err`.
#[derive(thiserror::Error, Debug)]
pub enum MomentsError {
    /// Fatal at startup, e.g. an interest map whose points do not increase.
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("numeric degeneracy: {0}")]
    Numeric(String),
}

pub type MomentsResult<T> = Result<T, MomentsError>;
