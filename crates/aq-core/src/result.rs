//! Result type alias

use crate::error::AqError;

/// Standard Result type for Aquifer operations
pub type AqResult<T> = Result<T, AqError>;
