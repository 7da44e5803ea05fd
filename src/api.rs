//! Structured business errors.
//!
//! A handler that rejects a request for a domain reason (duplicate email,
//! wrong password) returns an [`ApiError`]. The dispatcher turns it into a
//! JSON body `{"error": …, "data": …, "message": …}` instead of failing the
//! request at the transport level.

use std::fmt;

use serde::Serialize;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ApiError {
    /// Machine-readable kind, e.g. `value:invalid`.
    pub error: String,
    /// The field the error is about, if any.
    pub data: String,
    pub message: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, data: impl Into<String>, message: impl Into<String>) -> Self {
        Self { error: error.into(), data: data.into(), message: message.into() }
    }

    /// Input `field` is missing or invalid.
    pub fn value_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new("value:invalid", field, message)
    }

    /// The resource named by `field` does not exist.
    pub fn not_found(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new("value:notfound", field, message)
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::new("permission:forbidden", "permission", message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        if !self.data.is_empty() {
            write!(f, " ({})", self.data)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_wire_keys() {
        let e = ApiError::value_error("email", "Invalid email.");
        assert_eq!(
            serde_json::to_value(&e).unwrap(),
            serde_json::json!({"error": "value:invalid", "data": "email", "message": "Invalid email."})
        );
        assert_eq!(e.to_string(), "value:invalid (email): Invalid email.");
    }
}
