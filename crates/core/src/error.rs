use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid agent id: {0}")]
    InvalidAgentId(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("{field} must be bytes32 hex")]
    InvalidHash { field: &'static str },

    /// Malformed request shape. The message is surfaced to the caller as-is.
    #[error("{0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_agent_id() {
        let err = CoreError::InvalidAgentId("-1".to_string());
        assert_eq!(err.to_string(), "Invalid agent id: -1");
    }

    #[test]
    fn test_error_display_invalid_hash() {
        let err = CoreError::InvalidHash { field: "resultHash" };
        assert_eq!(err.to_string(), "resultHash must be bytes32 hex");
    }

    #[test]
    fn test_error_display_invalid_request() {
        let err = CoreError::InvalidRequest("tradeId is required".to_string());
        assert_eq!(err.to_string(), "tradeId is required");
    }

    #[test]
    fn test_result_type_err() {
        let result: Result<u8> = Err(CoreError::InvalidAmount("0".to_string()));
        assert!(result.is_err());
    }
}
