use serde::{Deserialize, Serialize};

/// Response envelope shared by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    pub errors: Vec<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self::success_with_message(data, "Operation successful")
    }

    pub fn success_with_message(data: T, message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            data: Some(data),
            errors: Vec::new(),
        }
    }

    pub fn error(message: &str) -> Self {
        Self::error_with(message, Vec::new())
    }

    pub fn error_with(message: &str, errors: Vec<String>) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            data: None,
            errors,
        }
    }
}

impl ApiResponse<()> {
    /// Success with no payload, just a message.
    pub fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            data: None,
            errors: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_all_fields() {
        let body = serde_json::to_value(ApiResponse::success(42)).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], 42);
        assert_eq!(body["errors"].as_array().unwrap().len(), 0);

        let body = serde_json::to_value(ApiResponse::<()>::error_with(
            "Validation failed",
            vec!["Email is required".into()],
        ))
        .unwrap();
        assert_eq!(body["success"], false);
        assert!(body["data"].is_null());
        assert_eq!(body["errors"][0], "Email is required");
    }
}
