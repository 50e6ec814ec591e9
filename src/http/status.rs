//! Error code to HTTP status mapping.
//!
//! The table is data: a built-in set of codes used by the gateway and the
//! services behind it, extended or overridden from configuration. Unknown
//! codes map to `500 Internal Server Error`.

use std::collections::HashMap;

use axum::http::StatusCode;

const BUILT_IN: &[(&str, u16)] = &[
    ("NOT_FOUND", 404),
    ("FORBIDDEN", 403),
    ("UNAUTHORIZED", 401),
    ("INVALID_CREDENTIALS", 401),
    ("INVALID_TOKEN", 401),
    ("VALIDATION_ERROR", 400),
    ("CONFLICT", 409),
    ("SERVICE_UNAVAILABLE", 503),
    ("RATE_LIMIT_EXCEEDED", 429),
    ("INTERNAL_ERROR", 500),
    ("UPSTREAM_RESPONSE_TOO_LARGE", 502),
    // users service
    ("USER_NOT_FOUND", 404),
    ("USER_EXISTS", 409),
    // orders service
    ("ORDER_NOT_FOUND", 404),
    ("ACCESS_DENIED", 403),
    ("ALREADY_CANCELLED", 400),
    ("CANNOT_CANCEL", 400),
    ("INVALID_STATUS", 400),
];

/// Codes whose status configuration may not change.
const FIXED: &[(&str, StatusCode)] = &[("SERVICE_UNAVAILABLE", StatusCode::SERVICE_UNAVAILABLE)];

/// The pinned status for `code`, if it has one.
pub fn fixed_status(code: &str) -> Option<StatusCode> {
    FIXED
        .iter()
        .find(|(fixed, _)| *fixed == code)
        .map(|(_, status)| *status)
}

/// Lookup table from logical error code to transport status.
#[derive(Debug, Clone)]
pub struct StatusMapper {
    table: HashMap<String, StatusCode>,
}

impl StatusMapper {
    /// An empty table; every code without a fixed status resolves to 500.
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// Built-in table plus `overrides`; invalid statuses and attempts to
    /// move a fixed code are skipped.
    pub fn with_overrides(overrides: &HashMap<String, u16>) -> Self {
        let mut mapper = Self::default();
        for (code, status) in overrides {
            if let Some(fixed) = fixed_status(code) {
                if fixed.as_u16() != *status {
                    tracing::warn!(%code, status, fixed = fixed.as_u16(), "Ignoring override of fixed status");
                }
                continue;
            }
            match StatusCode::from_u16(*status) {
                Ok(status) => mapper.insert(code.clone(), status),
                Err(_) => tracing::warn!(%code, status, "Ignoring invalid status mapping"),
            }
        }
        mapper
    }

    pub fn insert(&mut self, code: impl Into<String>, status: StatusCode) {
        self.table.insert(code.into(), status);
    }

    /// Fixed codes win over the table.
    pub fn status_for(&self, code: &str) -> StatusCode {
        fixed_status(code)
            .or_else(|| self.table.get(code).copied())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl Default for StatusMapper {
    fn default() -> Self {
        let table = BUILT_IN
            .iter()
            .filter_map(|(code, status)| {
                StatusCode::from_u16(*status)
                    .ok()
                    .map(|s| (code.to_string(), s))
            })
            .collect();
        Self { table }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_entries() {
        let mapper = StatusMapper::default();
        let expected = [
            ("NOT_FOUND", 404),
            ("FORBIDDEN", 403),
            ("UNAUTHORIZED", 401),
            ("INVALID_CREDENTIALS", 401),
            ("VALIDATION_ERROR", 400),
            ("CONFLICT", 409),
            ("SERVICE_UNAVAILABLE", 503),
            ("RATE_LIMIT_EXCEEDED", 429),
        ];
        for (code, status) in expected {
            assert_eq!(mapper.status_for(code).as_u16(), status, "{}", code);
        }
    }

    #[test]
    fn unknown_code_defaults_to_500() {
        let mapper = StatusMapper::default();
        assert_eq!(mapper.status_for("UNKNOWN_CODE"), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(StatusMapper::empty().status_for("NOT_FOUND"), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            StatusMapper::empty().status_for("SERVICE_UNAVAILABLE"),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn overrides_extend_and_replace() {
        let overrides: HashMap<String, u16> = [
            ("PAYMENT_REQUIRED".to_string(), 402),
            ("CONFLICT".to_string(), 422),
            ("BROKEN".to_string(), 1000),
        ]
        .into_iter()
        .collect();
        let mapper = StatusMapper::with_overrides(&overrides);

        assert_eq!(mapper.status_for("PAYMENT_REQUIRED"), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(mapper.status_for("CONFLICT"), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(mapper.status_for("BROKEN"), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(mapper.status_for("VALIDATION_ERROR"), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn service_unavailable_stays_503() {
        let overrides: HashMap<String, u16> =
            [("SERVICE_UNAVAILABLE".to_string(), 200)].into_iter().collect();
        let mut mapper = StatusMapper::with_overrides(&overrides);
        assert_eq!(mapper.status_for("SERVICE_UNAVAILABLE"), StatusCode::SERVICE_UNAVAILABLE);

        mapper.insert("SERVICE_UNAVAILABLE", StatusCode::OK);
        assert_eq!(mapper.status_for("SERVICE_UNAVAILABLE"), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(fixed_status("SERVICE_UNAVAILABLE"), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(fixed_status("CONFLICT"), None);
    }
}
