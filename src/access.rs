use crate::errors::AppError;
use crate::models::{Principal, Role};
use axum::http::HeaderMap;

/// Header a caller sets to `true` to confirm a bulk delete.
pub const CONFIRM_DELETE_HEADER: &str = "x-confirm-delete";

/// Whether the request carries `x-confirm-delete: true` exactly.
pub fn delete_confirmed(headers: &HeaderMap) -> bool {
    headers
        .get(CONFIRM_DELETE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "true")
        .unwrap_or(false)
}

/// Gate for deleting every client record.
///
/// The role is checked before the confirmation flag, so a non-manager is
/// refused whether or not they confirmed.
pub fn can_bulk_delete(principal: &Principal, confirmed: bool) -> Result<(), AppError> {
    if principal.role != Role::Manager {
        return Err(AppError::Forbidden(
            "Only managers can delete all clients".to_string(),
        ));
    }

    if !confirmed {
        return Err(AppError::BadRequest(format!(
            "Confirmation required. Add header: {}: true",
            CONFIRM_DELETE_HEADER
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn principal(role: Role) -> Principal {
        Principal {
            id: "7".to_string(),
            username: "nimal".to_string(),
            role,
        }
    }

    #[test]
    fn confirmation_must_be_exactly_true() {
        let mut headers = HeaderMap::new();
        assert!(!delete_confirmed(&headers));
        headers.insert(CONFIRM_DELETE_HEADER, HeaderValue::from_static("TRUE"));
        assert!(!delete_confirmed(&headers));
        headers.insert(CONFIRM_DELETE_HEADER, HeaderValue::from_static("true"));
        assert!(delete_confirmed(&headers));
    }

    #[test]
    fn role_is_checked_before_confirmation() {
        let err = can_bulk_delete(&principal(Role::Employee), false).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = can_bulk_delete(&principal(Role::Manager), false).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m.contains("x-confirm-delete: true")));

        assert!(can_bulk_delete(&principal(Role::Manager), true).is_ok());
    }
}
