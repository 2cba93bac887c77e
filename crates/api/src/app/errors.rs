use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use custodia_auth::AuthzError;
use custodia_core::DomainError;
use custodia_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::InvalidCredentials => {
            json_error(StatusCode::UNAUTHORIZED, "invalid_credentials", "invalid username or password")
        }
        ServiceError::Token(e) => {
            tracing::error!(error = %e, "token issuance failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "token_error", e.to_string())
        }
        ServiceError::Password(e) => {
            tracing::error!(error = %e, "password hashing failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "password_error", e.to_string())
        }
        ServiceError::Store(msg) => {
            tracing::error!(error = %msg, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
        ServiceError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish_error", msg),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        DomainError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        DomainError::InvalidId(_) => json_error(StatusCode::BAD_REQUEST, "invalid_id", message),
        DomainError::InsufficientStock { .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "insufficient_stock", message)
        }
        DomainError::InvariantViolation(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", message)
        }
        DomainError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        DomainError::Duplicate(_) => json_error(StatusCode::CONFLICT, "duplicate", message),
        DomainError::Conflict(_) => retryable_error(StatusCode::CONFLICT, "conflict", message),
        DomainError::PermissionDenied(_) => json_error(StatusCode::FORBIDDEN, "forbidden", message),
    }
}

pub fn authz_error_to_response(err: AuthzError) -> axum::response::Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    error_body(status, code, message.into(), false)
}

fn retryable_error(status: StatusCode, code: &'static str, message: String) -> axum::response::Response {
    error_body(status, code, message, true)
}

fn error_body(
    status: StatusCode,
    code: &'static str,
    message: String,
    retryable: bool,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message,
            "retryable": retryable,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_error_taxonomy() {
        let status = |e: DomainError| domain_error_to_response(e).status();
        assert_eq!(status(DomainError::not_found("asset x")), StatusCode::NOT_FOUND);
        assert_eq!(status(DomainError::validation("bad")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(DomainError::insufficient_stock(3, 2)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status(DomainError::conflict("locked")), StatusCode::CONFLICT);
        assert_eq!(status(DomainError::duplicate("code")), StatusCode::CONFLICT);
        assert_eq!(status(DomainError::permission_denied("no")), StatusCode::FORBIDDEN);

        let publish = service_error_to_response(ServiceError::Publish("bus down".into()));
        assert_eq!(publish.status(), StatusCode::BAD_GATEWAY);
        let login = service_error_to_response(ServiceError::InvalidCredentials);
        assert_eq!(login.status(), StatusCode::UNAUTHORIZED);
    }
}
