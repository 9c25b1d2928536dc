//! Bearer JWT authentication.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use crate::utils::jwt::{Claims, validate_token};

/// The authenticated caller, inserted into request extensions and read in
/// handlers with `Extension<AuthUser>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
}

impl TryFrom<Claims> for AuthUser {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: claims.user_id()?,
            email: claims.email,
        })
    }
}

fn bearer_token(request: &Request) -> Result<&str, AppError> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized {
            message: "Missing authorization header".to_string(),
        })?;

    value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized {
            message: "Invalid authorization header format. Expected: Bearer <token>".to_string(),
        })
}

/// Rejects the request with 401 unless it carries a valid bearer token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = validate_token(bearer_token(&request)?, &state.jwt_config.secret)?;
    let user = AuthUser::try_from(claims)?;

    tracing::Span::current().record("user_id", tracing::field::display(user.user_id));
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with(auth: Option<&str>) -> Request {
        let mut builder = Request::builder().uri("/api/uploads");
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn extracts_bearer_token() {
        let request = request_with(Some("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&request).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn missing_or_malformed_header_is_unauthorized() {
        assert!(matches!(
            bearer_token(&request_with(None)),
            Err(AppError::Unauthorized { .. })
        ));
        assert!(matches!(
            bearer_token(&request_with(Some("Basic dXNlcjpwYXNz"))),
            Err(AppError::Unauthorized { .. })
        ));
    }

    #[test]
    fn auth_user_requires_uuid_subject() {
        let id = Uuid::new_v4();
        let claims = Claims::new(id, Some("a@x.io".into()), 1);
        let user = AuthUser::try_from(claims).unwrap();
        assert_eq!(user.user_id, id);
        assert_eq!(user.email.as_deref(), Some("a@x.io"));

        let bad = Claims {
            sub: "not-a-uuid".into(),
            email: None,
            iat: 0,
            exp: 0,
        };
        assert!(AuthUser::try_from(bad).is_err());
    }
}
