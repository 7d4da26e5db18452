use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::errors::AppError;
use crate::models::Role;

pub const ROLE_HEADER: &str = "x-user-role";
pub const USERNAME_HEADER: &str = "x-username";

/// The caller as asserted by the upstream identity layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub role: Role,
    pub username: String,
}

impl Session {
    pub fn require(&self, role: Role) -> Result<(), AppError> {
        if self.role != role {
            return Err(AppError::Forbidden(format!(
                "{} access required",
                role.as_str()
            )));
        }
        Ok(())
    }

    pub fn require_user(&self, role: Role, username: &str) -> Result<(), AppError> {
        self.require(role)?;
        if self.username != username {
            return Err(AppError::Forbidden(format!(
                "signed in as {}, not {username}",
                self.username
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let role = header(ROLE_HEADER)
            .and_then(Role::parse)
            .ok_or(AppError::Unauthorized)?;
        let username = header(USERNAME_HEADER).ok_or(AppError::Unauthorized)?;

        Ok(Session {
            role,
            username: username.to_string(),
        })
    }
}
