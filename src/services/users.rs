use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::Argon2;
use rand_core::OsRng;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Role, User};

const MIN_PASSWORD_LEN: usize = 8;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

pub fn signup(
    conn: &Connection,
    username: &str,
    password: &str,
    role: Role,
) -> Result<User, AppError> {
    let username = username.trim();
    if username.is_empty() || username.chars().any(char::is_whitespace) {
        return Err(AppError::Validation(
            "username must be non-empty and contain no whitespace".into(),
        ));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let password_hash = hash_password(password)?;
    let user = queries::create_user(conn, username, &password_hash, role).map_err(|e| {
        if queries::is_unique_violation(&e) {
            AppError::Conflict(format!("username {username} is taken"))
        } else {
            e.into()
        }
    })?;

    tracing::info!(user_id = user.id, username, role = role.as_str(), "user signed up");
    Ok(user)
}

pub fn list_consultants(conn: &Connection) -> Result<Vec<User>, AppError> {
    Ok(queries::list_users_by_role(conn, Role::Consultant)?)
}
