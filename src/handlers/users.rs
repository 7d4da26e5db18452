use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{Role, User};
use crate::services::users;
use crate::state::AppState;

// POST /users
#[derive(Deserialize)]
pub struct SignupRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignupRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let (username, password, role) = match (body.username, body.password, body.role) {
        (Some(u), Some(p), Some(r)) if !u.is_empty() && !p.is_empty() && !r.is_empty() => (u, p, r),
        _ => return Err(AppError::MissingFields("username, password, role".into())),
    };
    let role =
        Role::parse(&role).ok_or_else(|| AppError::Validation(format!("unknown role: {role}")))?;

    let conn = state.conn();
    let user = users::signup(&conn, &username, &password, role)?;
    Ok((StatusCode::CREATED, Json(user)))
}

// GET /consultants
pub async fn list_consultants(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<User>>, AppError> {
    let conn = state.conn();
    Ok(Json(users::list_consultants(&conn)?))
}
