use axum::{
    extract::{FromRef, State},
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        avatar::gravatar_url,
        dto::{LoginRequest, RegisterRequest, TokenResponse},
        extractors::AuthUser,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::{CreateUserError, UserRepo},
        repo_types::{NewUser, User},
    },
    error::AppError,
    state::AppState,
    validation::{is_valid_email, AppJson, Validator},
};

const MIN_PASSWORD_LEN: usize = 6;

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/users", post(register))
}

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/auth", post(login).get(current_user))
}

fn normalize_email(email: Option<String>) -> String {
    email.unwrap_or_default().trim().to_lowercase()
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let email = normalize_email(payload.email);
    let password = payload.password.unwrap_or_default();

    let mut v = Validator::new();
    v.require("name", &payload.name, "Name is required")
        .check("email", is_valid_email(&email), "Please include a valid email")
        .check(
            "password",
            password.chars().count() >= MIN_PASSWORD_LEN,
            "Please enter a password with 6 or more characters",
        );
    v.finish()?;

    if state.store.find_user_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("User already exists".into()));
    }

    let new_user = NewUser {
        name: payload.name.unwrap_or_default().trim().to_string(),
        avatar: gravatar_url(&email),
        password_hash: hash_password(&password)?,
        email,
    };

    let user = match state.store.create_user(new_user).await {
        Ok(u) => u,
        Err(CreateUserError::DuplicateEmail) => {
            warn!("email registered concurrently");
            return Err(AppError::Conflict("User already exists".into()));
        }
        Err(CreateUserError::Other(e)) => return Err(e.into()),
    };

    let token = JwtKeys::from_ref(&state).issue(user.id)?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let email = normalize_email(payload.email);

    let mut v = Validator::new();
    v.check("email", is_valid_email(&email), "Please include a valid email")
        .require("password", &payload.password, "Password is required");
    v.finish()?;

    let Some(user) = state.store.find_user_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    let password = payload.password.unwrap_or_default();
    if !verify_password(&password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let token = JwtKeys::from_ref(&state).issue(user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip(state))]
pub async fn current_user(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<User>, AppError> {
    let user = load_user(&state, user).await?;
    Ok(Json(user))
}

/// The caller's own record. A valid token for a deleted account is treated
/// like an invalid one.
pub(crate) async fn load_user(state: &AppState, AuthUser(user_id): AuthUser) -> Result<User, AppError> {
    state.store.find_user_by_id(user_id).await?.ok_or_else(|| {
        warn!(user_id = %user_id, "token for missing user");
        AppError::unauthorized("User not found")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_normalized() {
        assert_eq!(normalize_email(Some("  A@X.Com ".into())), "a@x.com");
        assert_eq!(normalize_email(None), "");
    }

    #[test]
    fn user_json_hides_password_hash() {
        let user = User {
            id: uuid::Uuid::new_v4(),
            name: "A".into(),
            email: "a@x.com".into(),
            password_hash: "$argon2id$secret".into(),
            avatar: gravatar_url("a@x.com"),
            created_at: time::OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("a@x.com"));
        assert!(!json.contains("password"));
        assert!(!json.contains("argon2"));
    }
}
