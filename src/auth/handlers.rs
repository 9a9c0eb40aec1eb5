use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, LoginRequest, MessageResponse, PublicUser,
            RegisterRequest,
        },
        jwt::{AuthUser, JwtKeys},
        password::{hash_password, verify_dummy, verify_password},
        reset_token::generate_reset_token,
    },
    rate_limit,
    state::AppState,
    users::{NewUser, Role, UserError},
};

const MIN_PASSWORD_LEN: usize = 8;
const RESET_ACCEPTED: &str = "If an account exists for that email, a reset link has been sent.";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn auth_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route(
            "/auth/login",
            post(login).layer(middleware::from_fn_with_state(
                state.login_limiter.clone(),
                rate_limit::enforce,
            )),
        )
        .route(
            "/auth/forgot-password",
            post(forgot_password).layer(middleware::from_fn_with_state(
                state.reset_limiter.clone(),
                rate_limit::enforce,
            )),
        )
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn internal(e: impl std::fmt::Display, what: &'static str) -> (StatusCode, String) {
    error!(error = %e, "{what} failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".into(),
    )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }
    if payload.first_name.trim().is_empty() || payload.last_name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Name is required".into()));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err((StatusCode::BAD_REQUEST, "Password too short".into()));
    }

    let hashed_password =
        hash_password(&payload.password).map_err(|e| internal(e, "hash_password"))?;

    let new_user = NewUser {
        id: Uuid::new_v4(),
        first_name: payload.first_name.trim().to_string(),
        last_name: payload.last_name.trim().to_string(),
        email: payload.email,
        phone: payload.phone.trim().to_string(),
        hashed_password,
        user_id: format!("usr_{}", Uuid::new_v4().simple()),
        role: Role::Guest,
    };

    match state.users.create_user(&new_user).await {
        Ok(created) => {
            info!(user_id = %new_user.user_id, "user registered");
            Ok((
                StatusCode::CREATED,
                Json(PublicUser::from_created(created, new_user.user_id)),
            ))
        }
        Err(UserError::Conflict(constraint)) => {
            warn!(%constraint, "user already exists");
            Err((StatusCode::CONFLICT, "User already exists".into()))
        }
        Err(e) => Err(internal(e, "create_user")),
    }
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }

    let user = match state.users.get_user_by_email(&payload.email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            verify_dummy(&payload.password);
            warn!(email = %payload.email, "login unknown email");
            return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
        }
        Err(e) => return Err(internal(e, "get_user_by_email")),
    };

    let ok = verify_password(&payload.password, &user.hashed_password)
        .map_err(|e| internal(e, "verify_password"))?;
    if !ok {
        warn!(user_id = %user.user_id, "login invalid password");
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys
        .sign_access(&user.user_id, user.role)
        .map_err(|e| internal(e, "jwt sign"))?;

    info!(user_id = %user.user_id, "user logged in");
    Ok(Json(AuthResponse {
        access_token,
        user: user.into(),
    }))
}

/// Always answers 202 for a well-formed email so the endpoint does not reveal
/// which addresses have accounts.
#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), (StatusCode, String)> {
    let email = payload.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }

    match state.users.get_user_by_email(&email).await {
        Ok(Some(user)) => {
            let token = generate_reset_token();
            if let Err(e) = state.mailer.send_reset(&user, &token).await {
                error!(error = %e, user_id = %user.user_id, "reset delivery failed");
            }
        }
        Ok(None) => debug!("reset requested for unknown email"),
        Err(e) => return Err(internal(e, "get_user_by_email")),
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: RESET_ACCEPTED.into(),
        }),
    ))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    match state.users.get_user_by_user_id(&user_id).await {
        Ok(Some(user)) => Ok(Json(user.into())),
        Ok(None) => {
            warn!(%user_id, "token for unknown user");
            Err((StatusCode::UNAUTHORIZED, "User not found".into()))
        }
        Err(e) => Err(internal(e, "get_user_by_user_id")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    use crate::app::build_app;

    fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(res: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("guest@hostel.example"));
        assert!(!is_valid_email("guest@hostel"));
        assert!(!is_valid_email("no spaces@x.io"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn public_user_serialization_has_no_hash() {
        let response = PublicUser {
            id: Uuid::new_v4(),
            user_id: "usr_1".into(),
            first_name: "Test".into(),
            last_name: "User".into(),
            email: "test@example.com".to_string(),
            phone: String::new(),
            role: Role::Guest,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(!json.contains("password"));
    }

    #[tokio::test]
    async fn register_validates_before_touching_storage() {
        let app = build_app(AppState::fake());

        let res = app
            .clone()
            .oneshot(json_post(
                "/api/v1/auth/register",
                serde_json::json!({
                    "first_name": "A", "last_name": "B",
                    "email": "not-an-email", "password": "longenough"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = app
            .oneshot(json_post(
                "/api/v1/auth/register",
                serde_json::json!({
                    "first_name": "A", "last_name": "B",
                    "email": "a@b.io", "password": "short"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(res).await, "Password too short");
    }

    #[tokio::test]
    async fn login_limiter_trips_on_sixth_attempt_and_spares_reset() {
        let app = build_app(AppState::fake());
        let attempt = || {
            json_post(
                "/api/v1/auth/login",
                serde_json::json!({ "email": "bad", "password": "x" }),
            )
        };

        for _ in 0..5 {
            let res = app.clone().oneshot(attempt()).await.unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        }
        let res = app.clone().oneshot(attempt()).await.unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(body_string(res).await.contains("Too many login attempts"));

        // separate limiter, separate counter
        let res = app
            .oneshot(json_post(
                "/api/v1/auth/forgot-password",
                serde_json::json!({ "email": "bad" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn me_requires_bearer_token() {
        let app = build_app(AppState::fake());
        let res = app
            .clone()
            .oneshot(Request::get("/api/v1/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app
            .oneshot(
                Request::get("/api/v1/me")
                    .header("authorization", "Bearer garbage")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_with_valid_token_but_no_database_is_500() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state)
            .sign_access("usr_1", Role::Guest)
            .unwrap();
        let res = build_app(state)
            .oneshot(
                Request::get("/api/v1/me")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(res).await, "Internal server error");
    }
}
