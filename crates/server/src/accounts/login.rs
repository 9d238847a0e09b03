//! `POST /users/login` and `POST /users/logout`.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::accounts::cookie::{expired_session_cookie, session_cookie, session_token};
use crate::accounts::users::UserView;
use crate::accounts::{ACCOUNTS_TAG, AccountsState};
use crate::error::{ApiError, ErrorResponse};
use crate::metrics::AUTH_INACTIVATIONS;

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Exchange email and password for a session cookie.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    post,
    path = "/login",
    tag = ACCOUNTS_TAG,
    operation_id = "Login",
    summary = "Log in with email and password",
    description = "On success the response carries the user and sets the `auth_session` cookie. \
                   Unknown emails and wrong passwords are indistinguishable.",
    request_body(content = LoginRequest, content_type = "application/json"),
    responses(
        (status = 200, description = "Logged in", body = UserView,
            headers(("Set-Cookie" = String, description = "auth_session cookie"))),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 403, description = "Invalid email or password", body = ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AccountsState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    if req.email.is_empty() || req.password.is_empty() {
        return Err(ApiError::AccessDenied);
    }

    let user_id = state
        .credentials
        .verify_password(&req.email, &req.password)
        .await?;
    let Some(user) = state.users.find_by_id(&user_id).await? else {
        // credential without a user record
        return Err(ApiError::AccessDenied);
    };

    let token = state.sessions.create_session(&user.id).await?;
    let cookie = session_cookie(token, state.sessions.lifetime_secs(), state.cookie_secure);

    tracing::info!(user_id = %user.id, "user logged in");
    Ok((jar.add(cookie), Json(UserView::from(user))).into_response())
}

/// Drop the current session. Always succeeds.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    post,
    path = "/logout",
    tag = ACCOUNTS_TAG,
    operation_id = "Logout",
    summary = "End the current session",
    responses(
        (status = 200, description = "Session cleared",
            headers(("Set-Cookie" = String, description = "expired auth_session cookie"))),
    )
)]
pub async fn logout(State(state): State<AccountsState>, jar: CookieJar) -> Response {
    if let Some(token) = session_token(&jar) {
        if let Err(e) = state.sessions.invalidate_session(&token).await {
            tracing::warn!(error = %e, "failed to delete session on logout");
        }
        state
            .metrics
            .increment(AUTH_INACTIVATIONS, &[("method", "web")]);
    }
    jar.add(expired_session_cookie(state.cookie_secure))
        .into_response()
}
