//! OAuth2 HTTP endpoints.
//!
//! - `GET /oauth2/authorize` - bearer token check
//! - `POST /oauth2/token/create` - rotate client credentials for the session user
//! - `GET|POST /oauth2/token` - token grant

use axum::{
    Form, Json,
    extract::{Query, State, rejection::FormRejection},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::accounts::cookie::session_token;
use crate::error::{ApiError, ErrorResponse, GrantError};
use crate::oauth2::clients::Client;
use crate::oauth2::service::{TokenPayload, TokenRequest, extract_client_credentials};
use crate::oauth2::{OAUTH2_TAG, state::OAuth2State};

pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");

/// Creates the `/oauth2` router.
pub fn router(state: OAuth2State) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(authorize))
        .routes(routes!(create_client))
        .routes(routes!(token))
        .with_state(state)
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuthorizeQuery {
    /// Access token, when not sent as `Authorization: Bearer`
    pub access_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClientsResponse {
    pub clients: Vec<Client>,
}

fn log_grant_error(err: &GrantError) {
    match err {
        GrantError::Server(e) => tracing::error!(error = %e, "oauth2 internal error"),
        e if e.is_expected() => {}
        e => tracing::debug!(error = %e, "oauth2 request rejected"),
    }
}

/// Bearer token check.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    get,
    path = "/authorize",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Authorize",
    summary = "Check an access token",
    description = "Returns an empty `200 OK` when the bearer token exists and has not expired. \
                   Downstream services call this to gate their own endpoints.",
    params(AuthorizeQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Token is valid", body = str, content_type = "text/plain"),
        (status = 401, description = "Missing, unknown or expired token", body = ErrorResponse),
    )
)]
pub async fn authorize(
    State(state): State<OAuth2State>,
    headers: HeaderMap,
    Query(query): Query<AuthorizeQuery>,
) -> Response {
    match state.authorize(&headers, query.access_token.as_deref()).await {
        Ok(_) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            "",
        )
            .into_response(),
        Err(e) => {
            log_grant_error(&e);
            e.into_response()
        }
    }
}

/// Rotate the OAuth2 client of the logged-in user.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    post,
    path = "/token/create",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Create Client",
    summary = "Issue new client credentials",
    description = "Requires the `auth_session` cookie. Every existing client of the user is deleted and \
                   exactly one new client is returned. The secret is only ever shown in this response.",
    responses(
        (status = 200, description = "New client credentials", body = ClientsResponse),
        (status = 403, description = "No valid session", body = ErrorResponse),
    )
)]
pub async fn create_client(
    State(state): State<OAuth2State>,
    jar: CookieJar,
) -> Result<Json<ClientsResponse>, ApiError> {
    let cookie = session_token(&jar);
    let clients = state.issue_client(cookie.as_deref()).await?;
    Ok(Json(ClientsResponse { clients }))
}

/// Token endpoint.
#[tracing::instrument(skip_all, fields(method = %method))]
#[utoipa::path(
    method(get, post),
    path = "/token",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Token",
    summary = "Exchange client credentials or a refresh token for an access token",
    description = "**Supported grant types:**\n\
                   - `client_credentials`: issue a token for the user owning the client\n\
                   - `refresh_token`: trade a refresh token for a new pair; the old pair stops working\n\n\
                   **Client authentication:** HTTP Basic auth, or `client_id` and `client_secret` parameters.\n\n\
                   On success the `X-User-Id` header carries the id of the user owning the client.",
    params(TokenRequest),
    request_body(
        content = TokenRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Token request parameters"
    ),
    responses(
        (status = 200, description = "Token issued", body = TokenPayload,
            headers(("X-User-Id" = String, description = "Owner of the client"))),
        (status = 400, description = "Malformed request, bad grant or unsupported grant type", body = ErrorResponse),
        (status = 401, description = "Client authentication failed", body = ErrorResponse),
    )
)]
pub async fn token(
    State(state): State<OAuth2State>,
    method: Method,
    headers: HeaderMap,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Response {
    let request = match form {
        Ok(Form(request)) => request,
        Err(rejection) => {
            let err = GrantError::InvalidRequest("The request is missing a required parameter");
            tracing::debug!(error = %rejection, "unreadable token request");
            return err.into_response();
        }
    };
    let credentials = extract_client_credentials(&headers, &request);

    match state.issue_token(&method, credentials, &request).await {
        Ok(issued) => {
            let mut response = Json(issued.payload).into_response();
            let headers = response.headers_mut();
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
            headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
            if let Ok(user_id) = HeaderValue::from_str(&issued.user_id) {
                headers.insert(USER_ID_HEADER, user_id);
            }
            response
        }
        Err(e) => {
            log_grant_error(&e);
            e.into_response()
        }
    }
}
