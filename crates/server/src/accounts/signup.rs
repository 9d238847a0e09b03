//! `POST /users/create`.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::Deserialize;
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::accounts::users::{NewUser, UserView};
use crate::accounts::{ACCOUNTS_TAG, AccountsState};
use crate::error::{ApiError, ErrorResponse};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Signup form.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub company_url: Option<String>,
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::Validation("no email provided".into()));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.is_empty() {
        return Err(ApiError::Validation("no password provided".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::Validation(format!(
            "password required to be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// E.164-ish check: optional `+`, a leading digit 1-9, 2 to 15 digits in total.
///
/// Spaces, dashes, dots and parentheses are ignored.
pub fn validate_phone(phone: &str) -> Result<(), ApiError> {
    let stripped: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();
    let digits = stripped.strip_prefix('+').unwrap_or(&stripped);
    let valid = (2..=15).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
        && !digits.starts_with('0');
    if !valid {
        return Err(ApiError::Validation("phone number is invalid".into()));
    }
    Ok(())
}

/// Register a new user.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    post,
    path = "/create",
    tag = ACCOUNTS_TAG,
    operation_id = "Create User",
    summary = "Sign up with email and password",
    description = "Creates a user and stores an Argon2id hash of the password. Emails are compared in \
                   normalized form, so `john.doe+news@gmail.com` collides with `johndoe@gmail.com`.",
    request_body(content = SignupRequest, content_type = "application/json"),
    responses(
        (status = 200, description = "User created", body = UserView),
        (status = 400, description = "Validation failed or user exists", body = ErrorResponse),
    )
)]
pub async fn create_user(
    State(state): State<AccountsState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<UserView>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;

    validate_email(&req.email)?;
    validate_password(&req.password)?;
    validate_phone(&req.phone)?;

    if state.users.lookup_by_email(&req.email).await?.is_some() {
        tracing::debug!("signup rejected, email already registered");
        return Err(ApiError::UserExists);
    }

    let user = NewUser {
        email: req.email,
        first_name: req.first_name,
        last_name: req.last_name,
        phone: req.phone,
        company_url: req.company_url,
    }
    .into_user(OffsetDateTime::now_utc());

    // a concurrent signup may have claimed the address since the lookup
    if let Err(e) = state.users.upsert(&user).await {
        if e.is_unique_violation() {
            tracing::debug!("signup rejected, email registered concurrently");
            return Err(ApiError::UserExists);
        }
        return Err(e.into());
    }
    state
        .credentials
        .write_password(&user.id, &req.password)
        .await?;

    tracing::info!(user_id = %user.id, "user signed up");
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::credentials::CredentialStore;
    use crate::accounts::memory::MemoryAccounts;
    use crate::accounts::sessions::SessionManager;
    use crate::accounts::users::{User, UserRepository};
    use crate::error::StorageError;
    use crate::metrics::NoopMetrics;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Lookups always miss, as if another signup landed right after them.
    struct LateLookup(Arc<MemoryAccounts>);

    #[async_trait]
    impl UserRepository for LateLookup {
        async fn lookup_by_email(&self, _email: &str) -> Result<Option<User>, StorageError> {
            Ok(None)
        }
        async fn find_by_id(&self, id: &str) -> Result<Option<User>, StorageError> {
            self.0.find_by_id(id).await
        }
        async fn upsert(&self, user: &User) -> Result<(), StorageError> {
            self.0.upsert(user).await
        }
    }

    fn request(email: &str) -> SignupRequest {
        SignupRequest {
            email: email.into(),
            password: "long-enough".into(),
            first_name: String::new(),
            last_name: String::new(),
            phone: "+1 555 555 1234".into(),
            company_url: None,
        }
    }

    #[tokio::test]
    async fn losing_a_signup_race_reports_user_exists() {
        let accounts = Arc::new(MemoryAccounts::new());
        let metrics = Arc::new(NoopMetrics);
        let state = AccountsState {
            users: Arc::new(LateLookup(accounts.clone())),
            credentials: CredentialStore::new(accounts.clone(), accounts.clone(), metrics.clone()),
            sessions: SessionManager::new(accounts.clone(), 60),
            metrics,
            cookie_secure: false,
        };

        create_user(State(state.clone()), Ok(Json(request("john.doe@x.com"))))
            .await
            .unwrap();
        let second = create_user(State(state), Ok(Json(request("johndoe@x.com")))).await;
        assert!(matches!(second, Err(ApiError::UserExists)));
    }

    #[test]
    fn email_cases() {
        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("test@moov.io").is_ok());
    }

    #[test]
    fn password_cases() {
        assert!(validate_password("").is_err());
        assert!(validate_password("short").is_err());
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password("superlongpassword").is_ok());
    }

    #[test]
    fn phone_cases() {
        let cases = [
            ("", false),
            ("abcdefgh", false),
            ("a0a0a0a0", false),
            ("1a1a1a1a", false),
            ("0123456789", false),
            ("1", false),
            ("10", true),
            ("109", true),
            ("10909", true),
            ("109090", true),
            ("2090999", true),
            ("30909999", true),
            ("409099999", true),
            ("5090999999", true),
            ("60909999999", true),
            ("709099999999", true),
            ("8090999999999", true),
            ("90909999999999", true),
            ("1009099999999999", false),
            ("+14155552671000", true),
            ("+1415555267100001", false),
            ("+1-6174443000", true),
            ("+33 1 5669 6201", true),
            ("49-8994006308", true),
            ("+972-732858700", true),
            ("+81-90-1234-5678", true),
            ("666.666.6666", true),
            ("(617) 444-3000", true),
        ];
        for (input, valid) in cases {
            assert_eq!(validate_phone(input).is_ok(), valid, "input={input:?}");
        }
    }
}
