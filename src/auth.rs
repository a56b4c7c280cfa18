//! Sign-in, sign-up and session probing against the identity endpoints.

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::error::{ApiError, ValidationError};

/// Minimum password length accepted at sign-up.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Email and password pair sent to `/login` and `/register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into().trim().to_string(),
            password: password.into(),
        }
    }

    /// Rules for signing in: a plausible email and any password.
    pub fn validate_sign_in(&self) -> Result<(), ValidationError> {
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err(ValidationError::PasswordRequired);
        }
        Ok(())
    }

    /// Rules for signing up: a plausible email and a strong password.
    pub fn validate_sign_up(&self) -> Result<(), ValidationError> {
        validate_email(&self.email)?;
        let password = &self.password;
        if password.is_empty() {
            return Err(ValidationError::PasswordRequired);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort(MIN_PASSWORD_LEN));
        }
        let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
        let has_digit = password.chars().any(|c| c.is_ascii_digit());
        let has_symbol = password.chars().any(|c| !c.is_ascii_alphanumeric());
        if !(has_lower && has_upper && has_digit && has_symbol) {
            return Err(ValidationError::PasswordTooWeak);
        }
        Ok(())
    }
}

fn validate_email(email: &str) -> Result<(), ValidationError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::InvalidEmail);
    };
    let domain_ok = domain
        .split('.')
        .all(|label| !label.is_empty())
        && domain.contains('.');
    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}

/// Response of `/manage/info`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub email: String,
    #[serde(default)]
    pub is_email_confirmed: bool,
}

impl ApiClient {
    /// Sign in and keep the session cookie in the client's jar.
    pub async fn login(&self, credentials: &Credentials) -> Result<(), ApiError> {
        let mut url = self.url("login")?;
        url.query_pairs_mut().append_pair("useCookies", "true");
        let request = self.request_to(Method::POST, url).json(credentials);
        self.send(request, None).await?;
        info!(email = %credentials.email, "signed in");
        Ok(())
    }

    pub async fn register(&self, credentials: &Credentials) -> Result<(), ApiError> {
        let request = self.request(Method::POST, "register")?.json(credentials);
        self.send(request, None).await?;
        info!(email = %credentials.email, "registered");
        Ok(())
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        let request = self
            .request(Method::POST, "logout")?
            .json(&serde_json::json!({}));
        self.send(request, None).await?;
        Ok(())
    }

    /// The signed-in user, or `None` when there is no valid session.
    pub async fn current_user(&self) -> Result<Option<UserInfo>, ApiError> {
        match self.send(self.request(Method::GET, "manage/info")?, None).await {
            Ok(response) => Ok(Some(response.json().await?)),
            Err(ApiError::Unauthorized) => Ok(None),
            Err(ApiError::ServerRejection { status, .. })
                if status == StatusCode::FORBIDDEN.as_u16() || status == StatusCode::NOT_FOUND.as_u16() =>
            {
                debug!(status, "session probe rejected, treating as signed out");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_in_requires_email_and_password() {
        assert_eq!(Credentials::new("a@b.io", "x").validate_sign_in(), Ok(()));
        assert_eq!(
            Credentials::new("nope", "x").validate_sign_in(),
            Err(ValidationError::InvalidEmail)
        );
        assert_eq!(
            Credentials::new("a@b.io", "").validate_sign_in(),
            Err(ValidationError::PasswordRequired)
        );
    }

    #[test]
    fn email_shapes() {
        for bad in ["@b.io", "a@", "a@b", "a@.io", "a b@c.io", "a@b..io"] {
            assert_eq!(validate_email(bad), Err(ValidationError::InvalidEmail), "{bad}");
        }
        assert_eq!(validate_email("first.last@mail.example.com"), Ok(()));
    }

    #[test]
    fn sign_up_password_rules() {
        assert_eq!(
            Credentials::new("a@b.io", "Ab1!").validate_sign_up(),
            Err(ValidationError::PasswordTooShort(MIN_PASSWORD_LEN))
        );
        assert_eq!(
            Credentials::new("a@b.io", "abcdef1!").validate_sign_up(),
            Err(ValidationError::PasswordTooWeak)
        );
        assert_eq!(
            Credentials::new("a@b.io", "Abcdef12").validate_sign_up(),
            Err(ValidationError::PasswordTooWeak)
        );
        assert_eq!(Credentials::new("a@b.io", "Abcde1!").validate_sign_up(), Ok(()));
    }

    #[test]
    fn credentials_trim_email() {
        let c = Credentials::new("  me@x.org ", "pw");
        assert_eq!(c.email, "me@x.org");
    }
}
