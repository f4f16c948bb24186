use crate::error::{CloudWatchError, Result};

const ACCESS_KEY_VARS: &[&str] = &["AWS_ACCESS_KEY_ID", "AWS_ACCESS_KEY"];
const SECRET_KEY_VARS: &[&str] = &["AWS_SECRET_ACCESS_KEY", "AWS_SECRET_KEY"];
const SESSION_TOKEN_VAR: &str = "AWS_SESSION_TOKEN";

/// An AWS access key pair, with an optional STS session token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    /// Resolve credentials from explicit values, falling back to the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`CloudWatchError::MissingCredentials`] if either half of the key pair
    /// is absent from both sources.
    pub fn resolve(access_key_id: Option<&str>, secret_access_key: Option<&str>) -> Result<Self> {
        Self::resolve_with(access_key_id, secret_access_key, |name| std::env::var(name).ok())
    }

    /// Same as [`Credentials::resolve`] with an injectable environment lookup.
    pub fn resolve_with<F>(
        access_key_id: Option<&str>,
        secret_access_key: Option<&str>,
        lookup: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_env = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(*name))
                .find(|v| !v.is_empty())
        };

        let access_key_id = non_empty(access_key_id)
            .or_else(|| from_env(ACCESS_KEY_VARS))
            .ok_or_else(|| {
                CloudWatchError::MissingCredentials(
                    "access key id not given and AWS_ACCESS_KEY_ID is unset".to_string(),
                )
            })?;
        let secret_access_key = non_empty(secret_access_key)
            .or_else(|| from_env(SECRET_KEY_VARS))
            .ok_or_else(|| {
                CloudWatchError::MissingCredentials(
                    "secret access key not given and AWS_SECRET_ACCESS_KEY is unset".to_string(),
                )
            })?;
        let session_token = lookup(SESSION_TOKEN_VAR).filter(|v| !v.is_empty());

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}
