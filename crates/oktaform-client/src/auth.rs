//! Request authorization.
//!
//! API tokens are sent verbatim. Private-key credentials are exchanged for
//! a short-lived bearer token via a signed client assertion; the token is
//! cached until shortly before it expires.

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use url::Url;

use oktaform_core::api_paths;

use crate::config::Credentials;
use crate::error::ClientError;

/// Assertions are valid for one hour, the platform's maximum.
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh the cached token this long before the server-side expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

pub(crate) enum Authenticator {
    ApiToken(String),
    PrivateKey(PrivateKeyAuth),
}

pub(crate) struct PrivateKeyAuth {
    client_id: String,
    scopes: String,
    key: EncodingKey,
    key_id: Option<String>,
    token_url: Url,
    cached: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    access_token: String,
    expires_at: i64,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
    jti: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

impl Authenticator {
    pub(crate) fn from_credentials(
        credentials: &Credentials,
        endpoint: &Url,
    ) -> Result<Self, ClientError> {
        match credentials {
            Credentials::ApiToken { token } => {
                if token.is_empty() {
                    return Err(ClientError::Config("api token is empty".into()));
                }
                Ok(Self::ApiToken(token.clone()))
            }
            Credentials::PrivateKey {
                client_id,
                private_key,
                private_key_id,
                scopes,
            } => {
                if scopes.is_empty() {
                    return Err(ClientError::Config(
                        "private key authentication requires at least one scope".into(),
                    ));
                }
                let key = EncodingKey::from_rsa_pem(private_key.as_bytes())?;
                let token_url = endpoint.join(api_paths::TOKEN.trim_start_matches('/'))?;
                Ok(Self::PrivateKey(PrivateKeyAuth {
                    client_id: client_id.clone(),
                    scopes: scopes.join(" "),
                    key,
                    key_id: private_key_id.clone(),
                    token_url,
                    cached: Mutex::new(None),
                }))
            }
        }
    }

    /// Value for the `Authorization` header.
    pub(crate) async fn header(&self, http: &reqwest::Client) -> Result<String, ClientError> {
        match self {
            Self::ApiToken(token) => Ok(format!("SSWS {token}")),
            Self::PrivateKey(auth) => {
                let token = auth.access_token(http).await?;
                Ok(format!("Bearer {token}"))
            }
        }
    }

    /// Forget any cached bearer token after the server rejected it.
    pub(crate) async fn invalidate(&self) {
        if let Self::PrivateKey(auth) = self {
            *auth.cached.lock().await = None;
        }
    }
}

impl PrivateKeyAuth {
    async fn access_token(&self, http: &reqwest::Client) -> Result<String, ClientError> {
        let mut cached = self.cached.lock().await;
        let now = jiff::Timestamp::now().as_second();
        if let Some(token) = cached
            .as_ref()
            .filter(|t| t.expires_at - EXPIRY_SKEW_SECS > now)
        {
            return Ok(token.access_token.clone());
        }

        let assertion = self.client_assertion(now)?;
        tracing::debug!(client_id = %self.client_id, "requesting access token");
        let response = http
            .post(self.token_url.clone())
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", self.scopes.as_str()),
                (
                    "client_assertion_type",
                    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer",
                ),
                ("client_assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::Auth(format!(
                "token endpoint returned {status}: {text}"
            )));
        }
        let body: TokenResponse = response.json().await?;
        let access_token = body.access_token.clone();
        *cached = Some(CachedToken {
            access_token: body.access_token,
            expires_at: now + body.expires_in,
        });
        Ok(access_token)
    }

    fn client_assertion(&self, now: i64) -> Result<String, ClientError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();
        let claims = AssertionClaims {
            iss: &self.client_id,
            sub: &self.client_id,
            aud: self.token_url.as_str(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
            jti: uuid::Uuid::new_v4().to_string(),
        };
        Ok(jsonwebtoken::encode(&header, &claims, &self.key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn api_token_uses_ssws_scheme() {
        let auth = Authenticator::from_credentials(
            &Credentials::ApiToken {
                token: "abc".into(),
            },
            &Url::parse("https://dev.okta.com/").unwrap(),
        )
        .unwrap();
        let header = auth.header(&reqwest::Client::new()).await.unwrap();
        assert_eq!(header, "SSWS abc");
    }

    #[test]
    fn empty_scopes_are_rejected() {
        let result = Authenticator::from_credentials(
            &Credentials::PrivateKey {
                client_id: "0oa1".into(),
                private_key: String::new(),
                private_key_id: None,
                scopes: vec![],
            },
            &Url::parse("https://dev.okta.com/").unwrap(),
        );
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn malformed_key_is_a_jwt_error() {
        let result = Authenticator::from_credentials(
            &Credentials::PrivateKey {
                client_id: "0oa1".into(),
                private_key: "not a pem".into(),
                private_key_id: None,
                scopes: vec!["okta.users.manage".into()],
            },
            &Url::parse("https://dev.okta.com/").unwrap(),
        );
        assert!(matches!(result, Err(ClientError::Jwt(_))));
    }
}
