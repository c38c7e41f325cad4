use std::{env, fmt};

use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};

pub const AUTH_URL: &str = "https://workflowy.com/api/auth";

const CLIENT_ID_VAR: &str = "CLIENT_ID";
const CLIENT_SECRET_VAR: &str = "CLIENT_SECRET";
const CLIENT_EMAIL_VAR: &str = "CLIENT_EMAIL";
const AUTH_URL_VAR: &str = "WORKFLOWY_AUTH_URL";

/// Sends `creds` to the default auth endpoint once.
pub async fn authenticate(creds: &Credentials) -> Result<AuthResponse> {
    Authenticator::new().authenticate(creds).await
}

/// The three values the auth endpoint expects. Any of them may be absent,
/// in which case it goes over the wire as `null`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub email: Option<String>,
}

impl Credentials {
    pub fn new(client_id: &str, client_secret: &str, email: &str) -> Credentials {
        Credentials {
            client_id: Some(String::from(client_id)),
            client_secret: Some(String::from(client_secret)),
            email: Some(String::from(email)),
        }
    }

    pub fn from_lookup<F>(lookup: F) -> Credentials
    where
        F: Fn(&str) -> Option<String>,
    {
        Credentials {
            client_id: lookup(CLIENT_ID_VAR),
            client_secret: lookup(CLIENT_SECRET_VAR),
            email: lookup(CLIENT_EMAIL_VAR),
        }
    }

    /// Reads `CLIENT_ID`, `CLIENT_SECRET` and `CLIENT_EMAIL` from the process
    /// environment.
    pub fn from_env() -> Credentials {
        let creds = Credentials::from_lookup(|key| env::var(key).ok());
        for (key, value) in [
            (CLIENT_ID_VAR, &creds.client_id),
            (CLIENT_SECRET_VAR, &creds.client_secret),
            (CLIENT_EMAIL_VAR, &creds.email),
        ] {
            if value.is_none() {
                tracing::debug!("{key} is not set, sending null");
            }
        }
        creds
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("email", &self.email)
            .finish()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialRequest<'a> {
    client_id: Option<&'a str>,
    client_secret: Option<&'a str>,
    email: [Option<&'a str>; 1],
}

impl<'a> CredentialRequest<'a> {
    fn new(creds: &'a Credentials) -> CredentialRequest<'a> {
        CredentialRequest {
            client_id: creds.client_id.as_deref(),
            client_secret: creds.client_secret.as_deref(),
            email: [creds.email.as_deref()],
        }
    }
}

/// Whatever JSON the auth endpoint sent back, untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthResponse(Value);

impl AuthResponse {
    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// The top-level `access_token`, if the service sent a string one.
    pub fn access_token(&self) -> Option<&str> {
        self.0.get("access_token").and_then(Value::as_str)
    }
}

impl From<Value> for AuthResponse {
    fn from(value: Value) -> Self {
        AuthResponse(value)
    }
}

impl fmt::Display for AuthResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Authenticator {
    client: reqwest::Client,
    endpoint: Url,
}

impl Default for Authenticator {
    fn default() -> Self {
        Authenticator::new()
    }
}

impl Authenticator {
    pub fn new() -> Authenticator {
        Authenticator {
            client: reqwest::Client::new(),
            endpoint: Url::parse(AUTH_URL).expect("AUTH_URL is a valid url"),
        }
    }

    pub fn with_endpoint(endpoint: &str) -> Result<Authenticator> {
        Authenticator::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: &str) -> Result<Authenticator> {
        Ok(Authenticator {
            client,
            endpoint: Url::parse(endpoint)?,
        })
    }

    /// Uses `WORKFLOWY_AUTH_URL` when set, otherwise the public endpoint.
    pub fn from_env() -> Result<Authenticator> {
        match env::var(AUTH_URL_VAR) {
            Ok(endpoint) => Authenticator::with_endpoint(&endpoint),
            Err(_) => Ok(Authenticator::new()),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POSTs `creds` to the endpoint and returns the decoded reply.
    pub async fn authenticate(&self, creds: &Credentials) -> Result<AuthResponse> {
        tracing::debug!(endpoint = %self.endpoint, "Sending auth request");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&CredentialRequest::new(creds))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(%status, "Auth request was rejected");
            return Err(Error::Status { status, body });
        }

        let value: Value = serde_json::from_str(&body)?;
        tracing::info!(
            has_access_token = value.get("access_token").is_some(),
            "Auth request succeeded"
        );

        Ok(AuthResponse(value))
    }
}
