use std::collections::HashMap;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use switchboard_core::config::SlackConfig;

use crate::api_error::SlackApiError;

/// Query parameters of the OAuth redirect.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl OAuthQuery {
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let non_empty = |key: &str| params.get(key).filter(|v| !v.is_empty()).cloned();
        Self { code: non_empty("code"), state: non_empty("state") }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Api(#[from] SlackApiError),
    #[error("slack request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("slack response could not be decoded: {0}")]
    Decode(String),
    #[error("oauth exchange requires a `code` parameter")]
    MissingCode,
}

impl ClientError {
    pub fn api_error(&self) -> Option<&SlackApiError> {
        match self {
            Self::Api(error) => Some(error),
            _ => None,
        }
    }
}

#[async_trait]
pub trait SlackApi: Send + Sync {
    fn auth_url(&self, query: &OAuthQuery) -> String;

    /// Exchanges the OAuth `code` for the installation document.
    async fn install(&self, query: &OAuthQuery) -> Result<Value, ClientError>;

    async fn call(
        &self,
        method: &str,
        token: Option<&str>,
        body: &Value,
    ) -> Result<Value, ClientError>;

    async fn post_response(&self, response_url: &str, body: &Value) -> Result<(), ClientError>;
}

pub struct SlackWebClient {
    http: reqwest::Client,
    api_base_url: String,
    authorize_url: String,
    client_id: String,
    client_secret: SecretString,
    scopes: String,
    redirect_uri: Option<String>,
}

impl SlackWebClient {
    pub fn new(config: &SlackConfig) -> Self {
        Self::with_http_client(config, reqwest::Client::new())
    }

    pub fn with_http_client(config: &SlackConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            authorize_url: config.authorize_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scopes: config.scopes.clone(),
            redirect_uri: config.redirect_uri.clone(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base_url, method)
    }

    async fn decode(response: reqwest::Response) -> Result<Value, ClientError> {
        let envelope: Value =
            response.json().await.map_err(|e| ClientError::Decode(e.to_string()))?;
        match SlackApiError::from_envelope(&envelope) {
            Some(error) => Err(error.into()),
            None => Ok(envelope),
        }
    }
}

#[async_trait]
impl SlackApi for SlackWebClient {
    fn auth_url(&self, query: &OAuthQuery) -> String {
        let mut url = format!(
            "{}?client_id={}&scope={}",
            self.authorize_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.scopes),
        );
        if let Some(redirect_uri) = &self.redirect_uri {
            url.push_str("&redirect_uri=");
            url.push_str(&urlencoding::encode(redirect_uri));
        }
        if let Some(state) = &query.state {
            url.push_str("&state=");
            url.push_str(&urlencoding::encode(state));
        }
        url
    }

    async fn install(&self, query: &OAuthQuery) -> Result<Value, ClientError> {
        let code = query.code.as_deref().ok_or(ClientError::MissingCode)?;

        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("code", code),
        ];
        if let Some(redirect_uri) = &self.redirect_uri {
            form.push(("redirect_uri", redirect_uri.as_str()));
        }

        let response = self
            .http
            .post(self.method_url("oauth.v2.access"))
            .form(&form)
            .send()
            .await?
            .error_for_status()?;
        Self::decode(response).await
    }

    async fn call(
        &self,
        method: &str,
        token: Option<&str>,
        body: &Value,
    ) -> Result<Value, ClientError> {
        debug!(event_name = "slack.api.call", method, "calling slack web api");

        let mut request = self.http.post(self.method_url(method)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?.error_for_status()?;
        Self::decode(response).await
    }

    async fn post_response(&self, response_url: &str, body: &Value) -> Result<(), ClientError> {
        self.http.post(response_url).json(body).send().await?.error_for_status()?;
        Ok(())
    }
}
