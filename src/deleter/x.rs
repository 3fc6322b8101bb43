use super::oauth::Credentials;
use super::{DeleteResult, StatusDeleter};
use crate::config::Config;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Deletes tweets through `DELETE /2/tweets/:id` with user-context OAuth 1.0a.
pub struct XClient {
    credentials: Credentials,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    data: Option<DeleteData>,
    title: Option<String>,
    detail: Option<String>,
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct DeleteData {
    deleted: bool,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
    detail: Option<String>,
}

impl ApiResponse {
    fn error_message(self) -> Option<String> {
        self.detail
            .or_else(|| {
                self.errors
                    .into_iter()
                    .find_map(|e| e.message.or(e.detail))
            })
            .or(self.title)
            .filter(|m| !m.trim().is_empty())
    }
}

impl XClient {
    pub fn new(credentials: Credentials, base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("tweetprune/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            credentials,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Self::new(
            Credentials {
                consumer_key: config.consumer_key.clone(),
                consumer_secret: config.consumer_secret.clone(),
                token: config.access_token.clone(),
                token_secret: config.access_token_secret.clone(),
            },
            config.api_base_url.clone(),
        )
    }

    fn delete_url(&self, status_id: u64) -> String {
        format!("{}/2/tweets/{}", self.base_url, status_id)
    }
}

/// Map an HTTP response to a delete result. A 404 means the tweet is already
/// gone, which counts as deleted.
pub fn interpret_response(status: StatusCode, body: &str) -> DeleteResult {
    let parsed: ApiResponse = serde_json::from_str(body).unwrap_or_default();

    if status.is_success() {
        let confirmed = parsed.data.as_ref().map_or(true, |data| data.deleted);
        return if confirmed {
            DeleteResult::deleted("Deleted")
        } else {
            DeleteResult::failed(
                parsed
                    .error_message()
                    .unwrap_or_else(|| "Not deleted".to_string()),
            )
        };
    }

    if status == StatusCode::NOT_FOUND {
        let message = parsed
            .error_message()
            .unwrap_or_else(|| "Not found".to_string());
        return DeleteResult::deleted(format!("Already gone: {}", message));
    }

    DeleteResult::failed(
        parsed
            .error_message()
            .unwrap_or_else(|| format!("Error deleting (HTTP {})", status.as_u16())),
    )
}

#[async_trait]
impl StatusDeleter for XClient {
    async fn delete(&self, status_id: u64) -> DeleteResult {
        let url = self.delete_url(status_id);
        let authorization = self.credentials.authorization_header("DELETE", &url, &[]);

        let response = match self
            .client
            .delete(&url)
            .header(AUTHORIZATION, authorization)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(status_id, error = %e, "Delete request failed");
                return DeleteResult::failed(e.to_string());
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status_id, %status, "Delete response");

        interpret_response(status, &body)
    }
}
