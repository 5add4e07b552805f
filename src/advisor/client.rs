use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::AdvisorError;

/// The external advisor boundary: a system message and a user message go
/// in, a single text block comes out. Every caller (Matcher,
/// Adapter) has a documented rule-based fallback, so an `Err` here never
/// needs to propagate past the agent that issued the call.
#[async_trait]
pub trait AdvisorClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str, timeout: Duration) -> Result<String, AdvisorError>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    system: &'a str,
    user: &'a str,
    temperature: f32,
}

#[derive(Debug, serde::Deserialize)]
struct CompletionResponse {
    text: String,
}

/// `reqwest`-backed [`AdvisorClient`], the same bounded-external-call
/// shape used elsewhere in this crate for HTTP dependencies, generalized
/// to a provider-agnostic text completion endpoint.
pub struct HttpAdvisorClient {
    client: reqwest::Client,
    url: String,
}

impl HttpAdvisorClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl AdvisorClient for HttpAdvisorClient {
    async fn complete(&self, system: &str, user: &str, timeout: Duration) -> Result<String, AdvisorError> {
        let body = CompletionRequest {
            system,
            user,
            temperature: 0.0,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .timeout(timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AdvisorError::Unavailable(format!(
                "advisor returned status {}",
                response.status()
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AdvisorError::Malformed(e.to_string()))?;

        Ok(parsed.text)
    }
}

/// Always-unavailable advisor, used when no advisor endpoint is
/// configured. Every advisor-dependent agent falls back to its rule-based
/// path, so this is a legitimate runtime mode rather than a test-only
/// stub.
pub struct NullAdvisorClient;

#[async_trait]
impl AdvisorClient for NullAdvisorClient {
    async fn complete(&self, _system: &str, _user: &str, _timeout: Duration) -> Result<String, AdvisorError> {
        Err(AdvisorError::Unavailable("no advisor configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_advisor_always_errs() {
        let advisor = NullAdvisorClient;
        let result = advisor.complete("sys", "user", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(AdvisorError::Unavailable(_))));
    }
}
