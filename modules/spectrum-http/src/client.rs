use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{redirect, Response};
use serde::Serialize;

use crate::error::{HttpError, Result};
use crate::policy::{persistently, RetryPolicy};

/// Per-request timeout when the caller does not set one.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    /// Some end2end environments run on self-signed certificates.
    pub accept_invalid_certs: bool,
    pub follow_redirects: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: HTTP_TIMEOUT,
            accept_invalid_certs: false,
            follow_redirects: true,
        }
    }
}

/// reqwest client whose GETs ride out transient statuses.
#[derive(Debug, Clone)]
pub struct RetryingClient {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(policy: RetryPolicy) -> Result<Self> {
        Self::with_options(policy, ClientOptions::default())
    }

    pub fn with_options(policy: RetryPolicy, options: ClientOptions) -> Result<Self> {
        let redirects = if options.follow_redirects {
            redirect::Policy::default()
        } else {
            redirect::Policy::none()
        };
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .redirect(redirects)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self { client, policy })
    }

    pub fn from_client(client: reqwest::Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The underlying client, for requests that need more than a GET.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// GET, retried with backoff while the status is transient.
    pub async fn get(&self, url: &str, headers: &HeaderMap) -> Result<Response> {
        let response = persistently(&self.policy, url, || {
            self.client.get(url).headers(headers.clone()).send()
        })
        .await?;
        Ok(response)
    }

    /// Single GET, no retries.
    pub async fn get_once(&self, url: &str, headers: &HeaderMap) -> Result<Response> {
        Ok(self.client.get(url).headers(headers.clone()).send().await?)
    }

    pub async fn head(&self, url: &str) -> Result<Response> {
        Ok(self.client.head(url).send().await?)
    }

    pub async fn post_json<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<Response> {
        Ok(self.client.post(url).json(body).send().await?)
    }
}
