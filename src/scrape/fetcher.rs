//! Page fetcher: one HTTP GET per call, bounded by the client timeouts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect, Client};

use crate::config::Config;
use crate::errors::{AppError, FetchCause, FetchError};

/// Retrieves raw markup for a page belonging to one department.
///
/// Implementations do not retry; retry policy belongs to the department worker.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, department: &str, url: &str) -> Result<String, FetchError>;
}

/// `reqwest`-backed fetcher shared by all workers of a refresh.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(
        user_agent: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .redirect(redirect::Policy::limited(10))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(
            &config.user_agent,
            config.connect_timeout,
            config.request_timeout,
        )
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, department: &str, url: &str) -> Result<String, FetchError> {
        let fail = |cause| FetchError {
            department: department.to_string(),
            url: url.to_string(),
            cause,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fail(classify(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fail(FetchCause::Status(status.as_u16())));
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                fail(FetchCause::Timeout)
            } else {
                fail(FetchCause::Body(e.to_string()))
            }
        })
    }
}

fn classify(err: &reqwest::Error) -> FetchCause {
    if err.is_timeout() {
        FetchCause::Timeout
    } else if let Some(status) = err.status() {
        FetchCause::Status(status.as_u16())
    } else {
        FetchCause::Network(err.to_string())
    }
}
