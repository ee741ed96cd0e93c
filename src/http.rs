//! Polling HTTP GET capability used by the metadata providers.

use std::future::Future;
use std::time::Duration;

use log::debug;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio::time::{Instant, sleep_until, timeout_at};
use tokio_util::sync::CancellationToken;

use crate::constants::{
    HTTP_DETECT_MAX_DATA, HTTP_DETECT_POLL_TIMEOUT, HTTP_POLL_TIMEOUT, HTTP_RATE_LIMIT,
    HTTP_REQ_MAX_DATA, HTTP_TIMEOUT,
};
use crate::error::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollRequest<'a> {
    pub url: &'a str,
    /// Timeout of a single attempt.
    pub request_timeout: Duration,
    pub max_data: usize,
    /// Deadline for the whole poll, across all attempts.
    pub poll_timeout: Duration,
    /// Minimum spacing between attempts.
    pub ratelimit: Duration,
}

impl<'a> PollRequest<'a> {
    pub fn detect(url: &'a str) -> Self {
        Self {
            url,
            request_timeout: HTTP_TIMEOUT,
            max_data: HTTP_DETECT_MAX_DATA,
            poll_timeout: HTTP_DETECT_POLL_TIMEOUT,
            ratelimit: HTTP_RATE_LIMIT,
        }
    }

    pub fn config(url: &'a str) -> Self {
        Self {
            url,
            request_timeout: HTTP_TIMEOUT,
            max_data: HTTP_REQ_MAX_DATA,
            poll_timeout: HTTP_POLL_TIMEOUT,
            ratelimit: HTTP_RATE_LIMIT,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PollResponse {
    /// False when the server kept answering without a success status until
    /// the poll deadline.
    pub success: bool,
    pub body: Vec<u8>,
}

pub trait PollClient: Send + Sync {
    /// Adds a header, given as `"Name: value"`, to every later request.
    fn add_header(&mut self, header: &str) -> Result<(), Error>;

    /// Issues a GET, retrying until it succeeds or the poll deadline passes.
    /// Resolves to `Error::Cancelled` promptly once `cancel` fires.
    fn poll_get(
        &self,
        request: &PollRequest<'_>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<PollResponse, Error>> + Send;
}

enum Attempt {
    Done(Vec<u8>),
    Status(u16),
    Failed(Error),
}

#[derive(Clone, Debug)]
pub struct HttpPollClient {
    client: reqwest::Client,
    headers: HeaderMap,
}

impl HttpPollClient {
    pub fn new() -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| Error::Setup(format!("unable to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            headers: HeaderMap::new(),
        })
    }

    async fn get_once(&self, request: &PollRequest<'_>) -> Attempt {
        let mut response = match self
            .client
            .get(request.url)
            .headers(self.headers.clone())
            .timeout(request.request_timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return Attempt::Failed(Error::Transport(e.to_string())),
        };
        let status = response.status();
        if !status.is_success() {
            return Attempt::Status(status.as_u16());
        }
        let mut body = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if body.len() + chunk.len() > request.max_data {
                        return Attempt::Failed(Error::Transport(format!(
                            "response from {} exceeds {} bytes",
                            request.url, request.max_data
                        )));
                    }
                    body.extend_from_slice(&chunk);
                }
                Ok(None) => return Attempt::Done(body),
                Err(e) => return Attempt::Failed(Error::Transport(e.to_string())),
            }
        }
    }
}

impl PollClient for HttpPollClient {
    fn add_header(&mut self, header: &str) -> Result<(), Error> {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| Error::Setup(format!("malformed header {:?}", header)))?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|e| Error::Setup(format!("invalid header name {:?}: {}", name, e)))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|e| Error::Setup(format!("invalid header value {:?}: {}", value, e)))?;
        self.headers.insert(name, value);
        Ok(())
    }

    async fn poll_get(
        &self,
        request: &PollRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<PollResponse, Error> {
        let deadline = Instant::now() + request.poll_timeout;
        loop {
            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                a = timeout_at(deadline, self.get_once(request)) => a,
            };
            let last = match attempt {
                Err(_) => {
                    return Err(Error::Transport(format!(
                        "timed out polling {} after {:?}",
                        request.url, request.poll_timeout
                    )));
                }
                Ok(Attempt::Done(body)) => {
                    return Ok(PollResponse {
                        success: true,
                        body,
                    });
                }
                Ok(Attempt::Status(code)) => {
                    debug!("GET {} returned status {}", request.url, code);
                    None
                }
                Ok(Attempt::Failed(e)) => {
                    debug!("GET {} failed: {}", request.url, e);
                    Some(e)
                }
            };
            let next = Instant::now() + request.ratelimit;
            if next >= deadline {
                return match last {
                    Some(e) => Err(e),
                    None => Ok(PollResponse::default()),
                };
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = sleep_until(next) => {}
            }
        }
    }
}
