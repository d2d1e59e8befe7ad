use liquidity_core::MarketDataError;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
pub(crate) struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    pub(crate) async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            // Remove timestamps outside the window
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Wait until the oldest request falls out of the window
            let sleep_dur = match ts.front() {
                Some(&oldest) => {
                    (oldest + self.window).saturating_duration_since(now)
                        + Duration::from_millis(50)
                }
                None => Duration::from_millis(50),
            };
            drop(ts);
            tracing::debug!(
                "Rate limiter: waiting {:.1}s for a request slot",
                sleep_dur.as_secs_f64()
            );
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Bounded retry with linearly increasing backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
    pub request_timeout: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, backoff_step: Duration, request_timeout: Duration) -> Self {
        Self {
            max_attempts,
            backoff_step,
            request_timeout,
        }
    }

    /// Delay after the failed attempt `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step * (attempt + 1)
    }

    /// 429 and 5xx are worth another try; other 4xx are not
    pub fn is_retryable(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }
}

/// GET-and-decode helper shared by the provider clients
#[derive(Clone)]
pub struct JsonFetcher {
    provider: &'static str,
    client: Client,
    base_url: String,
    policy: RetryPolicy,
    headers: Vec<(&'static str, String)>,
    rate_limiter: Option<RateLimiter>,
}

impl JsonFetcher {
    pub fn new(provider: &'static str, base_url: impl Into<String>, policy: RetryPolicy) -> Self {
        let client = Client::builder()
            .timeout(policy.request_timeout)
            .user_agent(concat!("liquidity-monitor/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            provider,
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            policy,
            headers: Vec::new(),
            rate_limiter: None,
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn with_rate_limit(mut self, max_requests: usize, window: Duration) -> Self {
        self.rate_limiter = Some(RateLimiter::new(max_requests, window));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// GET `path` and decode the JSON body, retrying transient failures.
    ///
    /// Exhausted retries yield `Network`; a 2xx body that does not decode
    /// into `T` yields `DataUnavailable`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, MarketDataError> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_error = String::from("no attempt made");

        for attempt in 0..self.policy.max_attempts {
            if let Some(limiter) = &self.rate_limiter {
                limiter.acquire().await;
            }

            let mut request = self.client.get(&url).query(query);
            for (name, value) in &self.headers {
                request = request.header(*name, value);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => match response.text().await {
                    Ok(body) => {
                        return serde_json::from_str(&body).map_err(|e| {
                            MarketDataError::DataUnavailable(format!(
                                "{} {}: unexpected response shape: {}",
                                self.provider, path, e
                            ))
                        });
                    }
                    Err(e) => last_error = format!("reading body: {e}"),
                },
                Ok(response) => {
                    let status = response.status();
                    last_error = format!("HTTP {status}");
                    if !RetryPolicy::is_retryable(status) {
                        return Err(MarketDataError::Network(format!(
                            "{} {}: {}",
                            self.provider, path, last_error
                        )));
                    }
                }
                Err(e) => last_error = e.to_string(),
            }

            if attempt + 1 < self.policy.max_attempts {
                let delay = self.policy.backoff(attempt);
                tracing::warn!(
                    "{} {} failed ({}), retry {}/{} in {}ms",
                    self.provider,
                    path,
                    last_error,
                    attempt + 1,
                    self.policy.max_attempts - 1,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(MarketDataError::Network(format!(
            "{} {} failed after {} attempts: {}",
            self.provider, path, self.policy.max_attempts, last_error
        )))
    }
}
