//! Outbound HTTP to the puzzle site.
//!
//! Every request goes through a [`Transport`]. The production
//! implementation, [`HttpClient`], adds the runner's User-Agent, the
//! session cookie and a rate limiter that backs off on rapid requests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};

use crate::error::{mask_credential, AuthError, Result};

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!(
    "advent-of-code-runner v",
    env!("CARGO_PKG_VERSION"),
    " by drotthoff@gmail.com"
);

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Blocking GET/POST capability.
pub trait Transport {
    /// Issue a GET, optionally authenticated, optionally following redirects.
    fn get(&self, url: &str, credential: Option<&str>, redirect: bool) -> Result<HttpResponse>;

    /// Issue an authenticated form-encoded POST.
    fn post(&self, url: &str, credential: &str, fields: &[(&str, &str)]) -> Result<HttpResponse>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &str, credential: Option<&str>, redirect: bool) -> Result<HttpResponse> {
        (**self).get(url, credential, redirect)
    }

    fn post(&self, url: &str, credential: &str, fields: &[(&str, &str)]) -> Result<HttpResponse> {
        (**self).post(url, credential, fields)
    }
}

// ── Rate limiting ─────────────────────────────────────────────────────────────

const HISTORY_LEN: usize = 4;
const WINDOW: Duration = Duration::from_secs(3);
const INITIAL_COOL_OFF: Duration = Duration::from_millis(250);

/// Spacing guard: at most [`HISTORY_LEN`] requests per [`WINDOW`].
///
/// Exceeding the budget costs a cool-off delay that doubles on every
/// further offence and is never reset.
#[derive(Debug)]
pub struct RateLimiter {
    history: VecDeque<Instant>,
    cool_off: Duration,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(HISTORY_LEN),
            cool_off: INITIAL_COOL_OFF,
        }
    }

    /// Record a request at `now`, returning the delay to apply first.
    pub fn admit(&mut self, now: Instant) -> Option<Duration> {
        let delay = match self.history.front() {
            Some(oldest) if self.history.len() == HISTORY_LEN && now - *oldest < WINDOW => {
                let delay = self.cool_off;
                self.cool_off *= 2;
                Some(delay)
            }
            _ => None,
        };

        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(now);
        delay
    }

    /// Delay the next offence will cost.
    pub fn cool_off(&self) -> Duration {
        self.cool_off
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

// ── HttpClient ────────────────────────────────────────────────────────────────

/// Rate-limited blocking client for the puzzle site.
///
/// Proxies are taken from the standard `http_proxy`/`https_proxy`
/// environment variables by `reqwest`.
pub struct HttpClient {
    follow: Client,
    no_follow: Client,
    limiter: Mutex<RateLimiter>,
}

impl HttpClient {
    /// Build the client pair (redirect-following and not).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Transport` if the TLS backend cannot be set up.
    pub fn new() -> Result<Self> {
        let build = |policy| {
            Client::builder()
                .user_agent(USER_AGENT)
                .redirect(policy)
                .build()
        };
        Ok(Self {
            follow: build(reqwest::redirect::Policy::limited(10))?,
            no_follow: build(reqwest::redirect::Policy::none())?,
            limiter: Mutex::new(RateLimiter::new()),
        })
    }

    fn throttle(&self) {
        let delay = match self.limiter.lock() {
            Ok(mut limiter) => limiter.admit(Instant::now()),
            Err(poisoned) => poisoned.into_inner().admit(Instant::now()),
        };
        if let Some(delay) = delay {
            warn!(
                "You are being rate-limited - slow down on the requests! (delay={:.2}s)",
                delay.as_secs_f64()
            );
            std::thread::sleep(delay);
        }
    }
}

fn session_headers(credential: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(token) = credential {
        let value = HeaderValue::from_str(&format!("session={token}")).map_err(|_| {
            AuthError::InvalidArgument(format!(
                "token ...{} is not a valid cookie value",
                mask_credential(token)
            ))
        })?;
        headers.insert(COOKIE, value);
    }
    Ok(headers)
}

impl Transport for HttpClient {
    fn get(&self, url: &str, credential: Option<&str>, redirect: bool) -> Result<HttpResponse> {
        let headers = session_headers(credential)?;
        let client = if redirect { &self.follow } else { &self.no_follow };

        self.throttle();
        debug!(
            "GET {url} (token={}, redirect={redirect})",
            credential.map(mask_credential).unwrap_or_else(|| "none".into())
        );
        let response = client.get(url).headers(headers).send()?;

        let status = response.status().as_u16();
        let body = response.bytes()?.to_vec();
        Ok(HttpResponse { status, body })
    }

    fn post(&self, url: &str, credential: &str, fields: &[(&str, &str)]) -> Result<HttpResponse> {
        let headers = session_headers(Some(credential))?;

        self.throttle();
        debug!("POST {url} (token=...{})", mask_credential(credential));
        let response = self
            .follow
            .post(url)
            .headers(headers)
            .form(fields)
            .send()?;

        let status = response.status().as_u16();
        let body = response.bytes()?.to_vec();
        Ok(HttpResponse { status, body })
    }
}
