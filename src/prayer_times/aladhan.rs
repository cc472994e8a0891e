use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::models::{DailyTimings, Location};
use crate::prayer_times::provider::{timings_from_clock, TimingsError, TimingsProvider};

/// Remote timings lookup against an Aladhan-compatible `timingsByCity` API.
#[derive(Debug, Clone)]
pub struct AladhanProvider {
    http: reqwest::blocking::Client,
    base_url: String,
    method: u8,
    timeout: Duration,
}

impl AladhanProvider {
    pub fn new(base_url: &str, method: u8, timeout: Duration) -> Result<Self, TimingsError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TimingsError::Transport(format!("building http client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            method,
            timeout,
        })
    }

    fn build_url(&self, date: NaiveDate) -> String {
        format!(
            "{}/timingsByCity/{}",
            self.base_url,
            date.format("%d-%m-%Y")
        )
    }

    fn classify(&self, e: reqwest::Error) -> TimingsError {
        if e.is_timeout() {
            TimingsError::Timeout(format!("{:?}", self.timeout))
        } else if e.is_decode() {
            TimingsError::Malformed(e.to_string())
        } else {
            TimingsError::Transport(e.to_string())
        }
    }
}

impl TimingsProvider for AladhanProvider {
    fn name(&self) -> &'static str {
        "aladhan"
    }

    fn fetch(&self, date: NaiveDate, location: &Location) -> Result<DailyTimings, TimingsError> {
        let method = self.method.to_string();
        log::debug!("fetching timings for {} on {}", location, date);

        let resp = self
            .http
            .get(self.build_url(date))
            .query(&[
                ("city", location.city.as_str()),
                ("country", location.country.as_str()),
                ("method", method.as_str()),
            ])
            .send()
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        if status.is_client_error()
            && status != reqwest::StatusCode::REQUEST_TIMEOUT
            && status != reqwest::StatusCode::TOO_MANY_REQUESTS
        {
            return Err(TimingsError::UnknownLocation(format!(
                "{} (http {})",
                location,
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(TimingsError::Transport(format!(
                "http status {}",
                status.as_u16()
            )));
        }

        let body: AladhanResponse = resp.json().map_err(|e| self.classify(e))?;
        let timings = body.into_timings()?;
        timings_from_clock(date, &timings)
    }
}

#[derive(Debug, Deserialize)]
struct AladhanResponse {
    code: i64,
    #[serde(default)]
    status: Option<String>,
    data: serde_json::Value,
}

impl AladhanResponse {
    fn into_timings(self) -> Result<HashMap<String, String>, TimingsError> {
        if self.code != 200 {
            return Err(TimingsError::Malformed(format!(
                "code={} status={}",
                self.code,
                self.status.as_deref().unwrap_or("unknown")
            )));
        }
        let timings = self
            .data
            .get("timings")
            .cloned()
            .ok_or_else(|| TimingsError::Malformed("response has no timings".to_string()))?;
        serde_json::from_value(timings).map_err(|e| TimingsError::Malformed(e.to_string()))
    }
}

// -----------------
// Tests (local mock server, no network)
// -----------------
