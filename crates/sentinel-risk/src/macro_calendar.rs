//! Macro-event calendar collaborator.
//!
//! The HTTP client issues `GET {url}?date=YYYY-MM-DD` and expects
//! `{"result": [{"impact": "High", ...}, ...]}`. A day is not clear when any
//! event has impact `High`.

use std::time::Duration;

use chrono::NaiveDate;
use parking_lot::Mutex;
use reqwest::Client;
use sentinel_core::{BoxFuture, CollaboratorError, CollaboratorResult};
use serde::Deserialize;
use tracing::debug;

use crate::config::MacroCalendarConfig;
use crate::error::{RiskError, RiskResult};

/// Source of scheduled macro events.
pub trait MacroCalendar: Send + Sync {
    /// Whether a high-impact event is scheduled on `date`.
    fn high_impact_on(&self, date: NaiveDate) -> BoxFuture<'_, CollaboratorResult<bool>>;
}

#[derive(Debug, Deserialize)]
struct CalendarResponse {
    #[serde(default)]
    result: Vec<CalendarEvent>,
}

#[derive(Debug, Deserialize)]
struct CalendarEvent {
    #[serde(default)]
    impact: String,
}

impl CalendarResponse {
    fn has_high_impact(&self) -> bool {
        self.result.iter().any(|e| e.impact == "High")
    }
}

// ============================================================================
// HTTP calendar
// ============================================================================

/// Calendar backed by an HTTP endpoint.
pub struct HttpMacroCalendar {
    client: Client,
    url: String,
}

impl HttpMacroCalendar {
    pub fn new(url: impl Into<String>, timeout: Duration) -> RiskResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RiskError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// `None` when no URL is configured.
    pub fn from_config(config: &MacroCalendarConfig) -> RiskResult<Option<Self>> {
        config
            .url
            .as_ref()
            .map(|url| Self::new(url.clone(), Duration::from_secs(config.timeout_s)))
            .transpose()
    }

    async fn fetch(&self, date: NaiveDate) -> CollaboratorResult<bool> {
        let day = date.format("%Y-%m-%d").to_string();
        let response = self
            .client
            .get(&self.url)
            .query(&[("date", day.as_str())])
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(CollaboratorError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Fatal(format!("HTTP {status}: {body}")));
        }

        let body: CalendarResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Fatal(format!("Failed to parse response: {e}")))?;
        debug!(%date, events = body.result.len(), "Macro calendar fetched");
        Ok(body.has_high_impact())
    }
}

fn classify_transport(e: reqwest::Error) -> CollaboratorError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        CollaboratorError::Transient(format!("HTTP request failed: {e}"))
    } else {
        CollaboratorError::Fatal(format!("HTTP request failed: {e}"))
    }
}

impl MacroCalendar for HttpMacroCalendar {
    fn high_impact_on(&self, date: NaiveDate) -> BoxFuture<'_, CollaboratorResult<bool>> {
        Box::pin(self.fetch(date))
    }
}

// ============================================================================
// Fixed calendar
// ============================================================================

/// Calendar returning a preset answer; used by paper mode and tests.
#[derive(Debug)]
pub struct FixedMacroCalendar {
    answer: Mutex<CollaboratorResult<bool>>,
}

impl FixedMacroCalendar {
    #[must_use]
    pub fn new(answer: CollaboratorResult<bool>) -> Self {
        Self {
            answer: Mutex::new(answer),
        }
    }

    pub fn set(&self, answer: CollaboratorResult<bool>) {
        *self.answer.lock() = answer;
    }
}

impl MacroCalendar for FixedMacroCalendar {
    fn high_impact_on(&self, _date: NaiveDate) -> BoxFuture<'_, CollaboratorResult<bool>> {
        let answer = self.answer.lock().clone();
        Box::pin(async move { answer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_high_impact() {
        let body: CalendarResponse = serde_json::from_str(
            r#"{"result":[{"impact":"Low","event":"PMI"},{"impact":"High","event":"FOMC"}]}"#,
        )
        .unwrap();
        assert!(body.has_high_impact());
    }

    #[test]
    fn test_parse_no_high_impact() {
        let body: CalendarResponse =
            serde_json::from_str(r#"{"result":[{"impact":"Medium"}]}"#).unwrap();
        assert!(!body.has_high_impact());

        let empty: CalendarResponse = serde_json::from_str("{}").unwrap();
        assert!(!empty.has_high_impact());
    }

    #[test]
    fn test_from_config_without_url() {
        assert!(HttpMacroCalendar::from_config(&MacroCalendarConfig::default())
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transient() {
        // Port 9 (discard) on localhost is closed in test environments.
        let calendar =
            HttpMacroCalendar::new("http://127.0.0.1:9/calendar", Duration::from_millis(500))
                .unwrap();
        let result = calendar
            .high_impact_on(NaiveDate::from_ymd_opt(2024, 3, 20).unwrap())
            .await;
        assert!(matches!(result, Err(CollaboratorError::Transient(_))));
    }
}
