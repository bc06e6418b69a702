// src/models/analytics.rs

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Desktop,
    Mobile,
    Tablet,
    #[default]
    Unknown,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Desktop => "desktop",
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Unknown => "unknown",
        }
    }
}

/// Request context captured with every click or profile view.
/// Absent fields are stored as NULL; the device type defaults to unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventMetadata {
    pub ip_address: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub user_agent: Option<String>,
    pub device_type: Option<DeviceType>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub referrer: Option<String>,
    pub referrer_domain: Option<String>,
}

/// One row of `link_clicks` or `profile_views`.
///
/// `subject_id` is the link id for clicks and the viewed user id for views.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub id: String,
    pub subject_id: String,
    pub occurred_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub user_agent: Option<String>,
    pub device_type: DeviceType,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub referrer: Option<String>,
    pub referrer_domain: Option<String>,
}

/// Inclusive time window applied to event timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Window of equal length ending one millisecond before `start`.
    pub fn previous(&self) -> Self {
        let length = self.end - self.start;
        Self {
            start: self.start - length,
            end: self.start - Duration::milliseconds(1),
        }
    }

    pub fn start_millis(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn end_millis(&self) -> i64 {
        self.end.timestamp_millis()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct TimeSeriesPoint {
    /// Calendar day, `YYYY-MM-DD` (UTC).
    pub date: String,
    pub count: i64,
}

/// One bucket of a categorical breakdown.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct CountByField {
    pub value: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopLink {
    pub link_id: String,
    pub title: Option<String>,
    pub url: String,
    pub clicks: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_clicks: i64,
    pub total_profile_views: i64,
    /// Percentage change against the previous window.
    pub clicks_change: i64,
    pub views_change: i64,
    pub top_countries: Vec<CountByField>,
    pub top_devices: Vec<CountByField>,
    pub top_referrers: Vec<CountByField>,
    pub top_links: Vec<TopLink>,
    pub clicks_over_time: Vec<TimeSeriesPoint>,
    pub views_over_time: Vec<TimeSeriesPoint>,
}

#[derive(Debug, Serialize)]
pub struct DateRangeResponse {
    pub start: String,
    pub end: String,
}

/// Millisecond precision, `Z` suffix.
impl From<DateRange> for DateRangeResponse {
    fn from(range: DateRange) -> Self {
        Self {
            start: range.start.to_rfc3339_opts(SecondsFormat::Millis, true),
            end: range.end.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    #[serde(flatten)]
    pub summary: AnalyticsSummary,
    pub date_range: DateRangeResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkClicksResponse {
    pub link_id: String,
    pub link_title: Option<String>,
    pub link_url: String,
    pub total_clicks: i64,
    pub clicks_over_time: Vec<TimeSeriesPoint>,
    pub by_country: Vec<CountByField>,
    pub by_device: Vec<CountByField>,
    pub by_browser: Vec<CountByField>,
    pub by_referrer: Vec<CountByField>,
    pub date_range: DateRangeResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileViewsResponse {
    pub total_views: i64,
    pub views_over_time: Vec<TimeSeriesPoint>,
    pub by_country: Vec<CountByField>,
    pub by_referrer: Vec<CountByField>,
    pub date_range: DateRangeResponse,
}

/// Query parameters shared by the analytics endpoints.
#[derive(Debug, Deserialize)]
pub struct AnalyticsParams {
    /// '7d', '30d' (default) or '90d'.
    pub range: Option<String>,
}
