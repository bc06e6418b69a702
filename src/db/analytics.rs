// src/db/analytics.rs

//! Event recording and read-only aggregation over `link_clicks` and
//! `profile_views`.
//!
//! Every query is built from a [`Scope`] (which events) and an optional
//! inclusive [`DateRange`]. Breakdowns coalesce missing values to a fixed
//! label per [`Dimension`], identically for the per-link and per-user
//! variants.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

use super::Database;
use crate::models::analytics::{
    AnalyticsEvent, CountByField, DateRange, EventMetadata, TimeSeriesPoint, TopLink,
};

/// Number of links returned by [`Database::user_top_links`] when no limit is given.
pub const DEFAULT_TOP_LINKS: i64 = 10;

/// Which events a query reads.
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    /// Clicks on one link.
    LinkClicks(&'a str),
    /// Clicks on every link owned by a user.
    UserClicks(&'a str),
    /// Views of a user's public profile.
    ProfileViews(&'a str),
}

impl<'a> Scope<'a> {
    fn from_clause(&self) -> &'static str {
        match self {
            Scope::LinkClicks(_) => "FROM link_clicks e WHERE e.link_id = ",
            Scope::UserClicks(_) => {
                "FROM link_clicks e INNER JOIN links l ON e.link_id = l.id WHERE l.user_id = "
            }
            Scope::ProfileViews(_) => "FROM profile_views e WHERE e.user_id = ",
        }
    }

    fn owner(&self) -> &'a str {
        match self {
            Scope::LinkClicks(id) | Scope::UserClicks(id) | Scope::ProfileViews(id) => id,
        }
    }
}

/// Categorical dimension of a breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Country,
    Device,
    Browser,
    Referrer,
}

impl Dimension {
    fn column(&self) -> &'static str {
        match self {
            Dimension::Country => "e.country",
            Dimension::Device => "e.device_type",
            Dimension::Browser => "e.browser",
            Dimension::Referrer => "e.referrer_domain",
        }
    }

    /// Label used when the value is missing.
    pub fn fallback_label(&self) -> &'static str {
        match self {
            Dimension::Referrer => "Direct",
            _ => "Unknown",
        }
    }
}

enum EventTable {
    LinkClicks,
    ProfileViews,
}

impl EventTable {
    fn insert_sql(&self) -> &'static str {
        match self {
            EventTable::LinkClicks => {
                r#"
                INSERT INTO link_clicks (
                    id, link_id, occurred_at, ip_address, country, city, user_agent,
                    device_type, browser, os, referrer, referrer_domain
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#
            }
            EventTable::ProfileViews => {
                r#"
                INSERT INTO profile_views (
                    id, user_id, occurred_at, ip_address, country, city, user_agent,
                    device_type, browser, os, referrer, referrer_domain
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#
            }
        }
    }
}

impl Database {
    /// Records one click on `link_id` at the current time.
    pub async fn record_click(
        &self,
        link_id: &str,
        metadata: &EventMetadata,
    ) -> Result<AnalyticsEvent, sqlx::Error> {
        self.record_click_at(link_id, metadata, Utc::now()).await
    }

    pub async fn record_click_at(
        &self,
        link_id: &str,
        metadata: &EventMetadata,
        occurred_at: DateTime<Utc>,
    ) -> Result<AnalyticsEvent, sqlx::Error> {
        let event = self
            .insert_event(EventTable::LinkClicks, link_id, metadata, occurred_at)
            .await?;
        tracing::info!(
            link_id,
            country = ?event.country,
            device_type = event.device_type.as_str(),
            "Recorded link click"
        );
        Ok(event)
    }

    /// Records one view of the public profile of `user_id` at the current time.
    pub async fn record_profile_view(
        &self,
        user_id: &str,
        metadata: &EventMetadata,
    ) -> Result<AnalyticsEvent, sqlx::Error> {
        self.record_profile_view_at(user_id, metadata, Utc::now()).await
    }

    pub async fn record_profile_view_at(
        &self,
        user_id: &str,
        metadata: &EventMetadata,
        occurred_at: DateTime<Utc>,
    ) -> Result<AnalyticsEvent, sqlx::Error> {
        let event = self
            .insert_event(EventTable::ProfileViews, user_id, metadata, occurred_at)
            .await?;
        tracing::info!(
            user_id,
            country = ?event.country,
            device_type = event.device_type.as_str(),
            "Recorded profile view"
        );
        Ok(event)
    }

    async fn insert_event(
        &self,
        table: EventTable,
        subject_id: &str,
        metadata: &EventMetadata,
        occurred_at: DateTime<Utc>,
    ) -> Result<AnalyticsEvent, sqlx::Error> {
        let event = AnalyticsEvent {
            id: Uuid::new_v4().to_string(),
            subject_id: subject_id.to_string(),
            occurred_at,
            ip_address: metadata.ip_address.clone(),
            country: metadata.country.clone(),
            city: metadata.city.clone(),
            user_agent: metadata.user_agent.clone(),
            device_type: metadata.device_type.unwrap_or_default(),
            browser: metadata.browser.clone(),
            os: metadata.os.clone(),
            referrer: metadata.referrer.clone(),
            referrer_domain: metadata.referrer_domain.clone(),
        };

        sqlx::query(table.insert_sql())
            .bind(&event.id)
            .bind(&event.subject_id)
            .bind(event.occurred_at.timestamp_millis())
            .bind(&event.ip_address)
            .bind(&event.country)
            .bind(&event.city)
            .bind(&event.user_agent)
            .bind(event.device_type.as_str())
            .bind(&event.browser)
            .bind(&event.os)
            .bind(&event.referrer)
            .bind(&event.referrer_domain)
            .execute(self.pool())
            .await?;

        Ok(event)
    }

    /// `SELECT <select> FROM <scope> WHERE <owner> = ? [AND <range>]`
    fn scoped_query<'a>(
        select: &str,
        scope: Scope<'a>,
        range: Option<&DateRange>,
    ) -> QueryBuilder<'a, Sqlite> {
        let mut qb = QueryBuilder::new(format!("SELECT {} {}", select, scope.from_clause()));
        qb.push_bind(scope.owner());
        if let Some(range) = range {
            qb.push(" AND e.occurred_at >= ")
                .push_bind(range.start_millis())
                .push(" AND e.occurred_at <= ")
                .push_bind(range.end_millis());
        }
        qb
    }

    /// Events per UTC calendar day, ascending. Days without events are absent.
    pub async fn time_series(
        &self,
        scope: Scope<'_>,
        range: &DateRange,
    ) -> Result<Vec<TimeSeriesPoint>, sqlx::Error> {
        let mut qb = Self::scoped_query(
            "date(e.occurred_at / 1000, 'unixepoch') AS date, COUNT(*) AS count",
            scope,
            Some(range),
        );
        qb.push(" GROUP BY date(e.occurred_at / 1000, 'unixepoch') ORDER BY date ASC");

        qb.build_query_as::<TimeSeriesPoint>()
            .fetch_all(self.pool())
            .await
    }

    /// Event counts grouped by `dimension`, largest first.
    pub async fn breakdown(
        &self,
        scope: Scope<'_>,
        dimension: Dimension,
        range: Option<&DateRange>,
    ) -> Result<Vec<CountByField>, sqlx::Error> {
        let value = format!(
            "COALESCE({}, '{}')",
            dimension.column(),
            dimension.fallback_label()
        );
        let select = format!("{} AS value, COUNT(*) AS count", value);
        let mut qb = Self::scoped_query(&select, scope, range);
        qb.push(format!(" GROUP BY {} ORDER BY count DESC, value ASC", value));

        qb.build_query_as::<CountByField>()
            .fetch_all(self.pool())
            .await
    }

    pub async fn event_count(
        &self,
        scope: Scope<'_>,
        range: Option<&DateRange>,
    ) -> Result<i64, sqlx::Error> {
        let mut qb = Self::scoped_query("COUNT(*)", scope, range);
        qb.build_query_scalar::<i64>().fetch_one(self.pool()).await
    }

    pub async fn link_clicks_over_time(
        &self,
        link_id: &str,
        range: &DateRange,
    ) -> Result<Vec<TimeSeriesPoint>, sqlx::Error> {
        self.time_series(Scope::LinkClicks(link_id), range).await
    }

    pub async fn link_clicks_by_country(
        &self,
        link_id: &str,
        range: Option<&DateRange>,
    ) -> Result<Vec<CountByField>, sqlx::Error> {
        self.breakdown(Scope::LinkClicks(link_id), Dimension::Country, range).await
    }

    pub async fn link_clicks_by_device(
        &self,
        link_id: &str,
        range: Option<&DateRange>,
    ) -> Result<Vec<CountByField>, sqlx::Error> {
        self.breakdown(Scope::LinkClicks(link_id), Dimension::Device, range).await
    }

    pub async fn link_clicks_by_browser(
        &self,
        link_id: &str,
        range: Option<&DateRange>,
    ) -> Result<Vec<CountByField>, sqlx::Error> {
        self.breakdown(Scope::LinkClicks(link_id), Dimension::Browser, range).await
    }

    pub async fn link_clicks_by_referrer(
        &self,
        link_id: &str,
        range: Option<&DateRange>,
    ) -> Result<Vec<CountByField>, sqlx::Error> {
        self.breakdown(Scope::LinkClicks(link_id), Dimension::Referrer, range).await
    }

    pub async fn link_click_count(
        &self,
        link_id: &str,
        range: Option<&DateRange>,
    ) -> Result<i64, sqlx::Error> {
        self.event_count(Scope::LinkClicks(link_id), range).await
    }

    pub async fn user_clicks_over_time(
        &self,
        user_id: &str,
        range: &DateRange,
    ) -> Result<Vec<TimeSeriesPoint>, sqlx::Error> {
        self.time_series(Scope::UserClicks(user_id), range).await
    }

    pub async fn user_clicks_by_country(
        &self,
        user_id: &str,
        range: Option<&DateRange>,
    ) -> Result<Vec<CountByField>, sqlx::Error> {
        self.breakdown(Scope::UserClicks(user_id), Dimension::Country, range).await
    }

    pub async fn user_clicks_by_device(
        &self,
        user_id: &str,
        range: Option<&DateRange>,
    ) -> Result<Vec<CountByField>, sqlx::Error> {
        self.breakdown(Scope::UserClicks(user_id), Dimension::Device, range).await
    }

    pub async fn user_clicks_by_browser(
        &self,
        user_id: &str,
        range: Option<&DateRange>,
    ) -> Result<Vec<CountByField>, sqlx::Error> {
        self.breakdown(Scope::UserClicks(user_id), Dimension::Browser, range).await
    }

    pub async fn user_clicks_by_referrer(
        &self,
        user_id: &str,
        range: Option<&DateRange>,
    ) -> Result<Vec<CountByField>, sqlx::Error> {
        self.breakdown(Scope::UserClicks(user_id), Dimension::Referrer, range).await
    }

    pub async fn user_total_clicks(
        &self,
        user_id: &str,
        range: Option<&DateRange>,
    ) -> Result<i64, sqlx::Error> {
        self.event_count(Scope::UserClicks(user_id), range).await
    }

    /// Click counts per link of `user_id`, largest first, at most `limit`
    /// rows ([`DEFAULT_TOP_LINKS`] when `None`).
    pub async fn user_top_links(
        &self,
        user_id: &str,
        range: Option<&DateRange>,
        limit: Option<i64>,
    ) -> Result<Vec<TopLink>, sqlx::Error> {
        let limit = limit.unwrap_or(DEFAULT_TOP_LINKS);
        let mut qb = Self::scoped_query(
            "l.id AS link_id, l.title AS title, l.url AS url, COUNT(*) AS clicks",
            Scope::UserClicks(user_id),
            range,
        );
        qb.push(" GROUP BY l.id ORDER BY clicks DESC, l.position ASC LIMIT ")
            .push_bind(limit);

        qb.build_query_as::<TopLink>().fetch_all(self.pool()).await
    }

    pub async fn profile_views_over_time(
        &self,
        user_id: &str,
        range: &DateRange,
    ) -> Result<Vec<TimeSeriesPoint>, sqlx::Error> {
        self.time_series(Scope::ProfileViews(user_id), range).await
    }

    pub async fn profile_view_count(
        &self,
        user_id: &str,
        range: Option<&DateRange>,
    ) -> Result<i64, sqlx::Error> {
        self.event_count(Scope::ProfileViews(user_id), range).await
    }

    pub async fn profile_views_by_country(
        &self,
        user_id: &str,
        range: Option<&DateRange>,
    ) -> Result<Vec<CountByField>, sqlx::Error> {
        self.breakdown(Scope::ProfileViews(user_id), Dimension::Country, range).await
    }

    pub async fn profile_views_by_referrer(
        &self,
        user_id: &str,
        range: Option<&DateRange>,
    ) -> Result<Vec<CountByField>, sqlx::Error> {
        self.breakdown(Scope::ProfileViews(user_id), Dimension::Referrer, range).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users::NewPhoneUser;
    use crate::models::analytics::DeviceType;
    use crate::models::link::CreateLinkRequest;
    use chrono::TimeZone;

    struct Fixture {
        db: Database,
        user_id: String,
        link_a: String,
        link_b: String,
    }

    async fn fixture() -> Fixture {
        let db = Database::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let user = db
            .create_user_with_phone(NewPhoneUser {
                username: "stats".to_string(),
                display_name: "Stats".to_string(),
                phone: "5552223333".to_string(),
                pin_hash: "hash".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut ids = Vec::new();
        for (url, title) in [("https://a.example", "A"), ("https://b.example", "B")] {
            let link = db
                .create_link(
                    &user.id,
                    CreateLinkRequest {
                        url: url.to_string(),
                        title: Some(title.to_string()),
                        description: None,
                        image_url: None,
                        favicon: None,
                        site_name: None,
                        is_public: None,
                    },
                )
                .await
                .unwrap();
            ids.push(link.id);
        }

        Fixture {
            db,
            user_id: user.id,
            link_b: ids.pop().unwrap(),
            link_a: ids.pop().unwrap(),
        }
    }

    fn meta(country: Option<&str>, device: DeviceType, referrer: Option<&str>) -> EventMetadata {
        EventMetadata {
            country: country.map(String::from),
            device_type: Some(device),
            browser: Some("Firefox".to_string()),
            referrer_domain: referrer.map(String::from),
            ..Default::default()
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, hour, 30, 0).unwrap()
    }

    fn june(first: u32, last: u32) -> DateRange {
        DateRange::new(
            Utc.with_ymd_and_hms(2025, 6, first, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, last, 23, 59, 59).unwrap(),
        )
    }

    async fn seed(f: &Fixture) {
        let db = &f.db;
        let mobile_fr = meta(Some("France"), DeviceType::Mobile, Some("x.com"));
        db.record_click_at(&f.link_a, &mobile_fr, at(1, 9)).await.unwrap();
        db.record_click_at(&f.link_a, &meta(Some("France"), DeviceType::Desktop, None), at(1, 18))
            .await
            .unwrap();
        db.record_click_at(&f.link_a, &meta(None, DeviceType::Mobile, None), at(3, 12))
            .await
            .unwrap();
        let tablet_jp = meta(Some("Japan"), DeviceType::Tablet, Some("x.com"));
        db.record_click_at(&f.link_b, &tablet_jp, at(3, 13)).await.unwrap();
        // Outside the June 1-5 window.
        db.record_click_at(&f.link_b, &meta(Some("Japan"), DeviceType::Mobile, None), at(20, 8))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn recorded_event_defaults_device_type_to_unknown() {
        let f = fixture().await;
        let event = f.db.record_click(&f.link_a, &EventMetadata::default()).await.unwrap();
        assert_eq!(event.device_type, DeviceType::Unknown);
        assert_eq!(event.country, None);

        let devices = f.db.link_clicks_by_device(&f.link_a, None).await.unwrap();
        assert_eq!(devices, vec![CountByField { value: "unknown".to_string(), count: 1 }]);
    }

    #[tokio::test]
    async fn time_series_buckets_by_day_within_range() {
        let f = fixture().await;
        seed(&f).await;

        let series = f.db.user_clicks_over_time(&f.user_id, &june(1, 5)).await.unwrap();
        assert_eq!(
            series,
            vec![
                TimeSeriesPoint { date: "2025-06-01".to_string(), count: 2 },
                TimeSeriesPoint { date: "2025-06-03".to_string(), count: 2 },
            ]
        );

        let single = f.db.link_clicks_over_time(&f.link_a, &june(3, 3)).await.unwrap();
        assert_eq!(single, vec![TimeSeriesPoint { date: "2025-06-03".to_string(), count: 1 }]);
    }

    #[tokio::test]
    async fn breakdowns_coalesce_missing_values_and_sum_to_total() {
        let f = fixture().await;
        seed(&f).await;
        let range = june(1, 5);

        let by_country = f.db.user_clicks_by_country(&f.user_id, Some(&range)).await.unwrap();
        assert_eq!(by_country[0], CountByField { value: "France".to_string(), count: 2 });
        assert!(by_country.iter().any(|c| c.value == "Unknown" && c.count == 1));

        let by_referrer = f.db.user_clicks_by_referrer(&f.user_id, Some(&range)).await.unwrap();
        assert_eq!(by_referrer[0], CountByField { value: "Direct".to_string(), count: 2 });

        let total = f.db.user_total_clicks(&f.user_id, Some(&range)).await.unwrap();
        assert_eq!(total, 4);
        for rows in [
            by_country,
            by_referrer,
            f.db.user_clicks_by_device(&f.user_id, Some(&range)).await.unwrap(),
            f.db.user_clicks_by_browser(&f.user_id, Some(&range)).await.unwrap(),
        ] {
            assert_eq!(rows.iter().map(|r| r.count).sum::<i64>(), total);
        }

        assert_eq!(f.db.user_total_clicks(&f.user_id, None).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn per_link_and_per_user_country_breakdowns_agree() {
        let f = fixture().await;
        f.db.record_click(&f.link_a, &meta(None, DeviceType::Mobile, None)).await.unwrap();
        f.db.record_click(&f.link_a, &meta(Some("Peru"), DeviceType::Mobile, None)).await.unwrap();

        let per_link = f.db.link_clicks_by_country(&f.link_a, None).await.unwrap();
        let per_user = f.db.user_clicks_by_country(&f.user_id, None).await.unwrap();
        assert_eq!(per_link, per_user);
        assert!(per_link.iter().any(|c| c.value == Dimension::Country.fallback_label()));
    }

    #[tokio::test]
    async fn top_links_are_ranked_and_limited() {
        let f = fixture().await;
        seed(&f).await;

        let top = f.db.user_top_links(&f.user_id, None, None).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].link_id, f.link_a);
        assert_eq!(top[0].clicks, 3);
        assert_eq!(top[0].title.as_deref(), Some("A"));
        assert_eq!(top[1].clicks, 2);

        let only_one = f.db.user_top_links(&f.user_id, None, Some(1)).await.unwrap();
        assert_eq!(only_one.len(), 1);
    }

    #[tokio::test]
    async fn top_links_default_to_ten_rows() {
        let f = fixture().await;
        for i in 0..12 {
            let link = f
                .db
                .create_link(
                    &f.user_id,
                    CreateLinkRequest {
                        url: format!("https://extra{}.example", i),
                        title: None,
                        description: None,
                        image_url: None,
                        favicon: None,
                        site_name: None,
                        is_public: None,
                    },
                )
                .await
                .unwrap();
            f.db.record_click(&link.id, &EventMetadata::default()).await.unwrap();
        }

        let top = f.db.user_top_links(&f.user_id, None, None).await.unwrap();
        assert_eq!(top.len() as i64, DEFAULT_TOP_LINKS);
    }

    #[tokio::test]
    async fn profile_views_are_scoped_to_the_viewed_user() {
        let f = fixture().await;
        let view = meta(Some("Chile"), DeviceType::Desktop, Some("google.com"));
        f.db.record_profile_view_at(&f.user_id, &view, at(2, 10)).await.unwrap();
        f.db.record_profile_view_at(&f.user_id, &view, at(2, 11)).await.unwrap();

        let range = june(1, 5);
        assert_eq!(f.db.profile_view_count(&f.user_id, Some(&range)).await.unwrap(), 2);
        assert_eq!(f.db.profile_view_count("someone-else", None).await.unwrap(), 0);
        assert_eq!(
            f.db.profile_views_by_referrer(&f.user_id, Some(&range)).await.unwrap(),
            vec![CountByField { value: "google.com".to_string(), count: 2 }]
        );
        assert_eq!(
            f.db.profile_views_by_country(&f.user_id, None).await.unwrap(),
            vec![CountByField { value: "Chile".to_string(), count: 2 }]
        );
        assert_eq!(
            f.db.profile_views_over_time(&f.user_id, &range).await.unwrap(),
            vec![TimeSeriesPoint { date: "2025-06-02".to_string(), count: 2 }]
        );
    }

    #[tokio::test]
    async fn deleting_a_link_cascades_its_clicks() {
        let f = fixture().await;
        seed(&f).await;
        assert!(f.db.delete_link(&f.link_a).await.unwrap());
        assert_eq!(f.db.link_click_count(&f.link_a, None).await.unwrap(), 0);
        assert_eq!(f.db.user_total_clicks(&f.user_id, None).await.unwrap(), 2);
    }
}
