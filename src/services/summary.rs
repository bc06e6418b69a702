// src/services/summary.rs

use crate::db::Database;
use crate::models::analytics::{AnalyticsSummary, DateRange};

/// Entries kept in each ranked list of the summary.
pub const SUMMARY_TOP_N: usize = 5;

/// Relative change in percent, rounded half up.
/// A zero baseline yields 100 when anything happened and 0 otherwise.
pub fn percentage_change(current: i64, previous: i64) -> i64 {
    if previous > 0 {
        let change = (current - previous) as f64 / previous as f64 * 100.0;
        (change + 0.5).floor() as i64
    } else if current > 0 {
        100
    } else {
        0
    }
}

/// Totals for `range` and the window of equal length right before it,
/// plus the ranked breakdowns and raw time series for `range`.
///
/// Time series are returned as stored; callers fill the missing days.
pub async fn user_analytics_summary(
    db: &Database,
    user_id: &str,
    range: &DateRange,
) -> Result<AnalyticsSummary, sqlx::Error> {
    let previous = range.previous();

    let (
        total_clicks,
        previous_clicks,
        total_profile_views,
        previous_views,
        mut top_countries,
        mut top_devices,
        mut top_referrers,
        top_links,
        clicks_over_time,
        views_over_time,
    ) = tokio::try_join!(
        db.user_total_clicks(user_id, Some(range)),
        db.user_total_clicks(user_id, Some(&previous)),
        db.profile_view_count(user_id, Some(range)),
        db.profile_view_count(user_id, Some(&previous)),
        db.user_clicks_by_country(user_id, Some(range)),
        db.user_clicks_by_device(user_id, Some(range)),
        db.user_clicks_by_referrer(user_id, Some(range)),
        db.user_top_links(user_id, Some(range), Some(SUMMARY_TOP_N as i64)),
        db.user_clicks_over_time(user_id, range),
        db.profile_views_over_time(user_id, range),
    )?;

    top_countries.truncate(SUMMARY_TOP_N);
    top_devices.truncate(SUMMARY_TOP_N);
    top_referrers.truncate(SUMMARY_TOP_N);

    Ok(AnalyticsSummary {
        total_clicks,
        total_profile_views,
        clicks_change: percentage_change(total_clicks, previous_clicks),
        views_change: percentage_change(total_profile_views, previous_views),
        top_countries,
        top_devices,
        top_referrers,
        top_links,
        clicks_over_time,
        views_over_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users::NewPhoneUser;
    use crate::models::analytics::EventMetadata;
    use crate::models::link::CreateLinkRequest;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn change_against_zero_baseline() {
        assert_eq!(percentage_change(0, 0), 0);
        assert_eq!(percentage_change(5, 0), 100);
    }

    #[test]
    fn change_is_relative_and_rounded() {
        assert_eq!(percentage_change(15, 10), 50);
        assert_eq!(percentage_change(5, 10), -50);
        assert_eq!(percentage_change(0, 4), -100);
        assert_eq!(percentage_change(2, 3), -33);
        // Halves round toward positive infinity.
        assert_eq!(percentage_change(1, 8), -87);
        assert_eq!(percentage_change(3, 8), -62);
    }

    #[tokio::test]
    async fn summary_compares_against_previous_window() {
        let db = Database::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let user = db
            .create_user_with_phone(NewPhoneUser {
                username: "summary".to_string(),
                display_name: "Summary".to_string(),
                phone: "5554445555".to_string(),
                pin_hash: "hash".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let link = db
            .create_link(
                &user.id,
                CreateLinkRequest {
                    url: "https://example.com".to_string(),
                    title: Some("Example".to_string()),
                    description: None,
                    image_url: None,
                    favicon: None,
                    site_name: None,
                    is_public: None,
                },
            )
            .await
            .unwrap();

        let range = DateRange::new(
            Utc.with_ymd_and_hms(2025, 5, 8, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 5, 14, 23, 59, 59).unwrap() + Duration::milliseconds(999),
        );
        let meta = EventMetadata::default();

        for day in [9, 10, 10] {
            let at = Utc.with_ymd_and_hms(2025, 5, day, 12, 0, 0).unwrap();
            db.record_click_at(&link.id, &meta, at).await.unwrap();
        }
        let last_week = Utc.with_ymd_and_hms(2025, 5, 3, 12, 0, 0).unwrap();
        db.record_click_at(&link.id, &meta, last_week).await.unwrap();
        db.record_click_at(&link.id, &meta, last_week).await.unwrap();
        db.record_profile_view_at(&user.id, &meta, last_week).await.unwrap();

        let summary = user_analytics_summary(&db, &user.id, &range).await.unwrap();
        assert_eq!(summary.total_clicks, 3);
        assert_eq!(summary.clicks_change, 50);
        assert_eq!(summary.total_profile_views, 0);
        assert_eq!(summary.views_change, -100);
        assert_eq!(summary.top_links.len(), 1);
        assert_eq!(summary.top_links[0].clicks, 3);
        assert_eq!(summary.top_countries[0].value, "Unknown");
        assert_eq!(summary.top_referrers[0].value, "Direct");
        assert_eq!(summary.clicks_over_time.len(), 2);
        assert!(summary.views_over_time.is_empty());
    }
}
