// src/handlers/analytics.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    response::IntoResponse,
};

use crate::{
    db::Database,
    error::AppError,
    handlers::links::owned_link,
    models::{
        analytics::{AnalyticsParams, LinkClicksResponse, ProfileViewsResponse, SummaryResponse},
        user::User,
    },
    services::{
        date_range::{fill_missing_dates, parse_date_range},
        summary::user_analytics_summary,
    },
};

/// Dashboard summary for the current user over `?range=`.
pub async fn summary(
    State(db): State<Database>,
    Extension(user): Extension<User>,
    Query(params): Query<AnalyticsParams>,
) -> Result<impl IntoResponse, AppError> {
    let range = parse_date_range(params.range.as_deref());

    let mut summary = user_analytics_summary(&db, &user.id, &range).await?;
    summary.clicks_over_time = fill_missing_dates(&summary.clicks_over_time, &range);
    summary.views_over_time = fill_missing_dates(&summary.views_over_time, &range);

    Ok(Json(SummaryResponse {
        summary,
        date_range: range.into(),
    }))
}

/// Click analytics of one link owned by the current user.
pub async fn link_clicks(
    State(db): State<Database>,
    Extension(user): Extension<User>,
    Path(link_id): Path<String>,
    Query(params): Query<AnalyticsParams>,
) -> Result<impl IntoResponse, AppError> {
    let link = owned_link(&db, &user, &link_id).await?;
    let range = parse_date_range(params.range.as_deref());

    let (total_clicks, clicks_over_time, by_country, by_device, by_browser, by_referrer) =
        tokio::try_join!(
            db.link_click_count(&link.id, Some(&range)),
            db.link_clicks_over_time(&link.id, &range),
            db.link_clicks_by_country(&link.id, Some(&range)),
            db.link_clicks_by_device(&link.id, Some(&range)),
            db.link_clicks_by_browser(&link.id, Some(&range)),
            db.link_clicks_by_referrer(&link.id, Some(&range)),
        )?;

    Ok(Json(LinkClicksResponse {
        link_id: link.id,
        link_title: link.title,
        link_url: link.url,
        total_clicks,
        clicks_over_time: fill_missing_dates(&clicks_over_time, &range),
        by_country,
        by_device,
        by_browser,
        by_referrer,
        date_range: range.into(),
    }))
}

/// Profile view analytics of the current user.
pub async fn profile_views(
    State(db): State<Database>,
    Extension(user): Extension<User>,
    Query(params): Query<AnalyticsParams>,
) -> Result<impl IntoResponse, AppError> {
    let range = parse_date_range(params.range.as_deref());

    let (total_views, views_over_time, by_country, by_referrer) = tokio::try_join!(
        db.profile_view_count(&user.id, Some(&range)),
        db.profile_views_over_time(&user.id, &range),
        db.profile_views_by_country(&user.id, Some(&range)),
        db.profile_views_by_referrer(&user.id, Some(&range)),
    )?;

    Ok(Json(ProfileViewsResponse {
        total_views,
        views_over_time: fill_missing_dates(&views_over_time, &range),
        by_country,
        by_referrer,
        date_range: range.into(),
    }))
}
