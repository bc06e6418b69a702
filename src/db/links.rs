// src/db/links.rs

use chrono::Utc;
use uuid::Uuid;

use super::Database;
use crate::models::link::{CreateLinkRequest, Link, LinkStats};

impl Database {
    pub async fn get_link_by_id(&self, link_id: &str) -> Result<Option<Link>, sqlx::Error> {
        sqlx::query_as::<_, Link>("SELECT * FROM links WHERE id = ?")
            .bind(link_id)
            .fetch_optional(self.pool())
            .await
    }

    /// All links of a user in display order.
    pub async fn list_links_by_user(&self, user_id: &str) -> Result<Vec<Link>, sqlx::Error> {
        sqlx::query_as::<_, Link>(
            "SELECT * FROM links WHERE user_id = ? ORDER BY position ASC, created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
    }

    pub async fn list_public_links_by_user(&self, user_id: &str) -> Result<Vec<Link>, sqlx::Error> {
        sqlx::query_as::<_, Link>(
            r#"
            SELECT * FROM links
            WHERE user_id = ? AND is_public = 1
            ORDER BY position ASC, created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
    }

    /// Inserts a link at the end of the owner's list (max position + 1).
    pub async fn create_link(
        &self,
        user_id: &str,
        data: CreateLinkRequest,
    ) -> Result<Link, sqlx::Error> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let next_position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position), -1) + 1 FROM links WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;

        let link = Link {
            id,
            user_id: user_id.to_string(),
            url: data.url,
            title: data.title,
            description: data.description,
            image_url: data.image_url,
            favicon: data.favicon,
            site_name: data.site_name,
            position: next_position,
            is_public: data.is_public.unwrap_or(true),
            click_count: 0,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO links (
                id, user_id, url, title, description, image_url, favicon,
                site_name, position, is_public, click_count, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&link.id)
        .bind(&link.user_id)
        .bind(&link.url)
        .bind(&link.title)
        .bind(&link.description)
        .bind(&link.image_url)
        .bind(&link.favicon)
        .bind(&link.site_name)
        .bind(link.position)
        .bind(link.is_public)
        .bind(link.click_count)
        .bind(link.created_at)
        .bind(link.updated_at)
        .execute(self.pool())
        .await?;

        tracing::info!(link_id = %link.id, user_id, url = %link.url, "Created link");
        Ok(link)
    }

    /// Writes the editable columns of `link` back. Last write wins.
    pub async fn update_link(&self, link: &mut Link) -> Result<(), sqlx::Error> {
        link.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE links
            SET url = ?, title = ?, description = ?, image_url = ?, favicon = ?,
                site_name = ?, is_public = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&link.url)
        .bind(&link.title)
        .bind(&link.description)
        .bind(&link.image_url)
        .bind(&link.favicon)
        .bind(&link.site_name)
        .bind(link.is_public)
        .bind(link.updated_at)
        .bind(&link.id)
        .execute(self.pool())
        .await?;

        tracing::info!(link_id = %link.id, "Updated link");
        Ok(())
    }

    /// Deletes a link; its click events go with it.
    pub async fn delete_link(&self, link_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM links WHERE id = ?")
            .bind(link_id)
            .execute(self.pool())
            .await?;

        tracing::info!(link_id, "Deleted link");
        Ok(result.rows_affected() > 0)
    }

    /// Rewrites positions to match the order of `link_ids`.
    /// Ids not owned by `user_id` are skipped.
    pub async fn reorder_links(
        &self,
        user_id: &str,
        link_ids: &[String],
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        let mut tx = self.pool().begin().await?;

        for (index, link_id) in link_ids.iter().enumerate() {
            sqlx::query(
                "UPDATE links SET position = ?, updated_at = ? WHERE id = ? AND user_id = ?",
            )
            .bind(index as i64)
            .bind(now)
            .bind(link_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(user_id, count = link_ids.len(), "Reordered links");
        Ok(())
    }

    /// Bumps the denormalized click counter. Returns false for an unknown link.
    pub async fn increment_link_clicks(&self, link_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE links SET click_count = click_count + 1, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(link_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn link_stats(&self, user_id: &str) -> Result<LinkStats, sqlx::Error> {
        let (total_links, public_links, total_clicks): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN is_public = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(click_count), 0)
            FROM links
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;

        Ok(LinkStats {
            total_links,
            public_links,
            total_clicks,
        })
    }
}
