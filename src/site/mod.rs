pub mod reports;

use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::info;

use crate::{
    auth::{roles::ADMINS, AuthUser},
    db,
    error::required,
    AppError, AppResult, AppState,
};

/// Branding shown by every dashboard. Exactly one row exists.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SiteConfig {
    pub site_name: String,
    pub logo_url: Option<String>,
    pub primary_color: String,
    pub secondary_color: String,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

pub async fn load(db_pool: &SqlitePool) -> AppResult<SiteConfig> {
    Ok(sqlx::query_as(
        "SELECT site_name,logo_url,primary_color,secondary_color,updated_at FROM site_config WHERE id = 1",
    )
    .fetch_one(db_pool)
    .await?)
}

#[debug_handler(state = AppState)]
pub async fn get_config(State(db_pool): State<SqlitePool>) -> AppResult<Json<SiteConfig>> {
    Ok(Json(load(&db_pool).await?))
}

#[derive(Debug, Deserialize)]
pub struct ConfigUpdate {
    site_name: Option<String>,
    /// An empty string clears the logo.
    logo_url: Option<String>,
    primary_color: Option<String>,
    secondary_color: Option<String>,
}

/// `#rgb` or `#rrggbb`, normalized to lower case.
pub fn validate_color(field: &str, color: &str) -> AppResult<String> {
    let color = color.trim().to_ascii_lowercase();
    let valid = color
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6) && hex.bytes().all(|b| b.is_ascii_hexdigit()));
    if valid {
        Ok(color)
    } else {
        Err(AppError::bad_request(format!("{field} must be a hex color like #1f4e79")))
    }
}

#[debug_handler(state = AppState)]
pub async fn update_config(
    State(db_pool): State<SqlitePool>,
    admin: AuthUser,
    Json(update): Json<ConfigUpdate>,
) -> AppResult<Json<SiteConfig>> {
    admin.require(ADMINS)?;

    let site_name = update.site_name.as_deref().map(|name| required("site_name", name)).transpose()?;
    let primary_color = update
        .primary_color
        .as_deref()
        .map(|color| validate_color("primary_color", color))
        .transpose()?;
    let secondary_color = update
        .secondary_color
        .as_deref()
        .map(|color| validate_color("secondary_color", color))
        .transpose()?;

    let current = load(&db_pool).await?;
    let logo_url = match update.logo_url.as_deref().map(str::trim) {
        Some("") => None,
        Some(url) => Some(url.to_owned()),
        None => current.logo_url,
    };

    let config = sqlx::query_as(
        "UPDATE site_config SET
            site_name = COALESCE(?, site_name),
            logo_url = ?,
            primary_color = COALESCE(?, primary_color),
            secondary_color = COALESCE(?, secondary_color),
            updated_at = ?
         WHERE id = 1
         RETURNING site_name,logo_url,primary_color,secondary_color,updated_at",
    )
    .bind(site_name)
    .bind(logo_url)
    .bind(primary_color)
    .bind(secondary_color)
    .bind(db::now())
    .fetch_one(&db_pool)
    .await?;

    info!(by = %admin.username, "site config updated");
    Ok(Json(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_are_hex() {
        assert_eq!(validate_color("c", "#1F4E79").unwrap(), "#1f4e79");
        assert_eq!(validate_color("c", " #abc ").unwrap(), "#abc");
        assert!(validate_color("c", "1f4e79").is_err());
        assert!(validate_color("c", "#12345").is_err());
        assert!(validate_color("c", "#ggg").is_err());
    }

    #[tokio::test]
    async fn a_fresh_install_has_default_branding() {
        let db_pool = db::memory().await.unwrap();
        let config = load(&db_pool).await.unwrap();
        assert_eq!(config.site_name, "Clubhouse");
        assert_eq!(config.primary_color, "#1f4e79");
        assert!(config.logo_url.is_none());
    }
}
