//! Application state and configuration for the order approval API

use crate::storage::ArtifactStore;
use anyhow::Result;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::PathBuf;

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub storage_dir: PathBuf,
    pub public_base_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3001);

        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ordersign-api");

        let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            std::fs::create_dir_all(&data_dir).ok();
            format!("sqlite:{}/ordersign.db?mode=rwc", data_dir.display())
        });

        let storage_dir = std::env::var("STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("storage"));

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"));

        Self {
            port,
            database_url,
            storage_dir,
            public_base_url,
        }
    }
}

pub struct AppState {
    pub db: SqlitePool,
    pub store: ArtifactStore,
}

impl AppState {
    pub async fn new(config: &Config) -> Result<Self> {
        tracing::info!("connecting to database: {}", config.database_url);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await?;

        run_migrations(&pool).await?;

        let store = ArtifactStore::new(config.storage_dir.clone(), &config.public_base_url);
        Ok(Self { db: pool, store })
    }
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    tracing::info!("running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL,
            role TEXT NOT NULL,
            department TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            submitted_by TEXT NOT NULL REFERENCES profiles(id),
            submitted_at TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            document_path TEXT NOT NULL,
            pdf_url TEXT,
            department TEXT NOT NULL,
            notes TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One signature per (order, signer); corrections are new orders of
    // business, not edits.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS signatures (
            id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES profiles(id),
            signature_data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (order_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_signatures_order ON signatures(order_id)
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("migrations complete");
    Ok(())
}

/// Get platform-specific data directory
mod dirs {
    use std::path::PathBuf;

    pub fn data_dir() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            None
        }
    }
}
