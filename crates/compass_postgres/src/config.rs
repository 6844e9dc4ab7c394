use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use url::Url;

/// Connection settings, read by the server from `APP_DB_*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub ssl_mode: String,
    pub max_open_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            user: "postgres".into(),
            password: "pgsql@12345".into(),
            host: "localhost".into(),
            port: 5432,
            name: "compass".into(),
            ssl_mode: "disable".into(),
            max_open_connections: 2,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            encode(&self.user),
            encode(&self.password),
            self.host,
            self.port,
            self.name,
            self.ssl_mode
        )
    }

    pub async fn connect(&self) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(self.max_open_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect(&self.url())
            .await
    }
}

fn encode(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

/// Connection string safe to log: the password is replaced.
pub fn mask_database_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            if url.password().is_some() {
                // set_password only fails for cannot-be-a-base URLs
                let _ = url.set_password(Some("***"));
            }
            url.to_string()
        }
        Err(_) => "<invalid database url>".into(),
    }
}
