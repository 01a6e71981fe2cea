use crate::configuration::DatabaseSettings;
use anyhow::Context;
use chrono::{DateTime, SubsecRound, Utc};
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use secrecy::ExposeSecret;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Cheaply cloneable handle to the Postgres pool.
///
/// Diesel is blocking, so every unit of work is moved onto tokio's blocking
/// thread pool and awaited from there.
#[derive(Clone)]
pub struct DbPool {
    pool: PgPool,
}

impl DbPool {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool without opening any connection up front.
    pub fn from_settings(settings: &DatabaseSettings) -> Self {
        let manager =
            ConnectionManager::<PgConnection>::new(settings.connection_string().expose_secret());
        let pool = Pool::builder()
            .max_size(settings.max_connections)
            .build_unchecked(manager);
        Self { pool }
    }

    pub async fn run<F, R>(&self, f: F) -> Result<R, anyhow::Error>
    where
        F: FnOnce(&PgConnection) -> R + Send + 'static,
        R: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool
                .get()
                .context("Failed to retrieve a connection from the DB pool.")?;
            Ok::<_, anyhow::Error>(f(&*conn))
        })
        .await
        .context("The database task panicked or was cancelled.")?
    }
}

/// Postgres stores microseconds; rounding keeps values read back equal to
/// the ones that were written.
pub fn current_time() -> DateTime<Utc> {
    Utc::now().round_subsecs(6)
}

/// Escape LIKE wildcards so a user supplied term is matched literally.
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
