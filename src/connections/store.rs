use crate::db::{self, DbPool};
use crate::domain::{Connection, ConnectionPatch, NewConnection};
use crate::error::{error_chain_fmt, ErrorKind};
use crate::models::{FeedConnection, FeedConnectionChangeset, NewFeedConnection};
use crate::schema::{feed_connections, feeds};
use anyhow::Context;
use async_trait::async_trait;
use diesel::prelude::*;
use diesel::Connection as _;
use uuid::Uuid;

#[derive(thiserror::Error)]
pub enum StoreError {
    /// The write went through but the record cannot be read back.
    #[error("Connection {connection_id} of feed {feed_id} was missing after the write.")]
    NotPersisted { feed_id: Uuid, connection_id: Uuid },
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotPersisted { .. } => ErrorKind::StorageInconsistency,
            StoreError::UnexpectedError(_) => ErrorKind::Unexpected,
        }
    }
}

/// Connections embedded in a feed. Every mutation is a single atomic
/// statement or transaction; nothing here retries.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    async fn append_connection(
        &self,
        feed_id: Uuid,
        connection: NewConnection,
    ) -> Result<Connection, StoreError>;

    async fn patch_connection(
        &self,
        feed_id: Uuid,
        connection_id: Uuid,
        patch: ConnectionPatch,
    ) -> Result<Connection, StoreError>;

    async fn find_connection(
        &self,
        feed_id: Uuid,
        connection_id: Uuid,
    ) -> Result<Option<Connection>, StoreError>;
}

#[derive(Clone)]
pub struct PgConnectionStore {
    pool: DbPool,
}

impl PgConnectionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn find_row(
    conn: &PgConnection,
    feed_id: Uuid,
    connection_id: Uuid,
) -> QueryResult<Option<FeedConnection>> {
    feed_connections::table
        .filter(feed_connections::id.eq(connection_id))
        .filter(feed_connections::feed_id.eq(feed_id))
        .first::<FeedConnection>(conn)
        .optional()
}

fn read_back(
    row: Option<FeedConnection>,
    feed_id: Uuid,
    connection_id: Uuid,
) -> Result<Connection, StoreError> {
    match row {
        Some(row) => Ok(Connection::try_from(row)?),
        None => {
            tracing::error!(
                %feed_id,
                %connection_id,
                "Connection could not be read back after it was written"
            );
            Err(StoreError::NotPersisted {
                feed_id,
                connection_id,
            })
        }
    }
}

#[async_trait]
impl ConnectionStore for PgConnectionStore {
    #[tracing::instrument(
        name = "Appending a connection to a feed",
        skip(self, connection),
        fields(connection_id = %connection.id, kind = connection.kind.as_str())
    )]
    async fn append_connection(
        &self,
        feed_id: Uuid,
        connection: NewConnection,
    ) -> Result<Connection, StoreError> {
        let connection_id = connection.id;
        let now = db::current_time();
        let row = NewFeedConnection::new(feed_id, &connection, now)?;

        let stored = self
            .pool
            .run(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|| {
                    let parents = diesel::update(feeds::table.find(feed_id))
                        .set(feeds::updated_at.eq(now))
                        .execute(conn)?;
                    if parents == 1 {
                        diesel::insert_into(feed_connections::table)
                            .values(&row)
                            .execute(conn)?;
                    }
                    find_row(conn, feed_id, connection_id)
                })
            })
            .await?
            .context("Failed to append a connection to the feed.")?;

        read_back(stored, feed_id, connection_id)
    }

    #[tracing::instrument(name = "Patching a feed connection", skip(self, patch))]
    async fn patch_connection(
        &self,
        feed_id: Uuid,
        connection_id: Uuid,
        patch: ConnectionPatch,
    ) -> Result<Connection, StoreError> {
        let changeset = FeedConnectionChangeset::from_patch(&patch)?;
        let now = db::current_time();

        let stored = self
            .pool
            .run(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|| {
                    if !changeset.is_empty() {
                        let target = feed_connections::table
                            .filter(feed_connections::id.eq(connection_id))
                            .filter(feed_connections::feed_id.eq(feed_id));
                        let updated = diesel::update(target).set(&changeset).execute(conn)?;
                        if updated > 0 {
                            diesel::update(feeds::table.find(feed_id))
                                .set(feeds::updated_at.eq(now))
                                .execute(conn)?;
                        }
                    }
                    find_row(conn, feed_id, connection_id)
                })
            })
            .await?
            .context("Failed to patch the feed connection.")?;

        read_back(stored, feed_id, connection_id)
    }

    #[tracing::instrument(name = "Finding a feed connection", skip(self))]
    async fn find_connection(
        &self,
        feed_id: Uuid,
        connection_id: Uuid,
    ) -> Result<Option<Connection>, StoreError> {
        let row = self
            .pool
            .run(move |conn| find_row(conn, feed_id, connection_id))
            .await?
            .context("Failed to look up the feed connection.")?;

        Ok(row.map(Connection::try_from).transpose()?)
    }
}
