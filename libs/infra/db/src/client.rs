use std::sync::Arc;

use libsql::{Builder, Connection, Database};
use tracing::{info, instrument};

use crate::errors::DbError;
use crate::schema::apply_schema;

/// Connection factory over an embedded (local file or `:memory:`) libsql
/// database. Schema is applied once at connect time, idempotently.
#[derive(Clone)]
pub struct DbClient {
    database: Arc<Database>,
    /// Keeps an in-memory database alive for the lifetime of the client;
    /// SQLite drops `:memory:` data once the last connection closes.
    _memory_anchor: Option<Arc<Connection>>,
}

impl DbClient {
    #[instrument(skip_all, fields(url = %url))]
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        if url.is_empty() {
            return Err(DbError::Connection("database url is empty".into()));
        }

        let database = Builder::new_local(url)
            .build()
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let is_memory = url.contains(":memory:");
        let database = Arc::new(database);

        let anchor = if is_memory {
            let conn = database
                .connect()
                .map_err(|e| DbError::Connection(e.to_string()))?;
            apply_schema(&conn).await?;
            Some(Arc::new(conn))
        } else {
            let conn = database
                .connect()
                .map_err(|e| DbError::Connection(e.to_string()))?;
            apply_schema(&conn).await?;
            None
        };

        info!("database connected and schema applied");

        Ok(Self {
            database,
            _memory_anchor: anchor,
        })
    }

    pub fn connection(&self) -> Result<Connection, DbError> {
        self.database
            .connect()
            .map_err(|e| DbError::Connection(e.to_string()))
    }
}
