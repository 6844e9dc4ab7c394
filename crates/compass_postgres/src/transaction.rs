use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres};
use tracing::error;

use compass_core::error::{CompassError, Result};
use compass_core::transaction::{Transaction, Transactioner};

/// Opens sqlx transactions on the shared pool.
#[derive(Debug, Clone)]
pub struct PgTransactioner {
    pool: PgPool,
}

impl PgTransactioner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Transactioner for PgTransactioner {
    type Conn = PgConnection;
    type Tx = PgTransaction;

    async fn begin(&self) -> Result<PgTransaction> {
        let tx = self.pool.begin().await.map_err(connection_error)?;
        Ok(PgTransaction { tx })
    }
}

/// Rolls back when dropped without `commit`.
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PgTransaction {
    type Conn = PgConnection;

    fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(|e| {
            error!(error = %e, "failed to commit transaction");
            CompassError::internal("failed to commit transaction")
        })
    }
}

fn connection_error(err: sqlx::Error) -> CompassError {
    match err {
        sqlx::Error::PoolTimedOut => CompassError::internal("Maximum processing timeout reached"),
        other => {
            error!(error = %other, "failed to begin transaction");
            CompassError::internal("failed to begin transaction")
        }
    }
}
