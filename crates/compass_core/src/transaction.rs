//! Transaction demarcation ports.
//!
//! A resolver opens one transaction per request, passes `tx.conn()` down to
//! the services, and commits on success. A transaction that is dropped
//! without `commit` is rolled back, so every early `?` return rolls back.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait Transactioner: Send + Sync {
    /// Connection handle the repositories execute against.
    type Conn: Send;
    type Tx: Transaction<Conn = Self::Conn>;

    async fn begin(&self) -> Result<Self::Tx>;
}

#[async_trait]
pub trait Transaction: Send {
    type Conn: Send;

    fn conn(&mut self) -> &mut Self::Conn;

    async fn commit(self) -> Result<()>;
}
