//! Store contracts shared by the identity and catalog services.
//!
//! Reads run against the live store; writes go through a unit-of-work
//! transaction obtained from [`UnitOfWork::begin`]. The transaction handle is
//! consumed by `commit`/`rollback`, so a finished transaction cannot be
//! reused and nesting is impossible by construction. Every call takes a
//! cancellation token; cancellation observed before commit must leave no
//! trace of the transaction.

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::{Book, User};

pub mod memory;
pub mod seaorm;

pub use memory::MemoryStore;
pub use seaorm::SeaOrmStore;

/// Field behind a uniqueness invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    Email,
    Isbn,
}

impl std::fmt::Display for UniqueField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UniqueField::Username => write!(f, "username"),
            UniqueField::Email => write!(f, "email"),
            UniqueField::Isbn => write!(f, "isbn"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// A storage-level unique constraint fired. This, not the service-level
    /// pre-check, is the authoritative guarantor against concurrent
    /// duplicates.
    #[error("unique constraint violated on {0}")]
    Conflict(UniqueField),
    #[error("operation cancelled")]
    Cancelled,
    #[error("database error: {0}")]
    Db(String),
}

/// Bail out before I/O when the caller has given up.
pub(crate) fn ensure_live(cancel: &CancellationToken) -> Result<(), StoreError> {
    if cancel.is_cancelled() {
        return Err(StoreError::Cancelled);
    }
    Ok(())
}

/// One transaction scope per logical operation. `begin` must precede any
/// mutation; `commit` applies everything since `begin` atomically;
/// `rollback` discards it.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    type Tx: Send;

    async fn begin(&self, cancel: &CancellationToken) -> Result<Self::Tx, StoreError>;
    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError>;
    async fn rollback(&self, tx: Self::Tx) -> Result<(), StoreError>;
}

/// Persistence for user records. `find_*` lookups are case-insensitive.
#[async_trait]
pub trait CredentialStore: UnitOfWork {
    async fn get_by_id(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Option<User>, StoreError>;

    async fn find_by_username(
        &self,
        username: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<User>, StoreError>;

    async fn find_by_email(
        &self,
        email: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<User>, StoreError>;

    async fn add(
        &self,
        tx: &mut Self::Tx,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError>;

    async fn update(
        &self,
        tx: &mut Self::Tx,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError>;
}

/// Persistence for book records.
#[async_trait]
pub trait CatalogStore: UnitOfWork {
    async fn get_by_id(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Option<Book>, StoreError>;

    /// Exact-match ISBN lookup, optionally excluding one record (used when
    /// updating a book in place).
    async fn find_by_isbn(
        &self,
        isbn: &str,
        exclude: Option<Uuid>,
        cancel: &CancellationToken,
    ) -> Result<Option<Book>, StoreError>;

    /// Full listing with an optional case-insensitive substring filter over
    /// title or author, ordered by creation time.
    async fn list(
        &self,
        search: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Book>, StoreError>;

    /// Offset/limit page (1-based `page`) plus the total matching count.
    async fn get_page(
        &self,
        page: u64,
        size: u64,
        search: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(Vec<Book>, u64), StoreError>;

    async fn add(
        &self,
        tx: &mut Self::Tx,
        book: &Book,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError>;

    async fn update(
        &self,
        tx: &mut Self::Tx,
        book: &Book,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError>;

    async fn delete(
        &self,
        tx: &mut Self::Tx,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError>;
}
