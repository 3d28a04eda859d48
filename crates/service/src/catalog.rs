//! Catalog reads and transactional writes.
//!
//! Reads are served through the shared [`ResultCache`]; every successful
//! write invalidates the affected entries only after its transaction has
//! committed, so the cache never gets ahead of the store. Absent records are
//! never cached.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::cache::{CacheKey, CacheValue, ResultCache};
use crate::domain::{Book, BookChanges, BookPage, NewBook};
use crate::errors::ServiceError;
use crate::store::{CatalogStore, UniqueField};

pub struct CatalogService<S: CatalogStore> {
    store: Arc<S>,
    cache: Arc<ResultCache>,
}

impl<S: CatalogStore> CatalogService<S> {
    pub fn new(store: Arc<S>, cache: Arc<ResultCache>) -> Self {
        Self { store, cache }
    }

    #[instrument(skip_all, fields(isbn = %input.isbn))]
    pub async fn create(
        &self,
        input: NewBook,
        cancel: &CancellationToken,
    ) -> Result<Book, ServiceError> {
        require("title", &input.title)?;
        require("author", &input.author)?;
        require("isbn", &input.isbn)?;

        if self.store.find_by_isbn(&input.isbn, None, cancel).await?.is_some() {
            return Err(ServiceError::Conflict { field: UniqueField::Isbn });
        }

        let book = Book {
            id: Uuid::new_v4(),
            title: input.title,
            author: input.author,
            isbn: input.isbn,
            published_date: input.published_date,
            created_at: Utc::now(),
            updated_at: None,
        };

        let mut tx = self.store.begin(cancel).await?;
        match self.store.add(&mut tx, &book, cancel).await {
            Ok(()) => self.store.commit(tx).await?,
            Err(e) => {
                if let Err(rb) = self.store.rollback(tx).await {
                    warn!(error = %rb, "rollback failed after create error");
                }
                return Err(e.into());
            }
        }

        self.cache.invalidate_aggregates();
        info!(book_id = %book.id, "book created");
        Ok(book)
    }

    pub async fn get_by_id(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Option<Book>, ServiceError> {
        let key = CacheKey::Book(id);
        if let Some(CacheValue::Book(book)) = self.cache.try_get(&key).await {
            return Ok(Some(book));
        }
        let found = self.store.get_by_id(id, cancel).await?;
        if let Some(book) = &found {
            self.cache.set(key, CacheValue::Book(book.clone())).await;
        }
        Ok(found)
    }

    /// Listing, optionally filtered by a case-insensitive substring over
    /// title or author. With both paging parameters present the page comes
    /// straight from the store; otherwise the full listing is served through
    /// the aggregate cache, so a lone paging parameter is ignored rather
    /// than an error.
    pub async fn list(
        &self,
        page_number: Option<u64>,
        page_size: Option<u64>,
        search: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<BookPage, ServiceError> {
        if page_number.is_some_and(|page| page < 1) {
            return Err(ServiceError::validation("page_number", "must be at least 1"));
        }
        if page_size.is_some_and(|size| size < 1) {
            return Err(ServiceError::validation("page_size", "must be at least 1"));
        }

        if let (Some(page), Some(size)) = (page_number, page_size) {
            let (items, total_count) = self.store.get_page(page, size, search, cancel).await?;
            return Ok(BookPage { items, page_number: page, page_size: size, total_count });
        }

        let key = self.cache.aggregate_key(search);
        let items = match self.cache.try_get(&key).await {
            Some(CacheValue::Books(books)) => books.as_ref().clone(),
            _ => {
                let fetched = self.store.list(search, cancel).await?;
                self.cache.set(key, CacheValue::Books(Arc::new(fetched.clone()))).await;
                fetched
            }
        };
        let total_count = items.len() as u64;
        Ok(BookPage { items, page_number: 1, page_size: total_count, total_count })
    }

    /// Full replacement of a book's fields. `updated_at` is stamped here.
    #[instrument(skip_all, fields(book_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        changes: BookChanges,
        cancel: &CancellationToken,
    ) -> Result<Book, ServiceError> {
        require("title", &changes.title)?;
        require("author", &changes.author)?;
        require("isbn", &changes.isbn)?;

        let mut book = self
            .store
            .get_by_id(id, cancel)
            .await?
            .ok_or(ServiceError::NotFound("book"))?;
        if self.store.find_by_isbn(&changes.isbn, Some(id), cancel).await?.is_some() {
            return Err(ServiceError::Conflict { field: UniqueField::Isbn });
        }

        book.title = changes.title;
        book.author = changes.author;
        book.isbn = changes.isbn;
        book.published_date = changes.published_date;
        book.updated_at = Some(Utc::now());

        let mut tx = self.store.begin(cancel).await?;
        match self.store.update(&mut tx, &book, cancel).await {
            Ok(()) => self.store.commit(tx).await?,
            Err(e) => {
                if let Err(rb) = self.store.rollback(tx).await {
                    warn!(error = %rb, "rollback failed after update error");
                }
                return Err(e.into());
            }
        }

        self.cache.invalidate_book(id).await;
        self.cache.invalidate_aggregates();
        info!("book updated");
        Ok(book)
    }

    /// Idempotent delete: `Ok(false)` when the book does not exist.
    #[instrument(skip_all, fields(book_id = %id))]
    pub async fn delete(&self, id: Uuid, cancel: &CancellationToken) -> Result<bool, ServiceError> {
        if self.store.get_by_id(id, cancel).await?.is_none() {
            return Ok(false);
        }

        let mut tx = self.store.begin(cancel).await?;
        match self.store.delete(&mut tx, id, cancel).await {
            Ok(()) => self.store.commit(tx).await?,
            Err(e) => {
                if let Err(rb) = self.store.rollback(tx).await {
                    warn!(error = %rb, "rollback failed after delete error");
                }
                return Err(e.into());
            }
        }

        self.cache.invalidate_book(id).await;
        self.cache.invalidate_aggregates();
        info!("book deleted");
        Ok(true)
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::validation(field, format!("{field} is required")));
    }
    Ok(())
}
