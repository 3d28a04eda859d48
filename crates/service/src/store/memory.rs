//! In-memory store with staged transactions.
//!
//! Service-level tests run against this implementation, and embedders can
//! use it where no database is wanted. Writes are staged on the transaction
//! handle and applied atomically at commit under a single write lock, with
//! the unique constraints re-checked at apply time — the same guarantee a
//! database unique index gives against concurrent duplicate submissions.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::{Book, User};

use super::{ensure_live, CatalogStore, CredentialStore, StoreError, UnitOfWork, UniqueField};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    books: HashMap<Uuid, Book>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

enum Op {
    PutUser(User),
    PutBook(Book),
    DeleteBook(Uuid),
}

/// Pending writes; nothing is visible to readers until commit.
pub struct MemoryTx {
    ops: Vec<Op>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Constraint check against the live tables, skipping the record itself
    /// so updates do not collide with their own row.
    fn check_constraints(tables: &Tables, op: &Op) -> Result<(), StoreError> {
        match op {
            Op::PutUser(user) => {
                for existing in tables.users.values() {
                    if existing.id == user.id {
                        continue;
                    }
                    if existing.username.eq_ignore_ascii_case(&user.username) {
                        return Err(StoreError::Conflict(UniqueField::Username));
                    }
                    if existing.email.eq_ignore_ascii_case(&user.email) {
                        return Err(StoreError::Conflict(UniqueField::Email));
                    }
                }
            }
            Op::PutBook(book) => {
                for existing in tables.books.values() {
                    if existing.id != book.id && existing.isbn == book.isbn {
                        return Err(StoreError::Conflict(UniqueField::Isbn));
                    }
                }
            }
            Op::DeleteBook(_) => {}
        }
        Ok(())
    }

    fn matches_search(book: &Book, search: Option<&str>) -> bool {
        match search {
            None => true,
            Some(term) => {
                let term = term.to_lowercase();
                book.title.to_lowercase().contains(&term)
                    || book.author.to_lowercase().contains(&term)
            }
        }
    }

    fn filtered_books(&self, search: Option<&str>) -> Vec<Book> {
        let tables = self.read();
        let mut books: Vec<Book> = tables
            .books
            .values()
            .filter(|b| Self::matches_search(b, search))
            .cloned()
            .collect();
        books.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        books
    }
}

#[async_trait]
impl UnitOfWork for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self, cancel: &CancellationToken) -> Result<MemoryTx, StoreError> {
        ensure_live(cancel)?;
        Ok(MemoryTx { ops: Vec::new() })
    }

    async fn commit(&self, tx: MemoryTx) -> Result<(), StoreError> {
        let mut tables = self.write();
        // Validate everything first so a failed commit applies nothing.
        for op in &tx.ops {
            Self::check_constraints(&tables, op)?;
        }
        for op in tx.ops {
            match op {
                Op::PutUser(user) => {
                    tables.users.insert(user.id, user);
                }
                Op::PutBook(book) => {
                    tables.books.insert(book.id, book);
                }
                Op::DeleteBook(id) => {
                    tables.books.remove(&id);
                }
            }
        }
        Ok(())
    }

    async fn rollback(&self, tx: MemoryTx) -> Result<(), StoreError> {
        drop(tx);
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get_by_id(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Option<User>, StoreError> {
        ensure_live(cancel)?;
        Ok(self.read().users.get(&id).cloned())
    }

    async fn find_by_username(
        &self,
        username: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<User>, StoreError> {
        ensure_live(cancel)?;
        Ok(self
            .read()
            .users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn find_by_email(
        &self,
        email: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<User>, StoreError> {
        ensure_live(cancel)?;
        Ok(self
            .read()
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn add(
        &self,
        tx: &mut MemoryTx,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        ensure_live(cancel)?;
        tx.ops.push(Op::PutUser(user.clone()));
        Ok(())
    }

    async fn update(
        &self,
        tx: &mut MemoryTx,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        ensure_live(cancel)?;
        tx.ops.push(Op::PutUser(user.clone()));
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_by_id(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Option<Book>, StoreError> {
        ensure_live(cancel)?;
        Ok(self.read().books.get(&id).cloned())
    }

    async fn find_by_isbn(
        &self,
        isbn: &str,
        exclude: Option<Uuid>,
        cancel: &CancellationToken,
    ) -> Result<Option<Book>, StoreError> {
        ensure_live(cancel)?;
        Ok(self
            .read()
            .books
            .values()
            .find(|b| b.isbn == isbn && Some(b.id) != exclude)
            .cloned())
    }

    async fn list(
        &self,
        search: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Book>, StoreError> {
        ensure_live(cancel)?;
        Ok(self.filtered_books(search))
    }

    async fn get_page(
        &self,
        page: u64,
        size: u64,
        search: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(Vec<Book>, u64), StoreError> {
        ensure_live(cancel)?;
        let all = self.filtered_books(search);
        let total = all.len() as u64;
        let offset = page.saturating_sub(1).saturating_mul(size);
        let items = all
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(size as usize)
            .collect();
        Ok((items, total))
    }

    async fn add(
        &self,
        tx: &mut MemoryTx,
        book: &Book,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        ensure_live(cancel)?;
        tx.ops.push(Op::PutBook(book.clone()));
        Ok(())
    }

    async fn update(
        &self,
        tx: &mut MemoryTx,
        book: &Book,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        ensure_live(cancel)?;
        tx.ops.push(Op::PutBook(book.clone()));
        Ok(())
    }

    async fn delete(
        &self,
        tx: &mut MemoryTx,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        ensure_live(cancel)?;
        tx.ops.push(Op::DeleteBook(id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn user(username: &str, email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            password_hash: "$argon2id$stub".into(),
            first_name: "Test".into(),
            last_name: "User".into(),
            created_at: Utc::now(),
        }
    }

    fn book(isbn: &str) -> Book {
        Book {
            id: Uuid::new_v4(),
            title: "Title".into(),
            author: "Author".into(),
            isbn: isbn.into(),
            published_date: NaiveDate::from_ymd_opt(2001, 1, 1).unwrap(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn staged_writes_are_invisible_until_commit() {
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();
        let u = user("alice", "alice@x.com");

        let mut tx = store.begin(&cancel).await.unwrap();
        CredentialStore::add(&store, &mut tx, &u, &cancel).await.unwrap();
        assert!(store.find_by_email("alice@x.com", &cancel).await.unwrap().is_none());

        store.commit(tx).await.unwrap();
        assert!(store.find_by_email("alice@x.com", &cancel).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rollback_discards_staged_writes() {
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();

        let mut tx = store.begin(&cancel).await.unwrap();
        CatalogStore::add(&store, &mut tx, &book("978-0"), &cancel).await.unwrap();
        store.rollback(tx).await.unwrap();

        assert!(store.find_by_isbn("978-0", None, &cancel).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn commit_enforces_case_insensitive_email_uniqueness() {
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();

        let mut tx = store.begin(&cancel).await.unwrap();
        CredentialStore::add(&store, &mut tx, &user("a", "A@x.com"), &cancel).await.unwrap();
        store.commit(tx).await.unwrap();

        let mut tx = store.begin(&cancel).await.unwrap();
        CredentialStore::add(&store, &mut tx, &user("b", "a@x.com"), &cancel).await.unwrap();
        match store.commit(tx).await {
            Err(StoreError::Conflict(UniqueField::Email)) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_commit_applies_nothing() {
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();

        let mut tx = store.begin(&cancel).await.unwrap();
        CatalogStore::add(&store, &mut tx, &book("978-0"), &cancel).await.unwrap();
        store.commit(tx).await.unwrap();

        // Second transaction stages a fresh book plus a duplicate; neither
        // survives the failed commit.
        let fresh = book("978-1");
        let mut tx = store.begin(&cancel).await.unwrap();
        CatalogStore::add(&store, &mut tx, &fresh, &cancel).await.unwrap();
        CatalogStore::add(&store, &mut tx, &book("978-0"), &cancel).await.unwrap();
        assert!(store.commit(tx).await.is_err());

        assert!(store.find_by_isbn("978-1", None, &cancel).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(matches!(store.begin(&cancel).await, Err(StoreError::Cancelled)));
        assert!(matches!(
            store.find_by_email("x@x.com", &cancel).await,
            Err(StoreError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn pagination_slices_in_creation_order() {
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();

        for i in 0..5 {
            let mut b = book(&format!("isbn-{i}"));
            b.created_at = Utc::now() + chrono::Duration::seconds(i);
            let mut tx = store.begin(&cancel).await.unwrap();
            CatalogStore::add(&store, &mut tx, &b, &cancel).await.unwrap();
            store.commit(tx).await.unwrap();
        }

        let (items, total) = store.get_page(2, 2, None, &cancel).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].isbn, "isbn-2");
        assert_eq!(items[1].isbn, "isbn-3");
    }

    #[tokio::test]
    async fn huge_page_numbers_yield_an_empty_page() {
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();

        let mut tx = store.begin(&cancel).await.unwrap();
        CatalogStore::add(&store, &mut tx, &book("978-0"), &cancel).await.unwrap();
        store.commit(tx).await.unwrap();

        let (items, total) = store.get_page(u64::MAX, u64::MAX, None, &cancel).await.unwrap();
        assert_eq!(total, 1);
        assert!(items.is_empty());
    }
}
