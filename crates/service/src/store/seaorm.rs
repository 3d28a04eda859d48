//! SeaORM-backed store.
//!
//! Reads run on the pooled connection; writes run on a `DatabaseTransaction`
//! owned by the unit of work. Unique-index violations are mapped back to
//! [`StoreError::Conflict`] by constraint name so concurrent duplicates
//! surface as the same domain conflict the pre-checks produce.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use models::{book, user};

use crate::domain::{Book, User};

use super::{ensure_live, CatalogStore, CredentialStore, StoreError, UnitOfWork, UniqueField};

#[derive(Clone)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn map_db(e: DbErr) -> StoreError {
    if let Some(SqlErr::UniqueConstraintViolation(msg)) = e.sql_err() {
        // Constraint names (uniq_user_username_lower, uniq_user_email_lower,
        // uniq_book_isbn) identify the field on both postgres and sqlite.
        let lower = msg.to_lowercase();
        if lower.contains("username") {
            return StoreError::Conflict(UniqueField::Username);
        }
        if lower.contains("email") {
            return StoreError::Conflict(UniqueField::Email);
        }
        if lower.contains("isbn") {
            return StoreError::Conflict(UniqueField::Isbn);
        }
    }
    StoreError::Db(e.to_string())
}

fn user_from_model(m: user::Model) -> User {
    User {
        id: m.id,
        username: m.username,
        email: m.email,
        password_hash: m.password_hash,
        first_name: m.first_name,
        last_name: m.last_name,
        created_at: m.created_at.with_timezone(&Utc),
    }
}

fn user_to_active(u: &User) -> user::ActiveModel {
    user::ActiveModel {
        id: Set(u.id),
        username: Set(u.username.clone()),
        email: Set(u.email.clone()),
        password_hash: Set(u.password_hash.clone()),
        first_name: Set(u.first_name.clone()),
        last_name: Set(u.last_name.clone()),
        created_at: Set(u.created_at.into()),
    }
}

fn book_from_model(m: book::Model) -> Book {
    Book {
        id: m.id,
        title: m.title,
        author: m.author,
        isbn: m.isbn,
        published_date: m.published_date,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.map(|t| t.with_timezone(&Utc)),
    }
}

fn book_to_active(b: &Book) -> book::ActiveModel {
    book::ActiveModel {
        id: Set(b.id),
        title: Set(b.title.clone()),
        author: Set(b.author.clone()),
        isbn: Set(b.isbn.clone()),
        published_date: Set(b.published_date),
        created_at: Set(b.created_at.into()),
        updated_at: Set(b.updated_at.map(Into::into)),
    }
}

/// `lower(title) LIKE %term% OR lower(author) LIKE %term%`.
fn search_condition(term: &str) -> Condition {
    let pattern = format!("%{}%", term.to_lowercase());
    Condition::any()
        .add(Expr::expr(Func::lower(Expr::col(book::Column::Title))).like(pattern.clone()))
        .add(Expr::expr(Func::lower(Expr::col(book::Column::Author))).like(pattern))
}

#[async_trait]
impl UnitOfWork for SeaOrmStore {
    type Tx = DatabaseTransaction;

    async fn begin(&self, cancel: &CancellationToken) -> Result<DatabaseTransaction, StoreError> {
        ensure_live(cancel)?;
        self.db.begin().await.map_err(map_db)
    }

    async fn commit(&self, tx: DatabaseTransaction) -> Result<(), StoreError> {
        tx.commit().await.map_err(map_db)
    }

    async fn rollback(&self, tx: DatabaseTransaction) -> Result<(), StoreError> {
        tx.rollback().await.map_err(map_db)
    }
}

#[async_trait]
impl CredentialStore for SeaOrmStore {
    async fn get_by_id(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Option<User>, StoreError> {
        ensure_live(cancel)?;
        let found = user::Entity::find_by_id(id).one(&self.db).await.map_err(map_db)?;
        Ok(found.map(user_from_model))
    }

    async fn find_by_username(
        &self,
        username: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<User>, StoreError> {
        ensure_live(cancel)?;
        let found = user::Entity::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(user::Column::Username)))
                    .eq(username.to_lowercase()),
            )
            .one(&self.db)
            .await
            .map_err(map_db)?;
        Ok(found.map(user_from_model))
    }

    async fn find_by_email(
        &self,
        email: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<User>, StoreError> {
        ensure_live(cancel)?;
        let found = user::Entity::find()
            .filter(Expr::expr(Func::lower(Expr::col(user::Column::Email))).eq(email.to_lowercase()))
            .one(&self.db)
            .await
            .map_err(map_db)?;
        Ok(found.map(user_from_model))
    }

    async fn add(
        &self,
        tx: &mut DatabaseTransaction,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        ensure_live(cancel)?;
        user_to_active(user).insert(&*tx).await.map_err(map_db)?;
        Ok(())
    }

    async fn update(
        &self,
        tx: &mut DatabaseTransaction,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        ensure_live(cancel)?;
        user_to_active(user).update(&*tx).await.map_err(map_db)?;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for SeaOrmStore {
    async fn get_by_id(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<Option<Book>, StoreError> {
        ensure_live(cancel)?;
        let found = book::Entity::find_by_id(id).one(&self.db).await.map_err(map_db)?;
        Ok(found.map(book_from_model))
    }

    async fn find_by_isbn(
        &self,
        isbn: &str,
        exclude: Option<Uuid>,
        cancel: &CancellationToken,
    ) -> Result<Option<Book>, StoreError> {
        ensure_live(cancel)?;
        let mut query = book::Entity::find().filter(book::Column::Isbn.eq(isbn));
        if let Some(id) = exclude {
            query = query.filter(book::Column::Id.ne(id));
        }
        let found = query.one(&self.db).await.map_err(map_db)?;
        Ok(found.map(book_from_model))
    }

    async fn list(
        &self,
        search: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Book>, StoreError> {
        ensure_live(cancel)?;
        let mut query = book::Entity::find();
        if let Some(term) = search {
            query = query.filter(search_condition(term));
        }
        let found = query
            .order_by_asc(book::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(map_db)?;
        Ok(found.into_iter().map(book_from_model).collect())
    }

    async fn get_page(
        &self,
        page: u64,
        size: u64,
        search: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(Vec<Book>, u64), StoreError> {
        ensure_live(cancel)?;
        let mut query = book::Entity::find();
        if let Some(term) = search {
            query = query.filter(search_condition(term));
        }
        let paginator = query
            .order_by_asc(book::Column::CreatedAt)
            .paginate(&self.db, size);
        let total = paginator.num_items().await.map_err(map_db)?;
        // paginate() is 0-based; the contract is 1-based.
        let items = paginator.fetch_page(page.saturating_sub(1)).await.map_err(map_db)?;
        Ok((items.into_iter().map(book_from_model).collect(), total))
    }

    async fn add(
        &self,
        tx: &mut DatabaseTransaction,
        book: &Book,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        ensure_live(cancel)?;
        book_to_active(book).insert(&*tx).await.map_err(map_db)?;
        Ok(())
    }

    async fn update(
        &self,
        tx: &mut DatabaseTransaction,
        book: &Book,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        ensure_live(cancel)?;
        book_to_active(book).update(&*tx).await.map_err(map_db)?;
        Ok(())
    }

    async fn delete(
        &self,
        tx: &mut DatabaseTransaction,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        ensure_live(cancel)?;
        book::Entity::delete_by_id(id).exec(&*tx).await.map_err(map_db)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sqlite_store;
    use chrono::NaiveDate;

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

    fn sample_book(isbn: &str, title: &str) -> Book {
        Book {
            id: Uuid::new_v4(),
            title: title.into(),
            author: "Author".into(),
            isbn: isbn.into(),
            published_date: NaiveDate::from_ymd_opt(2001, 1, 1).unwrap(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn commit_persists_and_rollback_discards() -> anyhow::Result<()> {
        let store = sqlite_store().await?;
        let cancel = CancellationToken::new();

        let mut tx = store.begin(&cancel).await?;
        CredentialStore::add(&store, &mut tx, &user("alice", "alice@x.com"), &cancel).await?;
        store.commit(tx).await?;
        assert!(store.find_by_email("alice@x.com", &cancel).await?.is_some());

        let mut tx = store.begin(&cancel).await?;
        CredentialStore::add(&store, &mut tx, &user("bob", "bob@x.com"), &cancel).await?;
        store.rollback(tx).await?;
        assert!(store.find_by_email("bob@x.com", &cancel).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn unique_email_is_enforced_case_insensitively_by_the_index() -> anyhow::Result<()> {
        let store = sqlite_store().await?;
        let cancel = CancellationToken::new();

        let mut tx = store.begin(&cancel).await?;
        CredentialStore::add(&store, &mut tx, &user("a", "A@x.com"), &cancel).await?;
        store.commit(tx).await?;

        let mut tx = store.begin(&cancel).await?;
        let err = CredentialStore::add(&store, &mut tx, &user("b", "a@x.com"), &cancel)
            .await
            .unwrap_err();
        store.rollback(tx).await?;
        assert!(matches!(err, StoreError::Conflict(UniqueField::Email)));
        Ok(())
    }

    #[tokio::test]
    async fn unique_username_is_enforced_case_insensitively_by_the_index() -> anyhow::Result<()> {
        let store = sqlite_store().await?;
        let cancel = CancellationToken::new();

        let mut tx = store.begin(&cancel).await?;
        CredentialStore::add(&store, &mut tx, &user("Alice", "a1@x.com"), &cancel).await?;
        store.commit(tx).await?;

        let mut tx = store.begin(&cancel).await?;
        let err = CredentialStore::add(&store, &mut tx, &user("alice", "a2@x.com"), &cancel)
            .await
            .unwrap_err();
        store.rollback(tx).await?;
        assert!(matches!(err, StoreError::Conflict(UniqueField::Username)));
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_isbn_maps_to_isbn_conflict() -> anyhow::Result<()> {
        let store = sqlite_store().await?;
        let cancel = CancellationToken::new();

        let mut tx = store.begin(&cancel).await?;
        CatalogStore::add(&store, &mut tx, &sample_book("978-0", "One"), &cancel).await?;
        store.commit(tx).await?;

        let mut tx = store.begin(&cancel).await?;
        let err = CatalogStore::add(&store, &mut tx, &sample_book("978-0", "Two"), &cancel)
            .await
            .unwrap_err();
        store.rollback(tx).await?;
        assert!(matches!(err, StoreError::Conflict(UniqueField::Isbn)));
        Ok(())
    }

    #[tokio::test]
    async fn case_insensitive_lookups() -> anyhow::Result<()> {
        let store = sqlite_store().await?;
        let cancel = CancellationToken::new();

        let mut tx = store.begin(&cancel).await?;
        CredentialStore::add(&store, &mut tx, &user("Alice", "Alice@X.com"), &cancel).await?;
        store.commit(tx).await?;

        assert!(store.find_by_email("alice@x.com", &cancel).await?.is_some());
        assert!(store.find_by_username("ALICE", &cancel).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn search_and_pagination() -> anyhow::Result<()> {
        let store = sqlite_store().await?;
        let cancel = CancellationToken::new();

        let titles = ["Dune", "Dune Messiah", "Foundation"];
        for (i, title) in titles.iter().enumerate() {
            let mut b = sample_book(&format!("isbn-{i}"), title);
            b.created_at = Utc::now() + chrono::Duration::seconds(i as i64);
            let mut tx = store.begin(&cancel).await?;
            CatalogStore::add(&store, &mut tx, &b, &cancel).await?;
            store.commit(tx).await?;
        }

        let found = store.list(Some("dune"), &cancel).await?;
        assert_eq!(found.len(), 2);

        let (items, total) = store.get_page(1, 2, None, &cancel).await?;
        assert_eq!(total, 3);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Dune");

        let (items, total) = store.get_page(2, 2, None, &cancel).await?;
        assert_eq!(total, 3);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Foundation");
        Ok(())
    }

    #[tokio::test]
    async fn delete_then_lookup_misses() -> anyhow::Result<()> {
        let store = sqlite_store().await?;
        let cancel = CancellationToken::new();

        let b = sample_book("978-9", "Gone");
        let mut tx = store.begin(&cancel).await?;
        CatalogStore::add(&store, &mut tx, &b, &cancel).await?;
        store.commit(tx).await?;

        let mut tx = store.begin(&cancel).await?;
        store.delete(&mut tx, b.id, &cancel).await?;
        store.commit(tx).await?;

        assert!(CatalogStore::get_by_id(&store, b.id, &cancel).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_before_io() -> anyhow::Result<()> {
        let store = sqlite_store().await?;
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(matches!(store.begin(&cancel).await, Err(StoreError::Cancelled)));
        assert!(matches!(
            store.find_by_email("x@x.com", &cancel).await,
            Err(StoreError::Cancelled)
        ));
        Ok(())
    }
}
