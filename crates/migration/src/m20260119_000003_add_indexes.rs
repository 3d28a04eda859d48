//! Unique indexes guarding the uniqueness invariants.
//!
//! Username and email are unique case-insensitively, so the indexes cover
//! `lower(column)` rather than the raw column. Expression indexes are not
//! expressible through the schema builder, hence the raw statements; the
//! syntax is shared by PostgreSQL and SQLite.
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        conn.execute_unprepared(
            r#"CREATE UNIQUE INDEX "uniq_user_username_lower" ON "user" (LOWER("username"))"#,
        )
        .await?;
        conn.execute_unprepared(
            r#"CREATE UNIQUE INDEX "uniq_user_email_lower" ON "user" (LOWER("email"))"#,
        )
        .await?;

        // ISBNs compare exactly; a plain unique index is enough.
        manager
            .create_index(
                Index::create()
                    .name("uniq_book_isbn")
                    .table(Book::Table)
                    .col(Book::Isbn)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        conn.execute_unprepared(r#"DROP INDEX "uniq_user_username_lower""#).await?;
        conn.execute_unprepared(r#"DROP INDEX "uniq_user_email_lower""#).await?;
        manager
            .drop_index(Index::drop().name("uniq_book_isbn").table(Book::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Book { Table, Isbn }
