use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored account record, hash included. Only the store implementations and
/// the identity service ever see this; callers get a [`UserProfile`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            created_at: self.created_at,
        }
    }
}

/// Public view of a user; carries no password material by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

/// Registration input.
#[derive(Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

// Manual impl so the plaintext password can never end up in logs.
impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish()
    }
}

/// Login result. `expires_at` is informational; the authoritative expiry is
/// the `exp` claim inside the token itself.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub username: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

/// Catalog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub published_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    /// None until the first update.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Input for creating a book.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub published_date: NaiveDate,
}

/// Full replacement payload for updating a book.
#[derive(Debug, Clone, Deserialize)]
pub struct BookChanges {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub published_date: NaiveDate,
}

/// One page of catalog results.
#[derive(Debug, Clone, Serialize)]
pub struct BookPage {
    pub items: Vec<Book>,
    pub page_number: u64,
    pub page_size: u64,
    pub total_count: u64,
}

impl BookPage {
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total_count.div_ceil(self.page_size)
    }

    pub fn has_previous_page(&self) -> bool {
        self.page_number > 1
    }

    pub fn has_next_page(&self) -> bool {
        self.page_number < self.total_pages()
    }
}
