use async_trait::async_trait;
use sqlx::FromRow;
use tracing::debug;

use crate::accounts::{
    errors::StoreError,
    repo_types::{Account, AccountUpdate, NewAccount, StoredAccount},
};
use crate::db::Database;

/// Storage port for the `users` table.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Every row in storage order. Rows decode independently so one bad row
    /// does not hide the others.
    async fn scan_all(&self) -> Result<Vec<Result<Account, StoreError>>, StoreError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, StoreError>;
    async fn find_stored_by_id(&self, id: i64) -> Result<Option<StoredAccount>, StoreError>;
    async fn find_stored_by_email(&self, email: &str)
        -> Result<Option<StoredAccount>, StoreError>;
    async fn insert(&self, new: &NewAccount) -> Result<Account, StoreError>;
    /// Single-statement write of the mutable columns. A `None` hash leaves the
    /// stored one as it is. Returns `None` if the row is gone.
    async fn update(&self, id: i64, update: &AccountUpdate)
        -> Result<Option<Account>, StoreError>;
}

/// PostgreSQL adapter. Each call checks out one pooled connection and
/// releases it on return or cancellation.
#[derive(Clone)]
pub struct PgAccountStore {
    db: Database,
}

impl PgAccountStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn map_db_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or("unique").to_string();
            debug!(%constraint, "unique violation");
            return StoreError::UniqueViolation(constraint);
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn scan_all(&self) -> Result<Vec<Result<Account, StoreError>>, StoreError> {
        let mut conn = self.db.acquire().await?;
        let rows = sqlx::query(
            r#"
            SELECT id, username, email, image_url, created_at
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(&mut *conn)
        .await
        .map_err(map_db_error)?;

        Ok(rows
            .iter()
            .map(|row| Account::from_row(row).map_err(|e| StoreError::Decode(e.to_string())))
            .collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, StoreError> {
        let mut conn = self.db.acquire().await?;
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, username, email, image_url, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_db_error)?;
        Ok(account)
    }

    async fn find_stored_by_id(&self, id: i64) -> Result<Option<StoredAccount>, StoreError> {
        let mut conn = self.db.acquire().await?;
        let stored = sqlx::query_as::<_, StoredAccount>(
            r#"
            SELECT id, username, email, image_url, created_at, password_hash
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_db_error)?;
        Ok(stored)
    }

    async fn find_stored_by_email(
        &self,
        email: &str,
    ) -> Result<Option<StoredAccount>, StoreError> {
        let mut conn = self.db.acquire().await?;
        let stored = sqlx::query_as::<_, StoredAccount>(
            r#"
            SELECT id, username, email, image_url, created_at, password_hash
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_db_error)?;
        Ok(stored)
    }

    async fn insert(&self, new: &NewAccount) -> Result<Account, StoreError> {
        let mut conn = self.db.acquire().await?;
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO users (username, email, password_hash, image_url)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, image_url, created_at
            "#,
        )
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.image_url)
        .fetch_one(&mut *conn)
        .await
        .map_err(map_db_error)?;
        Ok(account)
    }

    async fn update(
        &self,
        id: i64,
        update: &AccountUpdate,
    ) -> Result<Option<Account>, StoreError> {
        let mut conn = self.db.acquire().await?;
        let account = sqlx::query_as::<_, Account>(
            r#"
            UPDATE users
               SET username = $2,
                   email = $3,
                   image_url = $4,
                   password_hash = COALESCE($5, password_hash)
             WHERE id = $1
            RETURNING id, username, email, image_url, created_at
            "#,
        )
        .bind(id)
        .bind(&update.username)
        .bind(&update.email)
        .bind(&update.image_url)
        .bind(&update.password_hash)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_db_error)?;
        Ok(account)
    }
}
