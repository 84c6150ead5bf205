//! In-memory `AccountStore` used by tests.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::accounts::{
    errors::StoreError,
    repo_types::{Account, AccountUpdate, NewAccount, StoredAccount},
    store::AccountStore,
};

enum Slot {
    Row(StoredAccount),
    Corrupt(i64),
}

#[derive(Default)]
pub struct MemoryAccountStore {
    rows: Mutex<Vec<Slot>>,
    next_id: Mutex<i64>,
    fail_writes: AtomicBool,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plants a row that fails to decode on every read.
    pub fn plant_corrupt_row(&self) -> i64 {
        let id = self.allocate_id();
        self.rows.lock().unwrap().push(Slot::Corrupt(id));
        id
    }

    /// Makes every subsequent insert/update fail with a database error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn stored_hash(&self, id: i64) -> Option<String> {
        self.rows.lock().unwrap().iter().find_map(|slot| match slot {
            Slot::Row(row) if row.account.id == id => Some(row.password_hash.clone()),
            _ => None,
        })
    }

    /// Replaces a row's hash directly, as a concurrent rotation would.
    pub fn overwrite_hash(&self, id: i64, hash: &str) {
        for slot in self.rows.lock().unwrap().iter_mut() {
            if let Slot::Row(row) = slot {
                if row.account.id == id {
                    row.password_hash = hash.to_owned();
                }
            }
        }
    }

    fn allocate_id(&self) -> i64 {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        *next
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn email_taken(rows: &[Slot], email: &str, except: Option<i64>) -> bool {
        rows.iter().any(|slot| match slot {
            Slot::Row(row) => row.account.email == email && Some(row.account.id) != except,
            Slot::Corrupt(_) => false,
        })
    }
}

fn corrupt(id: i64) -> StoreError {
    StoreError::Decode(format!("row {id}: invalid value for column created_at"))
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn scan_all(&self) -> Result<Vec<Result<Account, StoreError>>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .map(|slot| match slot {
                Slot::Row(row) => Ok(row.account.clone()),
                Slot::Corrupt(id) => Err(corrupt(*id)),
            })
            .collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>, StoreError> {
        Ok(self.find_stored_by_id(id).await?.map(|row| row.account))
    }

    async fn find_stored_by_id(&self, id: i64) -> Result<Option<StoredAccount>, StoreError> {
        let rows = self.rows.lock().unwrap();
        for slot in rows.iter() {
            match slot {
                Slot::Row(row) if row.account.id == id => return Ok(Some(row.clone())),
                Slot::Corrupt(bad) if *bad == id => return Err(corrupt(id)),
                _ => {}
            }
        }
        Ok(None)
    }

    async fn find_stored_by_email(
        &self,
        email: &str,
    ) -> Result<Option<StoredAccount>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find_map(|slot| match slot {
            Slot::Row(row) if row.account.email == email => Some(row.clone()),
            _ => None,
        }))
    }

    async fn insert(&self, new: &NewAccount) -> Result<Account, StoreError> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        if Self::email_taken(&rows, &new.email, None) {
            return Err(StoreError::UniqueViolation("users_email_key".into()));
        }
        let account = Account {
            id: self.allocate_id(),
            username: new.username.clone(),
            email: new.email.clone(),
            image_url: new.image_url.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        rows.push(Slot::Row(StoredAccount {
            account: account.clone(),
            password_hash: new.password_hash.clone(),
        }));
        Ok(account)
    }

    async fn update(
        &self,
        id: i64,
        update: &AccountUpdate,
    ) -> Result<Option<Account>, StoreError> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        if Self::email_taken(&rows, &update.email, Some(id)) {
            return Err(StoreError::UniqueViolation("users_email_key".into()));
        }
        for slot in rows.iter_mut() {
            if let Slot::Row(row) = slot {
                if row.account.id == id {
                    row.account.username = update.username.clone();
                    row.account.email = update.email.clone();
                    row.account.image_url = update.image_url.clone();
                    if let Some(hash) = &update.password_hash {
                        row.password_hash = hash.clone();
                    }
                    return Ok(Some(row.account.clone()));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_account(email: &str) -> NewAccount {
        NewAccount {
            username: "alice".into(),
            email: email.into(),
            password_hash: "hash-a".into(),
            image_url: None,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_of_one_email_admit_exactly_one() {
        let store = Arc::new(MemoryAccountStore::new());
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.insert(&new_account("same@example.com")).await })
            })
            .collect();

        let mut inserted = 0;
        let mut rejected = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => inserted += 1,
                Err(StoreError::UniqueViolation(constraint)) => {
                    assert_eq!(constraint, "users_email_key");
                    rejected += 1;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(rejected, 15);
        assert_eq!(store.scan_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_without_hash_keeps_the_stored_one() {
        let store = MemoryAccountStore::new();
        let account = store.insert(&new_account("a@example.com")).await.unwrap();

        let update = AccountUpdate {
            username: "renamed".into(),
            email: account.email.clone(),
            image_url: None,
            password_hash: None,
        };
        store.update(account.id, &update).await.unwrap();
        assert_eq!(store.stored_hash(account.id).as_deref(), Some("hash-a"));

        let rotate = AccountUpdate {
            password_hash: Some("hash-b".into()),
            ..update
        };
        store.update(account.id, &rotate).await.unwrap();
        assert_eq!(store.stored_hash(account.id).as_deref(), Some("hash-b"));
    }
}
