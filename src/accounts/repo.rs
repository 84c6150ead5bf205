use std::sync::{Arc, OnceLock};

use tracing::{error, info, instrument, warn};

use crate::accounts::{
    errors::AccountError,
    password::CredentialHasher,
    repo_types::{Account, AccountPatch, AccountUpdate, NewAccount},
    store::AccountStore,
};

/// Plaintext behind the decoy hash verified for unknown emails.
const DECOY_PASSWORD: &str = "decoy-password-for-unknown-accounts";

/// Sole reader/writer of account state.
#[derive(Clone)]
pub struct AccountRepository {
    store: Arc<dyn AccountStore>,
    hasher: Arc<dyn CredentialHasher>,
    decoy_hash: Arc<OnceLock<String>>,
}

impl AccountRepository {
    pub fn new(store: Arc<dyn AccountStore>, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self {
            store,
            hasher,
            decoy_hash: Arc::new(OnceLock::new()),
        }
    }

    /// All readable accounts. Rows that fail to decode are logged and skipped.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<Account>, AccountError> {
        let rows = self.store.scan_all().await.map_err(|e| {
            error!(error = %e, "list accounts failed");
            AccountError::from(e)
        })?;

        let mut accounts = Vec::with_capacity(rows.len());
        for row in rows {
            match row {
                Ok(account) => accounts.push(account),
                Err(e) => warn!(error = %e, "skipping unreadable account row"),
            }
        }
        Ok(accounts)
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: i64) -> Result<Account, AccountError> {
        self.store
            .find_by_id(id)
            .await
            .map_err(|e| {
                error!(error = %e, id, "find account failed");
                AccountError::from(e)
            })?
            .ok_or(AccountError::NotFound)
    }

    /// Hashes the password first; nothing is written if hashing fails.
    #[instrument(skip(self, password))]
    pub async fn create(
        &self,
        username: &str,
        email: &str,
        password: &str,
        image_url: Option<&str>,
    ) -> Result<Account, AccountError> {
        let password_hash = self.hash(password).await?;
        let new = NewAccount {
            username: username.to_owned(),
            email: email.to_owned(),
            password_hash,
            image_url: image_url.filter(|url| !url.is_empty()).map(str::to_owned),
        };

        let account = self.store.insert(&new).await.map_err(|e| {
            let err = AccountError::from(e);
            match &err {
                AccountError::DuplicateEmail => warn!(email, "email already registered"),
                other => error!(error = %other, "insert account failed"),
            }
            err
        })?;

        info!(account_id = account.id, email = %account.email, "account created");
        Ok(account)
    }

    /// Unknown email and wrong password both yield `InvalidCredentials`,
    /// and both cost one hash verification.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Account, AccountError> {
        let stored = self.store.find_stored_by_email(email).await.map_err(|e| {
            error!(error = %e, "find account by email failed");
            AccountError::from(e)
        })?;

        let Some(stored) = stored else {
            if let Some(decoy) = self.decoy_hash().await {
                let _ = self.verify(password, decoy).await;
            }
            warn!(email, "login unknown email");
            return Err(AccountError::InvalidCredentials);
        };

        if !self.verify(password, stored.password_hash).await? {
            warn!(email, account_id = stored.account.id, "login invalid password");
            return Err(AccountError::InvalidCredentials);
        }

        info!(account_id = stored.account.id, "account authenticated");
        Ok(stored.account)
    }

    /// Partial update. A password rotation needs the correct old password;
    /// a rejected rotation writes nothing.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: i64, patch: AccountPatch) -> Result<Account, AccountError> {
        let stored = self
            .store
            .find_stored_by_id(id)
            .await
            .map_err(|e| {
                error!(error = %e, id, "load account for update failed");
                AccountError::from(e)
            })?
            .ok_or(AccountError::NotFound)?;

        let password_hash = match &patch.password {
            Some(change) => {
                if !self
                    .verify(&change.old_password, stored.password_hash.clone())
                    .await?
                {
                    warn!(account_id = id, "update rejected: old password mismatch");
                    return Err(AccountError::InvalidCredentials);
                }
                Some(self.hash(&change.new_password).await?)
            }
            None => None,
        };

        let (username, email, image_url) = merge_fields(&stored.account, &patch);
        let update = AccountUpdate {
            username,
            email,
            image_url,
            password_hash,
        };

        let account = self
            .store
            .update(id, &update)
            .await
            .map_err(|e| {
                let err = AccountError::from(e);
                error!(error = %err, id, "update account failed");
                err
            })?
            .ok_or(AccountError::NotFound)?;

        info!(
            account_id = id,
            password_rotated = patch.password.is_some(),
            "account updated"
        );
        Ok(account)
    }

    async fn hash(&self, plain: &str) -> Result<String, AccountError> {
        let hasher = Arc::clone(&self.hasher);
        let plain = plain.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&plain))
            .await
            .map_err(|e| AccountError::HashingFailure(e.to_string()))?
            .map_err(|e| {
                error!(error = %e, "password hashing failed");
                AccountError::HashingFailure(e.to_string())
            })
    }

    async fn verify(&self, plain: &str, hash: String) -> Result<bool, AccountError> {
        let hasher = Arc::clone(&self.hasher);
        let plain = plain.to_owned();
        tokio::task::spawn_blocking(move || hasher.verify(&plain, &hash))
            .await
            .map_err(|e| AccountError::HashingFailure(e.to_string()))
    }

    async fn decoy_hash(&self) -> Option<String> {
        if let Some(hash) = self.decoy_hash.get() {
            return Some(hash.clone());
        }
        let hash = self.hash(DECOY_PASSWORD).await.ok()?;
        Some(self.decoy_hash.get_or_init(|| hash).clone())
    }
}

/// Present, non-empty fields replace stored values; everything else is kept.
fn merge_fields(current: &Account, patch: &AccountPatch) -> (String, String, Option<String>) {
    let username = non_empty(&patch.username).unwrap_or(&current.username).to_owned();
    let email = non_empty(&patch.email).unwrap_or(&current.email).to_owned();
    let image_url = match &patch.image_url {
        None => current.image_url.clone(),
        Some(None) => None,
        Some(Some(url)) if url.is_empty() => current.image_url.clone(),
        Some(Some(url)) => Some(url.clone()),
    };
    (username, email, image_url)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
