use std::sync::Arc;

use crate::accounts::{password::Argon2Hasher, repo::AccountRepository, store::PgAccountStore};
use crate::auth::{JwtIssuer, TokenIssuer};
use crate::config::AppConfig;
use crate::db::Database;

#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountRepository,
    pub tokens: Arc<dyn TokenIssuer>,
}

impl AppState {
    pub fn init(config: &AppConfig, db: Database) -> anyhow::Result<Self> {
        let hasher = Arc::new(Argon2Hasher::new(&config.hasher)?);
        let store = Arc::new(PgAccountStore::new(db));
        Ok(Self {
            accounts: AccountRepository::new(store, hasher),
            tokens: Arc::new(JwtIssuer::new(&config.jwt)),
        })
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::accounts::{memory::MemoryAccountStore, password::fast_hasher};
        use crate::accounts::repo_types::Account;

        struct FakeTokens;
        impl TokenIssuer for FakeTokens {
            fn issue(&self, account: &Account) -> anyhow::Result<String> {
                Ok(format!("token-for-{}", account.id))
            }
        }

        let accounts = AccountRepository::new(
            Arc::new(MemoryAccountStore::new()),
            Arc::new(fast_hasher()),
        );
        Self {
            accounts,
            tokens: Arc::new(FakeTokens),
        }
    }
}
