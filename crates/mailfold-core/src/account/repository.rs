//! Account storage.

use std::future::Future;

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::debug;

use super::model::{Account, AccountId, Credential, Endpoint};
use crate::Result;

/// Source of configured accounts.
///
/// The engine only reads accounts and deletes them by id; account creation
/// happens elsewhere.
pub trait AccountStore: Send + Sync {
    /// Returns every configured account.
    fn accounts(&self) -> impl Future<Output = Result<Vec<Account>>> + Send;

    /// Deletes an account, returning whether it existed.
    fn delete(&self, id: &AccountId) -> impl Future<Output = Result<bool>> + Send;
}

/// `SQLite`-backed account repository.
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
    /// Create a new repository with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Create an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                label TEXT NOT NULL,
                host TEXT NOT NULL,
                port INTEGER NOT NULL,
                tls INTEGER NOT NULL DEFAULT 1,
                username TEXT NOT NULL,
                credential TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get all accounts, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r"
            SELECT id, label, host, port, tls, username, credential
            FROM accounts
            ORDER BY created_at ASC, id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_account).collect())
    }

    /// Get account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: &AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(
            r"
            SELECT id, label, host, port, tls, username, credential
            FROM accounts
            WHERE id = ?
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_account))
    }

    /// Insert or replace an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn save(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO accounts (id, label, host, port, tls, username, credential)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                label = excluded.label,
                host = excluded.host,
                port = excluded.port,
                tls = excluded.tls,
                username = excluded.username,
                credential = excluded.credential
            ",
        )
        .bind(account.id.as_str())
        .bind(&account.label)
        .bind(&account.endpoint.host)
        .bind(i64::from(account.endpoint.port))
        .bind(account.endpoint.tls)
        .bind(&account.username)
        .bind(account.credential.as_str())
        .execute(&self.pool)
        .await?;

        debug!(account = %account.id, "account saved");
        Ok(())
    }

    /// Delete an account by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn remove(&self, id: &AccountId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl AccountStore for AccountRepository {
    async fn accounts(&self) -> Result<Vec<Account>> {
        self.list().await
    }

    async fn delete(&self, id: &AccountId) -> Result<bool> {
        self.remove(id).await
    }
}

fn row_to_account(row: &SqliteRow) -> Account {
    let port: i64 = row.get("port");
    Account {
        id: AccountId::new(row.get::<String, _>("id")),
        label: row.get("label"),
        endpoint: Endpoint {
            host: row.get("host"),
            port: u16::try_from(port).unwrap_or(993),
            tls: row.get("tls"),
        },
        username: row.get("username"),
        credential: Credential::new(row.get::<String, _>("credential")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn account(id: &str) -> Account {
        Account::new(
            id,
            format!("{id}@example.com"),
            Endpoint::tls("imap.example.com"),
            Credential::new(format!("ref-{id}")),
        )
    }

    #[tokio::test]
    async fn test_save_and_list() {
        let repo = AccountRepository::in_memory().await.unwrap();
        repo.save(&account("a")).await.unwrap();
        repo.save(&account("b")).await.unwrap();

        let accounts = repo.accounts().await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0], account("a"));
    }

    #[tokio::test]
    async fn test_save_is_upsert() {
        let repo = AccountRepository::in_memory().await.unwrap();
        let mut a = account("a");
        repo.save(&a).await.unwrap();

        a.endpoint.port = 1993;
        a.endpoint.tls = false;
        repo.save(&a).await.unwrap();

        let stored = repo.get(&a.id).await.unwrap().unwrap();
        assert_eq!(stored.endpoint.port, 1993);
        assert!(!stored.endpoint.tls);
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = AccountRepository::in_memory().await.unwrap();
        repo.save(&account("a")).await.unwrap();

        assert!(repo.delete(&AccountId::new("a")).await.unwrap());
        assert!(!repo.delete(&AccountId::new("a")).await.unwrap());
        assert!(repo.get(&AccountId::new("a")).await.unwrap().is_none());
    }
}
