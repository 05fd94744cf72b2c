//! Command handlers.

use std::io::BufRead;
use std::path::Path;

use anyhow::{Context, Result, bail};
use mailfold_core::{
    Account, AccountId, AccountRepository, AccountStore, Endpoint, ImapConnector,
    KeyringCredentials, LocalCache, SyncConfig, SyncEngine, default_database_path, namespace_for,
    validate_account,
};
use tracing::{debug, info};

use crate::cli::{AccountCommand, Command};
use crate::display;

type Engine = SyncEngine<ImapConnector, KeyringCredentials>;

/// Opened storage and a ready engine.
pub struct App {
    accounts: AccountRepository,
    engine: Engine,
}

impl App {
    /// Loads configuration, opens the database and restores the cache.
    pub async fn open() -> Result<Self> {
        let config_path = SyncConfig::default_path();
        let config = SyncConfig::load(&config_path)
            .await
            .with_context(|| format!("loading {}", config_path.display()))?;
        debug!(path = %config_path.display(), ?config, "configuration loaded");

        let db_path = default_database_path();
        if let Some(dir) = db_path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let db = db_path.to_str().unwrap_or("mailfold.db");

        let accounts = AccountRepository::new(db).await?;
        let cache = LocalCache::new(db, namespace_for(&user_name()), config.cache_capacity).await?;
        let connector = ImapConnector::new(config.mailbox.clone(), config.connect_timeout());
        let engine = SyncEngine::new(connector, KeyringCredentials, cache, config);
        engine.load_cache().await;

        Ok(Self { accounts, engine })
    }

    /// Runs one command.
    pub async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Account { action } => match action {
                AccountCommand::Add {
                    id,
                    email,
                    host,
                    port,
                    plain,
                    username,
                } => self.add_account(id, email, host, port, !plain, username).await,
                AccountCommand::Remove { id } => self.remove_account(&AccountId::new(id)).await,
                AccountCommand::List => {
                    for account in self.accounts.accounts().await? {
                        println!("{}", display::account_line(&account));
                    }
                    Ok(())
                }
            },
            Command::Probe { id } => {
                let account = self.account(&id).await?;
                match self.engine.probe(&account).await {
                    Ok(()) => {
                        println!("{}: connection OK", account.label);
                        Ok(())
                    }
                    Err(e) => bail!("{}: {}", account.label, e.friendly()),
                }
            }
            Command::Sync {
                page,
                force,
                account,
            } => self.sync(page, force, account).await,
            Command::List { page } => {
                for message in self.engine.page(page) {
                    println!("{}", display::message_line(&message));
                }
                Ok(())
            }
            Command::Stats => {
                println!("{}", display::stats(&self.engine.stats()));
                Ok(())
            }
            Command::Toggle { account, uid } => {
                let account = self.account(&account).await?;
                let seen = self.engine.toggle_seen(&account, uid).await?;
                println!("{} {uid}: {}", account.id, if seen { "read" } else { "unread" });
                Ok(())
            }
            Command::Open { account, uid } => {
                let account = self.account(&account).await?;
                let message = self.engine.open_message(&account, uid).await?;
                println!("From:    {}", message.from);
                println!("To:      {}", message.to);
                println!("Date:    {}", message.date);
                println!("Subject: {}", message.subject);
                println!();
                println!("{}", message.text_body.as_deref().unwrap_or(&message.html_body));
                Ok(())
            }
            Command::Export { account, uid, path } => {
                let account = self.account(&account).await?;
                let raw = self.engine.fetch_raw(&account, uid).await?;
                tokio::fs::write(&path, &raw)
                    .await
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("{} bytes written to {}", raw.len(), path.display());
                Ok(())
            }
            Command::Decode { path } => decode_file(&path).await,
        }
    }

    async fn account(&self, id: &str) -> Result<Account> {
        self.accounts
            .get(&AccountId::new(id))
            .await?
            .ok_or_else(|| mailfold_core::Error::AccountNotFound(id.to_string()).into())
    }

    async fn add_account(
        &self,
        id: String,
        email: String,
        host: String,
        port: Option<u16>,
        tls: bool,
        username: Option<String>,
    ) -> Result<()> {
        let id = AccountId::new(id);
        let endpoint = Endpoint {
            host,
            port: port.unwrap_or(if tls { 993 } else { 143 }),
            tls,
        };
        let mut account = Account::new(
            id.as_str(),
            email,
            endpoint,
            KeyringCredentials::credential_for(&id),
        );
        if let Some(username) = username {
            account.username = username;
        }
        if let Err(errors) = validate_account(&account) {
            let messages: Vec<_> = errors.iter().map(ToString::to_string).collect();
            bail!("invalid account: {}", messages.join(", "));
        }

        eprint!("Password for {}: ", account.username);
        let password = read_line()?;
        KeyringCredentials::store(&account.credential, &password)?;
        self.accounts.save(&account).await?;

        if let Err(e) = self.engine.probe(&account).await {
            eprintln!("warning: {}", e.friendly());
        }
        info!(account = %account.id, "account added");
        println!("Added {}", account.label);
        Ok(())
    }

    async fn remove_account(&self, id: &AccountId) -> Result<()> {
        let account = self.account(id.as_str()).await?;
        self.engine.remove_account(&self.accounts, id).await?;
        KeyringCredentials::delete(&account.credential)?;

        let remaining: Vec<_> = self
            .accounts
            .accounts()
            .await?
            .into_iter()
            .map(|a| a.id)
            .collect();
        self.engine.retain_accounts(&remaining).await;

        println!("Removed {}", account.label);
        Ok(())
    }

    async fn sync(&self, page: u32, force: bool, only: Option<String>) -> Result<()> {
        let mut accounts = self.accounts.accounts().await?;
        if let Some(only) = only {
            accounts.retain(|a| a.id.as_str() == only);
            if accounts.is_empty() {
                return Err(mailfold_core::Error::AccountNotFound(only).into());
            }
        }
        if accounts.is_empty() {
            bail!("no accounts configured; add one with `mailfold account add`");
        }

        let mut progress = self.engine.subscribe();
        let printer = tokio::spawn(async move {
            while progress.changed().await.is_ok() {
                if let Some(line) = display::progress(&progress.borrow_and_update()) {
                    eprintln!("{line}");
                }
            }
        });

        let report = self.engine.sync(&accounts, page, force).await;
        printer.abort();

        println!("{}", display::report(&report));
        for message in self.engine.page(page) {
            println!("{}", display::message_line(&message));
        }
        Ok(())
    }
}

async fn decode_file(path: &Path) -> Result<()> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let decoded = mailfold_mime::decode(&raw);
    println!("{}", serde_json::to_string_pretty(&decoded)?);
    Ok(())
}

fn read_line() -> Result<String> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let line = line.trim_end_matches(['\r', '\n']).to_string();
    if line.is_empty() {
        bail!("no password given");
    }
    Ok(line)
}

/// Namespace owner for the cache key.
fn user_name() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "default".to_string())
}
