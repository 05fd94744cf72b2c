//! The aggregation engine.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mailfold_mime::DecodedMessage;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::fetch::{FetchError, FetchErrorKind, FetchPolicy, fetch_page, open_session};
use super::message::{MessageId, MessageSummary};
use super::progress::{Progress, ProgressReporter};
use super::state::{MailboxStats, RoundResult, SyncState};
use crate::account::{Account, AccountId, AccountStore, CredentialProvider};
use crate::cache::LocalCache;
use crate::config::SyncConfig;
use crate::session::{Flag, MailboxConnector, MailboxSession};
use crate::{Error, Result};

/// Outcome of one [`SyncEngine::sync`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Page requested.
    pub page: u32,
    /// True if held data already covered the page and nothing was fetched.
    pub skipped: bool,
    /// Summaries fetched this round.
    pub fetched: usize,
    /// Largest mailbox size seen in the last round.
    pub known_total: u32,
    /// Accounts that failed this round, ordered by account id.
    pub errors: Vec<FetchError>,
}

impl SyncReport {
    /// True if every account synced.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Owns [`SyncState`] and drives fetch tasks, merges and cache writes.
///
/// All methods take `&self`; share the engine behind an [`Arc`] to toggle
/// flags while a sync is running.
pub struct SyncEngine<C, P> {
    connector: Arc<C>,
    credentials: Arc<P>,
    cache: LocalCache,
    config: SyncConfig,
    state: Mutex<SyncState>,
    round: tokio::sync::Mutex<()>,
    cache_writes: tokio::sync::Mutex<()>,
    progress: ProgressReporter,
}

impl<C, P> std::fmt::Debug for SyncEngine<C, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("cache", &self.cache.namespace())
            .field("config", &self.config)
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}

impl<C, P> SyncEngine<C, P>
where
    C: MailboxConnector,
    P: CredentialProvider,
{
    /// Creates an engine with empty state.
    #[must_use]
    pub fn new(connector: C, credentials: P, cache: LocalCache, config: SyncConfig) -> Self {
        let progress = ProgressReporter::new(config.progress_grace());
        Self {
            connector: Arc::new(connector),
            credentials: Arc::new(credentials),
            cache,
            config,
            state: Mutex::new(SyncState::new()),
            round: tokio::sync::Mutex::new(()),
            cache_writes: tokio::sync::Mutex::new(()),
            progress,
        }
    }

    fn state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    const fn policy(&self) -> FetchPolicy {
        FetchPolicy {
            page_size: self.config.page_size,
            connect_timeout: self.config.connect_timeout(),
            connect_attempts: self.config.connect_attempts,
            retry_delay: self.config.retry_delay(),
        }
    }

    /// Engine settings.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Replaces held messages with the cached snapshot. Returns how many were
    /// loaded.
    pub async fn load_cache(&self) -> usize {
        let messages = self.cache.load().await;
        let count = messages.len();
        self.state().restore(messages);
        info!(count, "cache loaded");
        count
    }

    /// Syncs `page` of every account in `accounts` concurrently.
    ///
    /// Failed accounts are listed in the report; they never abort the round
    /// or their siblings. Without `force`, a page already covered by held
    /// messages is not fetched again. An empty `accounts` changes nothing.
    pub async fn sync(&self, accounts: &[Account], page: u32, force: bool) -> SyncReport {
        let _round = self.round.lock().await;

        let mut scope: Vec<AccountId> = accounts.iter().map(|a| a.id.clone()).collect();
        scope.sort();
        scope.dedup();

        let issued = {
            let mut state = self.state();
            if scope.is_empty() {
                debug!(page, "no accounts to sync");
                return SyncReport {
                    page,
                    skipped: true,
                    fetched: 0,
                    known_total: state.known_total(),
                    errors: Vec::new(),
                };
            }
            if !force && state.can_skip(&scope, page, self.config.page_size) {
                state.set_page(page);
                debug!(page, "page already held, skipping fetch");
                return SyncReport {
                    page,
                    skipped: true,
                    fetched: 0,
                    known_total: state.known_total(),
                    errors: Vec::new(),
                };
            }
            state.begin_round()
        };

        self.progress.start(page);
        let policy = self.policy();
        let mut tasks = JoinSet::new();
        let mut pending: BTreeMap<AccountId, String> = BTreeMap::new();
        for account in accounts {
            if pending.contains_key(&account.id) {
                continue;
            }
            pending.insert(account.id.clone(), account.label.clone());

            let connector = Arc::clone(&self.connector);
            let credentials = Arc::clone(&self.credentials);
            let account = account.clone();
            tasks.spawn(async move {
                let id = account.id.clone();
                (id, fetch_page(connector, credentials, account, page, policy).await)
            });
        }

        let total = pending.len();
        let mut completed = 0;
        let mut round = RoundResult::default();
        while let Some(joined) = tasks.join_next().await {
            completed += 1;
            let label = match joined {
                Ok((id, result)) => {
                    let label = pending.remove(&id).unwrap_or_default();
                    match result {
                        Ok(outcome) => {
                            round.totals.insert(id, outcome.total);
                            round.fetched.extend(outcome.summaries);
                        }
                        Err(e) => {
                            warn!(account = %id, kind = ?e.kind, error = %e.message, "account sync failed");
                            round.errors.push(e);
                        }
                    }
                    label
                }
                Err(e) => {
                    warn!(error = %e, "sync task ended abnormally");
                    String::new()
                }
            };
            self.progress
                .advance(page, completed, total, &label, round.fetched.len());
        }

        for (id, label) in pending {
            round.errors.push(FetchError::new(
                id,
                FetchErrorKind::Aborted,
                format!("sync of {label} did not complete"),
            ));
        }
        round.errors.sort_by(|a, b| a.account_id.cmp(&b.account_id));

        let fetched = round.fetched.len();
        let errors = round.errors.clone();
        let known_total = {
            let mut state = self.state();
            state.finish_round(scope, page, issued, round);
            state.known_total()
        };
        self.progress.finish();
        self.persist().await;

        info!(page, fetched, failed = errors.len(), known_total, "sync round complete");
        SyncReport {
            page,
            skipped: false,
            fetched,
            known_total,
            errors,
        }
    }

    /// Flips `\Seen` locally, then on the server.
    ///
    /// The local change is visible at once and survives a sync that was
    /// already in flight. If the server rejects it, it is undone. Returns
    /// the new `\Seen` state.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is not held or the remote update fails.
    pub async fn toggle_seen(&self, account: &Account, remote_id: u32) -> Result<bool> {
        let id = MessageId::new(account.id.clone(), remote_id);
        let change = self
            .state()
            .apply_local(&id, None)
            .ok_or_else(|| Error::MessageNotFound(id.to_string()))?;
        self.persist().await;

        match self.store_seen(account, remote_id, change.seen).await {
            Ok(()) => {
                self.state().confirm(&id, change.seq);
                Ok(change.seen)
            }
            Err(e) => {
                warn!(message = %id, error = %e, "flag update rejected, reverting");
                let reverted = self.state().revert(&id, change);
                if reverted {
                    self.persist().await;
                }
                Err(e)
            }
        }
    }

    /// Downloads, decodes and marks a message seen.
    ///
    /// Failing to mark it seen on the server is only logged.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be downloaded.
    pub async fn open_message(&self, account: &Account, remote_id: u32) -> Result<DecodedMessage> {
        let raw = self.fetch_raw(account, remote_id).await?;
        let decoded = mailfold_mime::decode(&raw);

        let id = MessageId::new(account.id.clone(), remote_id);
        let change = {
            let mut state = self.state();
            if state.get(&id).is_some_and(|m| !m.is_seen()) {
                state.apply_local(&id, Some(true))
            } else {
                None
            }
        };

        if change.is_some() {
            self.persist().await;
        }

        // The server copy is marked even if nothing is held locally.
        let stored = self.store_seen(account, remote_id, true).await;
        if let Err(e) = &stored {
            warn!(message = %id, error = %e, "could not mark message seen");
        }
        if let Some(change) = change {
            let mut state = self.state();
            if stored.is_ok() {
                state.confirm(&id, change.seq);
            } else {
                state.settle(&id, change.seq);
            }
        }

        Ok(decoded)
    }

    /// Downloads the raw bytes of a message, retrying up to
    /// `fetch_attempts` times.
    ///
    /// # Errors
    ///
    /// Returns the last error if every attempt fails.
    pub async fn fetch_raw(&self, account: &Account, remote_id: u32) -> Result<Vec<u8>> {
        let attempts = self.config.fetch_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.download(account, remote_id).await {
                Ok(raw) => return Ok(raw),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    warn!(account = %account.id, remote_id, attempt, error = %e, "download failed, retrying");
                }
            }
            attempt += 1;
            tokio::time::sleep(self.config.retry_delay()).await;
        }
    }

    async fn download(&self, account: &Account, remote_id: u32) -> Result<Vec<u8>> {
        let mut session = open_session(
            self.connector.as_ref(),
            self.credentials.as_ref(),
            account,
            &self.policy(),
        )
        .await?;
        let raw = session.fetch_raw(remote_id).await;
        session.close().await;
        Ok(raw?)
    }

    async fn store_seen(&self, account: &Account, remote_id: u32, seen: bool) -> Result<()> {
        let mut session = open_session(
            self.connector.as_ref(),
            self.credentials.as_ref(),
            account,
            &self.policy(),
        )
        .await?;
        let stored = session.set_flag(remote_id, Flag::Seen, seen).await;
        session.close().await;
        Ok(stored?)
    }

    /// Opens and closes a session to check an account's settings.
    ///
    /// # Errors
    ///
    /// Returns the classified failure; [`FetchError::friendly`] gives a
    /// message for the user.
    pub async fn probe(&self, account: &Account) -> std::result::Result<(), FetchError> {
        let session = open_session(
            self.connector.as_ref(),
            self.credentials.as_ref(),
            account,
            &self.policy(),
        )
        .await?;
        session.close().await;
        info!(account = %account.id, "connection probe succeeded");
        Ok(())
    }

    /// Deletes an account from `store` and drops its messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn remove_account<S: AccountStore>(&self, store: &S, id: &AccountId) -> Result<bool> {
        let _round = self.round.lock().await;
        let existed = store.delete(id).await?;
        let dropped = self.state().retain_accounts(|account| account != id);
        self.persist().await;
        info!(account = %id, existed, dropped, "account removed");
        Ok(existed)
    }

    /// Drops messages of accounts not in `ids`. Returns how many were dropped.
    pub async fn retain_accounts(&self, ids: &[AccountId]) -> usize {
        let _round = self.round.lock().await;
        let dropped = self.state().retain_accounts(|account| ids.contains(account));
        if dropped > 0 {
            self.persist().await;
            debug!(dropped, "messages of removed accounts dropped");
        }
        dropped
    }

    async fn persist(&self) {
        let _writer = self.cache_writes.lock().await;
        let snapshot = self.state().messages().to_vec();
        if let Err(e) = self.cache.save(&snapshot).await {
            warn!(error = %e, "failed to save cache");
        }
    }

    /// Snapshot of held messages in display order.
    #[must_use]
    pub fn messages(&self) -> Vec<MessageSummary> {
        self.state().messages().to_vec()
    }

    /// Messages of page `index` of the merged collection.
    #[must_use]
    pub fn page(&self, index: u32) -> Vec<MessageSummary> {
        self.state().page(index, self.config.page_size).to_vec()
    }

    /// Page cursor of the last sync.
    #[must_use]
    pub fn current_page(&self) -> u32 {
        self.state().current_page()
    }

    /// Largest mailbox size seen in the last round.
    #[must_use]
    pub fn known_total(&self) -> u32 {
        self.state().known_total()
    }

    /// Per-account errors of the last round.
    #[must_use]
    pub fn last_errors(&self) -> Vec<FetchError> {
        self.state().errors()
    }

    /// True while a round is fetching.
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.state().in_flight()
    }

    /// Unread counts.
    #[must_use]
    pub fn stats(&self) -> MailboxStats {
        self.state().stats()
    }

    /// Subscribes to progress updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }
}
