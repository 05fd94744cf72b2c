//! Engine behaviour against a scripted multi-account server.

#![allow(clippy::unwrap_used, clippy::similar_names)]

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mailfold_core::{
    Account, AccountId, AccountRepository, Credential, Endpoint, FetchErrorKind, Flag, LocalCache,
    Login, MailboxConnector, MailboxSession, MessageId, Progress, RawRecord, SessionError,
    StaticCredentials, SyncConfig, SyncEngine,
};
use tokio::sync::Notify;

#[derive(Default)]
struct Mailbox {
    /// Oldest first; sequence number is index + 1.
    messages: Vec<RawRecord>,
    raw: HashMap<u32, Vec<u8>>,
    refuse: bool,
    /// Connecting never completes.
    wedged: bool,
    reject_store: bool,
}

#[derive(Default)]
struct Server {
    mailboxes: Mutex<HashMap<String, Mailbox>>,
    connects: Mutex<HashMap<String, u32>>,
    gate: Mutex<Option<Arc<Notify>>>,
    listing: Notify,
}

impl Server {
    fn add(&self, account: &str, mailbox: Mailbox) {
        self.mailboxes
            .lock()
            .unwrap()
            .insert(host(account), mailbox);
    }

    fn connects(&self, account: &str) -> u32 {
        self.connects
            .lock()
            .unwrap()
            .get(&host(account))
            .copied()
            .unwrap_or(0)
    }

    fn allow_store(&self, account: &str) {
        self.mailboxes
            .lock()
            .unwrap()
            .get_mut(&host(account))
            .unwrap()
            .reject_store = false;
    }

    fn remote_seen(&self, account: &str, remote_id: u32) -> bool {
        self.mailboxes.lock().unwrap()[&host(account)]
            .messages
            .iter()
            .find(|m| m.remote_id == remote_id)
            .unwrap()
            .flags
            .iter()
            .any(|f| f == "\\Seen")
    }
}

fn host(account: &str) -> String {
    format!("{account}.example.com")
}

struct Connector(Arc<Server>);

struct Session {
    server: Arc<Server>,
    host: String,
    total: u32,
}

impl MailboxConnector for Connector {
    type Session = Session;

    async fn connect(&self, endpoint: &Endpoint, login: &Login) -> Result<Session, SessionError> {
        assert_eq!(login.secret.expose(), "pw");
        *self
            .0
            .connects
            .lock()
            .unwrap()
            .entry(endpoint.host.clone())
            .or_default() += 1;

        let wedged = self
            .0
            .mailboxes
            .lock()
            .unwrap()
            .get(&endpoint.host)
            .is_some_and(|m| m.wedged);
        if wedged {
            std::future::pending::<()>().await;
        }

        let mailboxes = self.0.mailboxes.lock().unwrap();
        let mailbox = mailboxes
            .get(&endpoint.host)
            .ok_or_else(|| SessionError::Connect("unknown host".into()))?;
        if mailbox.refuse {
            return Err(SessionError::Connect("connection refused".into()));
        }
        Ok(Session {
            server: Arc::clone(&self.0),
            host: endpoint.host.clone(),
            total: u32::try_from(mailbox.messages.len()).unwrap(),
        })
    }
}

impl MailboxSession for Session {
    fn total(&self) -> u32 {
        self.total
    }

    async fn list(&mut self, range: RangeInclusive<u32>) -> Result<Vec<RawRecord>, SessionError> {
        let records: Vec<_> = {
            let mailboxes = self.server.mailboxes.lock().unwrap();
            let messages = &mailboxes[&self.host].messages;
            range
                .map(|seq| messages[seq as usize - 1].clone())
                .collect()
        };

        let gate = self.server.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            self.server.listing.notify_one();
            gate.notified().await;
        }
        Ok(records)
    }

    async fn set_flag(&mut self, remote_id: u32, flag: Flag, add: bool) -> Result<(), SessionError> {
        let mut mailboxes = self.server.mailboxes.lock().unwrap();
        let mailbox = mailboxes.get_mut(&self.host).unwrap();
        if mailbox.reject_store {
            return Err(SessionError::Protocol("STORE rejected".into()));
        }
        let message = mailbox
            .messages
            .iter_mut()
            .find(|m| m.remote_id == remote_id)
            .ok_or(SessionError::NotFound(remote_id))?;
        message.flags.retain(|f| f != flag.as_str());
        if add {
            message.flags.push(flag.as_str().to_string());
        }
        Ok(())
    }

    async fn fetch_raw(&mut self, remote_id: u32) -> Result<Vec<u8>, SessionError> {
        self.server.mailboxes.lock().unwrap()[&self.host]
            .raw
            .get(&remote_id)
            .cloned()
            .ok_or(SessionError::NotFound(remote_id))
    }

    async fn close(self) {}
}

/// `count` messages, one minute apart, newest last. The oldest `unread` are unseen.
fn mailbox(count: u32, unread: u32) -> Mailbox {
    let messages = (1..=count)
        .map(|seq| RawRecord {
            remote_id: 100 + seq,
            subject: Some(format!("message {seq}")),
            from: Some(format!("Sender {seq} <s{seq}@example.com>")),
            date: Some(format!(
                "Thu, 1 Jan 2026 {:02}:{:02}:00 +0000",
                seq / 60,
                seq % 60
            )),
            flags: if seq <= unread {
                Vec::new()
            } else {
                vec!["\\Seen".to_string()]
            },
        })
        .collect();
    Mailbox {
        messages,
        ..Mailbox::default()
    }
}

fn account(id: &str) -> Account {
    Account::new(
        id,
        format!("{id}@example.com"),
        Endpoint::tls(host(id)),
        Credential::new(format!("cred-{id}")),
    )
}

fn credentials(ids: &[&str]) -> StaticCredentials {
    ids.iter().fold(StaticCredentials::new(), |creds, id| {
        creds.with(Credential::new(format!("cred-{id}")), "pw")
    })
}

fn config(page_size: u32) -> SyncConfig {
    SyncConfig {
        page_size: page_size.try_into().unwrap(),
        progress_grace_ms: 0,
        retry_delay_ms: 10,
        ..SyncConfig::default()
    }
}

async fn engine(
    server: &Arc<Server>,
    ids: &[&str],
    config: SyncConfig,
) -> (SyncEngine<Connector, StaticCredentials>, LocalCache) {
    let cache = LocalCache::in_memory("mailfold_cached_messages_test", config.cache_capacity)
        .await
        .unwrap();
    let engine = SyncEngine::new(
        Connector(Arc::clone(server)),
        credentials(ids),
        cache.clone(),
        config,
    );
    (engine, cache)
}

#[tokio::test]
async fn partial_failure_keeps_healthy_accounts() {
    let server = Arc::new(Server::default());
    server.add("a", mailbox(3, 1));
    server.add("b", Mailbox {
        refuse: true,
        ..mailbox(3, 0)
    });
    server.add("c", mailbox(2, 2));
    let (engine, _) = engine(&server, &["a", "b", "c"], config(50)).await;

    let accounts = [account("a"), account("b"), account("c")];
    let report = engine.sync(&accounts, 0, false).await;

    assert!(!report.skipped);
    assert_eq!(report.fetched, 5);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].account_id, AccountId::new("b"));
    assert_eq!(report.errors[0].kind, FetchErrorKind::Connect);
    assert_eq!(engine.last_errors(), report.errors);

    let messages = engine.messages();
    assert_eq!(messages.len(), 5);
    assert!(messages.iter().all(|m| m.account_id.as_str() != "b"));
    assert_eq!(messages[0].sender, "s3@example.com");

    assert_eq!(server.connects("a"), 1);
    assert_eq!(server.connects("b"), 1);
    assert_eq!(server.connects("c"), 1);

    let stats = engine.stats();
    assert_eq!(stats.total, 5);
    assert_eq!(stats.unread, 3);
    assert_eq!(stats.unread_by_account[&AccountId::new("c")], 2);
}

#[tokio::test]
async fn paging_skip_and_idempotence() {
    let server = Arc::new(Server::default());
    server.add("a", mailbox(120, 0));
    let (engine, _) = engine(&server, &["a"], config(50)).await;
    let accounts = [account("a")];

    let first = engine.sync(&accounts, 0, false).await;
    assert_eq!(first.fetched, 50);
    assert_eq!(first.known_total, 120);
    assert_eq!(engine.messages()[0].remote_id, 220);

    let again = engine.sync(&accounts, 0, false).await;
    assert!(again.skipped);
    assert_eq!(server.connects("a"), 1);

    engine.sync(&accounts, 1, false).await;
    assert_eq!(engine.messages().len(), 100);
    assert_eq!(engine.current_page(), 1);
    assert_eq!(engine.page(1).len(), 50);

    let forced = engine.sync(&accounts, 0, true).await;
    assert!(!forced.skipped);
    assert_eq!(engine.messages().len(), 100);
    assert_eq!(server.connects("a"), 3);

    engine.sync(&accounts, 2, false).await;
    assert_eq!(engine.messages().len(), 120);

    // The whole mailbox is held now, so further pages need no fetch.
    let past_end = engine.sync(&accounts, 5, false).await;
    assert!(past_end.skipped);
    assert_eq!(server.connects("a"), 4);
}

#[tokio::test]
async fn local_change_survives_in_flight_sync() {
    let server = Arc::new(Server::default());
    server.add("a", mailbox(5, 5));
    let (engine, _) = engine(&server, &["a"], config(50)).await;
    let engine = Arc::new(engine);
    let accounts = vec![account("a")];

    engine.sync(&accounts, 0, false).await;
    let id = MessageId::new("a", 103);
    assert!(engine.messages().iter().all(|m| !m.is_seen()));

    let gate = Arc::new(Notify::new());
    *server.gate.lock().unwrap() = Some(Arc::clone(&gate));

    let background = {
        let engine = Arc::clone(&engine);
        let accounts = accounts.clone();
        tokio::spawn(async move { engine.sync(&accounts, 0, true).await })
    };

    // The listing has captured pre-change data and is parked on the gate.
    server.listing.notified().await;
    *server.gate.lock().unwrap() = None;
    let seen = engine.toggle_seen(&accounts[0], 103).await.unwrap();
    assert!(seen);
    assert!(server.remote_seen("a", 103));

    gate.notify_one();
    let report = background.await.unwrap();
    assert!(report.is_complete());

    let message = engine
        .messages()
        .into_iter()
        .find(|m| m.id() == id)
        .unwrap();
    assert!(message.is_seen());

    // A later round trusts the server again.
    engine.sync(&accounts, 0, true).await;
    let message = engine
        .messages()
        .into_iter()
        .find(|m| m.id() == id)
        .unwrap();
    assert!(message.is_seen());
}

#[tokio::test]
async fn wedged_account_times_out_without_holding_back_siblings() {
    let server = Arc::new(Server::default());
    server.add("a", mailbox(3, 0));
    server.add("b", Mailbox {
        wedged: true,
        ..mailbox(3, 0)
    });
    server.add("c", mailbox(2, 0));
    let config = SyncConfig {
        progress_grace_ms: 500,
        ..config(50)
    };
    let (engine, _) = engine(&server, &["a", "b", "c"], config).await;

    let mut rx = engine.subscribe();
    let watcher = tokio::spawn(async move {
        let mut percents = Vec::new();
        while rx.changed().await.is_ok() {
            let current = rx.borrow_and_update().clone();
            match current {
                Progress::Syncing { percent, .. } => percents.push(percent),
                Progress::Idle => break,
            }
        }
        percents
    });

    tokio::time::pause();
    let accounts = [account("a"), account("b"), account("c")];
    let report = engine.sync(&accounts, 0, false).await;

    assert_eq!(report.fetched, 5);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].account_id, AccountId::new("b"));
    assert_eq!(report.errors[0].kind, FetchErrorKind::Timeout);
    assert_eq!(server.connects("b"), 1);

    let messages = engine.messages();
    assert_eq!(messages.len(), 5);
    assert!(messages.iter().all(|m| m.account_id.as_str() != "b"));

    tokio::time::sleep(Duration::from_secs(1)).await;
    let percents = watcher.await.unwrap();
    assert_eq!(percents.last(), Some(&100));
    assert!(!engine.is_syncing());
}

#[tokio::test]
async fn syncing_no_accounts_changes_nothing() {
    let server = Arc::new(Server::default());
    server.add("a", mailbox(120, 0));
    let (engine, _) = engine(&server, &["a"], config(50)).await;
    engine.sync(&[account("a")], 0, false).await;
    let rx = engine.subscribe();

    let report = engine.sync(&[], 0, true).await;
    assert!(report.skipped);
    assert!(report.is_complete());
    assert_eq!(report.known_total, 120);
    assert_eq!(engine.known_total(), 120);
    assert_eq!(engine.messages().len(), 50);
    assert_eq!(server.connects("a"), 1);
    assert!(!rx.has_changed().unwrap());
}

#[tokio::test]
async fn rejected_toggle_is_reverted() {
    let server = Arc::new(Server::default());
    server.add("a", Mailbox {
        reject_store: true,
        ..mailbox(2, 2)
    });
    let (engine, cache) = engine(&server, &["a"], config(50)).await;
    let accounts = [account("a")];
    engine.sync(&accounts, 0, false).await;

    let err = engine.toggle_seen(&accounts[0], 101).await.unwrap_err();
    assert!(matches!(err, mailfold_core::Error::Session(_)));
    assert!(engine.messages().iter().all(|m| !m.is_seen()));
    assert!(cache.load().await.iter().all(|m| !m.is_seen()));

    let missing = engine.toggle_seen(&accounts[0], 999).await.unwrap_err();
    assert!(matches!(missing, mailfold_core::Error::MessageNotFound(_)));
}

#[tokio::test]
async fn cache_keeps_unread_first_and_reloads() {
    let server = Arc::new(Server::default());
    server.add("a", mailbox(600, 50));
    let (engine, cache) = engine(&server, &["a"], config(600)).await;
    engine.sync(&[account("a")], 0, false).await;
    assert_eq!(engine.messages().len(), 600);

    let saved = cache.load().await;
    assert_eq!(saved.len(), 500);
    assert_eq!(saved.iter().filter(|m| !m.is_seen()).count(), 50);
    // Read tier holds the newest read messages: 700 down to 251.
    assert_eq!(saved[50].remote_id, 700);
    assert_eq!(saved[499].remote_id, 251);

    let restarted = SyncEngine::new(
        Connector(Arc::clone(&server)),
        credentials(&["a"]),
        cache,
        config(600),
    );
    assert_eq!(restarted.load_cache().await, 500);
    assert_eq!(restarted.stats().unread, 50);
}

#[tokio::test]
async fn removing_an_account_drops_its_messages() {
    let server = Arc::new(Server::default());
    server.add("a", mailbox(2, 0));
    server.add("b", mailbox(3, 0));
    let (engine, cache) = engine(&server, &["a", "b"], config(50)).await;

    let store = AccountRepository::in_memory().await.unwrap();
    store.save(&account("a")).await.unwrap();
    store.save(&account("b")).await.unwrap();

    engine.sync(&[account("a"), account("b")], 0, false).await;
    assert_eq!(engine.messages().len(), 5);

    assert!(engine.remove_account(&store, &AccountId::new("a")).await.unwrap());
    assert_eq!(engine.messages().len(), 3);
    assert!(cache.load().await.iter().all(|m| m.account_id.as_str() == "b"));

    assert_eq!(engine.retain_accounts(&[]).await, 3);
    assert!(engine.messages().is_empty());
}

#[tokio::test]
async fn opening_a_message_decodes_and_marks_seen() {
    let server = Arc::new(Server::default());
    let mut inbox = mailbox(1, 1);
    inbox.raw.insert(
        101,
        b"Subject: =?UTF-8?B?SGVsbG8=?=\r\nFrom: s1@example.com\r\n\r\nbody text".to_vec(),
    );
    server.add("a", inbox);
    let (engine, _) = engine(&server, &["a"], config(50)).await;
    let accounts = [account("a")];
    engine.sync(&accounts, 0, false).await;

    let decoded = engine.open_message(&accounts[0], 101).await.unwrap();
    assert_eq!(decoded.subject, "Hello");
    assert!(decoded.html_body.contains("body text"));
    assert!(engine.messages()[0].is_seen());
    assert!(server.remote_seen("a", 101));
}

#[tokio::test]
async fn opening_an_unheld_message_marks_it_on_the_server() {
    let server = Arc::new(Server::default());
    let mut inbox = mailbox(1, 1);
    inbox
        .raw
        .insert(101, b"Subject: hi\r\nFrom: s1@example.com\r\n\r\nbody".to_vec());
    server.add("a", inbox);
    let (engine, _) = engine(&server, &["a"], config(50)).await;

    let decoded = engine.open_message(&account("a"), 101).await.unwrap();
    assert_eq!(decoded.subject, "hi");
    assert!(engine.messages().is_empty());
    assert!(server.remote_seen("a", 101));
}

#[tokio::test]
async fn reopening_retries_a_failed_remote_mark() {
    let server = Arc::new(Server::default());
    let mut inbox = Mailbox {
        reject_store: true,
        ..mailbox(1, 1)
    };
    inbox
        .raw
        .insert(101, b"Subject: hi\r\n\r\nbody".to_vec());
    server.add("a", inbox);
    let (engine, _) = engine(&server, &["a"], config(50)).await;
    let accounts = [account("a")];
    engine.sync(&accounts, 0, false).await;

    engine.open_message(&accounts[0], 101).await.unwrap();
    assert!(engine.messages()[0].is_seen());
    assert!(!server.remote_seen("a", 101));

    server.allow_store("a");
    engine.open_message(&accounts[0], 101).await.unwrap();
    assert!(engine.messages()[0].is_seen());
    assert!(server.remote_seen("a", 101));
}

#[tokio::test]
async fn download_retries_then_reports() {
    let server = Arc::new(Server::default());
    server.add("a", mailbox(1, 1));
    let (engine, _) = engine(&server, &["a"], config(50)).await;

    let err = engine.fetch_raw(&account("a"), 101).await.unwrap_err();
    assert!(matches!(
        err,
        mailfold_core::Error::Session(SessionError::NotFound(101))
    ));
    assert_eq!(server.connects("a"), 3);
}

#[tokio::test]
async fn probe_classifies_failures() {
    let server = Arc::new(Server::default());
    server.add("a", mailbox(1, 0));
    server.add("b", Mailbox {
        refuse: true,
        ..Mailbox::default()
    });
    let (engine, _) = engine(&server, &["a", "b"], config(50)).await;

    engine.probe(&account("a")).await.unwrap();
    let err = engine.probe(&account("b")).await.unwrap_err();
    assert_eq!(err.friendly(), "Could not reach mail server. Check host/port.");

    let unknown = engine.probe(&account("z")).await.unwrap_err();
    assert_eq!(unknown.kind, FetchErrorKind::Credential);
}

#[tokio::test]
async fn progress_returns_to_idle() {
    let server = Arc::new(Server::default());
    server.add("a", mailbox(1, 0));
    let (engine, _) = engine(&server, &["a"], config(50)).await;
    let mut rx = engine.subscribe();

    engine.sync(&[account("a")], 0, false).await;
    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), Progress::Idle);
    assert!(!engine.is_syncing());
}
