//! Text rendering for terminal output.

use chrono::{DateTime, Local, Utc};
use mailfold_core::{Account, MailboxStats, MessageDate, MessageSummary, Progress, SyncReport};

/// Formats a timestamp in local time, e.g. "Thu, 15 Jan 2026 14:31".
fn format_date_local(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%a, %d %b %Y %H:%M")
        .to_string()
}

/// Shortens `text` to `width` characters, marking the cut with `…`.
fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// One line per message.
pub fn message_line(message: &MessageSummary) -> String {
    let marker = if message.is_seen() { ' ' } else { '*' };
    let date = match message.date {
        MessageDate::Parsed(at) => format_date_local(at),
        MessageDate::Unparseable => "-".to_string(),
    };
    let subject = if message.subject.is_empty() {
        "(no subject)"
    } else {
        &message.subject
    };
    format!(
        "{marker} {:<12} {:>8}  {:<22}  {:<28}  {}",
        truncate(message.account_id.as_str(), 12),
        message.remote_id,
        date,
        truncate(&message.sender, 28),
        truncate(subject, 60),
    )
}

/// Round summary followed by one line per failed account.
pub fn report(report: &SyncReport) -> String {
    if report.skipped {
        return format!("Page {} already loaded.", report.page + 1);
    }
    let mut out = format!(
        "Page {}: {} messages fetched, {} in largest mailbox.",
        report.page + 1,
        report.fetched,
        report.known_total
    );
    for error in &report.errors {
        out.push_str(&format!("\n  ! {}: {} ({})", error.account_id, error.friendly(), error.message));
    }
    out
}

/// Unread dashboard.
pub fn stats(stats: &MailboxStats) -> String {
    let mut out = format!("{} messages, {} unread", stats.total, stats.unread);
    for (account, unread) in &stats.unread_by_account {
        out.push_str(&format!("\n  {account}: {unread} unread"));
    }
    out
}

/// One line per account.
pub fn account_line(account: &Account) -> String {
    let transport = if account.endpoint.tls { "tls" } else { "plain" };
    format!(
        "{:<12} {:<32} {}:{} ({transport})",
        account.id, account.label, account.endpoint.host, account.endpoint.port
    )
}

/// Progress as a status line, or `None` when idle.
pub fn progress(progress: &Progress) -> Option<String> {
    match progress {
        Progress::Idle => None,
        Progress::Syncing {
            percent,
            account,
            found,
            status,
        } if account.is_empty() => Some(format!("{status} {percent:>3}% ({found} found)")),
        Progress::Syncing {
            percent,
            account,
            found,
            status,
        } => Some(format!("{status} {percent:>3}% {account} ({found} found)")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use mailfold_core::{AccountId, FetchError, FetchErrorKind};

    use super::*;

    fn message(subject: &str, seen: bool) -> MessageSummary {
        let mut flags = BTreeSet::new();
        if seen {
            flags.insert("\\Seen".to_string());
        }
        MessageSummary {
            remote_id: 42,
            account_id: AccountId::new("work"),
            subject: subject.into(),
            sender: "ada@example.com".into(),
            date: MessageDate::Unparseable,
            flags,
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer subject", 8), "a longe…");
        assert_eq!(truncate("ünïcödé", 4), "ünï…");
    }

    #[test]
    fn test_message_line_marks_unread() {
        let line = message_line(&message("Hello", false));
        assert!(line.starts_with('*'));
        assert!(line.contains("Hello"));
        assert!(line.contains("ada@example.com"));

        let line = message_line(&message("", true));
        assert!(line.starts_with(' '));
        assert!(line.contains("(no subject)"));
    }

    #[test]
    fn test_report_lists_failures() {
        let text = report(&SyncReport {
            page: 0,
            skipped: false,
            fetched: 10,
            known_total: 120,
            errors: vec![FetchError::new(
                AccountId::new("home"),
                FetchErrorKind::Timeout,
                "timed out after 15s",
            )],
        });
        assert!(text.starts_with("Page 1: 10 messages fetched"));
        assert!(text.contains("home: Connection timed out. Check server settings."));
    }

    #[test]
    fn test_progress_line() {
        assert_eq!(progress(&Progress::Idle), None);
        let line = progress(&Progress::Syncing {
            percent: 50,
            account: "work".into(),
            found: 7,
            status: "Syncing Page 1...".into(),
        })
        .unwrap();
        assert_eq!(line, "Syncing Page 1...  50% work (7 found)");
    }
}
