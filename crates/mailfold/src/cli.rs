//! Command-line parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// One inbox over many IMAP accounts.
#[derive(Debug, Parser)]
#[command(name = "mailfold", version, about)]
pub struct Cli {
    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Add, remove or list accounts
    Account {
        /// Account action.
        #[command(subcommand)]
        action: AccountCommand,
    },
    /// Check that an account can log in
    Probe {
        /// Account id.
        id: String,
    },
    /// Fetch a page from every (or one) account
    Sync {
        /// Page index.
        #[arg(long, default_value_t = 0)]
        page: u32,
        /// Fetch even if the page is already held.
        #[arg(long)]
        force: bool,
        /// Restrict the round to one account.
        #[arg(long)]
        account: Option<String>,
    },
    /// Show a page of held messages
    List {
        /// Page index.
        #[arg(long, default_value_t = 0)]
        page: u32,
    },
    /// Show unread counts
    Stats,
    /// Flip the read state of a message
    Toggle {
        /// Account id.
        account: String,
        /// Remote id.
        uid: u32,
    },
    /// Download, decode and mark a message read
    Open {
        /// Account id.
        account: String,
        /// Remote id.
        uid: u32,
    },
    /// Save the raw message to a file
    Export {
        /// Account id.
        account: String,
        /// Remote id.
        uid: u32,
        /// Output path.
        path: PathBuf,
    },
    /// Decode a saved message as JSON
    Decode {
        /// Input path.
        path: PathBuf,
    },
}

/// `mailfold account ...`
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum AccountCommand {
    /// Add an account; the password is read from stdin
    Add {
        /// Account id.
        id: String,
        /// Email address, also the label.
        email: String,
        /// IMAP host.
        host: String,
        /// Port, 993 with TLS and 143 without.
        #[arg(long)]
        port: Option<u16>,
        /// Connect without TLS.
        #[arg(long)]
        plain: bool,
        /// Login name if different from the email address.
        #[arg(long)]
        username: Option<String>,
    },
    /// Remove an account and its cached messages
    Remove {
        /// Account id.
        id: String,
    },
    /// List accounts
    List,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;
    use clap::error::ErrorKind;

    use super::*;

    fn run(line: &str) -> Result<Command, clap::Error> {
        Cli::try_parse_from(std::iter::once("mailfold").chain(line.split_whitespace()))
            .map(|cli| cli.command)
    }

    fn kind(line: &str) -> ErrorKind {
        run(line).unwrap_err().kind()
    }

    #[test]
    fn test_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sync_options() {
        assert_eq!(
            run("sync --page 2 --force --account work").unwrap(),
            Command::Sync {
                page: 2,
                force: true,
                account: Some("work".into()),
            }
        );
        assert_eq!(
            run("sync").unwrap(),
            Command::Sync {
                page: 0,
                force: false,
                account: None,
            }
        );
    }

    #[test]
    fn test_account_add() {
        assert_eq!(
            run("account add work ada@example.com imap.example.com --port 1143 --plain").unwrap(),
            Command::Account {
                action: AccountCommand::Add {
                    id: "work".into(),
                    email: "ada@example.com".into(),
                    host: "imap.example.com".into(),
                    port: Some(1143),
                    plain: true,
                    username: None,
                },
            }
        );
        assert_eq!(
            run("account remove work").unwrap(),
            Command::Account {
                action: AccountCommand::Remove { id: "work".into() },
            }
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(kind(""), ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand);
        assert_eq!(kind("frobnicate"), ErrorKind::InvalidSubcommand);
        assert_eq!(kind("open work"), ErrorKind::MissingRequiredArgument);
        assert_eq!(kind("open work abc"), ErrorKind::ValueValidation);
        assert_eq!(kind("stats --verbose"), ErrorKind::UnknownArgument);
        assert_eq!(kind("account rename"), ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn test_export_and_decode() {
        assert_eq!(
            run("export work 42 out.eml").unwrap(),
            Command::Export {
                account: "work".into(),
                uid: 42,
                path: PathBuf::from("out.eml"),
            }
        );
        assert_eq!(
            run("decode in.eml").unwrap(),
            Command::Decode {
                path: PathBuf::from("in.eml"),
            }
        );
    }
}
