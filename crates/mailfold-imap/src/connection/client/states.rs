//! Connection state markers.

/// Before LOGIN: only authentication is valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAuthenticated;

/// After LOGIN: mailbox selection is valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

/// A mailbox is selected; carries what SELECT reported.
#[derive(Debug, Clone)]
pub struct Selected {
    pub(crate) mailbox: String,
    pub(crate) exists: u32,
}

impl Selected {
    /// Returns the selected mailbox name.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    /// Returns the last reported message count.
    #[must_use]
    pub const fn exists(&self) -> u32 {
        self.exists
    }
}
