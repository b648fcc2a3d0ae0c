//! Unsolicited update handling.
//!
//! Per RFC 3501, servers may send EXISTS, EXPUNGE and FETCH responses at any
//! time, not just in reply to a command. The client facade routes those to an
//! [`UpdateHandler`], together with mailbox selected/closed notifications.
//!
//! Handlers are called on the connection's driver task while the connection
//! is locked. They must return quickly and must not call back into the
//! connection; hand work off through a channel instead.
//!
//! # Example
//!
//! ```
//! use sealmail_imap::handler::UpdateHandler;
//!
//! struct NewMail {
//!     count: u32,
//! }
//!
//! impl UpdateHandler for NewMail {
//!     fn on_exists(&mut self, _mailbox: &str, count: u32) {
//!         self.count = count;
//!     }
//! }
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use crate::protocol::MailboxEvent;
use crate::types::Response;

/// Handler for unsolicited server updates.
///
/// Every method has an empty default, so implementors only override what
/// they care about. `mailbox` is the mailbox selected when the update
/// arrived (empty when none is).
pub trait UpdateHandler: Send {
    /// The mailbox now holds `count` messages.
    fn on_exists(&mut self, mailbox: &str, count: u32) {
        let _ = (mailbox, count);
    }

    /// Message `seq` was removed. Later sequence numbers shift down by one.
    fn on_expunge(&mut self, mailbox: &str, seq: u32) {
        let _ = (mailbox, seq);
    }

    /// Message `seq` changed, usually its flags.
    fn on_fetch(&mut self, mailbox: &str, seq: u32, response: &Response) {
        let _ = (mailbox, seq, response);
    }

    /// A mailbox was opened.
    fn on_selected(&mut self, mailbox: &str, read_only: bool) {
        let _ = (mailbox, read_only);
    }

    /// The selected mailbox was closed.
    fn on_closed(&mut self, mailbox: &str) {
        let _ = mailbox;
    }

    /// The server sent an `[ALERT]`, which must be shown to the user.
    fn on_alert(&mut self, text: &str) {
        let _ = text;
    }

    /// The server is closing the connection.
    fn on_bye(&mut self, text: &str) {
        let _ = text;
    }
}

/// A handler that ignores every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl UpdateHandler for NoopHandler {}

/// A handler that logs updates using tracing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl UpdateHandler for LoggingHandler {
    fn on_exists(&mut self, mailbox: &str, count: u32) {
        tracing::debug!(mailbox, count, "EXISTS");
    }

    fn on_expunge(&mut self, mailbox: &str, seq: u32) {
        tracing::debug!(mailbox, seq, "EXPUNGE");
    }

    fn on_fetch(&mut self, mailbox: &str, seq: u32, response: &Response) {
        tracing::debug!(mailbox, seq, attributes = ?response.attributes, "FETCH");
    }

    fn on_selected(&mut self, mailbox: &str, read_only: bool) {
        tracing::debug!(mailbox, read_only, "mailbox selected");
    }

    fn on_closed(&mut self, mailbox: &str) {
        tracing::debug!(mailbox, "mailbox closed");
    }

    fn on_alert(&mut self, text: &str) {
        tracing::warn!(text, "ALERT");
    }

    fn on_bye(&mut self, text: &str) {
        tracing::info!(text, "BYE");
    }
}

/// An update collected by [`CollectingHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    /// EXISTS response.
    Exists {
        /// Selected mailbox.
        mailbox: String,
        /// Message count.
        count: u32,
    },
    /// EXPUNGE response.
    Expunge {
        /// Selected mailbox.
        mailbox: String,
        /// Sequence number of the removed message.
        seq: u32,
    },
    /// Unsolicited FETCH response.
    Fetch {
        /// Selected mailbox.
        mailbox: String,
        /// Sequence number of the changed message.
        seq: u32,
    },
    /// Mailbox opened.
    Selected {
        /// Mailbox path.
        mailbox: String,
        /// Opened read-only.
        read_only: bool,
    },
    /// Mailbox closed.
    Closed {
        /// Mailbox path.
        mailbox: String,
    },
    /// ALERT response code.
    Alert(String),
    /// BYE response.
    Bye(String),
}

/// A handler that collects updates for later processing.
///
/// Clones share the same event list, so one clone can be handed to the
/// client while another is inspected.
#[derive(Debug, Default, Clone)]
pub struct CollectingHandler {
    events: Arc<Mutex<Vec<UpdateEvent>>>,
}

impl CollectingHandler {
    /// Creates a new collecting handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes all collected events, leaving the handler empty.
    #[must_use]
    pub fn take(&self) -> Vec<UpdateEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn push(&self, event: UpdateEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl UpdateHandler for CollectingHandler {
    fn on_exists(&mut self, mailbox: &str, count: u32) {
        self.push(UpdateEvent::Exists {
            mailbox: mailbox.to_string(),
            count,
        });
    }

    fn on_expunge(&mut self, mailbox: &str, seq: u32) {
        self.push(UpdateEvent::Expunge {
            mailbox: mailbox.to_string(),
            seq,
        });
    }

    fn on_fetch(&mut self, mailbox: &str, seq: u32, _response: &Response) {
        self.push(UpdateEvent::Fetch {
            mailbox: mailbox.to_string(),
            seq,
        });
    }

    fn on_selected(&mut self, mailbox: &str, read_only: bool) {
        self.push(UpdateEvent::Selected {
            mailbox: mailbox.to_string(),
            read_only,
        });
    }

    fn on_closed(&mut self, mailbox: &str) {
        self.push(UpdateEvent::Closed {
            mailbox: mailbox.to_string(),
        });
    }

    fn on_alert(&mut self, text: &str) {
        self.push(UpdateEvent::Alert(text.to_string()));
    }

    fn on_bye(&mut self, text: &str) {
        self.push(UpdateEvent::Bye(text.to_string()));
    }
}

/// Routes raw responses and mailbox events to an [`UpdateHandler`],
/// remembering which mailbox is selected.
pub(crate) struct UpdateRouter {
    handler: Box<dyn UpdateHandler>,
    mailbox: String,
}

impl UpdateRouter {
    pub(crate) fn new(handler: Box<dyn UpdateHandler>) -> Self {
        Self {
            handler,
            mailbox: String::new(),
        }
    }

    pub(crate) fn on_response(&mut self, response: &Response) {
        let nr = response.nr.unwrap_or_default();
        match response.command.as_str() {
            "EXISTS" => self.handler.on_exists(&self.mailbox, nr),
            "EXPUNGE" => self.handler.on_expunge(&self.mailbox, nr),
            "FETCH" => self.handler.on_fetch(&self.mailbox, nr, response),
            "BYE" => self
                .handler
                .on_bye(response.human_readable.as_deref().unwrap_or_default()),
            "OK" | "NO" | "BAD" if response.code.as_deref() == Some("ALERT") => self
                .handler
                .on_alert(response.human_readable.as_deref().unwrap_or_default()),
            _ => {}
        }
    }

    pub(crate) fn on_mailbox(&mut self, event: &MailboxEvent) {
        match event {
            MailboxEvent::Selected { mailbox, read_only } => {
                self.mailbox.clone_from(mailbox);
                self.handler.on_selected(mailbox, *read_only);
            }
            MailboxEvent::Closed { mailbox } => {
                self.mailbox.clear();
                self.handler.on_closed(mailbox);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::parser::{ParseOptions, parse};

    fn response(frame: &[u8]) -> Response {
        parse(frame, ParseOptions::default()).unwrap()
    }

    #[test]
    fn test_noop_handler() {
        let mut handler = NoopHandler;
        handler.on_exists("INBOX", 100);
        handler.on_bye("goodbye");
    }

    #[test]
    fn test_router_tracks_mailbox() {
        let collected = CollectingHandler::new();
        let mut router = UpdateRouter::new(Box::new(collected.clone()));

        router.on_response(&response(b"* 3 EXISTS"));
        router.on_mailbox(&MailboxEvent::Selected {
            mailbox: "INBOX".to_string(),
            read_only: false,
        });
        router.on_response(&response(b"* 4 EXISTS"));
        router.on_response(&response(b"* 2 EXPUNGE"));
        router.on_response(&response(b"* 1 FETCH (FLAGS (\\Seen))"));
        router.on_mailbox(&MailboxEvent::Closed {
            mailbox: "INBOX".to_string(),
        });

        assert_eq!(
            collected.take(),
            [
                UpdateEvent::Exists {
                    mailbox: String::new(),
                    count: 3
                },
                UpdateEvent::Selected {
                    mailbox: "INBOX".to_string(),
                    read_only: false
                },
                UpdateEvent::Exists {
                    mailbox: "INBOX".to_string(),
                    count: 4
                },
                UpdateEvent::Expunge {
                    mailbox: "INBOX".to_string(),
                    seq: 2
                },
                UpdateEvent::Fetch {
                    mailbox: "INBOX".to_string(),
                    seq: 1
                },
                UpdateEvent::Closed {
                    mailbox: "INBOX".to_string()
                },
            ]
        );
        assert!(collected.take().is_empty());
    }

    #[test]
    fn test_router_alert_and_bye() {
        let collected = CollectingHandler::new();
        let mut router = UpdateRouter::new(Box::new(collected.clone()));
        router.on_response(&response(b"* OK [ALERT] Maintenance at noon"));
        router.on_response(&response(b"* OK still here"));
        router.on_response(&response(b"* NO [ALERT] Over quota"));
        router.on_response(&response(b"* BAD unparseable"));
        router.on_response(&response(b"* BYE shutting down"));
        assert_eq!(
            collected.take(),
            [
                UpdateEvent::Alert("Maintenance at noon".to_string()),
                UpdateEvent::Alert("Over quota".to_string()),
                UpdateEvent::Bye("shutting down".to_string()),
            ]
        );
    }
}
