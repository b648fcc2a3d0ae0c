//! Message operations.
//!
//! Each operation names its mailbox and carries a precheck that selects it
//! first when needed.

use bytes::Bytes;
use tracing::debug;

use super::Client;
use crate::Result;
use crate::command::{Command, FetchItems, SearchCriteria, StoreAction};
use crate::protocol::CommandOptions;
use crate::types::{Attribute, CodeValue, Response};

/// FETCH modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Treat the sequence set as UIDs.
    pub by_uid: bool,
    /// Only messages changed since this mod-sequence (CONDSTORE).
    pub changed_since: Option<u64>,
    /// Keep literal bodies as raw bytes instead of decoding them as text.
    pub raw_literals: bool,
}

/// STORE modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Treat the sequence set as UIDs.
    pub by_uid: bool,
    /// Use `.SILENT`, suppressing the FETCH replies.
    pub silent: bool,
    /// Conditional store (CONDSTORE).
    pub unchanged_since: Option<u64>,
}

impl Client {
    /// Fetches `items` for the messages in `sequence`.
    ///
    /// Returns the untagged FETCH responses in the order they arrived.
    pub async fn list_messages(
        &self,
        mailbox: &str,
        sequence: &str,
        items: FetchItems,
        options: FetchOptions,
    ) -> Result<Vec<Response>> {
        let mut request = Command::Fetch {
            sequence: sequence.to_string(),
            items,
            uid: options.by_uid,
            changed_since: options.changed_since,
        }
        .into_request();
        if options.raw_literals {
            request = request.raw_literals();
        }
        let mut response = self
            .connection
            .exec(
                request,
                &["FETCH"],
                CommandOptions::new().precheck(self.ensure_selected(mailbox)),
            )
            .await?;
        Ok(response.payload.remove("FETCH").unwrap_or_default())
    }

    /// Runs SEARCH and returns the matching numbers in ascending order.
    pub async fn search(
        &self,
        mailbox: &str,
        criteria: SearchCriteria,
        by_uid: bool,
    ) -> Result<Vec<u32>> {
        let command = Command::Search {
            criteria,
            uid: by_uid,
        };
        let accept = command.accepts();
        let response = self
            .connection
            .exec(
                command.into_request(),
                accept,
                CommandOptions::new().precheck(self.ensure_selected(mailbox)),
            )
            .await?;
        let mut found: Vec<u32> = response
            .payload("SEARCH")
            .iter()
            .flat_map(|search| &search.attributes)
            .filter_map(Attribute::as_number)
            .filter_map(|n| u32::try_from(n).ok())
            .collect();
        found.sort_unstable();
        found.dedup();
        debug!(mailbox, matches = found.len(), "search finished");
        Ok(found)
    }

    /// Changes flags with STORE and returns the FETCH replies.
    pub async fn set_flags(
        &self,
        mailbox: &str,
        sequence: &str,
        action: StoreAction,
        options: StoreOptions,
    ) -> Result<Vec<Response>> {
        let command = Command::Store {
            sequence: sequence.to_string(),
            action,
            uid: options.by_uid,
            silent: options.silent,
            unchanged_since: options.unchanged_since,
        };
        let accept = command.accepts();
        let mut response = self
            .connection
            .exec(
                command.into_request(),
                accept,
                CommandOptions::new().precheck(self.ensure_selected(mailbox)),
            )
            .await?;
        Ok(response.payload.remove("FETCH").unwrap_or_default())
    }

    /// Flags messages `\Deleted` and expunges them.
    ///
    /// With UIDs and UIDPLUS only the given messages are expunged; otherwise
    /// a plain EXPUNGE removes every deleted message in the mailbox.
    pub async fn delete_messages(&self, mailbox: &str, sequence: &str, by_uid: bool) -> Result<()> {
        self.set_flags(
            mailbox,
            sequence,
            StoreAction::AddFlags(vec!["\\Deleted".to_string()]),
            StoreOptions {
                by_uid,
                silent: true,
                unchanged_since: None,
            },
        )
        .await?;
        let command = if by_uid && self.has_capability("UIDPLUS") {
            Command::UidExpunge {
                uids: sequence.to_string(),
            }
        } else {
            Command::Expunge
        };
        self.connection
            .exec(
                command.into_request(),
                &[],
                CommandOptions::new().precheck(self.ensure_selected(mailbox)),
            )
            .await?;
        Ok(())
    }

    /// Copies messages to `destination`.
    ///
    /// The completion is returned as-is; with UIDPLUS it carries a
    /// `COPYUID` code.
    pub async fn copy_messages(
        &self,
        mailbox: &str,
        sequence: &str,
        destination: &str,
        by_uid: bool,
    ) -> Result<Response> {
        let command = Command::Copy {
            sequence: sequence.to_string(),
            mailbox: destination.to_string(),
            uid: by_uid,
        };
        self.connection
            .exec(
                command.into_request(),
                &[],
                CommandOptions::new().precheck(self.ensure_selected(mailbox)),
            )
            .await
    }

    /// Moves messages to `destination`: MOVE when supported, otherwise COPY
    /// followed by delete.
    pub async fn move_messages(
        &self,
        mailbox: &str,
        sequence: &str,
        destination: &str,
        by_uid: bool,
    ) -> Result<()> {
        if !self.has_capability("MOVE") {
            debug!(mailbox, destination, "MOVE unsupported, copying instead");
            self.copy_messages(mailbox, sequence, destination, by_uid)
                .await?;
            return self.delete_messages(mailbox, sequence, by_uid).await;
        }
        let command = Command::Move {
            sequence: sequence.to_string(),
            mailbox: destination.to_string(),
            uid: by_uid,
        };
        self.connection
            .exec(
                command.into_request(),
                &[],
                CommandOptions::new().precheck(self.ensure_selected(mailbox)),
            )
            .await?;
        Ok(())
    }

    /// Appends a message to `destination`.
    ///
    /// Returns the new UID when the server reports `APPENDUID`.
    pub async fn upload(
        &self,
        destination: &str,
        message: impl Into<Bytes>,
        flags: Vec<String>,
    ) -> Result<Option<u32>> {
        let command = Command::Append {
            mailbox: destination.to_string(),
            flags,
            message: message.into(),
        };
        let response = self
            .connection
            .exec(command.into_request(), &[], CommandOptions::new())
            .await?;
        Ok(appended_uid(&response))
    }
}

/// `[APPENDUID <uidvalidity> <uid>]`.
fn appended_uid(response: &Response) -> Option<u32> {
    match response.extra.get("appenduid")? {
        CodeValue::List(values) => values.get(1)?.parse().ok(),
        CodeValue::Scalar(_) => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::parser::{ParseOptions, parse};

    #[test]
    fn test_appended_uid() {
        let done = parse(
            b"W4 OK [APPENDUID 38505 3955] APPEND completed",
            ParseOptions::default(),
        )
        .unwrap();
        assert_eq!(appended_uid(&done), Some(3955));

        let plain = parse(b"W4 OK APPEND completed", ParseOptions::default()).unwrap();
        assert_eq!(appended_uid(&plain), None);
    }
}
