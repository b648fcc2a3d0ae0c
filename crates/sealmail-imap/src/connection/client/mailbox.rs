//! Mailbox selection.

use tracing::debug;

use super::Client;
use crate::Result;
use crate::command::Command;
use crate::connection::Connection;
use crate::protocol::{CommandId, CommandOptions, Precheck, PrecheckFuture};
use crate::types::{Attribute, CodeValue, Response};

/// How to open a mailbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectOptions {
    /// Open with EXAMINE instead of SELECT.
    pub read_only: bool,
    /// Enable CONDSTORE (RFC 7162) if the server supports it.
    pub condstore: bool,
}

/// What the server reported when a mailbox was opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxInfo {
    /// Mailbox path.
    pub path: String,
    /// Opened read-only.
    pub read_only: bool,
    /// Number of messages.
    pub exists: u32,
    /// Flags defined in the mailbox.
    pub flags: Vec<String>,
    /// Flags the client can change permanently.
    pub permanent_flags: Vec<String>,
    /// UIDVALIDITY value.
    pub uid_validity: Option<u32>,
    /// Predicted next UID.
    pub uid_next: Option<u32>,
    /// Highest mod-sequence (CONDSTORE).
    pub highest_modseq: Option<u64>,
    /// The server does not keep mod-sequences for this mailbox.
    pub no_modseq: bool,
}

impl MailboxInfo {
    /// Builds the info from a completed SELECT or EXAMINE.
    #[must_use]
    pub fn from_response(path: &str, response: &Response) -> Self {
        let mut info = Self {
            path: path.to_string(),
            read_only: response.code.as_deref() == Some("READ-ONLY"),
            ..Self::default()
        };

        if let Some(exists) = response.payload("EXISTS").last().and_then(|r| r.nr) {
            info.exists = exists;
        }

        if let Some(flags) = response
            .payload("FLAGS")
            .last()
            .and_then(|r| r.attributes.first())
            .and_then(Attribute::as_list)
        {
            info.flags = flags
                .iter()
                .filter_map(Attribute::as_str)
                .map(|flag| flag.into_owned())
                .collect();
        }

        for ok in response.payload("OK") {
            let Some(code) = ok.code.as_deref() else {
                continue;
            };
            let value = ok.extra.get(&code.to_lowercase());
            match (code, value) {
                ("PERMANENTFLAGS", Some(CodeValue::List(flags))) => {
                    info.permanent_flags.clone_from(flags);
                }
                ("UIDVALIDITY", Some(value)) => info.uid_validity = number(value),
                ("UIDNEXT", Some(value)) => info.uid_next = number(value),
                ("HIGHESTMODSEQ", Some(value)) => {
                    info.highest_modseq = value.as_scalar().and_then(|v| v.parse().ok());
                }
                ("NOMODSEQ", _) => info.no_modseq = true,
                _ => {}
            }
        }
        info
    }
}

fn number(value: &CodeValue) -> Option<u32> {
    value.as_scalar().and_then(|v| v.parse().ok())
}

impl Client {
    /// Opens a mailbox with SELECT (or EXAMINE when read-only).
    pub async fn select_mailbox(&self, path: &str, options: SelectOptions) -> Result<MailboxInfo> {
        let options = SelectOptions {
            condstore: options.condstore && self.has_capability("CONDSTORE"),
            ..options
        };
        select(&self.connection, path, options, None).await
    }

    /// Precheck that selects `path` before a message command unless it will
    /// already be selected when that command runs.
    pub(super) fn ensure_selected(&self, path: &str) -> Precheck {
        let connection = self.connection.clone();
        let path = path.to_string();
        Box::new(move |ctx: CommandId| -> PrecheckFuture {
            Box::pin(async move {
                if !should_select(&connection, &path, ctx) {
                    return Ok(());
                }
                select(&connection, &path, SelectOptions::default(), Some(ctx))
                    .await
                    .map(drop)
            })
        })
    }
}

async fn select(
    connection: &Connection,
    path: &str,
    options: SelectOptions,
    ctx: Option<CommandId>,
) -> Result<MailboxInfo> {
    let command = if options.read_only {
        Command::Examine {
            mailbox: path.to_string(),
            condstore: options.condstore,
        }
    } else {
        Command::Select {
            mailbox: path.to_string(),
            condstore: options.condstore,
        }
    };
    let accept = command.accepts();
    let mut command_options = CommandOptions::new();
    if let Some(ctx) = ctx {
        command_options = command_options.ctx(ctx);
    }
    debug!(mailbox = path, read_only = options.read_only, "opening mailbox");
    let response = connection
        .exec(command.into_request(), accept, command_options)
        .await?;
    Ok(MailboxInfo::from_response(path, &response))
}

/// The mailbox in effect for `ctx` is the one named by the closest
/// SELECT/EXAMINE queued before it (or in flight), else the selected one.
fn should_select(connection: &Connection, path: &str, ctx: CommandId) -> bool {
    match connection.get_previously_queued(&["SELECT", "EXAMINE"], Some(ctx)) {
        Some(previous) => previous.first_string() != Some(path),
        None => connection.state().selected_mailbox() != Some(path),
    }
}
