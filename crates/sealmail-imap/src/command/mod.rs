//! IMAP command builder.
//!
//! [`Command`] is the typed front-end; it lowers into a [`Request`] which
//! [`compile`] turns into wire chunks once the queue has assigned a tag.

mod sasl;
mod serialize;
mod tag_generator;
mod types;

use bytes::Bytes;

use crate::types::{Attribute, Request};

pub use sasl::{plain_response, xoauth2_token};
pub use serialize::{compile, redacted};
pub use tag_generator::TagGenerator;
pub use types::{FetchAttribute, FetchItems, SearchCriteria, StoreAction};

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Any State Commands
    /// CAPABILITY command.
    Capability,
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,

    // Not Authenticated State Commands
    /// STARTTLS command.
    StartTls,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// AUTHENTICATE with the initial response inline (SASL-IR).
    Authenticate {
        /// Authentication mechanism.
        mechanism: String,
        /// Initial response, already base64 encoded.
        initial_response: Option<String>,
    },
    /// AUTHENTICATE with the response sent after the server's `+`.
    AuthenticateContinued {
        /// Authentication mechanism.
        mechanism: String,
        /// Response, already base64 encoded.
        response: String,
    },

    // Authenticated State Commands
    /// ID command (RFC 2971) - client/server identification.
    Id {
        /// Client identification parameters (field-value pairs).
        /// None = ID NIL (no identification).
        parameters: Option<Vec<(String, String)>>,
    },
    /// COMPRESS DEFLATE (RFC 4978).
    Compress,
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: String,
        /// Enable CONDSTORE.
        condstore: bool,
    },
    /// EXAMINE command (read-only SELECT).
    Examine {
        /// Mailbox to examine.
        mailbox: String,
        /// Enable CONDSTORE.
        condstore: bool,
    },
    /// APPEND command.
    Append {
        /// Target mailbox.
        mailbox: String,
        /// Flags to set.
        flags: Vec<String>,
        /// Message data.
        message: Bytes,
    },

    // Selected State Commands
    /// EXPUNGE command.
    Expunge,
    /// UID EXPUNGE command (RFC 4315 UIDPLUS) - expunge specific UIDs.
    UidExpunge {
        /// UIDs to expunge.
        uids: String,
    },
    /// SEARCH command.
    Search {
        /// Search criteria.
        criteria: SearchCriteria,
        /// Use UIDs.
        uid: bool,
    },
    /// FETCH command.
    Fetch {
        /// Sequence set.
        sequence: String,
        /// Items to fetch.
        items: FetchItems,
        /// Use UIDs.
        uid: bool,
        /// Only messages changed since this mod-sequence (CONDSTORE).
        changed_since: Option<u64>,
    },
    /// STORE command.
    Store {
        /// Sequence set.
        sequence: String,
        /// Store action.
        action: StoreAction,
        /// Use UIDs.
        uid: bool,
        /// Silent mode (no FETCH response).
        silent: bool,
        /// Conditional store (CONDSTORE).
        unchanged_since: Option<u64>,
    },
    /// COPY command.
    Copy {
        /// Sequence set.
        sequence: String,
        /// Target mailbox.
        mailbox: String,
        /// Use UIDs.
        uid: bool,
    },
    /// MOVE command.
    Move {
        /// Sequence set.
        sequence: String,
        /// Target mailbox.
        mailbox: String,
        /// Use UIDs.
        uid: bool,
    },
    /// IDLE command.
    Idle,
}

const fn uid_verb(uid: bool, verb: &'static str, with_uid: &'static str) -> &'static str {
    if uid { with_uid } else { verb }
}

impl Command {
    /// Untagged verbs whose responses belong to this command and should be
    /// collected into its payload rather than handed to global handlers.
    #[must_use]
    pub const fn accepts(&self) -> &'static [&'static str] {
        match self {
            Self::Capability => &["CAPABILITY"],
            Self::Id { .. } => &["ID"],
            Self::Select { .. } | Self::Examine { .. } => &["EXISTS", "FLAGS", "OK"],
            Self::Search { .. } => &["SEARCH"],
            Self::Fetch { .. } | Self::Store { .. } => &["FETCH"],
            _ => &[],
        }
    }

    /// Lowers the command into a request.
    #[must_use]
    pub fn into_request(self) -> Request {
        match self {
            Self::Capability => Request::new("CAPABILITY"),
            Self::Noop => Request::new("NOOP"),
            Self::Logout => Request::new("LOGOUT"),
            Self::StartTls => Request::new("STARTTLS"),
            Self::Idle => Request::new("IDLE"),
            Self::Expunge => Request::new("EXPUNGE"),
            Self::Compress => Request::new("COMPRESS").attribute(Attribute::atom("DEFLATE")),

            Self::Login { username, password } => Request::new("LOGIN")
                .attributes(vec![Attribute::String(username), Attribute::String(password)])
                .sensitive(),

            Self::Authenticate {
                mechanism,
                initial_response,
            } => {
                let mut attrs = vec![Attribute::Atom(mechanism)];
                attrs.extend(initial_response.map(Attribute::Atom));
                Request::new("AUTHENTICATE").attributes(attrs).sensitive()
            }

            Self::AuthenticateContinued {
                mechanism,
                response,
            } => Request::new("AUTHENTICATE")
                .attributes(vec![Attribute::Atom(mechanism), Attribute::Chunk(response)])
                .sensitive(),

            Self::Id { parameters } => Request::new("ID").attribute(match parameters {
                Some(params) => Attribute::List(
                    params
                        .into_iter()
                        .flat_map(|(key, value)| [Attribute::String(key), Attribute::String(value)])
                        .collect(),
                ),
                None => Attribute::Nil,
            }),

            Self::Select { mailbox, condstore } => mailbox_request("SELECT", mailbox, condstore),
            Self::Examine { mailbox, condstore } => mailbox_request("EXAMINE", mailbox, condstore),

            Self::Append {
                mailbox,
                flags,
                message,
            } => {
                let mut attrs = vec![Attribute::String(mailbox)];
                if !flags.is_empty() {
                    attrs.push(Attribute::List(flags.into_iter().map(Attribute::Atom).collect()));
                }
                attrs.push(Attribute::Literal(message));
                Request::new("APPEND").attributes(attrs)
            }

            Self::UidExpunge { uids } => {
                Request::new("UID EXPUNGE").attribute(Attribute::Sequence(uids))
            }

            Self::Search { criteria, uid } => {
                Request::new(uid_verb(uid, "SEARCH", "UID SEARCH")).attributes(criteria.to_attributes())
            }

            Self::Fetch {
                sequence,
                items,
                uid,
                changed_since,
            } => {
                let mut attrs = vec![Attribute::Sequence(sequence), items.to_attribute()];
                if let Some(modseq) = changed_since {
                    attrs.push(Attribute::List(vec![
                        Attribute::atom("CHANGEDSINCE"),
                        Attribute::Number(modseq),
                    ]));
                }
                Request::new(uid_verb(uid, "FETCH", "UID FETCH")).attributes(attrs)
            }

            Self::Store {
                sequence,
                action,
                uid,
                silent,
                unchanged_since,
            } => {
                let mut attrs = vec![Attribute::Sequence(sequence)];
                attrs.extend(action.to_attributes(silent, unchanged_since));
                Request::new(uid_verb(uid, "STORE", "UID STORE")).attributes(attrs)
            }

            Self::Copy {
                sequence,
                mailbox,
                uid,
            } => Request::new(uid_verb(uid, "COPY", "UID COPY"))
                .attributes(vec![Attribute::Sequence(sequence), Attribute::String(mailbox)]),

            Self::Move {
                sequence,
                mailbox,
                uid,
            } => Request::new(uid_verb(uid, "MOVE", "UID MOVE"))
                .attributes(vec![Attribute::Sequence(sequence), Attribute::String(mailbox)]),
        }
    }
}

fn mailbox_request(verb: &str, mailbox: String, condstore: bool) -> Request {
    let mut request = Request::new(verb).attribute(Attribute::String(mailbox));
    if condstore {
        request = request.attribute(Attribute::List(vec![Attribute::atom("CONDSTORE")]));
    }
    request
}

impl From<Command> for Request {
    fn from(command: Command) -> Self {
        command.into_request()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn wire(command: Command, tag: &str) -> Vec<String> {
        compile(&command.into_request(), tag)
            .into_iter()
            .map(|c| String::from_utf8_lossy(&c).into_owned())
            .collect()
    }

    #[test]
    fn test_capability_command() {
        assert_eq!(wire(Command::Capability, "W1"), ["W1 CAPABILITY"]);
    }

    #[test]
    fn test_login_command() {
        let cmd = Command::Login {
            username: "user@example.com".to_string(),
            password: "pass word".to_string(),
        };
        let request = cmd.into_request();
        assert!(request.sensitive);
        assert_eq!(
            compile(&request, "W1"),
            [b"W1 LOGIN \"user@example.com\" \"pass word\"".to_vec()]
        );
    }

    #[test]
    fn test_select_condstore() {
        let cmd = Command::Select {
            mailbox: "INBOX".to_string(),
            condstore: true,
        };
        assert_eq!(cmd.accepts(), ["EXISTS", "FLAGS", "OK"]);
        let request = cmd.into_request();
        assert_eq!(request.first_string(), Some("INBOX"));
        assert_eq!(compile(&request, "W2"), [b"W2 SELECT \"INBOX\" (CONDSTORE)".to_vec()]);
    }

    #[test]
    fn test_examine_command() {
        let cmd = Command::Examine {
            mailbox: "Archive".to_string(),
            condstore: false,
        };
        assert_eq!(wire(cmd, "W3"), ["W3 EXAMINE \"Archive\""]);
    }

    #[test]
    fn test_uid_fetch_changed_since() {
        let cmd = Command::Fetch {
            sequence: "1:*".to_string(),
            items: FetchItems::Items(vec![FetchAttribute::Uid, FetchAttribute::Flags]),
            uid: true,
            changed_since: Some(9000),
        };
        assert_eq!(
            wire(cmd, "W4"),
            ["W4 UID FETCH 1:* (UID FLAGS) (CHANGEDSINCE 9000)"]
        );
    }

    #[test]
    fn test_store_command() {
        let cmd = Command::Store {
            sequence: "1".to_string(),
            action: StoreAction::AddFlags(vec!["\\Seen".to_string()]),
            uid: false,
            silent: true,
            unchanged_since: None,
        };
        assert_eq!(wire(cmd, "W5"), ["W5 STORE 1 +FLAGS.SILENT (\\Seen)"]);
    }

    #[test]
    fn test_id_command() {
        assert_eq!(wire(Command::Id { parameters: None }, "W6"), ["W6 ID NIL"]);
        let cmd = Command::Id {
            parameters: Some(vec![("name".to_string(), "sealmail".to_string())]),
        };
        assert_eq!(wire(cmd, "W7"), ["W7 ID (\"name\" \"sealmail\")"]);
    }

    #[test]
    fn test_append_uses_literal() {
        let cmd = Command::Append {
            mailbox: "Sent".to_string(),
            flags: vec!["\\Seen".to_string()],
            message: Bytes::from_static(b"hello"),
        };
        assert_eq!(
            wire(cmd, "W8"),
            ["W8 APPEND \"Sent\" (\\Seen) {5}\r\n", "hello"]
        );
    }

    #[test]
    fn test_authenticate_variants() {
        let inline = Command::Authenticate {
            mechanism: "XOAUTH2".to_string(),
            initial_response: Some(xoauth2_token("u", "t")),
        };
        let chunks = wire(inline, "W9");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].starts_with("W9 AUTHENTICATE XOAUTH2 "));

        let continued = Command::AuthenticateContinued {
            mechanism: "PLAIN".to_string(),
            response: plain_response("user", "pass"),
        };
        assert_eq!(
            wire(continued, "W10"),
            ["W10 AUTHENTICATE PLAIN\r\n", "AHVzZXIAcGFzcw=="]
        );
    }

    #[test]
    fn test_move_and_uid_expunge() {
        let cmd = Command::Move {
            sequence: "4:6".to_string(),
            mailbox: "Trash".to_string(),
            uid: true,
        };
        assert_eq!(wire(cmd, "W11"), ["W11 UID MOVE 4:6 \"Trash\""]);
        let cmd = Command::UidExpunge {
            uids: "100:200".to_string(),
        };
        assert_eq!(wire(cmd, "W12"), ["W12 UID EXPUNGE 100:200"]);
    }

    #[test]
    fn test_compress_and_idle() {
        assert_eq!(wire(Command::Compress, "W13"), ["W13 COMPRESS DEFLATE"]);
        assert_eq!(wire(Command::Idle, "W14"), ["W14 IDLE"]);
    }
}
