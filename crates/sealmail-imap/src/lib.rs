//! # sealmail-imap
//!
//! An asynchronous IMAP client core built around a command queue.
//!
//! ## Features
//!
//! - **Literal-aware framing**: server output is split into complete
//!   responses, however the bytes were chunked on the wire
//! - **Command queue**: one command in flight, monotonically numbered tags,
//!   per-command prechecks that may insert commands ahead of their owner
//! - **Untagged routing**: responses collected into the running command's
//!   payload, or dispatched to per-verb handlers
//! - **IDLE keep-alive**: IDLE (RFC 2177) after a quiet period, renewed
//!   periodically, or NOOP polling when IDLE is not supported
//! - **STARTTLS and COMPRESS=DEFLATE** (RFC 4978), with an in-task or
//!   worker-thread codec
//! - **TLS via rustls**: no OpenSSL dependency
//! - **Sans-I/O protocol core**: [`protocol::Protocol`] holds all state and
//!   timers; [`Connection`] drives it over a socket
//!
//! ## Quick Start
//!
//! ```no_run
//! use sealmail_imap::{Auth, Client, Config, FetchItems, FetchOptions};
//!
//! #[tokio::main]
//! async fn main() -> sealmail_imap::Result<()> {
//!     let config = Config::builder("imap.example.com")
//!         .auth(Auth::Login {
//!             username: "user@example.com".to_string(),
//!             password: "password".to_string(),
//!         })
//!         .build();
//!     let client = Client::connect(config).await?;
//!
//!     // INBOX is selected automatically before the FETCH.
//!     let messages = client
//!         .list_messages("INBOX", "1:10", FetchItems::Fast, FetchOptions::default())
//!         .await?;
//!     println!("fetched {}", messages.len());
//!
//!     client.logout().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! Connecting ── greeting OK ──→ NotAuthenticated ── LOGIN ──→ Authenticated
//!     │                                                          │  ▲
//!     └── greeting PREAUTH ──────────────────────────────────────┘  │
//!                                              SELECT │   CLOSE    │
//!                                                     ▼            │
//!                                                  Selected ───────┘
//! ```
//!
//! Any state moves to `Logout` on LOGOUT, BYE, or a fatal error.
//!
//! ## Modules
//!
//! - [`command`]: typed commands, request compilation, SASL helpers
//! - [`connection`]: configuration, streams, framing, compression, the
//!   connection driver and the client facade
//! - [`handler`]: unsolicited update handlers
//! - [`parser`]: response parser
//! - [`protocol`]: the sans-I/O state machine and command queue
//! - [`types`]: requests, responses, attributes, capabilities

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod handler;
pub mod parser;
pub mod protocol;
pub mod types;

pub use command::{Command, FetchAttribute, FetchItems, SearchCriteria, StoreAction, TagGenerator};
pub use connection::{
    Auth, Client, CompressionMode, Config, ConfigBuilder, Connection, FetchOptions, ImapStream,
    MailboxInfo, Security, SelectOptions, StoreOptions, Timeouts,
};
pub use error::{Error, Result};
pub use handler::{CollectingHandler, LoggingHandler, NoopHandler, UpdateEvent, UpdateHandler};
pub use parser::{ParseOptions, parse};
pub use protocol::{CommandId, CommandOptions, ConnectionState, MailboxEvent, Protocol};
pub use types::{Attribute, Capabilities, Request, Response};

/// IMAP protocol version spoken.
pub const IMAP_VERSION: &str = "IMAP4rev1";
