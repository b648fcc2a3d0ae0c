//! IMAP connection management.
//!
//! This module provides connection handling for IMAP servers, including:
//! - Configuration (host, port, security mode, timers)
//! - TLS/plaintext stream abstraction with STARTTLS upgrade
//! - Literal-aware frame decoding
//! - COMPRESS=DEFLATE stream compression
//! - The driver task behind [`Connection`]
//! - The [`Client`] session facade

mod client;
pub mod compress;
mod config;
mod driver;
mod framed;
mod stream;

pub use client::{Client, FetchOptions, MailboxInfo, SelectOptions, StoreOptions};
pub use compress::{CodecOutput, CompressionStrategy, InlineCompressor, WorkerCompressor};
pub use config::{Auth, CompressionMode, Config, ConfigBuilder, Security, Timeouts};
pub use driver::Connection;
pub use framed::{DEFAULT_BUFFER_SIZE, FrameDecoder};
pub use stream::{AsyncStream, ImapStream, connect_plain, connect_tls, create_tls_connector};
