//! High-level IMAP client.
//!
//! [`Client`] wraps a [`Connection`] with the usual session setup
//! (capabilities, STARTTLS, ID, authentication, compression) and with
//! mailbox and message operations. Message operations name the mailbox they
//! act on; the client selects it first unless the command queued ahead of
//! them already does.
//!
//! ```no_run
//! use sealmail_imap::{Auth, Client, Config};
//!
//! # async fn example() -> sealmail_imap::Result<()> {
//! let config = Config::builder("imap.example.com")
//!     .auth(Auth::Login {
//!         username: "me@example.com".to_string(),
//!         password: "secret".to_string(),
//!     })
//!     .build();
//! let client = Client::connect(config).await?;
//! let unseen = client
//!     .search("INBOX", sealmail_imap::command::SearchCriteria::Unseen, false)
//!     .await?;
//! println!("{} unseen", unseen.len());
//! client.logout().await?;
//! # Ok(())
//! # }
//! ```

#![allow(clippy::missing_errors_doc)]

mod mailbox;
mod messages;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

pub use self::mailbox::{MailboxInfo, SelectOptions};
pub use self::messages::{FetchOptions, StoreOptions};
use super::{Auth, Config, Connection, ImapStream, Security};
use crate::command::{Command, plain_response, xoauth2_token};
use crate::handler::{NoopHandler, UpdateHandler, UpdateRouter};
use crate::protocol::{CommandOptions, ConnectionState};
use crate::Result;
use crate::types::{Attribute, Capabilities, Response};

/// Verbs whose untagged responses are routed to the update handler.
const UPDATE_VERBS: [&str; 7] = ["EXISTS", "EXPUNGE", "FETCH", "OK", "NO", "BAD", "BYE"];

/// IMAP client session.
pub struct Client {
    connection: Connection,
    config: Config,
    secure: AtomicBool,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.config.host)
            .field("secure", &self.is_secure())
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Connects, then runs the session setup with a no-op update handler.
    pub async fn connect(config: Config) -> Result<Self> {
        Self::connect_with_handler(config, NoopHandler).await
    }

    /// Connects, then runs the session setup, reporting unsolicited updates
    /// to `handler`.
    ///
    /// Setup asks for capabilities if the greeting carried none, upgrades
    /// with STARTTLS when allowed, sends ID, authenticates when credentials
    /// are configured, and enables compression when asked to.
    pub async fn connect_with_handler(
        config: Config,
        handler: impl UpdateHandler + 'static,
    ) -> Result<Self> {
        let connection = Connection::connect(&config).await?;
        let secure = config.security == Security::Implicit;
        Self::setup(connection, config, Box::new(handler), secure).await
    }

    /// Runs the session setup over an already open stream.
    pub async fn from_stream(
        stream: ImapStream,
        config: Config,
        handler: impl UpdateHandler + 'static,
    ) -> Result<Self> {
        let secure = stream.is_tls();
        let connection = Connection::from_stream(stream, &config).await?;
        Self::setup(connection, config, Box::new(handler), secure).await
    }

    async fn setup(
        connection: Connection,
        config: Config,
        handler: Box<dyn UpdateHandler>,
        secure: bool,
    ) -> Result<Self> {
        install_router(&connection, handler);
        let client = Self {
            connection,
            config,
            secure: AtomicBool::new(secure),
        };
        if let Err(err) = client.handshake().await {
            warn!(host = %client.config.host, %err, "session setup failed");
            client.connection.close();
            return Err(err);
        }
        Ok(client)
    }

    async fn handshake(&self) -> Result<()> {
        self.update_capability(false).await?;
        self.upgrade_connection().await?;
        if let Err(err) = self.update_id(self.config.client_id.clone()).await {
            warn!(%err, "ID failed");
        }
        if let Some(auth) = self.config.auth.clone() {
            self.login(&auth).await?;
        }
        self.compress_connection().await?;
        info!(host = %self.config.host, state = ?self.state(), "session ready");
        Ok(())
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Current capability set.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.connection.capabilities()
    }

    /// Returns `true` if the server advertises `name`.
    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.connection.capabilities().has(name)
    }

    /// Returns `true` once the connection runs over TLS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure.load(Ordering::Acquire)
    }

    /// Asks the server for its capabilities.
    ///
    /// Without `force` nothing is sent if capabilities are already known.
    /// In cleartext with TLS required the query waits for the upgrade.
    pub async fn update_capability(&self, force: bool) -> Result<()> {
        if !force && !self.connection.capabilities().is_empty() {
            return Ok(());
        }
        if !self.is_secure() && self.config.require_tls {
            return Ok(());
        }
        let command = Command::Capability;
        let accept = command.accepts();
        let response = self
            .connection
            .exec(command.into_request(), accept, CommandOptions::new())
            .await?;
        if let Some(listing) = listing_from(&response) {
            self.connection
                .set_capabilities(Capabilities::from_listing(listing));
        }
        debug!(capabilities = %self.connection.capabilities(), "capabilities updated");
        Ok(())
    }

    /// Upgrades the connection with STARTTLS.
    ///
    /// Returns `false` without sending anything when the connection is
    /// already secure, or when STARTTLS is not advertised (or ignored) and
    /// TLS is not required.
    pub async fn upgrade_connection(&self) -> Result<bool> {
        if self.is_secure() {
            return Ok(false);
        }
        let required = self.config.require_tls || self.config.security == Security::StartTls;
        if (!self.has_capability("STARTTLS") || self.config.ignore_tls) && !required {
            return Ok(false);
        }
        debug!("upgrading connection with STARTTLS");
        self.connection.upgrade().await?;
        self.secure.store(true, Ordering::Release);
        self.update_capability(true).await?;
        Ok(true)
    }

    /// Sends ID (RFC 2971) when the server supports it and returns the
    /// server's identification.
    pub async fn update_id(
        &self,
        parameters: Option<Vec<(String, String)>>,
    ) -> Result<Option<Vec<(String, String)>>> {
        if !self.has_capability("ID") {
            return Ok(None);
        }
        let command = Command::Id { parameters };
        let accept = command.accepts();
        let response = self
            .connection
            .exec(command.into_request(), accept, CommandOptions::new())
            .await?;
        let server_id = response
            .payload("ID")
            .first()
            .and_then(|id| id.attributes.first())
            .and_then(Attribute::as_list)
            .map(|items| {
                items
                    .chunks_exact(2)
                    .filter_map(|pair| match pair {
                        [key, value] => Some((
                            key.as_str()?.to_lowercase(),
                            value.as_str()?.into_owned(),
                        )),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
            });
        debug!(?server_id, "server identified");
        Ok(server_id)
    }

    /// Authenticates.
    ///
    /// XOAUTH2 credentials use `AUTHENTICATE XOAUTH2`. Passwords go through
    /// `AUTHENTICATE PLAIN` when advertised and `LOGIN` otherwise. A
    /// capability list on the completion (or alongside it) replaces the
    /// known set; without one, capabilities are asked for again.
    pub async fn login(&self, auth: &Auth) -> Result<()> {
        let (command, options) = match auth {
            Auth::XOAuth2 { user, access_token } => (
                Command::Authenticate {
                    mechanism: "XOAUTH2".to_string(),
                    initial_response: Some(xoauth2_token(user, access_token)),
                },
                CommandOptions::new().error_response_expects_empty_line(),
            ),
            Auth::Login { username, password } if self.capabilities().has_auth("PLAIN") => (
                Command::AuthenticateContinued {
                    mechanism: "PLAIN".to_string(),
                    response: plain_response(username, password),
                },
                CommandOptions::new(),
            ),
            Auth::Login { username, password } => (
                Command::Login {
                    username: username.clone(),
                    password: password.clone(),
                },
                CommandOptions::new(),
            ),
        };

        let response = self
            .connection
            .exec(command.into_request(), &["CAPABILITY"], options)
            .await?;
        info!(user = auth.user(), "logged in");

        if response.capability.is_some() {
            debug!("capabilities updated from login completion");
        } else if let Some(listing) = response
            .payload("CAPABILITY")
            .last()
            .and_then(Response::capability_listing)
        {
            self.connection
                .set_capabilities(Capabilities::from_listing(listing));
            debug!("capabilities updated from login payload");
        } else {
            self.update_capability(true).await?;
        }
        Ok(())
    }

    /// Enables COMPRESS=DEFLATE when configured and advertised.
    pub async fn compress_connection(&self) -> Result<bool> {
        if !self.config.enable_compression || !self.has_capability("COMPRESS=DEFLATE") {
            return Ok(false);
        }
        debug!(mode = ?self.config.compression, "enabling compression");
        self.connection.enable_compression().await?;
        Ok(true)
    }

    /// Sends LOGOUT and closes the connection.
    pub async fn logout(&self) -> Result<()> {
        self.connection.logout().await
    }

    /// Closes the connection without LOGOUT, failing anything queued.
    pub fn close(&self) {
        self.connection.close();
    }
}

fn install_router(connection: &Connection, handler: Box<dyn UpdateHandler>) {
    let router = Arc::new(Mutex::new(UpdateRouter::new(handler)));
    for verb in UPDATE_VERBS {
        let router = Arc::clone(&router);
        connection.set_handler(verb, move |response| {
            router
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .on_response(response);
        });
    }
    connection.on_mailbox_event(move |event| {
        router
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_mailbox(event);
    });
}

fn listing_from(response: &Response) -> Option<Vec<String>> {
    response
        .capability
        .clone()
        .or_else(|| {
            response
                .payload("CAPABILITY")
                .last()
                .and_then(Response::capability_listing)
        })
}
