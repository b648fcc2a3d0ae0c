//! Connection configuration types.

use std::fmt;
use std::time::Duration;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 143). **Not recommended for production.**
    None,
    /// Start with plaintext, upgrade with STARTTLS (port 143).
    StartTls,
    /// TLS from the start (port 993). **Recommended.**
    #[default]
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls => 143,
            Self::Implicit => 993,
        }
    }
}

/// Where DEFLATE work runs once COMPRESS is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionMode {
    /// Inflate and deflate on the connection task.
    #[default]
    Inline,
    /// Inflate and deflate on a dedicated worker thread.
    Worker,
}

/// Credentials used by the client facade.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// `LOGIN` (or `AUTHENTICATE PLAIN` when advertised).
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// `AUTHENTICATE XOAUTH2`.
    XOAuth2 {
        /// User email address.
        user: String,
        /// `OAuth2` access token.
        access_token: String,
    },
}

impl Auth {
    /// Returns the user name.
    #[must_use]
    pub fn user(&self) -> &str {
        match self {
            Self::Login { username, .. } => username,
            Self::XOAuth2 { user, .. } => user,
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::XOAuth2 { user, .. } => f
                .debug_struct("XOAuth2")
                .field("user", user)
                .finish_non_exhaustive(),
        }
    }
}

/// Timer settings of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Budget for TCP/TLS setup plus the server greeting.
    pub connect: Duration,
    /// Base of the socket watchdog.
    pub socket_lower_bound: Duration,
    /// Additional watchdog time per byte written (or per 4096 bytes read).
    pub socket_multiplier: Duration,
    /// Quiet period after the queue drains before IDLE/NOOP starts.
    pub enter_idle: Duration,
    /// How long one IDLE lasts before it is renewed with DONE.
    pub idle: Duration,
    /// Interval between keep-alive NOOPs when IDLE is not supported.
    pub noop: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            socket_lower_bound: Duration::from_secs(10),
            socket_multiplier: Duration::from_micros(100),
            enter_idle: Duration::from_secs(1),
            idle: Duration::from_secs(60),
            noop: Duration::from_secs(60),
        }
    }
}

/// IMAP connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Timer settings.
    pub timeouts: Timeouts,
    /// Where compression runs.
    pub compression: CompressionMode,
    /// Negotiate COMPRESS=DEFLATE after login when advertised.
    pub enable_compression: bool,
    /// Fail the connection if STARTTLS is not available.
    pub require_tls: bool,
    /// Never issue STARTTLS, even when advertised.
    pub ignore_tls: bool,
    /// Credentials for the client facade.
    pub auth: Option<Auth>,
    /// Client identification sent with ID when the server supports it.
    pub client_id: Option<Vec<(String, String)>>,
}

impl Config {
    /// Creates a new configuration with implicit TLS on port 993.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        ConfigBuilder::new(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }
}

/// Builder for connection configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    timeouts: Timeouts,
    compression: CompressionMode,
    enable_compression: bool,
    require_tls: bool,
    ignore_tls: bool,
    auth: Option<Auth>,
    client_id: Option<Vec<(String, String)>>,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::Implicit,
            timeouts: Timeouts::default(),
            compression: CompressionMode::Inline,
            enable_compression: false,
            require_tls: false,
            ignore_tls: false,
            auth: None,
            client_id: None,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connect = timeout;
        self
    }

    /// Sets the socket watchdog: `lower_bound + bytes * multiplier`.
    #[must_use]
    pub const fn socket_timeout(mut self, lower_bound: Duration, multiplier: Duration) -> Self {
        self.timeouts.socket_lower_bound = lower_bound;
        self.timeouts.socket_multiplier = multiplier;
        self
    }

    /// Sets the quiet period before entering IDLE.
    #[must_use]
    pub const fn enter_idle_delay(mut self, delay: Duration) -> Self {
        self.timeouts.enter_idle = delay;
        self
    }

    /// Sets the IDLE renewal and NOOP intervals.
    #[must_use]
    pub const fn keep_alive(mut self, idle: Duration, noop: Duration) -> Self {
        self.timeouts.idle = idle;
        self.timeouts.noop = noop;
        self
    }

    /// Sets where compression runs.
    #[must_use]
    pub const fn compression(mut self, mode: CompressionMode) -> Self {
        self.compression = mode;
        self
    }

    /// Negotiates COMPRESS=DEFLATE after login.
    #[must_use]
    pub const fn enable_compression(mut self, enable: bool) -> Self {
        self.enable_compression = enable;
        self
    }

    /// Fails the connection if STARTTLS is not offered.
    #[must_use]
    pub const fn require_tls(mut self, require: bool) -> Self {
        self.require_tls = require;
        self
    }

    /// Never upgrades with STARTTLS.
    #[must_use]
    pub const fn ignore_tls(mut self, ignore: bool) -> Self {
        self.ignore_tls = ignore;
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Sets the client identification sent with ID.
    #[must_use]
    pub fn client_id(mut self, fields: Vec<(String, String)>) -> Self {
        self.client_id = Some(fields);
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            timeouts: self.timeouts,
            compression: self.compression,
            enable_compression: self.enable_compression,
            require_tls: self.require_tls,
            ignore_tls: self.ignore_tls,
            auth: self.auth,
            client_id: self.client_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 143);
        assert_eq!(Security::StartTls.default_port(), 143);
        assert_eq!(Security::Implicit.default_port(), 993);
    }

    #[test]
    fn test_config_new() {
        let config = Config::new("imap.example.com");
        assert_eq!(config.host, "imap.example.com");
        assert_eq!(config.port, 993);
        assert_eq!(config.security, Security::Implicit);
        assert_eq!(config.timeouts.connect, Duration::from_secs(30));
        assert_eq!(config.timeouts.enter_idle, Duration::from_secs(1));
        assert!(!config.enable_compression);
    }

    #[test]
    fn test_config_builder() {
        let config = Config::builder("imap.example.com")
            .security(Security::StartTls)
            .connect_timeout(Duration::from_secs(10))
            .keep_alive(Duration::from_secs(300), Duration::from_secs(30))
            .compression(CompressionMode::Worker)
            .enable_compression(true)
            .auth(Auth::Login {
                username: "me".to_string(),
                password: "secret".to_string(),
            })
            .build();

        assert_eq!(config.port, 143);
        assert_eq!(config.timeouts.connect, Duration::from_secs(10));
        assert_eq!(config.timeouts.idle, Duration::from_secs(300));
        assert_eq!(config.compression, CompressionMode::Worker);
        assert_eq!(config.auth.as_ref().map(Auth::user), Some("me"));
    }

    #[test]
    fn test_auth_debug_hides_secret() {
        let auth = Auth::XOAuth2 {
            user: "me@example.com".to_string(),
            access_token: "ya29.secret".to_string(),
        };
        let debug = format!("{auth:?}");
        assert!(debug.contains("me@example.com"));
        assert!(!debug.contains("ya29"));
    }
}
