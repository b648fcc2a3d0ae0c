//! Connection driver.
//!
//! [`Connection`] is a cheap handle around a [`Protocol`] behind a mutex. A
//! single driver task owns the socket: it writes whatever the protocol wants
//! to send, feeds decoded frames back in, fires the protocol's timers and
//! performs the STARTTLS and COMPRESS transitions. The mutex is never held
//! across an await.

#![allow(clippy::missing_errors_doc)]

use std::fmt;
use std::future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{Notify, mpsc, oneshot};
use tokio::time::{Instant, sleep_until, timeout};
use tracing::{debug, trace, warn};

use super::compress::{self, CodecOutput, CompressionStrategy};
use super::config::{CompressionMode, Config};
use super::framed::{DEFAULT_BUFFER_SIZE, FrameDecoder};
use super::stream::ImapStream;
use crate::protocol::{
    CommandId, CommandOptions, CommandReceiver, ConnectionState, MailboxEvent, Precheck, Protocol,
};
use crate::types::{Attribute, Capabilities, Request, Response};
use crate::{Error, Result};

/// Requests to the driver task.
enum Control {
    /// Wrap the socket in TLS after STARTTLS succeeded.
    Upgrade(oneshot::Sender<Result<()>>),
    /// Start DEFLATE after COMPRESS succeeded.
    Compress(oneshot::Sender<Result<()>>),
    /// Shut the connection down.
    Close,
}

/// State shared between handles, the driver and running prechecks.
struct Shared {
    protocol: Mutex<Protocol>,
    /// Wakes the driver when the protocol has something to send.
    wake: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Protocol> {
        self.protocol.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn inspect<R>(&self, f: impl FnOnce(&Protocol) -> R) -> R {
        f(&self.lock())
    }

    /// Mutates the protocol, then starts any prechecks it scheduled and wakes
    /// the driver.
    fn update<R>(self: &Arc<Self>, f: impl FnOnce(&mut Protocol, Instant) -> R) -> R {
        let (result, prechecks) = {
            let mut protocol = self.lock();
            let result = f(&mut protocol, Instant::now());
            (result, protocol.take_prechecks())
        };
        for (id, precheck) in prechecks {
            self.spawn_precheck(id, precheck);
        }
        self.wake.notify_one();
        result
    }

    fn spawn_precheck(self: &Arc<Self>, id: CommandId, precheck: Precheck) {
        let shared = Arc::clone(self);
        let work = precheck(id);
        tokio::spawn(async move {
            let result = work.await;
            shared.update(|protocol, now| protocol.finish_precheck(id, result, now));
        });
    }
}

fn closed() -> Error {
    Error::ConnectionClosed("connection driver stopped".to_string())
}

/// Handle to a running IMAP connection.
///
/// Clones share the same connection. The driver stops when the connection is
/// closed or every handle has been dropped.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
    control: mpsc::UnboundedSender<Control>,
}

impl Connection {
    /// Opens a connection and waits for the server greeting.
    ///
    /// Socket setup, TLS and the greeting share the connect timeout.
    pub async fn connect(config: &Config) -> Result<Self> {
        let budget = config.timeouts.connect;
        let started = Instant::now();
        debug!(host = %config.host, port = config.port, security = ?config.security, "connecting");
        let stream = timeout(
            budget,
            ImapStream::connect(&config.host, config.port, config.security),
        )
        .await
        .map_err(|_| Error::Timeout(budget))??;
        Self::start(stream, config, budget.saturating_sub(started.elapsed())).await
    }

    /// Runs a connection over an already open stream and waits for the
    /// server greeting.
    pub async fn from_stream(stream: ImapStream, config: &Config) -> Result<Self> {
        Self::start(stream, config, config.timeouts.connect).await
    }

    async fn start(
        stream: ImapStream,
        config: &Config,
        budget: std::time::Duration,
    ) -> Result<Self> {
        let connection = Self::spawn(stream, config);
        let greeting = connection.shared.update(|p, _| p.wait_for_greeting());
        let result = match timeout(budget, greeting).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(closed()),
            Err(_) => Err(Error::Timeout(budget)),
        };
        match result {
            Ok(()) => Ok(connection),
            Err(err) => {
                let reported = err.clone();
                connection
                    .shared
                    .update(move |p, _| p.close(Some(reported)));
                connection.close();
                Err(err)
            }
        }
    }

    fn spawn(stream: ImapStream, config: &Config) -> Self {
        let shared = Arc::new(Shared {
            protocol: Mutex::new(Protocol::new(config.timeouts)),
            wake: Notify::new(),
        });
        let (control, control_rx) = mpsc::unbounded_channel();
        let (codec_tx, codec_rx) = mpsc::unbounded_channel();
        let driver = Driver {
            shared: Arc::clone(&shared),
            stream: Some(stream),
            decoder: FrameDecoder::new(),
            control: control_rx,
            codec: None,
            codec_tx,
            codec_rx,
            host: config.host.clone(),
            compression: config.compression,
        };
        tokio::spawn(driver.run());
        Self { shared, control }
    }

    /// Queues a command without waiting for it.
    pub fn enqueue(
        &self,
        request: Request,
        accept: &[&str],
        options: CommandOptions,
    ) -> (CommandId, CommandReceiver) {
        self.shared
            .update(|p, now| p.enqueue(request, accept, options, now))
    }

    /// Leaves idle, runs a command and waits for its completion.
    ///
    /// Tagged NO and BAD come back as [`Error::No`] and [`Error::Bad`].
    pub async fn exec(
        &self,
        request: Request,
        accept: &[&str],
        options: CommandOptions,
    ) -> Result<Response> {
        let (_, done) = self
            .shared
            .update(|p, now| p.exec(request, accept, options, now));
        done.await.map_err(|_| closed())?
    }

    /// Installs the handler for untagged responses of `verb`.
    ///
    /// Handlers run on the driver task with the connection locked; they must
    /// not call back into the connection.
    pub fn set_handler(&self, verb: &str, handler: impl FnMut(&Response) + Send + 'static) {
        self.shared.update(|p, _| p.set_handler(verb, handler));
    }

    /// Installs the callback for fatal connection errors.
    pub fn on_error(&self, callback: impl FnMut(&Error) + Send + 'static) {
        self.shared.update(|p, _| p.on_error(callback));
    }

    /// Installs the listener for mailbox selection changes.
    pub fn on_mailbox_event(&self, listener: impl FnMut(&MailboxEvent) + Send + 'static) {
        self.shared.update(|p, _| p.on_mailbox_event(listener));
    }

    /// See [`Protocol::get_previously_queued`].
    #[must_use]
    pub fn get_previously_queued(&self, verbs: &[&str], ctx: Option<CommandId>) -> Option<Request> {
        self.shared
            .inspect(|p| p.get_previously_queued(verbs, ctx).cloned())
    }

    /// Writes raw bytes, bypassing the queue.
    pub fn send(&self, data: impl Into<bytes::Bytes>) {
        let data = data.into();
        self.shared.update(|p, now| p.send(data, now));
    }

    /// Returns the connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.inspect(|p| p.state().clone())
    }

    /// Returns the server capabilities.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.shared.inspect(|p| p.capabilities().clone())
    }

    /// Replaces the server capabilities.
    pub fn set_capabilities(&self, capabilities: Capabilities) {
        self.shared.update(|p, _| p.set_capabilities(capabilities));
    }

    /// Returns `true` once the connection has been torn down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.inspect(Protocol::is_closed)
    }

    /// Starts the IDLE/NOOP keep-alive now.
    pub fn enter_idle(&self) {
        self.shared.update(|p, now| p.enter_idle(now));
    }

    /// Leaves the keep-alive.
    pub fn break_idle(&self) {
        self.shared.update(|p, now| p.break_idle(now));
    }

    /// Issues STARTTLS and wraps the socket in TLS.
    pub async fn upgrade(&self) -> Result<()> {
        self.exec(Request::new("STARTTLS"), &[], CommandOptions::new())
            .await?;
        self.transition(Control::Upgrade).await?;
        debug!("connection upgraded to TLS");
        Ok(())
    }

    /// Issues COMPRESS DEFLATE and compresses the stream from then on.
    pub async fn enable_compression(&self) -> Result<()> {
        let request = Request::new("COMPRESS").attribute(Attribute::atom("DEFLATE"));
        self.exec(request, &[], CommandOptions::new()).await?;
        self.transition(Control::Compress).await?;
        debug!("compression enabled");
        Ok(())
    }

    async fn transition(
        &self,
        control: impl FnOnce(oneshot::Sender<Result<()>>) -> Control,
    ) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.control.send(control(tx)).map_err(|_| closed())?;
        rx.await.map_err(|_| closed())?
    }

    /// Sends LOGOUT and closes the connection.
    pub async fn logout(&self) -> Result<()> {
        let (_, done) = self.shared.update(|p, now| {
            let queued = p.exec(Request::new("LOGOUT"), &[], CommandOptions::new(), now);
            p.set_state(ConnectionState::Logout);
            queued
        });
        let result = match done.await {
            // The server may hang up before the tagged OK.
            Ok(Err(Error::ConnectionClosed(_))) | Err(_) => Ok(()),
            Ok(result) => result.map(|_| ()),
        };
        self.close();
        result
    }

    /// Closes the connection. Pending commands fail with
    /// [`Error::ConnectionClosed`].
    pub fn close(&self) {
        self.shared.update(|p, _| p.close(None));
        let _ = self.control.send(Control::Close);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("protocol", &*self.shared.lock())
            .finish()
    }
}

/// The task that owns the socket.
struct Driver {
    shared: Arc<Shared>,
    stream: Option<ImapStream>,
    decoder: FrameDecoder,
    control: mpsc::UnboundedReceiver<Control>,
    codec: Option<Box<dyn CompressionStrategy>>,
    codec_tx: mpsc::UnboundedSender<CodecOutput>,
    codec_rx: mpsc::UnboundedReceiver<CodecOutput>,
    host: String,
    compression: CompressionMode,
}

impl Driver {
    async fn run(mut self) {
        let result = self.drive().await;
        if let Err(err) = &result {
            debug!(error = %err, "driver failed");
        }
        self.shared.update(|p, _| p.close(result.err()));
        // Dropping the codec stops a worker thread.
        self.codec = None;
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        trace!("driver stopped");
    }

    async fn drive(&mut self) -> Result<()> {
        let mut buf = vec![0u8; DEFAULT_BUFFER_SIZE];
        loop {
            self.flush().await?;
            let (deadline, paused, closed) = self
                .shared
                .inspect(|p| (p.poll_timeout(), p.is_paused(), p.is_closed()));
            if closed {
                return Ok(());
            }
            let Some(stream) = self.stream.as_mut() else {
                return Err(Error::InvalidState("connection has no stream".to_string()));
            };

            tokio::select! {
                control = self.control.recv() => match control {
                    Some(control) => self.handle_control(control).await?,
                    None => return Ok(()),
                },
                () = self.shared.wake.notified() => {}
                read = stream.read(&mut buf), if !paused => {
                    let n = read?;
                    if n == 0 {
                        return self.handle_eof();
                    }
                    trace!(bytes = n, "read");
                    self.handle_bytes(&buf[..n])?;
                }
                Some(output) = self.codec_rx.recv() => self.handle_codec_output(output).await?,
                () = sleep_until_deadline(deadline) => {
                    self.shared.update(|p, now| p.handle_timeout(now));
                }
            }
        }
    }

    /// Writes (or hands to the deflater) everything the protocol queued.
    async fn flush(&mut self) -> Result<()> {
        loop {
            let transmit = self.shared.lock().poll_transmit();
            let Some(transmit) = transmit else {
                return Ok(());
            };
            match self.codec.as_mut() {
                Some(codec) => codec.deflate(transmit.data)?,
                None => self.write(&transmit.data).await?,
            }
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::InvalidState("connection has no stream".to_string()))?;
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    fn handle_bytes(&mut self, chunk: &[u8]) -> Result<()> {
        match self.codec.as_mut() {
            Some(codec) => codec.inflate(bytes::Bytes::copy_from_slice(chunk)),
            None => self.handle_plain(chunk),
        }
    }

    /// Decodes plaintext and feeds every frame to the protocol, stopping
    /// early if the protocol pauses for a transport change.
    fn handle_plain(&mut self, chunk: &[u8]) -> Result<()> {
        let decoder = &mut self.decoder;
        decoder.push(chunk);
        self.shared.update(|protocol, now| {
            protocol.handle_inbound(now);
            while !protocol.is_paused() && !protocol.is_closed() {
                match decoder.next_frame()? {
                    Some(frame) => protocol.handle_frame(&frame, now),
                    None => break,
                }
            }
            Ok(())
        })
    }

    async fn handle_codec_output(&mut self, output: CodecOutput) -> Result<()> {
        match output {
            CodecOutput::InflatedReady(data) => self.handle_plain(&data),
            CodecOutput::DeflatedReady(data) => self.write(&data).await,
            CodecOutput::Failed(err) => Err(err),
        }
    }

    fn handle_eof(&self) -> Result<()> {
        if self.shared.inspect(|p| p.state() == &ConnectionState::Logout) {
            debug!("server closed the connection after logout");
            return Ok(());
        }
        Err(Error::ConnectionClosed(
            "server closed the connection".to_string(),
        ))
    }

    async fn handle_control(&mut self, control: Control) -> Result<()> {
        match control {
            Control::Close => {
                self.shared.update(|p, _| p.close(None));
                Ok(())
            }
            Control::Upgrade(ack) => {
                let result = self.upgrade().await;
                let _ = ack.send(result.clone());
                result
            }
            Control::Compress(ack) => {
                let result = self.start_compression();
                let _ = ack.send(result.clone());
                result
            }
        }
    }

    async fn upgrade(&mut self) -> Result<()> {
        let leftover = self.decoder.take_buffered();
        if !leftover.is_empty() {
            warn!(bytes = leftover.len(), "discarding plaintext received before TLS");
        }
        let stream = self
            .stream
            .take()
            .ok_or_else(|| Error::InvalidState("connection has no stream".to_string()))?;
        self.stream = Some(stream.upgrade_to_tls(&self.host).await?);
        self.shared.update(|p, now| p.resume(now));
        Ok(())
    }

    fn start_compression(&mut self) -> Result<()> {
        if self.codec.is_some() {
            return Err(Error::InvalidState(
                "compression is already active".to_string(),
            ));
        }
        let mut codec = compress::strategy(self.compression, self.codec_tx.clone())?;
        // Anything after the COMPRESS response is already deflated.
        let leftover = self.decoder.take_buffered();
        if !leftover.is_empty() {
            codec.inflate(leftover)?;
        }
        self.codec = Some(codec);
        debug!(mode = ?self.compression, "deflate stream started");
        self.shared.update(|p, now| p.resume(now));
        Ok(())
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}
