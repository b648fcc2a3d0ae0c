//! Sans-I/O IMAP protocol state machine.
//!
//! [`Protocol`] owns the command queue, the connection state, the server
//! capabilities and every timer, but performs no I/O:
//!
//! - Decoded frames go in through `handle_frame()`
//! - Bytes to send come out of `poll_transmit()`
//! - The next deadline is reported by `poll_timeout()`
//! - Expired deadlines are processed by `handle_timeout()`
//! - Prechecks that must run before a command are drained with
//!   `take_prechecks()` and reported back with `finish_precheck()`
//!
//! At most one command is in flight. Each command resolves exactly once
//! through the oneshot receiver returned by `enqueue()`.
//!
//! # Example
//!
//! ```
//! use sealmail_imap::connection::Timeouts;
//! use sealmail_imap::protocol::{CommandOptions, ConnectionState, Protocol};
//! use sealmail_imap::types::Request;
//! use tokio::time::Instant;
//!
//! let now = Instant::now();
//! let mut protocol = Protocol::new(Timeouts::default());
//! protocol.handle_frame(b"* OK IMAP4rev1 ready", now);
//! assert_eq!(protocol.state(), &ConnectionState::NotAuthenticated);
//!
//! let (_id, mut done) =
//!     protocol.enqueue(Request::new("NOOP"), &[], CommandOptions::default(), now);
//! assert_eq!(protocol.poll_transmit().unwrap().as_str(), Some("W1 NOOP\r\n"));
//!
//! protocol.handle_frame(b"W1 OK NOOP completed", now);
//! assert!(done.try_recv().unwrap().is_ok());
//! ```

#![allow(clippy::missing_const_for_fn)]

mod idle;
mod queue;
mod state;
mod transmit;

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error, trace, warn};

pub use idle::{IdleKeepAlive, IdleMode};
pub use queue::{CommandId, CommandQueue};
pub use state::{ConnectionState, SelectedState};
pub use transmit::Transmit;

use crate::command::{TagGenerator, compile, redacted};
use crate::connection::Timeouts;
use crate::parser::{ParseOptions, parse};
use crate::types::{Capabilities, Request, Response};
use crate::{Error, Result};

const CRLF: &[u8] = b"\r\n";

/// Inbound chunk size the socket watchdog is refreshed for.
const READ_BUDGET_BYTES: u32 = 4096;

/// Future returned by a precheck.
pub type PrecheckFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// Work that must succeed before a queued command is sent.
///
/// It receives the id of the command it guards, so it can splice its own
/// commands in front of it (see [`CommandOptions::ctx`]).
pub type Precheck = Box<dyn FnOnce(CommandId) -> PrecheckFuture + Send>;

/// Receiver of a command's completion.
pub type CommandReceiver = oneshot::Receiver<Result<Response>>;

type Responder = oneshot::Sender<Result<Response>>;
type UntaggedHandler = Box<dyn FnMut(&Response) + Send>;
type ErrorCallback = Box<dyn FnMut(&Error) + Send>;
type MailboxListener = Box<dyn FnMut(&MailboxEvent) + Send>;

/// Mailbox selection changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailboxEvent {
    /// A mailbox was opened.
    Selected {
        /// Mailbox path.
        mailbox: String,
        /// Opened with EXAMINE or reported `READ-ONLY`.
        read_only: bool,
    },
    /// The previously selected mailbox was closed.
    Closed {
        /// Mailbox path.
        mailbox: String,
    },
}

/// Per-command queueing options.
#[derive(Default)]
pub struct CommandOptions {
    ctx: Option<CommandId>,
    precheck: Option<Precheck>,
    error_response_expects_empty_line: bool,
}

impl CommandOptions {
    /// Default options: append to the queue, no precheck.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends this command right before `ctx` if it is still queued.
    #[must_use]
    pub fn ctx(mut self, ctx: CommandId) -> Self {
        self.ctx = Some(ctx);
        self
    }

    /// Runs `precheck` before the command is sent.
    #[must_use]
    pub fn precheck(mut self, precheck: Precheck) -> Self {
        self.precheck = Some(precheck);
        self
    }

    /// Answers a continuation that carries an error (XOAUTH2) with an
    /// empty line, so the server can send the tagged NO.
    #[must_use]
    pub fn error_response_expects_empty_line(mut self) -> Self {
        self.error_response_expects_empty_line = true;
        self
    }
}

impl fmt::Debug for CommandOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandOptions")
            .field("ctx", &self.ctx)
            .field("precheck", &self.precheck.is_some())
            .field(
                "error_response_expects_empty_line",
                &self.error_response_expects_empty_line,
            )
            .finish()
    }
}

/// A command waiting in the queue or in flight.
struct QueuedCommand {
    tag: String,
    request: Request,
    /// Untagged responses collected for this command, keyed by verb.
    payload: HashMap<String, Vec<Response>>,
    responder: Option<Responder>,
    precheck: Option<Precheck>,
    error_response_expects_empty_line: bool,
    /// Chunks still waiting for a continuation.
    chunks: VecDeque<Vec<u8>>,
}

impl QueuedCommand {
    fn resolve(&mut self, result: Result<Response>) {
        if let Some(responder) = self.responder.take() {
            // The caller may have stopped waiting.
            let _ = responder.send(result);
        }
    }
}

/// Sans-I/O IMAP connection state machine.
pub struct Protocol {
    state: ConnectionState,
    tags: TagGenerator,
    capabilities: Capabilities,
    queue: CommandQueue<QueuedCommand>,
    current: Option<QueuedCommand>,
    next_id: u64,
    /// Nothing in flight and the greeting has arrived.
    can_send: bool,
    /// Head command whose precheck is running.
    awaiting_precheck: Option<CommandId>,
    prechecks: Vec<(CommandId, Precheck)>,
    /// Sending is suspended until the transport finished STARTTLS/COMPRESS.
    paused: bool,
    closed: bool,
    greeted: bool,
    greeting: Option<oneshot::Sender<Result<()>>>,
    outbound: VecDeque<Transmit>,
    handlers: HashMap<String, UntaggedHandler>,
    on_error: Option<ErrorCallback>,
    on_mailbox: Option<MailboxListener>,
    timeouts: Timeouts,
    enter_idle_at: Option<Instant>,
    socket_deadline: Option<(Instant, Duration)>,
    idle: IdleKeepAlive,
}

impl Default for Protocol {
    fn default() -> Self {
        Self::new(Timeouts::default())
    }
}

impl Protocol {
    /// Creates a protocol waiting for the server greeting.
    #[must_use]
    pub fn new(timeouts: Timeouts) -> Self {
        Self {
            state: ConnectionState::Connecting,
            tags: TagGenerator::default(),
            capabilities: Capabilities::new(),
            queue: CommandQueue::new(),
            current: None,
            next_id: 0,
            can_send: false,
            awaiting_precheck: None,
            prechecks: Vec::new(),
            paused: false,
            closed: false,
            greeted: false,
            greeting: None,
            outbound: VecDeque::new(),
            handlers: HashMap::new(),
            on_error: None,
            on_mailbox: None,
            timeouts,
            enter_idle_at: None,
            socket_deadline: None,
            idle: IdleKeepAlive::default(),
        }
    }

    /// Returns the connection state.
    #[must_use]
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Returns the server capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Replaces the server capabilities.
    pub fn set_capabilities(&mut self, capabilities: Capabilities) {
        self.capabilities = capabilities;
    }

    /// Returns the keep-alive state.
    #[must_use]
    pub fn idle(&self) -> &IdleKeepAlive {
        &self.idle
    }

    /// Returns `true` once the connection has been torn down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns `true` while sending waits for a transport transition.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Number of commands waiting to be sent.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Tag of the command in flight.
    #[must_use]
    pub fn in_flight(&self) -> Option<&str> {
        self.current.as_ref().map(|c| c.tag.as_str())
    }

    /// Returns a receiver resolved by the server greeting.
    ///
    /// Resolves with an error if the greeting is `BYE` or the connection
    /// closes first.
    pub fn wait_for_greeting(&mut self) -> oneshot::Receiver<Result<()>> {
        let (tx, rx) = oneshot::channel();
        if self.greeted {
            let _ = tx.send(Ok(()));
        } else if self.closed {
            let _ = tx.send(Err(Error::ConnectionClosed(
                "closed before greeting".to_string(),
            )));
        } else {
            self.greeting = Some(tx);
        }
        rx
    }

    /// Installs the handler for untagged responses of `verb`.
    pub fn set_handler(&mut self, verb: &str, handler: impl FnMut(&Response) + Send + 'static) {
        self.handlers.insert(verb.to_uppercase(), Box::new(handler));
    }

    /// Removes the handler for `verb`.
    pub fn remove_handler(&mut self, verb: &str) {
        self.handlers.remove(&verb.to_uppercase());
    }

    /// Installs the callback for fatal connection errors.
    pub fn on_error(&mut self, callback: impl FnMut(&Error) + Send + 'static) {
        self.on_error = Some(Box::new(callback));
    }

    /// Installs the listener for mailbox selection changes.
    pub fn on_mailbox_event(&mut self, listener: impl FnMut(&MailboxEvent) + Send + 'static) {
        self.on_mailbox = Some(Box::new(listener));
    }

    /// Queues a command.
    ///
    /// `accept` lists the untagged verbs collected into the command's payload
    /// instead of going to the global handlers. The command is sent as soon
    /// as nothing else is in flight.
    pub fn enqueue(
        &mut self,
        request: Request,
        accept: &[&str],
        options: CommandOptions,
        now: Instant,
    ) -> (CommandId, CommandReceiver) {
        let (tx, rx) = oneshot::channel();
        let id = self.push_command(request, accept, options, Some(tx), now);
        (id, rx)
    }

    /// Leaves idle, then queues a command.
    pub fn exec(
        &mut self,
        request: Request,
        accept: &[&str],
        options: CommandOptions,
        now: Instant,
    ) -> (CommandId, CommandReceiver) {
        self.break_idle(now);
        self.enqueue(request, accept, options, now)
    }

    fn push_command(
        &mut self,
        request: Request,
        accept: &[&str],
        options: CommandOptions,
        responder: Option<Responder>,
        now: Instant,
    ) -> CommandId {
        self.next_id += 1;
        let id = CommandId(self.next_id);
        let mut command = QueuedCommand {
            tag: self.tags.next(),
            payload: accept
                .iter()
                .map(|verb| (verb.to_uppercase(), Vec::new()))
                .collect(),
            request,
            responder,
            precheck: options.precheck,
            error_response_expects_empty_line: options.error_response_expects_empty_line,
            chunks: VecDeque::new(),
        };

        if self.closed {
            command.resolve(Err(Error::ConnectionClosed(
                "connection is closed".to_string(),
            )));
            return id;
        }

        match options.ctx.filter(|ctx| self.queue.contains(*ctx)) {
            Some(ctx) => {
                command.tag.push_str(".p");
                if let Some(target) = self.queue.get_mut(ctx) {
                    if !target.tag.ends_with(".p") {
                        target.tag.push_str(".p");
                    }
                }
                trace!(id = %id, before = %ctx, tag = %command.tag, "command spliced");
                if let Err(command) = self.queue.insert_before(ctx, id, command) {
                    self.queue.push_back(id, command);
                }
            }
            None => {
                trace!(id = %id, tag = %command.tag, "command queued");
                self.queue.push_back(id, command);
            }
        }

        self.send_next(now);
        id
    }

    /// Finds the most recent queued command before `ctx` (or the last queued
    /// one) whose verb is in `verbs`, falling back to the command in flight.
    #[must_use]
    pub fn get_previously_queued(&self, verbs: &[&str], ctx: Option<CommandId>) -> Option<&Request> {
        let matches = |request: &&Request| {
            let verb = request.verb();
            verbs.iter().any(|v| v.eq_ignore_ascii_case(&verb))
        };
        self.queue
            .iter_back_from(ctx)
            .map(|(_, command)| &command.request)
            .find(matches)
            .or_else(|| self.current.as_ref().map(|c| &c.request).filter(matches))
    }

    /// Queues raw bytes for the transport and arms the socket watchdog.
    pub fn send(&mut self, data: impl Into<Bytes>, now: Instant) {
        if self.closed {
            return;
        }
        let data: Bytes = data.into();
        let len = u32::try_from(data.len()).unwrap_or(u32::MAX);
        let budget = self.timeouts.socket_lower_bound + self.timeouts.socket_multiplier.saturating_mul(len);
        self.socket_deadline = Some((now + budget, budget));
        trace!(bytes = data.len(), "C: queued for transmit");
        self.outbound.push_back(Transmit::new(data));
    }

    /// Returns the next bytes to write, if any.
    pub fn poll_transmit(&mut self) -> Option<Transmit> {
        self.outbound.pop_front()
    }

    /// Removes the prechecks the driver has to run.
    pub fn take_prechecks(&mut self) -> Vec<(CommandId, Precheck)> {
        std::mem::take(&mut self.prechecks)
    }

    /// Reports the outcome of a precheck.
    ///
    /// On success the guarded command is sent next. On failure it is removed
    /// from the queue and failed, and the queue moves on.
    pub fn finish_precheck(&mut self, id: CommandId, result: Result<()>, now: Instant) {
        if self.awaiting_precheck == Some(id) {
            self.awaiting_precheck = None;
        }
        if let Err(err) = result {
            if let Some(mut command) = self.queue.remove(id) {
                let verb = command.request.verb();
                warn!(tag = %command.tag, command = %verb, error = %err, "precheck failed");
                command.resolve(Err(Error::PrecheckFailed {
                    command: verb,
                    source: Box::new(err),
                }));
            }
            if self.current.is_none() && self.greeted {
                self.can_send = true;
            }
        }
        self.send_next(now);
    }

    /// Resumes sending after the transport finished STARTTLS or COMPRESS.
    pub fn resume(&mut self, now: Instant) {
        if !self.paused {
            return;
        }
        debug!("resuming after transport change");
        self.paused = false;
        self.send_next(now);
    }

    /// Refreshes the socket watchdog for an inbound chunk.
    ///
    /// While a response is awaited the deadline moves forward; while idling
    /// or with nothing in flight it is cleared.
    pub fn handle_inbound(&mut self, now: Instant) {
        let awaiting = self.current.is_some() && !self.idle.is_idling();
        self.socket_deadline = awaiting.then(|| {
            let budget = self.timeouts.socket_lower_bound
                + self.timeouts.socket_multiplier.saturating_mul(READ_BUDGET_BYTES);
            (now + budget, budget)
        });
    }

    /// Processes one decoded frame.
    pub fn handle_frame(&mut self, frame: &[u8], now: Instant) {
        if self.closed {
            return;
        }
        trace!(frame = %String::from_utf8_lossy(frame), "S:");

        if frame.first() == Some(&b'+') {
            self.handle_continuation(now);
            return;
        }

        let options = ParseOptions {
            value_as_string: self
                .current
                .as_ref()
                .is_none_or(|c| c.request.value_as_string),
        };
        match parse(frame, options) {
            Ok(response) => self.handle_response(response, now),
            Err(err) => self.close(Some(err)),
        }
    }

    fn handle_continuation(&mut self, now: Instant) {
        let Some(current) = self.current.as_mut() else {
            warn!("continuation with no command in flight");
            return;
        };
        if let Some(mut chunk) = current.chunks.pop_front() {
            if current.chunks.is_empty() {
                chunk.extend_from_slice(CRLF);
            }
            self.send(chunk, now);
        } else if current.error_response_expects_empty_line {
            self.send(Bytes::from_static(CRLF), now);
        } else if current.request.verb() == "IDLE" {
            // After DONE the watchdog stays armed for the tagged reply.
            if self.idle.mode() == Some(IdleMode::Idle) {
                debug!("server accepted IDLE");
                self.idle.acknowledge();
                self.socket_deadline = None;
            } else {
                trace!("IDLE accepted after DONE");
            }
        } else {
            trace!("continuation ignored");
        }
    }

    fn handle_response(&mut self, response: Response, now: Instant) {
        if let Some(listing) = response.capability_listing() {
            self.capabilities.replace(listing);
            debug!(capabilities = %self.capabilities, "capabilities updated");
        } else if let Some(listing) = &response.capability {
            self.capabilities.replace(listing);
            debug!(capabilities = %self.capabilities, "capabilities updated");
        }

        if !self.greeted {
            self.handle_greeting(&response, now);
            return;
        }

        if response.is_untagged() {
            let accepted = self
                .current
                .as_mut()
                .and_then(|c| c.payload.get_mut(&response.command));
            if let Some(collected) = accepted {
                collected.push(response);
                return;
            }
            let handled = self.dispatch_untagged(&response);
            if self.current.is_none() {
                self.can_send = true;
                self.send_next(now);
            } else if !handled {
                trace!(command = %response.command, "untagged response ignored");
            }
            return;
        }

        match self.current.take() {
            Some(command) if command.tag == response.tag => self.complete(command, response, now),
            current => {
                warn!(tag = %response.tag, "tagged response for unknown command");
                self.current = current;
                if self.current.is_none() {
                    self.can_send = true;
                    self.send_next(now);
                }
            }
        }
    }

    fn handle_greeting(&mut self, response: &Response, now: Instant) {
        self.greeted = true;
        let text = response.human_readable.clone().unwrap_or_default();
        match response.command.as_str() {
            "PREAUTH" => self.set_state(ConnectionState::Authenticated),
            "OK" => self.set_state(ConnectionState::NotAuthenticated),
            "BYE" => {
                self.close(Some(Error::Bye(text)));
                return;
            }
            other => {
                self.close(Some(Error::Protocol(format!("unexpected greeting {other}"))));
                return;
            }
        }
        debug!(greeting = %text, "server greeting");
        if let Some(greeting) = self.greeting.take() {
            let _ = greeting.send(Ok(()));
        }
        self.can_send = true;
        self.send_next(now);
    }

    fn dispatch_untagged(&mut self, response: &Response) -> bool {
        if response.command == "BYE" {
            warn!(text = ?response.human_readable, "server sent BYE");
        }
        match self.handlers.get_mut(&response.command) {
            Some(handler) => {
                handler(response);
                true
            }
            None => false,
        }
    }

    fn complete(&mut self, mut command: QueuedCommand, mut response: Response, now: Instant) {
        let verb = command.request.verb();
        debug!(
            tag = %command.tag,
            command = %verb,
            status = %response.command,
            "command completed"
        );
        self.apply_completion(&command.request, &verb, &response);

        response.payload = std::mem::take(&mut command.payload)
            .into_iter()
            .filter(|(_, responses)| !responses.is_empty())
            .collect();
        command.resolve(response.into_result());

        self.can_send = true;
        self.send_next(now);
    }

    /// State changes caused by a completed command.
    fn apply_completion(&mut self, request: &Request, verb: &str, response: &Response) {
        let ok = response.command == "OK";
        match verb {
            "LOGIN" | "AUTHENTICATE" if ok => self.set_state(ConnectionState::Authenticated),
            "SELECT" | "EXAMINE" if ok => {
                let read_only = verb == "EXAMINE" || response.code.as_deref() == Some("READ-ONLY");
                self.set_state(ConnectionState::Selected(SelectedState {
                    mailbox: request.first_string().unwrap_or_default().to_string(),
                    read_only,
                }));
            }
            // A failed SELECT leaves no mailbox selected.
            "SELECT" | "EXAMINE" if self.state.is_selected() => {
                self.set_state(ConnectionState::Authenticated);
            }
            "CLOSE" | "UNSELECT" if ok => self.set_state(ConnectionState::Authenticated),
            "STARTTLS" if ok => {
                self.capabilities.clear();
                self.paused = true;
            }
            "COMPRESS" if ok => self.paused = true,
            "IDLE" => self.idle_finished(),
            _ => {}
        }
    }

    fn send_next(&mut self, now: Instant) {
        if !self.can_send || self.paused || self.closed {
            return;
        }
        let Some(head) = self.queue.front_id() else {
            self.enter_idle_at = Some(now + self.timeouts.enter_idle);
            self.socket_deadline = None;
            return;
        };
        self.enter_idle_at = None;

        if self.awaiting_precheck == Some(head) {
            return;
        }
        if let Some(precheck) = self.queue.get_mut(head).and_then(|c| c.precheck.take()) {
            trace!(id = %head, "precheck scheduled");
            self.awaiting_precheck = Some(head);
            self.prechecks.push((head, precheck));
            return;
        }

        let Some(mut command) = self.queue.pop_front() else {
            return;
        };
        self.can_send = false;

        let mut chunks: VecDeque<Vec<u8>> = compile(&command.request, &command.tag).into();
        debug!(
            tag = %command.tag,
            command = %redacted(&command.request, &command.tag),
            "sending command"
        );
        if let Some(mut first) = chunks.pop_front() {
            if chunks.is_empty() {
                first.extend_from_slice(CRLF);
            }
            self.send(first, now);
        }
        command.chunks = chunks;
        self.current = Some(command);
    }

    /// Returns the earliest pending deadline.
    #[must_use]
    pub fn poll_timeout(&self) -> Option<Instant> {
        [
            self.enter_idle_at,
            self.idle.deadline(),
            self.socket_deadline.map(|(deadline, _)| deadline),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Processes every deadline that has passed.
    pub fn handle_timeout(&mut self, now: Instant) {
        if let Some((deadline, budget)) = self.socket_deadline {
            if deadline <= now {
                self.socket_deadline = None;
                self.close(Some(Error::Timeout(budget)));
                return;
            }
        }

        if self.enter_idle_at.is_some_and(|at| at <= now) {
            self.enter_idle_at = None;
            if self.state.is_authenticated() && !self.paused {
                self.enter_idle(now);
            }
        }

        self.handle_idle_timeout(now);
    }

    /// Changes the connection state, reporting mailbox changes.
    pub fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        debug!(from = ?self.state, to = ?state, "state transition");
        let previous = std::mem::replace(&mut self.state, state);
        if let ConnectionState::Selected(SelectedState { mailbox, .. }) = previous {
            self.emit_mailbox(&MailboxEvent::Closed { mailbox });
        }
        if let ConnectionState::Selected(selected) = &self.state {
            let event = MailboxEvent::Selected {
                mailbox: selected.mailbox.clone(),
                read_only: selected.read_only,
            };
            self.emit_mailbox(&event);
        }
    }

    fn emit_mailbox(&mut self, event: &MailboxEvent) {
        if let Some(listener) = self.on_mailbox.as_mut() {
            listener(event);
        }
    }

    /// Tears the connection down.
    ///
    /// Every queued and in-flight command fails with `error` (or
    /// [`Error::ConnectionClosed`] for a clean close), all timers and handlers
    /// are dropped and the state becomes `Logout`. Fatal errors are reported
    /// to the error callback. Calling it again does nothing.
    pub fn close(&mut self, error: Option<Error>) {
        if self.closed {
            return;
        }
        self.closed = true;
        let reason = error
            .clone()
            .unwrap_or_else(|| Error::ConnectionClosed("connection closed".to_string()));
        match &error {
            Some(err) => error!(error = %err, "connection failed"),
            None => debug!("closing connection"),
        }

        if let Some(mut command) = self.current.take() {
            command.resolve(Err(reason.clone()));
        }
        for mut command in self.queue.drain() {
            command.resolve(Err(reason.clone()));
        }
        if let Some(greeting) = self.greeting.take() {
            let _ = greeting.send(Err(reason));
        }

        self.prechecks.clear();
        self.awaiting_precheck = None;
        self.can_send = false;
        self.paused = false;
        self.outbound.clear();
        self.enter_idle_at = None;
        self.socket_deadline = None;
        self.idle.reset();
        self.handlers.clear();
        self.set_state(ConnectionState::Logout);

        if let Some(err) = error {
            if let Some(callback) = self.on_error.as_mut() {
                callback(&err);
            }
        }
    }
}

impl fmt::Debug for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Protocol")
            .field("state", &self.state)
            .field("capabilities", &self.capabilities)
            .field("queued", &self.queue.len())
            .field("in_flight", &self.in_flight())
            .field("paused", &self.paused)
            .field("closed", &self.closed)
            .field("idle", &self.idle.mode())
            .finish_non_exhaustive()
    }
}
