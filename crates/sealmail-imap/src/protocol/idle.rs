//! IDLE / NOOP keep-alive.
//!
//! Once the queue has been quiet for the enter-idle delay, the connection
//! either issues IDLE (RFC 2177) and renews it with DONE every idle timeout,
//! or, without the IDLE capability, sends a NOOP every noop timeout. Any
//! command sent through `exec` leaves idle first.

use bytes::Bytes;
use tokio::time::Instant;
use tracing::debug;

use super::{CommandId, CommandOptions, Protocol};
use crate::types::Request;

const DONE: &[u8] = b"DONE\r\n";

/// How the connection keeps itself alive while nothing is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleMode {
    /// An IDLE command is running.
    Idle,
    /// Periodic NOOPs.
    Noop,
}

/// Keep-alive bookkeeping.
#[derive(Debug, Default)]
pub struct IdleKeepAlive {
    entered: Option<IdleMode>,
    deadline: Option<Instant>,
    /// The IDLE command, for as long as it is queued or running.
    command: Option<CommandId>,
    /// The server acknowledged IDLE with a continuation.
    acknowledged: bool,
}

impl IdleKeepAlive {
    /// Current keep-alive mode, if any.
    #[must_use]
    pub const fn mode(&self) -> Option<IdleMode> {
        self.entered
    }

    /// When the running IDLE is renewed or the next NOOP goes out.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` while the server holds an acknowledged IDLE open.
    #[must_use]
    pub fn is_idling(&self) -> bool {
        self.entered == Some(IdleMode::Idle) && self.acknowledged
    }

    pub(super) fn acknowledge(&mut self) {
        self.acknowledged = true;
    }

    pub(super) fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Protocol {
    /// Starts the keep-alive: IDLE when the server supports it, NOOP polling
    /// otherwise. Does nothing if already entered.
    pub fn enter_idle(&mut self, now: Instant) {
        if self.idle.entered.is_some() || self.closed {
            return;
        }
        let mode = if self.capabilities.has("IDLE") {
            IdleMode::Idle
        } else {
            IdleMode::Noop
        };
        debug!(?mode, "entering idle");
        self.idle.entered = Some(mode);
        match mode {
            IdleMode::Idle => {
                self.idle.deadline = Some(now + self.timeouts.idle);
                let id = self.push_command(
                    Request::new("IDLE"),
                    &[],
                    CommandOptions::default(),
                    None,
                    now,
                );
                self.idle.command = Some(id);
            }
            IdleMode::Noop => self.idle.deadline = Some(now + self.timeouts.noop),
        }
    }

    /// Leaves the keep-alive, writing DONE if an IDLE is running.
    pub fn break_idle(&mut self, now: Instant) {
        let Some(mode) = self.idle.entered.take() else {
            return;
        };
        self.idle.deadline = None;
        self.idle.acknowledged = false;
        if mode != IdleMode::Idle {
            return;
        }
        // An IDLE that never left the queue is just dropped.
        if let Some(id) = self.idle.command.take() {
            if self.queue.remove(id).is_some() {
                debug!("dropped queued IDLE");
                return;
            }
        }
        debug!("leaving idle");
        self.send(Bytes::from_static(DONE), now);
    }

    /// Called when the IDLE command completes.
    pub(super) fn idle_finished(&mut self) {
        if self.idle.entered == Some(IdleMode::Idle) {
            self.idle.reset();
        } else {
            self.idle.command = None;
            self.idle.acknowledged = false;
        }
    }

    pub(super) fn handle_idle_timeout(&mut self, now: Instant) {
        if !self.idle.deadline.is_some_and(|deadline| deadline <= now) {
            return;
        }
        match self.idle.entered {
            Some(IdleMode::Idle) => self.break_idle(now),
            Some(IdleMode::Noop) => {
                self.break_idle(now);
                self.push_command(
                    Request::new("NOOP"),
                    &[],
                    CommandOptions::default(),
                    None,
                    now,
                );
            }
            None => self.idle.deadline = None,
        }
    }
}
