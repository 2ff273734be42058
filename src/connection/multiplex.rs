//! Demultiplexing of pipelined responses on a shared connection.
//!
//! Many dispatchers write requests to one socket; a single reader task pulls
//! response frames off it. The [`Multiplexer`] is the rendezvous between the
//! two sides: dispatchers register a single-shot waiter slot under their
//! correlation ID, the reader fulfills the slot when the matching frame
//! arrives.
//!
//! The whole structure is a one-way latch. The first read failure, framing
//! failure or explicit close transitions it to a terminal state that cancels
//! every pending waiter, rejects all future registrations and keeps returning
//! the very first error forever.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::protocol::frame::{read_response_frame, FrameError, MAX_FRAME_SIZE};

/// First correlation ID handed out on a fresh connection.
///
/// The counter wraps back here after reaching `i32::MAX - 1`. Correlation IDs
/// only need to be unique among in-flight requests, which are bounded by the
/// number of concurrent callers, so a wrap cannot collide in practice. The
/// conflict check in [`Multiplexer::register`] stays anyway.
const FIRST_CORRELATION_ID: i32 = 1;

/// The sticky error of a dead connection.
///
/// Cloned into every pending and future caller once the terminal transition
/// happened.
#[derive(Debug, Error, Clone)]
pub enum TerminalError {
    /// The connection was shut down deliberately.
    #[error("Connection is closed")]
    Closed,

    /// The read side of the connection failed.
    #[error("Cannot read response frame: {0}")]
    ReadFrame(Arc<FrameError>),
}

#[derive(Debug, Error)]
pub(crate) enum RegisterError {
    #[error(transparent)]
    Terminal(#[from] TerminalError),

    #[error("Correlation ID {0} is already in flight")]
    Conflict(i32),
}

#[derive(Debug)]
struct State {
    /// The next correlation ID to hand out.
    next_correlation_id: i32,

    /// Waiter slots of in-flight requests, keyed by correlation ID.
    waiters: HashMap<i32, oneshot::Sender<Bytes>>,

    /// Set exactly once; `Some` means no new IDs, no new waiters.
    terminal: Option<TerminalError>,
}

#[derive(Debug)]
pub(crate) struct Multiplexer {
    state: Mutex<State>,
}

impl Multiplexer {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_correlation_id: FIRST_CORRELATION_ID,
                waiters: HashMap::new(),
                terminal: None,
            }),
        }
    }

    /// Hand out the next correlation ID.
    ///
    /// IDs are issued strictly in order across all callers. Fails once the
    /// connection is terminal.
    pub(crate) fn issue_id(&self) -> Result<i32, TerminalError> {
        let mut state = self.state.lock();
        if let Some(error) = &state.terminal {
            return Err(error.clone());
        }

        let id = state.next_correlation_id;
        state.next_correlation_id = id
            .checked_add(1)
            .filter(|&next| next < i32::MAX)
            .unwrap_or(FIRST_CORRELATION_ID);
        Ok(id)
    }

    /// Register a waiter slot for `correlation_id`.
    ///
    /// The returned receiver yields the response payload, or closes without a
    /// value when the connection goes terminal first.
    pub(crate) fn register(
        &self,
        correlation_id: i32,
    ) -> Result<oneshot::Receiver<Bytes>, RegisterError> {
        use std::collections::hash_map::Entry;

        let mut state = self.state.lock();
        if let Some(error) = &state.terminal {
            return Err(error.clone().into());
        }

        match state.waiters.entry(correlation_id) {
            Entry::Occupied(_) => Err(RegisterError::Conflict(correlation_id)),
            Entry::Vacant(slot) => {
                let (tx, rx) = oneshot::channel();
                slot.insert(tx);
                Ok(rx)
            }
        }
    }

    /// Remove a waiter without delivering anything.
    ///
    /// Used by the write path after a failed write. Tolerates IDs that are no
    /// longer present, e.g. because a concurrent terminal transition already
    /// swept them.
    pub(crate) fn release(&self, correlation_id: i32) {
        self.state.lock().waiters.remove(&correlation_id);
    }

    /// Fulfill the waiter registered under `correlation_id` with `payload`.
    ///
    /// A response for an ID nobody waits on is logged and dropped.
    pub(crate) fn deliver(&self, correlation_id: i32, payload: Bytes) {
        let waiter = self.state.lock().waiters.remove(&correlation_id);

        match waiter {
            Some(tx) => {
                if tx.send(payload).is_err() {
                    debug!(correlation_id, "waiter gone before response delivery");
                }
            }
            None => {
                warn!(correlation_id, "got response for unknown request");
            }
        }
    }

    /// Terminal transition: record `error` and cancel every pending waiter.
    ///
    /// Idempotent; only the first caller sets the error, later calls merely
    /// sweep whatever waiters remain (there should be none).
    pub(crate) fn drain(&self, error: TerminalError) {
        let waiters = {
            let mut state = self.state.lock();
            if state.terminal.is_none() {
                state.terminal = Some(error);
            }
            std::mem::take(&mut state.waiters)
        };

        // dropping the senders outside the lock cancels the receivers
        drop(waiters);
    }

    /// The sticky error of this connection.
    ///
    /// Falls back to [`TerminalError::Closed`] for the race where a waiter was
    /// cancelled but the latch is not yet observable.
    pub(crate) fn terminal_error(&self) -> TerminalError {
        self.state
            .lock()
            .terminal
            .clone()
            .unwrap_or(TerminalError::Closed)
    }

    #[cfg(test)]
    pub(crate) fn waiter_count(&self) -> usize {
        self.state.lock().waiters.len()
    }
}

/// Read frames until the connection dies, routing each payload to its waiter.
///
/// Exactly one reader loop runs per connection. Any read or framing error is
/// terminal: the registry is drained and the task exits.
pub(crate) async fn run_reader<R>(
    mut reader: R,
    multiplexer: Arc<Multiplexer>,
    read_timeout: Option<Duration>,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let frame = match read_timeout {
            Some(timeout) => {
                match tokio::time::timeout(timeout, read_response_frame(&mut reader, MAX_FRAME_SIZE))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(FrameError::IO(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "read deadline exceeded",
                    ))),
                }
            }
            None => read_response_frame(&mut reader, MAX_FRAME_SIZE).await,
        };

        match frame {
            Ok(frame) => {
                multiplexer.deliver(frame.correlation_id, frame.payload);
            }
            Err(error) => {
                debug!(%error, "read side failed, cancelling all pending requests");
                multiplexer.drain(TerminalError::ReadFrame(Arc::new(error)));
                return;
            }
        }
    }
}
