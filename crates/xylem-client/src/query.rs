//! Query handle: one query's execution and result iteration.

use std::cell::RefCell;
use std::fmt::{self, Display};
use std::rc::Rc;

use tracing::debug;

use xylem_wire::{BindRequest, CloseQueryRequest, ExecuteRequest, QueryId, Request, Response};

use crate::error::{ClientError, ClientResult};
use crate::session::SessionCore;

/// State of a [`Query`] handle.
///
/// ```text
/// Created ──run──▶ Running ──▶ Exhausted
///    │                │    └──▶ Failed
///    └──────── close (from any state) ──▶ Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    /// Registered on the server, not yet executed.
    Created,
    /// Accepted by the server; results are being streamed.
    Running,
    /// The result stream ended normally.
    Exhausted,
    /// The server rejected the query, reported a mid-stream failure, or
    /// the transport broke.
    Failed,
    /// The handle was closed. Terminal.
    Closed,
}

impl Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "Created",
            Self::Running => "Running",
            Self::Exhausted => "Exhausted",
            Self::Failed => "Failed",
            Self::Closed => "Closed",
        };
        f.write_str(name)
    }
}

/// Handle for one query opened on a [`crate::Session`].
///
/// The handle never touches the transport directly; every wire operation
/// goes through the owning session's serialized dispatch. Server-side
/// iterator resources exist from the moment the handle is created until
/// [`close`](Query::close) runs, so the handle closes itself on drop if
/// the caller abandons it.
#[derive(Debug)]
pub struct Query {
    core: Rc<RefCell<SessionCore>>,
    id: QueryId,
    state: QueryState,
    /// Outcome recorded by the first `run` call; repeats replay it.
    accepted: Option<bool>,
    /// Server diagnostic from a rejection or mid-stream failure.
    diagnostic: Option<String>,
    /// Item buffered by the last successful `more`, awaiting `next`.
    pending: Option<Vec<u8>>,
    /// The stream terminator was observed; nothing is left to read.
    end_seen: bool,
}

impl Query {
    pub(crate) fn new(core: Rc<RefCell<SessionCore>>, id: QueryId) -> Self {
        Self {
            core,
            id,
            state: QueryState::Created,
            accepted: None,
            diagnostic: None,
            pending: None,
            end_seen: false,
        }
    }

    /// The handle's query id.
    pub fn id(&self) -> QueryId {
        self.id
    }

    /// The handle's current state.
    pub fn state(&self) -> QueryState {
        self.state
    }

    /// Binds an external variable. Valid only before [`run`](Query::run).
    ///
    /// A server rejection (unknown variable, bad value) is returned as
    /// [`ClientError::Command`] and leaves the handle in `Created`.
    pub fn bind(&mut self, name: &str, value: &str) -> ClientResult<()> {
        self.check_session_open()?;
        if self.state != QueryState::Created {
            return Err(self.invalid("bind"));
        }

        let outcome = self.core.borrow_mut().exchange(&Request::Bind(BindRequest {
            id: self.id,
            name: name.to_string(),
            value: value.to_string(),
        }));

        match outcome {
            Ok(Response::Ok { .. }) => Ok(()),
            Ok(Response::Err { message }) => Err(ClientError::Command(message)),
            Ok(other) => {
                self.state = QueryState::Failed;
                Err(self.core.borrow_mut().unexpected("Ok or Err", &other))
            }
            Err(e) => {
                self.state = QueryState::Failed;
                Err(e)
            }
        }
    }

    /// Starts execution.
    ///
    /// Returns `true` when the server accepted the query (results may
    /// follow via [`more`](Query::more)), `false` when it rejected it; the
    /// diagnostic is then available via [`info`](Query::info). Calling
    /// `run` again is a no-op returning the recorded outcome. A handle
    /// that failed before execution ever started cannot be run at all;
    /// [`close`](Query::close) is its only valid operation.
    pub fn run(&mut self) -> ClientResult<bool> {
        self.check_session_open()?;
        if self.state == QueryState::Closed {
            return Err(self.invalid("run"));
        }
        if let Some(accepted) = self.accepted {
            return Ok(accepted);
        }
        if self.state != QueryState::Created {
            // Failed before execution ever started (a bind hit a transport
            // or protocol failure). The stream can no longer be trusted;
            // close is the only legal exit.
            return Err(self.invalid("run"));
        }

        let outcome = self
            .core
            .borrow_mut()
            .exchange(&Request::Execute(ExecuteRequest { id: self.id }));

        match outcome {
            Ok(Response::Ok { .. }) => {
                self.state = QueryState::Running;
                self.accepted = Some(true);
                debug!(query = %self.id, "query accepted");
                Ok(true)
            }
            Ok(Response::Err { message }) => {
                self.state = QueryState::Failed;
                self.accepted = Some(false);
                self.end_seen = true;
                debug!(query = %self.id, diagnostic = %message, "query rejected");
                self.diagnostic = Some(message);
                Ok(false)
            }
            Ok(other) => {
                self.state = QueryState::Failed;
                Err(self.core.borrow_mut().unexpected("Ok or Err", &other))
            }
            Err(e) => {
                self.state = QueryState::Failed;
                Err(e)
            }
        }
    }

    /// Blocks for the next stream frame.
    ///
    /// Returns `true` when an item is buffered for [`next`](Query::next),
    /// `false` once the server signalled end-of-stream (the handle is then
    /// `Exhausted`). Valid only while `Running`. A server failure
    /// mid-stream surfaces as [`ClientError::Command`]; a transport
    /// failure as [`ClientError::Transport`]. Both move the handle to
    /// `Failed`, and the session stays busy until [`close`](Query::close).
    pub fn more(&mut self) -> ClientResult<bool> {
        self.check_session_open()?;
        if self.state != QueryState::Running {
            return Err(self.invalid("more"));
        }

        // Whatever the previous step buffered is forfeit now.
        self.pending = None;

        if self.end_seen {
            self.state = QueryState::Exhausted;
            return Ok(false);
        }

        let outcome = self.core.borrow_mut().recv();
        match outcome {
            Ok(Response::Item { payload, has_more }) => {
                self.pending = Some(payload);
                if !has_more {
                    self.end_seen = true;
                }
                Ok(true)
            }
            Ok(Response::Ok { .. }) => {
                self.end_seen = true;
                self.state = QueryState::Exhausted;
                Ok(false)
            }
            Ok(Response::Err { message }) => {
                self.state = QueryState::Failed;
                self.end_seen = true;
                self.diagnostic = Some(message.clone());
                Err(ClientError::Command(message))
            }
            Err(e) => {
                self.state = QueryState::Failed;
                Err(e)
            }
        }
    }

    /// Returns the item buffered by the immediately preceding successful
    /// [`more`](Query::more).
    ///
    /// Without one, including a second `next` in the same iteration step,
    /// this fails with [`ClientError::InvalidState`], so an item can be
    /// neither skipped nor consumed twice.
    pub fn next(&mut self) -> ClientResult<Vec<u8>> {
        self.check_session_open()?;
        if self.state != QueryState::Running {
            return Err(self.invalid("next"));
        }

        self.pending.take().ok_or(ClientError::InvalidState {
            op: "next",
            state: self.state,
        })
    }

    /// Returns the diagnostic recorded for this query, or an empty string
    /// when there is none. Valid in any state except `Created`.
    pub fn info(&self) -> ClientResult<&str> {
        if self.state == QueryState::Created {
            return Err(self.invalid("info"));
        }
        Ok(self.diagnostic.as_deref().unwrap_or(""))
    }

    /// Closes the handle and releases its server-side resources.
    /// Idempotent; reachable from every state, including `Failed` and a
    /// partially consumed `Running` stream.
    ///
    /// An abandoned stream is drained first so the connection is
    /// frame-aligned for the next exchange; then the close notification is
    /// sent (skipped when the transport is already poisoned). Clearing the
    /// session's busy flag happens here and only here; an error during
    /// iteration does not release the session by itself.
    pub fn close(&mut self) {
        if self.state == QueryState::Closed {
            return;
        }

        {
            let mut core = self.core.borrow_mut();
            if !core.is_closed() {
                if self.state == QueryState::Running && !self.end_seen {
                    drain(&mut core);
                }
                if !core.is_poisoned() {
                    if let Err(e) = core.send(&Request::CloseQuery(CloseQueryRequest {
                        id: self.id,
                    })) {
                        tracing::warn!(query = %self.id, error = %e, "failed to send close notification");
                    }
                }
            }
            core.release();
        }

        self.state = QueryState::Closed;
        self.pending = None;
        debug!(query = %self.id, "query closed");
    }

    /// Fails with [`ClientError::Closed`] once the owning session is
    /// closed, transitioning the handle to `Closed` on the way.
    fn check_session_open(&mut self) -> ClientResult<()> {
        if self.core.borrow().is_closed() {
            self.state = QueryState::Closed;
            return Err(ClientError::Closed);
        }
        Ok(())
    }

    fn invalid(&self, op: &'static str) -> ClientError {
        ClientError::InvalidState {
            op,
            state: self.state,
        }
    }
}

impl Drop for Query {
    fn drop(&mut self) {
        self.close();
    }
}

/// Reads and discards stream frames until a terminator, an error frame, or
/// a dead transport.
fn drain(core: &mut SessionCore) {
    loop {
        match core.recv() {
            Ok(Response::Item { has_more: true, .. }) => {}
            Ok(_) | Err(_) => break,
        }
    }
}
