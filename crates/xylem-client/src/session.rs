//! Authenticated session owning one connection.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, warn};

use xylem_wire::auth::credential_digest;
use xylem_wire::{
    AuthRequest, CommandRequest, OpenQueryRequest, QueryId, Request, Response, WireError,
};

use crate::connection::Connection;
use crate::error::{ClientError, ClientResult};
use crate::query::Query;

/// Configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Read timeout.
    pub read_timeout: Option<Duration>,
    /// Write timeout.
    pub write_timeout: Option<Duration>,
    /// Initial capacity of the read buffer.
    pub buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: Some(Duration::from_secs(30)),
            write_timeout: Some(Duration::from_secs(30)),
            buffer_size: 64 * 1024,
        }
    }
}

/// Shared session state, reachable from the [`Session`] and from every
/// [`Query`] handle it created.
#[derive(Debug)]
pub(crate) struct SessionCore {
    conn: Connection,
    /// An exchange (an open query handle) is outstanding; new exchanges
    /// must fail fast instead of interleaving frames.
    busy: bool,
    /// The session was explicitly closed; the transport is gone.
    closed: bool,
    /// A transport or protocol error corrupted the frame stream; no
    /// further bytes may be written to it, not even close notifications.
    poisoned: bool,
    next_query_id: u64,
}

impl SessionCore {
    /// Rejects new exchanges on a closed or busy session, before any byte
    /// touches the transport.
    pub(crate) fn ensure_ready(&self) -> ClientResult<()> {
        if self.closed {
            return Err(ClientError::Closed);
        }
        if self.busy {
            return Err(ClientError::Busy);
        }
        Ok(())
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub(crate) fn release(&mut self) {
        self.busy = false;
    }

    /// Sends one request, poisoning the session on transport failure.
    pub(crate) fn send(&mut self, request: &Request) -> ClientResult<()> {
        let result = self.conn.send(request);
        self.note(result)
    }

    /// Receives one response, poisoning the session on transport or
    /// protocol failure.
    pub(crate) fn recv(&mut self) -> ClientResult<Response> {
        let result = self.conn.recv();
        self.note(result)
    }

    /// One request/response round trip.
    pub(crate) fn exchange(&mut self, request: &Request) -> ClientResult<Response> {
        self.send(request)?;
        self.recv()
    }

    /// Records an unexpected frame kind as a protocol violation.
    pub(crate) fn unexpected(&mut self, expected: &'static str, actual: &Response) -> ClientError {
        self.poisoned = true;
        ClientError::Protocol(WireError::UnexpectedFrame {
            expected,
            actual: actual.kind(),
        })
    }

    fn note<T>(&mut self, result: ClientResult<T>) -> ClientResult<T> {
        if matches!(
            result,
            Err(ClientError::Transport(_) | ClientError::Protocol(_))
        ) {
            self.poisoned = true;
        }
        result
    }
}

/// A single authenticated connection to a `Xylem` server.
///
/// The session exclusively owns its transport and serializes every
/// exchange on it: one command or one query at a time, strictly
/// request/response, no pipelining. A second exchange attempted while a
/// [`Query`] handle is open fails fast with [`ClientError::Busy`].
///
/// # Example
///
/// ```ignore
/// use xylem_client::Session;
///
/// let mut session = Session::connect("localhost", 1984, "admin", "admin")?;
///
/// let mut query = session.query("for $x in doc('input')//li return $x")?;
/// if query.run()? {
///     while query.more()? {
///         println!("{}", String::from_utf8_lossy(&query.next()?));
///     }
/// } else {
///     eprintln!("{}", query.info()?);
/// }
/// query.close();
///
/// session.close();
/// ```
#[derive(Debug)]
pub struct Session {
    core: Rc<RefCell<SessionCore>>,
}

impl Session {
    /// Connects to a server and authenticates with the default
    /// configuration.
    ///
    /// Credentials are supplied once; there is no re-authentication
    /// mid-session. Failure modes: [`ClientError::Connect`] when the host
    /// is unreachable or the transport breaks during the handshake,
    /// [`ClientError::Auth`] when the server rejects the credentials (the
    /// transport is closed before returning).
    pub fn connect(host: &str, port: u16, username: &str, password: &str) -> ClientResult<Self> {
        Self::connect_with_config(host, port, username, password, SessionConfig::default())
    }

    /// Connects with an explicit configuration.
    pub fn connect_with_config(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        config: SessionConfig,
    ) -> ClientResult<Self> {
        debug!(host, port, username, "connecting");

        let mut conn = Connection::connect(host, port, &config).map_err(ClientError::Connect)?;

        if let Err(e) = authenticate(&mut conn, username, password) {
            conn.shutdown();
            return Err(e);
        }
        debug!(username, "authenticated");

        Ok(Self {
            core: Rc::new(RefCell::new(SessionCore {
                conn,
                busy: false,
                closed: false,
                poisoned: false,
                next_query_id: 1,
            })),
        })
    }

    /// Executes a one-shot command and returns its result text.
    ///
    /// Blocks for the single response frame. A server-reported failure is
    /// returned as [`ClientError::Command`] carrying the diagnostic; the
    /// session stays usable afterwards. Fails fast with
    /// [`ClientError::Busy`] (without touching the transport) while a
    /// query handle is open.
    pub fn execute(&mut self, command: &str) -> ClientResult<String> {
        let mut core = self.core.borrow_mut();
        core.ensure_ready()?;

        debug!(command, "executing command");
        let response = core.exchange(&Request::Command(CommandRequest {
            text: command.to_string(),
        }))?;

        match response {
            Response::Ok { payload } => String::from_utf8(payload).map_err(|_| {
                ClientError::Protocol(WireError::Deserialization(
                    "command result is not valid UTF-8".to_string(),
                ))
            }),
            Response::Err { message } => Err(ClientError::Command(message)),
            other => Err(core.unexpected("Ok or Err", &other)),
        }
    }

    /// Opens a query and returns its handle.
    ///
    /// The registration frame is sent eagerly: from the moment this call
    /// returns, the server holds iterator resources keyed on the handle,
    /// and [`Query::close`] is mandatory to release them. The session is
    /// busy until then: further `execute`/`query` calls fail with
    /// [`ClientError::Busy`].
    pub fn query(&mut self, text: &str) -> ClientResult<Query> {
        let id = {
            let mut core = self.core.borrow_mut();
            core.ensure_ready()?;

            let id = QueryId::new(core.next_query_id);
            core.next_query_id += 1;

            let response = core.exchange(&Request::OpenQuery(OpenQueryRequest {
                id,
                text: text.to_string(),
            }))?;
            match response {
                Response::Ok { .. } => {}
                Response::Err { message } => return Err(ClientError::Command(message)),
                other => return Err(core.unexpected("Ok or Err", &other)),
            }

            core.busy = true;
            id
        };

        debug!(query = %id, "query opened");
        Ok(Query::new(Rc::clone(&self.core), id))
    }

    /// Closes the session. Idempotent.
    ///
    /// Sends the teardown notification best-effort and shuts the transport
    /// down. Any query handle still open transitions to closed on its next
    /// use and fails with [`ClientError::Closed`].
    pub fn close(&mut self) {
        let mut core = self.core.borrow_mut();
        if core.closed {
            return;
        }

        if !core.poisoned {
            if let Err(e) = core.send(&Request::Quit) {
                warn!(error = %e, "failed to send quit notification");
            }
        }
        core.conn.shutdown();
        core.closed = true;
        debug!("session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Greeting + challenge/response handshake.
///
/// Transport failures here are connection-establishment failures
/// ([`ClientError::Connect`]), not mid-session transport errors.
fn authenticate(conn: &mut Connection, username: &str, password: &str) -> ClientResult<()> {
    let nonce = match conn.recv().map_err(as_connect_failure)? {
        Response::Ok { payload } => payload,
        other => {
            return Err(ClientError::Protocol(WireError::UnexpectedFrame {
                expected: "Ok",
                actual: other.kind(),
            }));
        }
    };

    conn.send(&Request::Auth(AuthRequest {
        username: username.to_string(),
        digest: credential_digest(password, &nonce),
    }))
    .map_err(as_connect_failure)?;

    match conn.recv().map_err(as_connect_failure)? {
        Response::Ok { .. } => Ok(()),
        Response::Err { message } => Err(ClientError::Auth(message)),
        other => Err(ClientError::Protocol(WireError::UnexpectedFrame {
            expected: "Ok or Err",
            actual: other.kind(),
        })),
    }
}

fn as_connect_failure(e: ClientError) -> ClientError {
    match e {
        ClientError::Transport(io) => ClientError::Connect(io),
        other => other,
    }
}
