//! # xylem-client: session client for `Xylem`
//!
//! This crate implements the client side of the `Xylem` session protocol:
//! a single authenticated TCP connection over which commands and queries
//! are dispatched strictly one at a time, with query results consumed as
//! an incremental stream rather than one bulk response.
//!
//! The wire format lives in `xylem-wire`; this crate owns the session
//! lifecycle (connect, authenticate, dispatch, teardown) and the query
//! handle state machine.
//!
//! ## Usage
//!
//! ```ignore
//! use xylem_client::{Session, DEFAULT_PORT};
//!
//! // Connect and authenticate.
//! let mut session = Session::connect("localhost", DEFAULT_PORT, "admin", "admin")?;
//!
//! // One-shot command: single request, single response.
//! let result = session.execute("xquery 1 to 10")?;
//! println!("{result}");
//!
//! // Iterable query: items arrive one frame at a time, so a large result
//! // set never has to fit in memory at once.
//! let mut query = session.query("for $x in doc('input')//li return $x")?;
//! if query.run()? {
//!     while query.more()? {
//!         println!("{}", String::from_utf8_lossy(&query.next()?));
//!     }
//! } else {
//!     eprintln!("query failed: {}", query.info()?);
//! }
//! query.close();
//!
//! session.close();
//! ```
//!
//! ## Errors
//!
//! Every failure category is a distinct [`ClientError`] variant
//! (connection, authentication, server diagnostic, protocol violation,
//! busy session, closed session, invalid handle state, transport), so
//! callers branch on the kind, never on message text.

mod connection;
mod error;
mod query;
mod session;

pub use error::{ClientError, ClientResult};
pub use query::{Query, QueryState};
pub use session::{Session, SessionConfig};

pub use xylem_wire::DEFAULT_PORT;
