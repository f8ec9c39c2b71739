//! Connection seam between the writer thread and the relational store.
//!
//! The writer only needs a handful of operations from a store: open a
//! connection, open a streaming load for one target, feed it bytes, close
//! it, run a plain statement, and disconnect. Backends implement
//! [`Connector`] and [`Connection`]; the pipeline never touches a connection
//! outside its writer thread, so connections need not be `Send`.

use std::error::Error as StdError;

use crate::TargetDescriptor;

/// An open connection to the store, owned by the writer thread.
pub trait Connection {
    /// Error type reported by the backend.
    type Error: StdError + Send + Sync + 'static;

    /// Open a streaming load session for `target`.
    ///
    /// # Errors
    /// Returns the backend error when the session cannot be started.
    fn begin_copy(&mut self, target: &TargetDescriptor) -> Result<(), Self::Error>;

    /// Stream a chunk of encoded rows into the open session.
    ///
    /// Chunks need not end on a row boundary.
    ///
    /// # Errors
    /// Returns the backend error when the chunk is rejected.
    fn write_copy_data(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Close the open load session, making its rows durable.
    ///
    /// # Errors
    /// Returns the backend error when the session cannot be completed.
    fn end_copy(&mut self) -> Result<(), Self::Error>;

    /// Execute a statement outside any load session.
    ///
    /// # Errors
    /// Returns the backend error when the statement fails.
    fn execute(&mut self, sql: &str) -> Result<(), Self::Error>;

    /// Disconnect from the store.
    ///
    /// # Errors
    /// Returns the backend error when the connection does not close cleanly.
    fn close(self) -> Result<(), Self::Error>
    where
        Self: Sized;
}

/// Factory for connections, moved into the writer thread on spawn.
pub trait Connector: Send + 'static {
    /// Connection produced by this connector.
    type Connection: Connection;
    /// Error raised when connecting fails.
    type Error: StdError + Send + Sync + 'static;

    /// Open a new connection.
    ///
    /// # Errors
    /// Returns the backend error when the store cannot be reached.
    fn connect(&self) -> Result<Self::Connection, Self::Error>;
}
