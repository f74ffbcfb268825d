//! Error types for the duckduckpatentd server and CLI.
//!
//! This module provides an error type covering every failure the binary can run
//! into:
//! - Patent search, lookup and suggestion errors from the library
//! - File system operations, such as writing a downloaded page
//! - Invalid listen addresses
//!
//! The errors are transparent, so the underlying message is what the user sees.

use thiserror::Error;

/// Errors that can occur while running a command or the server.
#[derive(Error, Debug)]
pub enum PatentdErrors {
  /// Errors from the underlying duckduckpatent library
  #[error(transparent)]
  Patent(#[from] duckduckpatent::errors::PatentError),

  /// File system and IO operation errors
  #[error(transparent)]
  IO(#[from] std::io::Error),

  /// A listen address that does not parse
  #[error(transparent)]
  Addr(#[from] std::net::AddrParseError),
}
