//! A library for searching patents through the EPO Open Patent Services (OPS) API
//! and turning its irregular responses into clean, stable patent records.
//!
//! The crate is organised around a small number of pieces:
//! - [`ops`] describes the raw OPS JSON shapes
//! - [`normalize`] converts those shapes into [`patent`] records
//! - [`clients`] performs the outbound HTTP calls, including OPS token management
//! - [`service`] composes the above into search, lookup, family and document operations
//! - [`keyword`] produces keyword suggestions from an external similarity API
//!
//! # Example
//! ```rust,no_run
//! use duckduckpatent::{config::OpsConfig, patent::PatentSearchQuery, service::PatentsService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!   let service = PatentsService::new(OpsConfig::from_env()?);
//!
//!   let query = PatentSearchQuery::new(vec!["bread".to_string()]);
//!   let result = service.query(&query).await?;
//!   println!("{} patents found", result.total);
//!
//!   Ok(())
//! }
//! ```

#![warn(missing_docs, clippy::missing_docs_in_private_items)]
use std::sync::Arc;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};
#[cfg(test)] use tracing_test::traced_test;

pub mod clients;
pub mod config;
pub mod errors;
pub mod keyword;
pub mod normalize;
pub mod ops;
pub mod patent;
pub mod service;
#[cfg(test)] mod tests;

use clients::{
  ops::{OpsClient, OpsRequest, OpsResponse},
  transport::Transport,
};
use config::{KeywordConfig, OpsConfig};
use errors::PatentError;
use patent::{CitedPatent, DocumentInformation, DocumentSection, Patent, QueryResult};
