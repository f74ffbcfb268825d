//! Clients for the external services the backend talks to.
//!
//! Each submodule wraps one upstream API:
//! - [`ops`] - the EPO Open Patent Services API, including OAuth token handling
//! - [`similarity`] - the word-similarity API behind keyword suggestions
//!
//! Both send their requests through a [`Transport`](transport::Transport), which
//! is implemented by [`HttpTransport`](transport::HttpTransport) for real traffic
//! and can be swapped for a scripted transport in tests.
//!
//! # Examples
//!
//! ```no_run
//! use duckduckpatent::{
//!   clients::ops::{OpsClient, OpsRequest},
//!   config::OpsConfig,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OpsConfig::from_env()?;
//! let client = OpsClient::new(config.clone());
//!
//! let url = format!(
//!   "{}/rest-services/published-data/publication/epodoc/EP1000000/biblio",
//!   config.base_url
//! );
//! let response = client.send_ops_request(OpsRequest::get(url)).await?;
//! println!("{} bytes", response.data.len());
//! # Ok(())
//! # }
//! ```

pub mod ops;
pub mod similarity;
pub mod transport;

pub use ops::OpsClient;
pub use similarity::SimilarityClient;
pub use transport::HttpTransport;

use super::*;
