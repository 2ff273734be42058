//! A minimal, multiplexed, single-connection client for the Kafka wire protocol.
//!
//! This crate owns exactly one TCP (or TLS) socket to a Kafka broker and lets many
//! concurrent callers issue requests over it. Requests are pipelined on the shared
//! socket; a dedicated background task reads response frames and routes each one to
//! the caller that issued the matching request, using the correlation ID echoed by
//! the broker. There is no reconnection, no retry and no cluster awareness here —
//! a broken connection is terminal and the layer above is expected to dial a new one.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use kafka_mux::BrokerConnection;
//! use kafka_mux::protocol::messages::{ApiVersionsRequest, MetadataRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connection = BrokerConnection::connect_tcp(
//!     "localhost:9092",
//!     Some(Duration::from_secs(10)),
//!     None,
//! )
//! .await?;
//!
//! // Negotiate API versions, then fetch cluster metadata.
//! connection.api_versions(ApiVersionsRequest::default()).await?;
//! let metadata = connection
//!     .metadata(MetadataRequest {
//!         topics: None,
//!         allow_auto_topic_creation: None,
//!     })
//!     .await?;
//! println!("{} brokers", metadata.brokers.len());
//!
//! connection.close().await?;
//! # Ok(())
//! # }
//! ```
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::future_not_send,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

pub mod connection;
pub mod protocol;

pub use connection::{BrokerConnection, RequestError, TerminalError};
