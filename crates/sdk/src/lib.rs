//! eventstream SDK
//!
//! Client-side wrapper for the eventstream broker: dial a broker, publish
//! messages, subscribe to streams and read what the broker delivers.
//!
//! # Overview
//!
//! - [`Client`] - one connection; sends publish and subscribe requests
//! - [`EventListener`] - the connection's delivery reader
//!
//! # Quick Start
//!
//! ```ignore
//! use eventstream_sdk::{Client, SubscriptionMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect("127.0.0.1:8080").await?;
//!     let mut listener = client.listener().expect("Already taken");
//!
//!     // receive every previous event on the stream, then new ones
//!     client.subscribe("stream1", SubscriptionMode::All, None).await?;
//!
//!     while let Some(message) = listener.recv().await {
//!         println!("Message received: {}", message);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod listener;

// Re-export main types at crate root
pub use client::Client;
pub use error::{ClientError, Result};
pub use eventstream_types::{Action, StartAt, SubscriptionMode};
pub use listener::EventListener;
