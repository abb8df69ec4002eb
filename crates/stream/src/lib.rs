//! eventstream broker
//!
//! A publish/subscribe broker over persistent TCP connections: append-only
//! named streams, live fan-out to subscribers, history replay and crash-safe
//! persistence of stream history.
//!
//! # Features
//!
//! - **Implicit streams**: a stream exists as soon as someone publishes or subscribes to it
//! - **Ordered delivery**: every subscriber sees a stream in publish order
//! - **Replay**: new subscribers can receive the whole history or everything from a position onward
//! - **Persistence**: stream history survives restarts; subscriptions do not
//!
//! # Example
//!
//! ```rust,no_run
//! use eventstream::{server, types::ServerOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let options = ServerOptions {
//!         port: 8080,
//!         host: "127.0.0.1".to_string(),
//!         ..Default::default()
//!     };
//!
//!     server::start_server(options, std::future::pending()).await.unwrap();
//! }
//! ```
//!
//! # Protocol
//!
//! Clients send one JSON action per line:
//!
//! ```text
//! {"actionType":"PUBLISH","data":{"stream":"chat","message":"Hello"}}
//! {"actionType":"SUBSCRIBE","data":{"stream":"chat","subscriptionMode":"SUBSCRIPTION_MODE_ALL"}}
//! ```
//!
//! Every request must end with `\n`. A client that writes bare back-to-back
//! JSON objects without a newline is not understood: its requests are only
//! seen once the connection closes, and then as a single undecodable line.
//! Use `eventstream-sdk`, which frames requests this way.
//!
//! Subscribers receive each message as a plain line:
//!
//! ```text
//! Hello
//! ```

pub mod connection;
pub mod event_system;
pub mod server;
pub mod store;
pub mod types;

// Re-export commonly used items
pub use connection::handle_connection;
pub use event_system::{EventSystem, Outbound};
pub use eventstream_types::{Action, StartAt, SubscriptionMode};
pub use server::{Server, ServerError, start_server};
pub use store::{StoreError, StreamStore};
pub use types::{ClientId, Event, ServerOptions, Snapshot, Stream};
