//! Wire types shared by the eventstream broker and its clients.
//!
//! Every request a client sends is one [`Action`], encoded as a single line of
//! JSON:
//!
//! ```text
//! {"actionType":"PUBLISH","data":{"stream":"chat","message":"Hello"}}
//! {"actionType":"SUBSCRIBE","data":{"stream":"chat","subscriptionMode":"SUBSCRIPTION_MODE_AFTER","afterId":2}}
//! ```
//!
//! The server answers subscribers with bare message lines and never
//! acknowledges a publish.

pub mod action;

pub use action::{
    ACTION_PUBLISH, ACTION_SUBSCRIBE, Action, ActionError, Envelope, Publish, StartAt, Subscribe,
    SubscriptionMode,
};
