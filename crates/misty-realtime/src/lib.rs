//! Client for the robot's `pubsub` WebSocket.
//!
//! A [`Connection`] owns one socket to the robot. Control frames
//! (subscribe/unsubscribe) are written directly from the caller's task, while a
//! single background reader task decodes inbound frames, classifies them and
//! pushes them into a bounded channel that the caller drains in order.

pub mod connection;
pub mod error;
pub mod subscriptions;

pub use connection::{Connection, ConnectionState, EVENT_BUFFER, pubsub_url};
pub use error::{RealtimeError, Result};
pub use subscriptions::SubscriptionSet;
