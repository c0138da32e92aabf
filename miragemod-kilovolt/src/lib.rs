//! Minimal async client for the Kilovolt websocket key-value broker.
//!
//! Covers the subset of the protocol the bridge needs: `kget`/`kset` (with
//! JSON helpers), key subscriptions via `ksub`, and the optional
//! challenge-response authentication flow. Subscribed keys deliver pushes
//! over bounded mpsc channels, one receiver per subscription.

pub mod client;
pub mod error;
pub mod proto;

pub use client::{ClientOptions, KilovoltClient};
pub use error::ClientError;
pub use proto::KeyPush;
