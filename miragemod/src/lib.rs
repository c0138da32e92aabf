//! miragemod: channel-points "figment" counter.
//!
//! Bridges a Kilovolt broker to Twitch chat: watches the stulbe webhook
//! stream for custom-reward redemptions of one configured reward, keeps a
//! per-user ledger of claims (persisted back to the broker), and replies in
//! chat with the claimer's running totals. Claims are gated by a per-user
//! cooldown.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod ledger;

pub use error::Error;
