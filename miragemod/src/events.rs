// src/events.rs
//
// Webhook notification schema as relayed by stulbe. The envelope carries a
// subscription-type discriminator and a raw event payload; the payload is
// only decoded after the discriminator matches a type we care about.

use serde::Deserialize;

pub const CUSTOM_REWARD_REDEMPTION_ADD: &str =
    "channel.channel_points_custom_reward_redemption.add";

/// Subscription metadata on the envelope. Only the type discriminator is
/// used; the rest is kept loose.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionData {
    #[serde(rename = "type")]
    pub sub_type: String,

    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub version: Option<String>,
}

/// Top-level webhook notification:
/// { "subscription": { ... }, "challenge": ..., "event": { ... } }
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookNotification {
    pub subscription: SubscriptionData,

    // Verification challenges are handled upstream; carried for completeness.
    #[serde(default)]
    pub challenge: Option<String>,

    #[serde(default)]
    pub event: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedemptionReward {
    pub id: String,
    pub title: String,
}

/// "channel.channel_points_custom_reward_redemption.add" event payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelPointsRedemption {
    pub user_id: String,
    pub user_name: String,
    pub reward: RedemptionReward,
}

/// Typed webhook events, one variant per subscription type we handle.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    ChannelPointsRedemptionAdd(ChannelPointsRedemption),
}

/// Decodes the raw event payload for a known subscription type. `Ok(None)`
/// means the type is not one we handle.
pub fn parse_webhook_event(
    sub_type: &str,
    event: &serde_json::Value,
) -> Result<Option<WebhookEvent>, serde_json::Error> {
    match sub_type {
        CUSTOM_REWARD_REDEMPTION_ADD => {
            let evt = serde_json::from_value::<ChannelPointsRedemption>(event.clone())?;
            Ok(Some(WebhookEvent::ChannelPointsRedemptionAdd(evt)))
        }
        _ => Ok(None),
    }
}
