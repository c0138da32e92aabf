// src/dispatcher.rs
//
// The single event loop. All three subscriptions feed one task; the ledger
// is owned here and never touched from anywhere else.

use chrono::{DateTime, Utc};
use miragemod_kilovolt::{ClientError, KilovoltClient};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::config::Args;
use crate::error::Error;
use crate::events::{WebhookEvent, WebhookNotification, parse_webhook_event};
use crate::ledger::{Ledger, RedemptionOutcome, ordinal_suffix, redeem};

/// Chat messages observed in the channel. Subscribed but unused for now,
/// reserved for chat-driven commands.
pub const CHAT_MESSAGE_KEY: &str = "twitch/ev/chat-message";

/// EventSub notifications relayed by stulbe.
pub const WEBHOOK_KEY: &str = "stulbe/ev/webhook";

/// Writing a string here makes the twitch module send it to chat.
pub const SEND_CHAT_KEY: &str = "twitch/@send-chat-message";

pub struct Dispatcher {
    client: KilovoltClient,
    ledger: Ledger,
    ledger_key: String,
    reward_id: String,
    chat: mpsc::Receiver<miragemod_kilovolt::KeyPush>,
    webhook: mpsc::Receiver<miragemod_kilovolt::KeyPush>,
    ledger_changes: mpsc::Receiver<miragemod_kilovolt::KeyPush>,
}

impl Dispatcher {
    /// Subscribes to the three input streams and loads (or initializes) the
    /// persisted ledger. Any failure here is fatal to the process.
    pub async fn start(client: KilovoltClient, args: &Args) -> Result<Self, Error> {
        let chat = client.subscribe_key(CHAT_MESSAGE_KEY).await?;
        let webhook = client.subscribe_key(WEBHOOK_KEY).await?;

        let ledger_key = args.ledger_key();
        let ledger = match client.get_json::<Ledger>(&ledger_key).await {
            Ok(map) => map,
            Err(ClientError::EmptyKey) => {
                info!("no figment ledger found, creating a new one");
                let empty = Ledger::new();
                client.set_json(&ledger_key, &empty).await?;
                empty
            }
            Err(e) => return Err(e.into()),
        };
        let ledger_changes = client.subscribe_key(&ledger_key).await?;

        Ok(Self {
            client,
            ledger,
            ledger_key,
            reward_id: args.reward.clone(),
            chat,
            webhook,
            ledger_changes,
        })
    }

    /// Runs until the broker connection goes away. One message per
    /// iteration, whichever source is ready first.
    pub async fn run(mut self) -> Result<(), Error> {
        loop {
            tokio::select! {
                Some(push) = self.ledger_changes.recv() => {
                    info!("figment ledger changed outside miragemod, updating local copy");
                    self.ledger = decode_replacement_ledger(&push.new_value);
                }
                Some(_msg) = self.chat.recv() => {
                    // Reserved.
                }
                Some(push) = self.webhook.recv() => {
                    let reply = handle_webhook(&self.reward_id, &mut self.ledger, &push.new_value, Utc::now());
                    if let Some(reply) = reply {
                        if reply.persist {
                            if let Err(e) = self.client.set_json(&self.ledger_key, &self.ledger).await {
                                error!("failed to update figment ledger: {}", e);
                            }
                        }
                        if let Err(e) = self.say(&reply.message).await {
                            error!("failed to send chat message: {}", e);
                        }
                    }
                }
                else => {
                    // All subscription channels closed: the connection died.
                    return Err(ClientError::ConnectionClosed.into());
                }
            }
        }
    }

    async fn say(&self, message: &str) -> Result<(), Error> {
        self.client.set(SEND_CHAT_KEY, message).await?;
        Ok(())
    }
}

/// Chat reply produced by a webhook message, plus whether the ledger was
/// mutated and needs persisting.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub message: String,
    pub persist: bool,
}

/// Decodes a wholesale ledger replacement pushed by another writer. A value
/// that fails to decode resets the ledger to empty rather than leaving a
/// stale copy in place.
pub fn decode_replacement_ledger(raw: &str) -> Ledger {
    match serde_json::from_str(raw) {
        Ok(map) => map,
        Err(e) => {
            error!("failed to decode replacement figment ledger, resetting: {}", e);
            Ledger::new()
        }
    }
}

/// Processes one webhook message. Returns the chat reply to send, if any;
/// the ledger is mutated in place on an accepted redemption.
pub fn handle_webhook(
    reward_id: &str,
    ledger: &mut Ledger,
    raw: &str,
    now: DateTime<Utc>,
) -> Option<Reply> {
    let notification: WebhookNotification = match serde_json::from_str(raw) {
        Ok(n) => n,
        Err(e) => {
            error!("failed to decode webhook payload: {}", e);
            return None;
        }
    };

    let event = match parse_webhook_event(&notification.subscription.sub_type, &notification.event)
    {
        Ok(Some(event)) => event,
        Ok(None) => return None,
        Err(e) => {
            error!(
                "failed to decode {} event: {}",
                notification.subscription.sub_type, e
            );
            return None;
        }
    };

    match event {
        WebhookEvent::ChannelPointsRedemptionAdd(redemption) => {
            if redemption.reward.id != reward_id {
                return None;
            }
            match redeem(ledger, &redemption.user_id, &redemption.user_name, now) {
                RedemptionOutcome::OnCooldown => Some(Reply {
                    message: format!(
                        "{}: You can only claim a figment once a day",
                        redemption.user_name
                    ),
                    persist: false,
                }),
                RedemptionOutcome::Accepted { total, count } => {
                    info!(
                        "redeemed: user={} reward={}",
                        redemption.user_id, redemption.reward.title
                    );
                    Some(Reply {
                        message: format!(
                            "{}: You claimed your ⭐ {}{} figment! ⭐ (balance: {})",
                            redemption.user_name,
                            total,
                            ordinal_suffix(total),
                            count
                        ),
                        persist: true,
                    })
                }
            }
        }
    }
}
