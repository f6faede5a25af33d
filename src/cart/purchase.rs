//! Reaction-driven purchases.
//!
//! A valid reaction marks the player as an active buyer, asks for a quantity and
//! waits for an integer reply. Funds are checked and withdrawn, then the character
//! sheet is loaded, credited and saved while holding the player's purchase lock. If
//! the sheet cannot be loaded or saved after the withdrawal, the money is paid back.
//! The player leaves the active-buyer set on every path.

use uuid::Uuid;

use crate::cart::errors::{CartError, LedgerError};
use crate::cart::events::CartEvent;
use crate::cart::ledger::display_currency;
use crate::cart::listing::{
    insufficient_funds, purchase_announcement, purchase_not_recorded, quantity_prompt, WASTING_TIME,
};
use crate::cart::service::CartService;
use crate::cart::session::IgnoreReason;
use crate::cart::stock::Offer;
use crate::cart::surface::ReplyFilter;
use crate::cart::types::{reaction_index, ChannelId, GuildId, MessageRef, Reaction, Reply, UserId};
use crate::logutil::escape_log;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseOutcome {
    /// The reaction did not start a purchase.
    Ignored(IgnoreReason),
    /// No integer reply arrived in time.
    TimedOut,
    /// The player asked for less than one.
    Rejected,
    InsufficientFunds { needed: u64 },
    Purchased { quantity: u64, total: u64 },
    /// Funds were taken but the character sheet could not be updated.
    Failed { refunded: bool },
}

/// The integer a reply asks for, if it is one.
pub fn parse_quantity(content: &str) -> Option<i64> {
    content.trim().parse::<i64>().ok()
}

pub fn mention(user: UserId) -> String {
    format!("<@{}>", user)
}

impl CartService {
    /// Route a reaction to a purchase. Reactions that are not number controls, are on
    /// another message or come from a player already buying are ignored.
    pub async fn handle_reaction(&self, reaction: &Reaction) -> Result<PurchaseOutcome, CartError> {
        let Some(index) = reaction_index(&reaction.emoji) else {
            return Ok(PurchaseOutcome::Ignored(IgnoreReason::UnknownReaction));
        };
        if let Err(reason) = self
            .state
            .check_reaction(reaction.guild, reaction.user, reaction.message)
            .await
        {
            log::trace!(
                "reaction from {} in guild {} ignored: {:?}",
                reaction.user,
                reaction.guild,
                reason
            );
            return Ok(PurchaseOutcome::Ignored(reason));
        }
        self.purchase(reaction.guild, Some(reaction.message), index, reaction.user)
            .await
    }

    /// Buy stock line `index` of the guild's current cart for `user`.
    pub async fn attempt_purchase(
        &self,
        guild: GuildId,
        index: usize,
        user: UserId,
    ) -> Result<PurchaseOutcome, CartError> {
        self.purchase(guild, None, index, user).await
    }

    async fn purchase(
        &self,
        guild: GuildId,
        message: Option<MessageRef>,
        index: usize,
        user: UserId,
    ) -> Result<PurchaseOutcome, CartError> {
        let slot = match self.state.register_buyer(guild, message, user, index).await {
            Ok(slot) => slot,
            Err(reason) => return Ok(PurchaseOutcome::Ignored(reason)),
        };
        let purchase_id = Uuid::new_v4();
        log::debug!(
            "purchase {} started: {} wants {} in guild {}",
            purchase_id,
            user,
            slot.offer.display_name,
            guild
        );
        let result = self
            .run_purchase(purchase_id, guild, slot.channel, user, &slot.offer)
            .await;
        self.state.unregister_buyer(guild, slot.cart, user).await;
        match &result {
            Ok(outcome) => log::debug!("purchase {} finished: {:?}", purchase_id, outcome),
            Err(e) => log::warn!("purchase {} aborted: {}", purchase_id, e),
        }
        result
    }

    async fn run_purchase(
        &self,
        purchase_id: Uuid,
        guild: GuildId,
        channel: ChannelId,
        user: UserId,
        offer: &Offer,
    ) -> Result<PurchaseOutcome, CartError> {
        let currency = display_currency(&self.ledger.currency_name(guild).await);
        let who = mention(user);
        let prompt = self
            .surface
            .send(channel, &quantity_prompt(&who, offer))
            .await?;

        let filter: ReplyFilter = Box::new(move |r: &Reply| {
            r.author == user && r.message.channel == channel && parse_quantity(&r.content).is_some()
        });
        let Some(reply) = self
            .surface
            .await_message(filter, self.config.cart.reply_timeout())
            .await
        else {
            log::info!("purchase {}: {} never named a quantity", purchase_id, user);
            return Ok(PurchaseOutcome::TimedOut);
        };
        log::debug!(
            "purchase {}: {} replied '{}'",
            purchase_id,
            user,
            escape_log(&reply.content)
        );

        let requested = parse_quantity(&reply.content).unwrap_or(0);
        if requested < 1 {
            self.tidy(&prompt, &reply).await;
            self.surface.send(channel, WASTING_TIME).await?;
            return Ok(PurchaseOutcome::Rejected);
        }
        let quantity = requested as u64;

        let Some(total) = offer.price.checked_mul(quantity) else {
            self.tidy(&prompt, &reply).await;
            self.surface
                .send(channel, &insufficient_funds(&who, &currency))
                .await?;
            return Ok(PurchaseOutcome::InsufficientFunds { needed: u64::MAX });
        };

        if !self.ledger.can_spend(user, total).await? {
            self.tidy(&prompt, &reply).await;
            self.surface
                .send(channel, &insufficient_funds(&who, &currency))
                .await?;
            return Ok(PurchaseOutcome::InsufficientFunds { needed: total });
        }
        match self.ledger.withdraw(user, total).await {
            Ok(balance) => log::debug!("purchase {}: withdrew {}, {} left", purchase_id, total, balance),
            Err(LedgerError::InsufficientFunds { needed, .. }) => {
                log::info!("purchase {}: balance moved under {}", purchase_id, needed);
                self.tidy(&prompt, &reply).await;
                self.notify(channel, &insufficient_funds(&who, &currency)).await;
                return Ok(PurchaseOutcome::InsufficientFunds { needed });
            }
            Err(e) => return Err(e.into()),
        }

        let committed = {
            let lock = self.state.user_lock(user).await;
            let _guard = lock.lock().await;
            match self.characters.load(user).await {
                Ok(mut sheet) => {
                    sheet.apply_purchase(offer, quantity);
                    self.characters.save(&sheet).await
                }
                Err(e) => Err(e),
            }
        };

        if let Err(e) = committed {
            log::error!(
                "purchase {}: character sheet for {} not updated: {}",
                purchase_id,
                user,
                e
            );
            let refunded = match self.ledger.deposit(user, total).await {
                Ok(_) => true,
                Err(refund_err) => {
                    log::error!(
                        "purchase {}: refund of {} to {} failed: {}",
                        purchase_id,
                        total,
                        user,
                        refund_err
                    );
                    false
                }
            };
            self.tidy(&prompt, &reply).await;
            self.notify(channel, &purchase_not_recorded(&who, refunded)).await;
            return Ok(PurchaseOutcome::Failed { refunded });
        }

        // The sheet is saved; from here on the purchase stands whatever the surface does.
        self.tidy(&prompt, &reply).await;
        self.notify(
            channel,
            &purchase_announcement(&who, quantity, offer, total, &currency),
        )
        .await;
        self.events
            .publish(CartEvent::Purchased {
                guild,
                user,
                item: offer.display_name.clone(),
                quantity,
                total,
            })
            .await;
        log::info!(
            "purchase {}: {} bought {} x {} for {}",
            purchase_id,
            user,
            quantity,
            offer.display_name,
            total
        );
        Ok(PurchaseOutcome::Purchased { quantity, total })
    }

    /// Post a message whose loss must not undo the purchase outcome.
    async fn notify(&self, channel: ChannelId, text: &str) {
        if let Err(e) = self.surface.send(channel, text).await {
            log::warn!("could not post to channel {}: {}", channel, e);
        }
    }

    /// Remove the quantity prompt and the player's reply.
    async fn tidy(&self, prompt: &MessageRef, reply: &Reply) {
        for message in [prompt, &reply.message] {
            if let Err(e) = self.surface.delete(message).await {
                log::debug!("could not delete message {}: {}", message.id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_accepts_signed_integers_only() {
        assert_eq!(parse_quantity(" 3 "), Some(3));
        assert_eq!(parse_quantity("0"), Some(0));
        assert_eq!(parse_quantity("-2"), Some(-2));
        assert_eq!(parse_quantity("three"), None);
        assert_eq!(parse_quantity("2.5"), None);
    }
}
