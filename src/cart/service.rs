//! The cart service: opening, closing and supervising carts.
//!
//! Purchases are handled in [`crate::cart::purchase`] on the same type.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::cart::catalog::ItemCatalog;
use crate::cart::countdown::{Countdown, CountdownTimer};
use crate::cart::dice::{Dice, RandDice};
use crate::cart::errors::CartError;
use crate::cart::events::{CartEvent, EventSink};
use crate::cart::ledger::{display_currency, CharacterStore, Ledger};
use crate::cart::listing::format_offer_listing;
use crate::cart::session::{
    CartSession, CartSnapshot, CartState, CountdownHandle, OpenOutcome,
};
use crate::cart::stock::StockGenerator;
use crate::cart::surface::Surface;
use crate::cart::types::{ChannelId, GuildId, MessageRef, Reaction};
use crate::config::Config;

/// Extra time the supervisor grants a countdown before closing the cart itself.
const SUPERVISOR_GRACE: Duration = Duration::from_secs(5);

const COUNTDOWN_TITLE: &str = "The cart will leave in";

pub type DiceFactory = Arc<dyn Fn() -> Box<dyn Dice> + Send + Sync>;

/// Owns the cart state and the collaborators. Clones share everything.
#[derive(Clone)]
pub struct CartService {
    pub(crate) state: Arc<CartState>,
    pub(crate) surface: Arc<dyn Surface>,
    pub(crate) ledger: Arc<dyn Ledger>,
    pub(crate) characters: Arc<dyn CharacterStore>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) config: Arc<Config>,
    catalog: Arc<ItemCatalog>,
    dice: DiceFactory,
}

impl CartService {
    pub fn new(
        config: Arc<Config>,
        catalog: Arc<ItemCatalog>,
        surface: Arc<dyn Surface>,
        ledger: Arc<dyn Ledger>,
        characters: Arc<dyn CharacterStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let dice: DiceFactory = match config.cart.rng_seed {
            Some(seed) => Arc::new(move || Box::new(RandDice::seeded(seed)) as Box<dyn Dice>),
            None => Arc::new(|| Box::new(RandDice::from_entropy()) as Box<dyn Dice>),
        };
        Self {
            state: Arc::new(CartState::new()),
            surface,
            ledger,
            characters,
            events,
            config,
            catalog,
            dice,
        }
    }

    /// Replace the randomness used for stock generation.
    pub fn with_dice(mut self, dice: DiceFactory) -> Self {
        self.dice = dice;
        self
    }

    pub fn state(&self) -> &CartState {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bring the cart to `guild`.
    ///
    /// Inside the guild's cooldown window (and without `bypass`) this is a silent
    /// no-op reported as [`OpenOutcome::Suppressed`]. Otherwise the window is
    /// restamped, observers hear `CartEvent::Arrived`, the stock is rolled and posted
    /// and a countdown starts; the cart closes when it runs out.
    pub async fn open_cart(
        &self,
        guild: GuildId,
        invoked_in: ChannelId,
        bypass: bool,
    ) -> Result<OpenOutcome, CartError> {
        let guild_config = self.config.guild(guild);
        let cart_name = self.config.cart_name(guild);
        let now = Utc::now();

        if let Err(reason) = self
            .state
            .admit(guild, now, guild_config.cart_timeout, bypass)
            .await
        {
            log::debug!("cart for guild {} suppressed: {:?}", guild, reason);
            return Ok(OpenOutcome::Suppressed(reason));
        }
        if self.state.has_session(guild).await {
            log::info!("replacing live cart in guild {}", guild);
            self.close_cart(guild).await;
        }

        let channel = self.config.cart_channel(guild, invoked_in);
        self.events
            .publish(CartEvent::Arrived { guild, channel })
            .await;

        let stock = {
            let mut dice = (self.dice)();
            StockGenerator::new(&self.catalog, self.config.cart.enable_chests)
                .generate(self.config.cart.stock_count, dice.as_mut())
        };
        let stock = match stock {
            Ok(stock) => stock,
            Err(e) => {
                log::warn!("cart for guild {} has nothing to sell: {}", guild, e);
                return Err(e.into());
            }
        };

        let currency = display_currency(&self.ledger.currency_name(guild).await);
        let text = format_offer_listing(&cart_name, &stock, &currency);
        let message = self.surface.send(channel, &text).await?;

        let last_trade = self.state.last_trade(guild).await.unwrap_or(now);
        let window_left = (last_trade + ChronoDuration::seconds(guild_config.cart_timeout as i64)
            - now)
            .num_seconds()
            .max(0) as u64;
        let duration_secs = self.config.cart.countdown_cap_secs.min(window_left);
        let duration = Duration::from_secs(duration_secs);

        let snapshot = self
            .state
            .insert_session(
                guild,
                CartSession {
                    cart_name: cart_name.clone(),
                    stock,
                    channel,
                    message,
                    active_buyers: Default::default(),
                    opened_at: now,
                    last_trade_at: last_trade,
                    expires_at: now + ChronoDuration::seconds(duration_secs as i64),
                },
            )
            .await;
        log::info!(
            "{} arrived in guild {} channel {} for {}s with {} offers",
            cart_name,
            guild,
            channel,
            duration_secs,
            snapshot.stock.len()
        );

        self.start_countdown(guild, channel, message, duration).await;
        Ok(OpenOutcome::Opened(snapshot))
    }

    /// Spawn the countdown under a supervisor bounded by `duration` plus a grace
    /// period; whichever ends first closes this cart.
    async fn start_countdown(
        &self,
        guild: GuildId,
        channel: ChannelId,
        message: MessageRef,
        duration: Duration,
    ) {
        let countdown = Countdown::new(Arc::clone(&self.surface), channel, COUNTDOWN_TITLE, duration);
        let timer = countdown.timer();
        let watched = Arc::clone(&timer);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let service = self.clone();

        let task = tokio::spawn(async move {
            match tokio::time::timeout(duration + SUPERVISOR_GRACE, countdown.run(cancel_rx)).await {
                Ok(end) => log::debug!("countdown for guild {} ended: {:?}", guild, end),
                Err(_) => {
                    log::warn!("countdown for guild {} overran; closing cart", guild);
                    let stale = watched.lock().ok().and_then(|t| t.message);
                    if let Some(stale) = stale {
                        if let Err(e) = service.surface.delete(&stale).await {
                            log::debug!("stale countdown in guild {} not deleted: {}", guild, e);
                        }
                    }
                }
            }
            service.close_if_current(guild, message).await;
        });

        self.state
            .set_countdown(guild, CountdownHandle::new(message, timer, cancel_tx, task))
            .await;
    }

    /// Close the guild's cart: stop the countdown, drop the session and delete the
    /// offer message. Returns whether a cart was open.
    pub async fn close_cart(&self, guild: GuildId) -> bool {
        self.close_inner(guild, None).await
    }

    async fn close_if_current(&self, guild: GuildId, message: MessageRef) -> bool {
        self.close_inner(guild, Some(message)).await
    }

    async fn close_inner(&self, guild: GuildId, only_message: Option<MessageRef>) -> bool {
        self.state.cancel_countdown(guild, only_message).await;
        let Some(session) = self.state.remove_session(guild, only_message).await else {
            return false;
        };
        if let Err(e) = self.surface.delete(&session.message).await {
            log::debug!("cart message in guild {} already gone: {}", guild, e);
        }
        self.events.publish(CartEvent::Departed { guild }).await;
        log::info!("{} left guild {}", session.cart_name, guild);
        true
    }

    /// Current cart in `guild` and its countdown, if any.
    pub async fn status(&self, guild: GuildId) -> Option<(CartSnapshot, Option<CountdownTimer>)> {
        let snapshot = self.state.snapshot(guild).await?;
        let countdown = self.state.countdown(guild).await;
        Some((snapshot, countdown))
    }

    /// Forget finished countdown tasks.
    pub async fn cleanup_tasks(&self) -> usize {
        let pruned = self.state.cleanup_tasks().await;
        if pruned > 0 {
            log::debug!("pruned {} finished countdowns", pruned);
        }
        pruned
    }

    /// Listen for reactions on the surface and hand each one to its own purchase task.
    pub fn spawn_reaction_listener(&self) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            loop {
                let reaction = service
                    .surface
                    .await_reaction(Box::new(|_: &Reaction| true), Duration::from_secs(3600))
                    .await;
                let Some(reaction) = reaction else {
                    service.cleanup_tasks().await;
                    continue;
                };
                let worker = service.clone();
                tokio::spawn(async move {
                    match worker.handle_reaction(&reaction).await {
                        Ok(outcome) => log::debug!(
                            "reaction {} by {} in guild {}: {:?}",
                            reaction.emoji,
                            reaction.user,
                            reaction.guild,
                            outcome
                        ),
                        Err(e) => log::error!(
                            "purchase by {} in guild {} failed: {}",
                            reaction.user,
                            reaction.guild,
                            e
                        ),
                    }
                });
            }
        })
    }
}
