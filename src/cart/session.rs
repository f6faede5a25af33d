//! Per-guild cart sessions, cooldown stamps, countdown handles and purchase locks.
//!
//! One [`CartState`] lives for the whole process and is owned by the service. Every
//! map sits behind its own `tokio::sync::Mutex`; no guard here is ever held across a
//! surface or ledger await.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::cart::countdown::CountdownTimer;
use crate::cart::stock::Offer;
use crate::cart::types::{ChannelId, GuildId, MessageRef, UserId};

/// A live cart in one guild.
#[derive(Debug, Clone)]
pub struct CartSession {
    pub cart_name: String,
    pub stock: Vec<Offer>,
    pub channel: ChannelId,
    pub message: MessageRef,
    pub active_buyers: HashSet<UserId>,
    pub opened_at: DateTime<Utc>,
    pub last_trade_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// What callers get back from a successful open.
#[derive(Debug, Clone)]
pub struct CartSnapshot {
    pub guild: GuildId,
    pub cart_name: String,
    pub channel: ChannelId,
    pub message: MessageRef,
    pub stock: Vec<Offer>,
    pub countdown_secs: u64,
    pub opened_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub active_buyers: usize,
}

impl CartSnapshot {
    fn of(guild: GuildId, session: &CartSession) -> Self {
        Self {
            guild,
            cart_name: session.cart_name.clone(),
            channel: session.channel,
            message: session.message,
            stock: session.stock.clone(),
            countdown_secs: (session.expires_at - session.opened_at).num_seconds().max(0) as u64,
            opened_at: session.opened_at,
            expires_at: session.expires_at,
            active_buyers: session.active_buyers.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuppressReason {
    /// The guild saw a cart less than `cart_timeout` seconds ago.
    Cooldown { remaining_secs: u64 },
}

#[derive(Debug, Clone)]
pub enum OpenOutcome {
    Opened(CartSnapshot),
    Suppressed(SuppressReason),
}

impl OpenOutcome {
    pub fn is_opened(&self) -> bool {
        matches!(self, OpenOutcome::Opened(_))
    }
}

/// Why a reaction did not start a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NoSession,
    WrongMessage,
    AlreadyTrading,
    UnknownReaction,
}

/// A buyer's place in one cart: the offer picked, where to talk, and which cart it was.
#[derive(Debug, Clone)]
pub struct BuyerSlot {
    pub offer: Offer,
    pub channel: ChannelId,
    pub cart: MessageRef,
}

/// Running countdown for a guild's cart.
pub struct CountdownHandle {
    pub message: MessageRef,
    pub timer: Arc<StdMutex<CountdownTimer>>,
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl CountdownHandle {
    pub fn new(
        message: MessageRef,
        timer: Arc<StdMutex<CountdownTimer>>,
        cancel: oneshot::Sender<()>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            message,
            timer,
            cancel: Some(cancel),
            task,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Ask the countdown to stop; a countdown that already finished ignores it.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }
}

#[derive(Default)]
pub struct CartState {
    sessions: Mutex<HashMap<GuildId, CartSession>>,
    last_trade: Mutex<HashMap<GuildId, DateTime<Utc>>>,
    countdowns: Mutex<HashMap<GuildId, CountdownHandle>>,
    user_locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl CartState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cooldown gate. The first open a guild ever sees is stamped and allowed; after
    /// that an open inside `cart_timeout` seconds of the last stamp is refused unless
    /// `bypass` is set. Allowed opens stamp `now`; refused ones leave the stamp alone.
    pub async fn admit(
        &self,
        guild: GuildId,
        now: DateTime<Utc>,
        cart_timeout: u64,
        bypass: bool,
    ) -> Result<(), SuppressReason> {
        let mut last_trade = self.last_trade.lock().await;
        if !bypass {
            if let Some(last) = last_trade.get(&guild) {
                let window_end = *last + ChronoDuration::seconds(cart_timeout as i64);
                if window_end >= now {
                    let remaining_secs = (window_end - now).num_seconds().max(0) as u64;
                    return Err(SuppressReason::Cooldown { remaining_secs });
                }
            }
        }
        last_trade.insert(guild, now);
        Ok(())
    }

    pub async fn last_trade(&self, guild: GuildId) -> Option<DateTime<Utc>> {
        self.last_trade.lock().await.get(&guild).copied()
    }

    /// Overwrite a guild's last-trade stamp (console tooling and tests).
    pub async fn stamp_last_trade(&self, guild: GuildId, at: DateTime<Utc>) {
        self.last_trade.lock().await.insert(guild, at);
    }

    pub async fn insert_session(&self, guild: GuildId, session: CartSession) -> CartSnapshot {
        let snapshot = CartSnapshot::of(guild, &session);
        self.sessions.lock().await.insert(guild, session);
        snapshot
    }

    /// Remove the guild's session. With `only_message` set, a session showing a
    /// different message is left in place.
    pub async fn remove_session(
        &self,
        guild: GuildId,
        only_message: Option<MessageRef>,
    ) -> Option<CartSession> {
        let mut sessions = self.sessions.lock().await;
        match (sessions.get(&guild), only_message) {
            (None, _) => None,
            (Some(s), Some(m)) if s.message != m => None,
            _ => sessions.remove(&guild),
        }
    }

    pub async fn snapshot(&self, guild: GuildId) -> Option<CartSnapshot> {
        self.sessions
            .lock()
            .await
            .get(&guild)
            .map(|s| CartSnapshot::of(guild, s))
    }

    pub async fn has_session(&self, guild: GuildId) -> bool {
        self.sessions.lock().await.contains_key(&guild)
    }

    pub async fn open_guilds(&self) -> Vec<GuildId> {
        let mut guilds: Vec<GuildId> = self.sessions.lock().await.keys().copied().collect();
        guilds.sort();
        guilds
    }

    /// A reaction may start a purchase when the guild has a live cart, the reaction
    /// is on the cart's message and the user is not already mid-purchase.
    pub async fn is_valid_reaction(&self, guild: GuildId, user: UserId, message: MessageRef) -> bool {
        self.check_reaction(guild, user, message).await.is_ok()
    }

    /// Like [`CartState::is_valid_reaction`], naming the failed condition.
    pub async fn check_reaction(
        &self,
        guild: GuildId,
        user: UserId,
        message: MessageRef,
    ) -> Result<(), IgnoreReason> {
        let sessions = self.sessions.lock().await;
        let session = sessions.get(&guild).ok_or(IgnoreReason::NoSession)?;
        Self::guard(session, Some(message), user)
    }

    fn guard(session: &CartSession, message: Option<MessageRef>, user: UserId) -> Result<(), IgnoreReason> {
        if message.is_some_and(|m| m != session.message) {
            return Err(IgnoreReason::WrongMessage);
        }
        if session.active_buyers.contains(&user) {
            return Err(IgnoreReason::AlreadyTrading);
        }
        Ok(())
    }

    /// Validate a reaction and, when it selects a real offer, mark `user` as buying.
    /// `message` is the message reacted on; `None` means the guild's current cart.
    pub async fn register_buyer(
        &self,
        guild: GuildId,
        message: Option<MessageRef>,
        user: UserId,
        index: usize,
    ) -> Result<BuyerSlot, IgnoreReason> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(&guild).ok_or(IgnoreReason::NoSession)?;
        Self::guard(session, message, user)?;
        let offer = session
            .stock
            .get(index)
            .cloned()
            .ok_or(IgnoreReason::UnknownReaction)?;
        session.active_buyers.insert(user);
        Ok(BuyerSlot {
            offer,
            channel: session.channel,
            cart: session.message,
        })
    }

    /// Drop `user` from the active buyers of the cart showing `cart`. A cart that
    /// already closed, or was replaced by a newer one, is left alone.
    pub async fn unregister_buyer(&self, guild: GuildId, cart: MessageRef, user: UserId) {
        if let Some(session) = self.sessions.lock().await.get_mut(&guild) {
            if session.message == cart {
                session.active_buyers.remove(&user);
            }
        }
    }

    pub async fn is_buying(&self, guild: GuildId, user: UserId) -> bool {
        self.sessions
            .lock()
            .await
            .get(&guild)
            .map(|s| s.active_buyers.contains(&user))
            .unwrap_or(false)
    }

    pub async fn set_countdown(&self, guild: GuildId, handle: CountdownHandle) {
        if let Some(mut previous) = self.countdowns.lock().await.insert(guild, handle) {
            previous.cancel();
        }
    }

    /// Cancel and forget the guild's countdown. With `only_message` set, a countdown
    /// belonging to another cart is left running.
    pub async fn cancel_countdown(&self, guild: GuildId, only_message: Option<MessageRef>) {
        let mut countdowns = self.countdowns.lock().await;
        let matches = match (countdowns.get(&guild), only_message) {
            (None, _) => false,
            (Some(h), Some(m)) => h.message == m,
            (Some(_), None) => true,
        };
        if matches {
            if let Some(mut handle) = countdowns.remove(&guild) {
                handle.cancel();
            }
        }
    }

    pub async fn countdown(&self, guild: GuildId) -> Option<CountdownTimer> {
        let countdowns = self.countdowns.lock().await;
        let handle = countdowns.get(&guild)?;
        let timer = handle.timer.lock().ok()?.clone();
        Some(timer)
    }

    /// Forget countdown handles whose task has finished. Returns how many were pruned.
    pub async fn cleanup_tasks(&self) -> usize {
        let mut countdowns = self.countdowns.lock().await;
        let before = countdowns.len();
        countdowns.retain(|_, handle| !handle.is_finished());
        before - countdowns.len()
    }

    /// The purchase lock for `user`, created on first use and kept for the life of
    /// the process.
    pub async fn user_lock(&self, user: UserId) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        Arc::clone(locks.entry(user).or_default())
    }
}
