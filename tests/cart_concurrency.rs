//! One player buying in two guilds at once must not interleave sheet updates.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::*;
use wagonwheel::cart::character::Character;
use wagonwheel::cart::errors::StoreError;
use wagonwheel::cart::ledger::CharacterStore;
use wagonwheel::cart::types::{ChannelId, GuildId, UserId};
use wagonwheel::cart::{OpenOutcome, PurchaseOutcome};
use wagonwheel::storage::CartStore;

/// Counts how many load/save windows are open at once and remembers any overlap.
struct Watched {
    inner: CartStore,
    open: Arc<AtomicUsize>,
    overlaps: Arc<AtomicUsize>,
}

#[async_trait]
impl CharacterStore for Watched {
    async fn load(&self, user: UserId) -> Result<Character, StoreError> {
        if self.open.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        // Widen the window so an unguarded second purchase would land inside it.
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.inner.load(user).await
    }

    async fn save(&self, character: &Character) -> Result<(), StoreError> {
        let saved = self.inner.save(character).await;
        self.open.fetch_sub(1, Ordering::SeqCst);
        saved
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_player_in_two_guilds_is_serialized() {
    let other_guild = GuildId(1002);
    let other_channel = ChannelId(2002);
    let open = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));

    let (o, v) = (open.clone(), overlaps.clone());
    let h = HarnessBuilder::new()
        .characters(move |inner| {
            Arc::new(Watched {
                inner,
                open: o,
                overlaps: v,
            }) as Arc<dyn CharacterStore>
        })
        .build();
    h.store.set_balance(BUYER, 1_000_000).unwrap();

    let mut listings = Vec::new();
    for (guild, channel) in [(GUILD, CHANNEL), (other_guild, other_channel)] {
        match h.service.open_cart(guild, channel, false).await.unwrap() {
            OpenOutcome::Opened(snapshot) => listings.push(snapshot),
            other => panic!("cart did not open in {}: {:?}", guild, other),
        }
    }

    let mut pending = Vec::new();
    for snapshot in &listings {
        let worker = h.service.clone();
        let react = reaction(snapshot.guild, snapshot.message, BUYER, 1);
        pending.push(tokio::spawn(async move { worker.handle_reaction(&react).await }));
    }
    until_waiting(&h.surface, 2).await;
    h.surface.inject_reply(CHANNEL, BUYER, "2");
    h.surface.inject_reply(other_channel, BUYER, "3");

    let mut bought = 0;
    for task in pending {
        match task.await.unwrap().unwrap() {
            PurchaseOutcome::Purchased { quantity, .. } => bought += quantity,
            other => panic!("purchase failed: {:?}", other),
        }
    }

    assert_eq!(bought, 5);
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(open.load(Ordering::SeqCst), 0);
    let sheet = h.store.get_character(BUYER).unwrap().unwrap();
    assert_eq!(sheet.owned("Sunforged Blade"), 5);
    assert_eq!(h.store.get_balance(BUYER).unwrap(), 1_000_000 - 5 * BLADE_PRICE);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_players_buy_side_by_side() {
    let h = HarnessBuilder::new().build();
    let players = [BUYER, UserId(3002), UserId(3003)];
    for player in players {
        h.store.set_balance(player, 50_000).unwrap();
    }
    let cart = match h.service.open_cart(GUILD, CHANNEL, false).await.unwrap() {
        OpenOutcome::Opened(snapshot) => snapshot,
        other => panic!("cart did not open: {:?}", other),
    };

    let mut pending = Vec::new();
    for player in players {
        let worker = h.service.clone();
        let react = reaction(GUILD, cart.message, player, 1);
        pending.push(tokio::spawn(async move { worker.handle_reaction(&react).await }));
    }
    until_waiting(&h.surface, players.len()).await;
    for player in players {
        h.surface.inject_reply(CHANNEL, player, "2");
    }
    for task in pending {
        assert_eq!(
            task.await.unwrap().unwrap(),
            PurchaseOutcome::Purchased {
                quantity: 2,
                total: 2 * BLADE_PRICE
            }
        );
    }
    for player in players {
        assert_eq!(h.store.get_balance(player).unwrap(), 50_000 - 2 * BLADE_PRICE);
        assert_eq!(
            h.store.get_character(player).unwrap().unwrap().owned("Sunforged Blade"),
            2
        );
    }
}
