//! Test utilities & fixtures.
//! Builds a cart service over a temp sled store, a local surface and scripted dice.

#![allow(dead_code)] // each test crate uses a different subset

use std::sync::Arc;

use tempfile::TempDir;
use wagonwheel::cart::catalog::{ItemCatalog, ItemTemplate, Rarity, Stats};
use wagonwheel::cart::dice::{Dice, ScriptedDice};
use wagonwheel::cart::events::EventBus;
use wagonwheel::cart::ledger::{CharacterStore, Ledger};
use wagonwheel::cart::service::DiceFactory;
use wagonwheel::cart::surface::{LocalSurface, Surface, SurfaceRecord};
use wagonwheel::cart::types::{ChannelId, GuildId, MessageRef, Reaction, UserId, NUMBER_EMOJIS};
use wagonwheel::cart::CartService;
use wagonwheel::config::{Config, GuildConfig};
use wagonwheel::storage::{CartStore, CartStoreBuilder};

pub const GUILD: GuildId = GuildId(1001);
pub const CHANNEL: ChannelId = ChannelId(2001);
pub const BUYER: UserId = UserId(3001);

/// Price of the epic blade under [`epic_and_rare_chest`]: 3000 per point, weight 8.
pub const BLADE_PRICE: u64 = 24_000;

pub fn item(name: &str, rarity: Rarity, slots: &[&str], att: i32, cha: i32, int: i32) -> ItemTemplate {
    ItemTemplate {
        name: name.to_string(),
        rarity,
        slots: slots.iter().map(|s| s.to_string()).collect(),
        stats: Stats {
            att,
            cha,
            int,
            luck: 1,
            dex: 1,
        },
        lvl: 10,
    }
}

pub fn catalog() -> ItemCatalog {
    ItemCatalog::new(vec![
        item("Sunforged Blade", Rarity::Epic, &["right"], 5, 2, 1),
        item("Moonlit Circlet", Rarity::Epic, &["head"], 0, 3, 4),
        item("Hunter's Longbow", Rarity::Rare, &["left", "right"], 3, 0, 0),
        item("Quilted Vest", Rarity::Rare, &["chest"], 1, 1, 0),
        item("Rusty Dagger", Rarity::Common, &["right"], 1, 0, 0),
        item("Straw Hat", Rarity::Common, &["head"], 0, 1, 0),
    ])
}

/// High band: epic roll picks the blade at 3000/point, then a rare chest.
pub fn epic_and_rare_chest() -> ScriptedDice {
    ScriptedDice::new()
        .rolls([80, 10, 95])
        .picks([0, 0])
        .amounts([3000])
}

pub fn scripted(dice: ScriptedDice) -> DiceFactory {
    Arc::new(move || Box::new(dice.clone()) as Box<dyn Dice>)
}

pub fn config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.guilds.clear();
    config.storage.data_dir = dir.path().display().to_string();
    config.bank.currency_name = "gold".to_string();
    config.logging.file = None;
    config
}

pub fn with_guild(mut config: Config, guild: GuildId, settings: GuildConfig) -> Config {
    config.guilds.insert(guild.to_string(), settings);
    config
}

pub struct Harness {
    pub service: CartService,
    pub surface: Arc<LocalSurface>,
    pub store: Arc<CartStore>,
    pub events: Arc<EventBus>,
    _dir: TempDir,
}

pub struct HarnessBuilder {
    dir: TempDir,
    config: Option<Config>,
    dice: ScriptedDice,
    catalog: ItemCatalog,
    characters: Option<Box<dyn FnOnce(CartStore) -> Arc<dyn CharacterStore>>>,
    ledger: Option<Box<dyn FnOnce(CartStore) -> Arc<dyn Ledger>>>,
    surface: Option<Box<dyn FnOnce(Arc<LocalSurface>) -> Arc<dyn Surface>>>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
            config: None,
            dice: epic_and_rare_chest(),
            catalog: catalog(),
            characters: None,
            ledger: None,
            surface: None,
        }
    }

    pub fn config(mut self, edit: impl FnOnce(Config) -> Config) -> Self {
        let base = config(&self.dir);
        self.config = Some(edit(base));
        self
    }

    pub fn dice(mut self, dice: ScriptedDice) -> Self {
        self.dice = dice;
        self
    }

    pub fn catalog(mut self, catalog: ItemCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Wrap the sled store with a different character store.
    pub fn characters(mut self, wrap: impl FnOnce(CartStore) -> Arc<dyn CharacterStore> + 'static) -> Self {
        self.characters = Some(Box::new(wrap));
        self
    }

    /// Wrap the sled store with a different ledger.
    pub fn ledger(mut self, wrap: impl FnOnce(CartStore) -> Arc<dyn Ledger> + 'static) -> Self {
        self.ledger = Some(Box::new(wrap));
        self
    }

    /// Put another surface in front of the local one. [`Harness::surface`] stays the
    /// local surface so tests can still inject and inspect.
    pub fn surface(mut self, wrap: impl FnOnce(Arc<LocalSurface>) -> Arc<dyn Surface> + 'static) -> Self {
        self.surface = Some(Box::new(wrap));
        self
    }

    pub fn build(self) -> Harness {
        let config = self.config.unwrap_or_else(|| config(&self.dir));
        let store = Arc::new(
            CartStoreBuilder::new(config.db_path())
                .currency_name(config.bank.currency_name.clone())
                .open()
                .expect("store"),
        );
        let characters: Arc<dyn CharacterStore> = match self.characters {
            Some(wrap) => wrap((*store).clone()),
            None => store.clone(),
        };
        let ledger: Arc<dyn Ledger> = match self.ledger {
            Some(wrap) => wrap((*store).clone()),
            None => store.clone(),
        };
        let surface = Arc::new(LocalSurface::new());
        let facing: Arc<dyn Surface> = match self.surface {
            Some(wrap) => wrap(surface.clone()),
            None => surface.clone(),
        };
        let events = Arc::new(EventBus::default());
        let service = CartService::new(
            Arc::new(config),
            Arc::new(self.catalog),
            facing,
            ledger,
            characters,
            events.clone(),
        )
        .with_dice(scripted(self.dice));
        Harness {
            service,
            surface,
            store,
            events,
            _dir: self.dir,
        }
    }
}

pub fn reaction(guild: GuildId, message: MessageRef, user: UserId, number: usize) -> Reaction {
    Reaction {
        guild,
        message,
        user,
        emoji: NUMBER_EMOJIS[number - 1].to_string(),
    }
}

/// Number of cart listings posted so far.
pub fn listings_posted(surface: &LocalSurface) -> usize {
    surface
        .sent_texts()
        .iter()
        .filter(|t| t.contains("is bringing the cart around"))
        .count()
}

/// Wait until `waiters` purchases are listening for a typed reply.
pub async fn until_waiting(surface: &LocalSurface, waiters: usize) {
    while surface.reply_waiters() < waiters {
        tokio::task::yield_now().await;
    }
}

/// Type `text` into the cart channel as `user` once a purchase is asking.
pub async fn reply_when_asked(surface: &LocalSurface, user: UserId, text: &str) -> MessageRef {
    until_waiting(surface, 1).await;
    surface.inject_reply(CHANNEL, user, text)
}

/// The quantity prompt sent to `user`, if one was posted.
pub fn prompt_for(surface: &LocalSurface, user: UserId) -> Option<MessageRef> {
    let asking = format!("<@{}>, how many", user);
    surface.history().into_iter().find_map(|r| match r {
        SurfaceRecord::Sent { message, text } if text.starts_with(&asking) => Some(message),
        _ => None,
    })
}
