//! # Wagonwheel - a traveling merchant cart for text adventures
//!
//! A vendor periodically shows up in a guild channel with a small randomized stock of
//! items and treasure chests. Players react with a number to buy, type a quantity,
//! and the purchase is paid from their balance and stored on their character sheet.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wagonwheel::cart::catalog::ItemCatalog;
//! use wagonwheel::cart::events::EventBus;
//! use wagonwheel::cart::surface::LocalSurface;
//! use wagonwheel::cart::types::{ChannelId, GuildId};
//! use wagonwheel::cart::CartService;
//! use wagonwheel::config::Config;
//! use wagonwheel::storage::CartStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Arc::new(Config::load("config.toml").await?);
//!     let store = Arc::new(CartStore::open(config.db_path())?);
//!     let service = CartService::new(
//!         config,
//!         Arc::new(ItemCatalog::bundled()?),
//!         Arc::new(LocalSurface::new()),
//!         store.clone(),
//!         store,
//!         Arc::new(EventBus::default()),
//!     );
//!     service.open_cart(GuildId(1), ChannelId(1), false).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`cart`] - stock generation, sessions, countdowns and purchases
//! - [`storage`] - sled-backed balances and character sheets
//! - [`config`] - TOML configuration
//! - [`logutil`] - log sanitizing helpers

pub mod cart;
pub mod config;
pub mod logutil;
pub mod storage;
