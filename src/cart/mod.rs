//! # Traveling cart
//!
//! Every so often a merchant rolls into a guild, posts a small random stock and
//! leaves after a countdown. Players react with a number to buy.
//!
//! - [`stock`] rolls the offers from the [`catalog`] using a [`dice::Dice`].
//! - [`session`] holds per-guild carts, cooldown stamps and purchase locks.
//! - [`service::CartService`] opens and closes carts; [`purchase`] adds the buying flow.
//! - [`surface`], [`ledger`] and [`events`] are the seams to the outside world.

pub mod catalog;
pub mod character;
pub mod countdown;
pub mod dice;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod listing;
pub mod purchase;
pub mod service;
pub mod session;
pub mod stock;
pub mod surface;
pub mod types;

pub use errors::{CartError, StockError};
pub use purchase::PurchaseOutcome;
pub use service::CartService;
pub use session::{BuyerSlot, CartSnapshot, CartState, IgnoreReason, OpenOutcome, SuppressReason};
