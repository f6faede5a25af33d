//! Contracts for the currency ledger and the character store.
//!
//! `storage::CartStore` implements both over sled; tests swap in instrumented
//! implementations to observe ordering or inject failures.

use async_trait::async_trait;

use crate::cart::character::Character;
use crate::cart::errors::{LedgerError, StoreError};
use crate::cart::types::{GuildId, UserId};

/// Name used when a guild's currency label is missing or unusable.
pub const DEFAULT_CURRENCY: &str = "credits";

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Whether `user` holds at least `amount`.
    async fn can_spend(&self, user: UserId, amount: u64) -> Result<bool, LedgerError>;

    /// Remove `amount` from `user`. Fails with `InsufficientFunds` without changing
    /// the balance.
    async fn withdraw(&self, user: UserId, amount: u64) -> Result<u64, LedgerError>;

    /// Add `amount` to `user`, returning the new balance.
    async fn deposit(&self, user: UserId, amount: u64) -> Result<u64, LedgerError>;

    async fn balance(&self, user: UserId) -> Result<u64, LedgerError>;

    async fn currency_name(&self, guild: GuildId) -> String;
}

#[async_trait]
pub trait CharacterStore: Send + Sync {
    /// Load the sheet for `user`; a user without one gets a fresh sheet.
    async fn load(&self, user: UserId) -> Result<Character, StoreError>;

    async fn save(&self, character: &Character) -> Result<(), StoreError>;
}

/// Currency label as shown to players. Raw custom-emoji markup (`<:coin:123>`) does
/// not render in plain text, so it falls back to [`DEFAULT_CURRENCY`].
pub fn display_currency(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.starts_with('<') {
        DEFAULT_CURRENCY.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emoji_markup_falls_back_to_credits() {
        assert_eq!(display_currency("<:gold:81234>"), "credits");
        assert_eq!(display_currency("  "), "credits");
        assert_eq!(display_currency("gold"), "gold");
    }
}
