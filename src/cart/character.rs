//! The slice of a character sheet the cart touches: treasure chests and the backpack.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cart::catalog::ItemTemplate;
use crate::cart::stock::{Offer, OfferKind};
use crate::cart::types::UserId;

pub const CHARACTER_SCHEMA_VERSION: u8 = 1;

/// A stack of identical items in a backpack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackpackItem {
    pub item: ItemTemplate,
    pub owned: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub user: UserId,
    /// Unopened chests: normal, rare, epic.
    pub treasure: [u64; 3],
    /// Stacks keyed by item name.
    pub backpack: BTreeMap<String, BackpackItem>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl Character {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            treasure: [0; 3],
            backpack: BTreeMap::new(),
            updated_at: Utc::now(),
            schema_version: CHARACTER_SCHEMA_VERSION,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn owned(&self, item_name: &str) -> u64 {
        self.backpack.get(item_name).map(|s| s.owned).unwrap_or(0)
    }

    /// Credit `quantity` units of `offer`: chests go to the treasure counters, items
    /// are stacked by name.
    pub fn apply_purchase(&mut self, offer: &Offer, quantity: u64) {
        match &offer.kind {
            OfferKind::Chest(tier) => {
                let slot = &mut self.treasure[tier.treasure_index()];
                *slot = slot.saturating_add(quantity);
            }
            OfferKind::Item(template) => {
                let fresh = BackpackItem {
                    item: template.clone(),
                    owned: quantity,
                };
                match self.backpack.get_mut(&template.name) {
                    Some(stack) => stack.owned = stack.owned.saturating_add(quantity),
                    None => {
                        self.backpack.insert(template.name.clone(), fresh);
                    }
                }
            }
        }
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::catalog::{Rarity, Stats};
    use crate::cart::stock::ChestTier;

    fn sword_offer() -> Offer {
        Offer::item(
            ItemTemplate {
                name: "Silvered Rapier".into(),
                rarity: Rarity::Rare,
                slots: vec!["right".into()],
                stats: Stats {
                    att: 4,
                    dex: 2,
                    ..Stats::default()
                },
                lvl: 8,
            },
            1200,
        )
    }

    #[test]
    fn chests_increment_matching_counter() {
        let mut c = Character::new(UserId(1));
        c.apply_purchase(&Offer::chest(ChestTier::Rare, 50_000), 2);
        c.apply_purchase(&Offer::chest(ChestTier::Epic, 100_000), 1);
        c.apply_purchase(&Offer::chest(ChestTier::Rare, 50_000), 3);
        assert_eq!(c.treasure, [0, 5, 1]);
        assert!(c.backpack.is_empty());
    }

    #[test]
    fn items_merge_into_existing_stack() {
        let mut c = Character::new(UserId(1));
        let offer = sword_offer();
        c.apply_purchase(&offer, 3);
        assert_eq!(c.owned("Silvered Rapier"), 3);
        c.apply_purchase(&offer, 4);
        assert_eq!(c.owned("Silvered Rapier"), 7);
        assert_eq!(c.backpack.len(), 1);
        assert_eq!(c.treasure, [0, 0, 0]);
    }
}
