//! Stock generation for the traveling cart.
//!
//! A single band draw per cart decides how generous the rarity windows are; each
//! subsequent percentile roll then lands in an epic, rare, chest or filler window:
//!
//! ```text
//! band     epic       rare          roll >= 90 (chests on)   otherwise
//! <= 60    <= 5       6..=25        normal @ 100,000         common
//! 61..=75  <= 15      16..=45       normal | rare            common
//! > 75     <= 25      -             rare | epic              rare
//! ```
//!
//! Rolls that would duplicate an offer are discarded. Outcomes whose candidates are
//! all stocked are marked exhausted; once every reachable outcome is exhausted (or
//! [`MAX_ROLLS`] is hit) generation fails instead of spinning.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::cart::catalog::{ItemCatalog, ItemTemplate, Rarity, TierPick};
use crate::cart::dice::Dice;
use crate::cart::errors::StockError;

/// Upper bound on percentile rolls per generation call.
pub const MAX_ROLLS: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChestTier {
    Normal,
    Rare,
    Epic,
}

impl ChestTier {
    pub const ALL: [ChestTier; 3] = [ChestTier::Normal, ChestTier::Rare, ChestTier::Epic];

    /// Standard price outside the low band.
    pub fn list_price(self) -> u64 {
        match self {
            ChestTier::Normal => 10_000,
            ChestTier::Rare => 50_000,
            ChestTier::Epic => 100_000,
        }
    }

    /// Slot in a character's treasure counters.
    pub fn treasure_index(self) -> usize {
        match self {
            ChestTier::Normal => 0,
            ChestTier::Rare => 1,
            ChestTier::Epic => 2,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ChestTier::Normal => "normal chest",
            ChestTier::Rare => "rare chest",
            ChestTier::Epic => "epic chest",
        }
    }
}

/// Chest-type context drawn once per cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Low,
    Mid,
    High,
}

impl Band {
    pub fn from_draw(draw: u32) -> Self {
        match draw {
            0..=60 => Band::Low,
            61..=75 => Band::Mid,
            _ => Band::High,
        }
    }

    /// Where a percentile roll lands in this band.
    pub fn outcome(self, roll: u32, chests_enabled: bool) -> Outcome {
        let chest = roll >= 90 && chests_enabled;
        match self {
            Band::Low => match roll {
                0..=5 => Outcome::Item(Rarity::Epic),
                6..=25 => Outcome::Item(Rarity::Rare),
                _ if chest => Outcome::Chest,
                _ => Outcome::Item(Rarity::Common),
            },
            Band::Mid => match roll {
                0..=15 => Outcome::Item(Rarity::Epic),
                16..=45 => Outcome::Item(Rarity::Rare),
                _ if chest => Outcome::Chest,
                _ => Outcome::Item(Rarity::Common),
            },
            Band::High => match roll {
                0..=25 => Outcome::Item(Rarity::Epic),
                _ if chest => Outcome::Chest,
                _ => Outcome::Item(Rarity::Rare),
            },
        }
    }

    /// Every outcome a roll can produce in this band.
    pub fn reachable(self, chests_enabled: bool) -> Vec<Outcome> {
        let mut outcomes = match self {
            Band::Low | Band::Mid => vec![
                Outcome::Item(Rarity::Epic),
                Outcome::Item(Rarity::Rare),
                Outcome::Item(Rarity::Common),
            ],
            Band::High => vec![Outcome::Item(Rarity::Epic), Outcome::Item(Rarity::Rare)],
        };
        if chests_enabled {
            outcomes.push(Outcome::Chest);
        }
        outcomes
    }

    /// Chest tiers that can drop in this band.
    pub fn chest_tiers(self) -> &'static [ChestTier] {
        match self {
            Band::Low => &[ChestTier::Normal],
            Band::Mid => &[ChestTier::Normal, ChestTier::Rare],
            Band::High => &[ChestTier::Rare, ChestTier::Epic],
        }
    }

    pub fn chest_price(self, tier: ChestTier) -> u64 {
        match (self, tier) {
            (Band::Low, ChestTier::Normal) => 100_000,
            _ => tier.list_price(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Item(Rarity),
    Chest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferKind {
    Item(ItemTemplate),
    Chest(ChestTier),
}

/// One purchasable line in a cart's stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    pub kind: OfferKind,
    pub display_name: String,
    pub price: u64,
    pub level_requirement: u32,
}

impl Offer {
    pub fn item(template: ItemTemplate, price: u64) -> Self {
        Self {
            display_name: template.name.clone(),
            level_requirement: template.lvl,
            kind: OfferKind::Item(template),
            price,
        }
    }

    pub fn chest(tier: ChestTier, price: u64) -> Self {
        Self {
            kind: OfferKind::Chest(tier),
            display_name: tier.display_name().to_string(),
            price,
            level_requirement: 0,
        }
    }
}

/// Item price: a per-point draw from the rarity band times the pricing weight.
pub fn price_item(template: &ItemTemplate, dice: &mut dyn Dice) -> u64 {
    let (low, high) = template.rarity.price_band();
    dice.between(low, high) * template.price_weight()
}

pub struct StockGenerator<'a> {
    catalog: &'a ItemCatalog,
    chests_enabled: bool,
}

impl<'a> StockGenerator<'a> {
    pub fn new(catalog: &'a ItemCatalog, chests_enabled: bool) -> Self {
        Self {
            catalog,
            chests_enabled,
        }
    }

    /// Build `count` offers with unique display names, in reaction order.
    pub fn generate(&self, count: usize, dice: &mut dyn Dice) -> Result<Vec<Offer>, StockError> {
        if count == 0 {
            return Err(StockError::EmptyRequest);
        }
        let band = Band::from_draw(dice.d100());
        let reachable = band.reachable(self.chests_enabled);
        let mut exhausted: HashSet<Outcome> = HashSet::new();
        let mut stock: Vec<Offer> = Vec::with_capacity(count);
        let mut rolls = 0usize;

        while stock.len() < count {
            if rolls >= MAX_ROLLS || reachable.iter().all(|o| exhausted.contains(o)) {
                log::warn!(
                    "cart stock exhausted after {} rolls ({:?} band, {}/{} offers)",
                    rolls,
                    band,
                    stock.len(),
                    count
                );
                return Err(StockError::Exhausted {
                    requested: count,
                    generated: stock.len(),
                });
            }
            rolls += 1;

            let outcome = band.outcome(dice.d100(), self.chests_enabled);
            if exhausted.contains(&outcome) {
                continue;
            }
            match outcome {
                Outcome::Item(rarity) => {
                    let pick = self.catalog.draw(rarity, dice, |name| {
                        stock.iter().any(|offer| offer.display_name == name)
                    });
                    match pick {
                        TierPick::Picked(template) => {
                            let price = price_item(template, dice);
                            stock.push(Offer::item(template.clone(), price));
                        }
                        TierPick::Duplicate => {}
                        TierPick::Exhausted => {
                            exhausted.insert(outcome);
                        }
                    }
                }
                Outcome::Chest => {
                    let remaining: Vec<ChestTier> = band
                        .chest_tiers()
                        .iter()
                        .copied()
                        .filter(|tier| {
                            !stock.iter().any(|offer| offer.display_name == tier.display_name())
                        })
                        .collect();
                    if remaining.is_empty() {
                        exhausted.insert(outcome);
                        continue;
                    }
                    let tier = remaining[dice.pick(remaining.len())];
                    stock.push(Offer::chest(tier, band.chest_price(tier)));
                }
            }
        }

        log::debug!("cart stock generated in {} rolls ({:?} band)", rolls, band);
        Ok(stock)
    }
}
