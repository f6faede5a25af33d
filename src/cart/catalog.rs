//! Item templates the cart can stock, grouped by rarity.
//!
//! The catalog is loaded once at startup, either from the bundled seed
//! (`data/seeds/items.json`) or from a file named in `[storage] catalog_file`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::cart::dice::Dice;
use crate::cart::errors::CartError;

const BUNDLED_ITEMS: &str = include_str!("../../data/seeds/items.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
}

impl Rarity {
    /// Inclusive per-point price band used by the cart.
    pub fn price_band(self) -> (u64, u64) {
        match self {
            Rarity::Epic => (2000, 5000),
            Rarity::Rare => (250, 500),
            Rarity::Common => (50, 100),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rarity::Common => "common",
            Rarity::Rare => "rare",
            Rarity::Epic => "epic",
        }
    }
}

/// Attribute bonuses of an item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub att: i32,
    #[serde(default)]
    pub cha: i32,
    #[serde(default)]
    pub int: i32,
    #[serde(default)]
    pub luck: i32,
    #[serde(default)]
    pub dex: i32,
}

impl Stats {
    fn doubled(self) -> Self {
        Self {
            att: self.att * 2,
            cha: self.cha * 2,
            int: self.int * 2,
            luck: self.luck * 2,
            dex: self.dex * 2,
        }
    }
}

/// A catalog entry. Owned by the character sheet once bought.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTemplate {
    pub name: String,
    pub rarity: Rarity,
    /// Equip slots; two entries means the item is wielded with both hands.
    pub slots: Vec<String>,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default)]
    pub lvl: u32,
}

impl ItemTemplate {
    pub fn is_two_handed(&self) -> bool {
        self.slots.len() == 2
    }

    /// Bonuses as they apply when equipped: two-handed items count twice.
    pub fn effective_stats(&self) -> Stats {
        if self.is_two_handed() {
            self.stats.doubled()
        } else {
            self.stats
        }
    }

    /// Pricing weight, `max(att + cha + int, 1)` over effective stats.
    pub fn price_weight(&self) -> u64 {
        let s = self.effective_stats();
        (s.att as i64 + s.cha as i64 + s.int as i64).max(1) as u64
    }

    /// Short wield description for listings ("two handed", "right handed", "head slot").
    pub fn hand_label(&self) -> String {
        if self.is_two_handed() {
            return "two handed".to_string();
        }
        match self.slots.first().map(String::as_str) {
            Some(side @ ("left" | "right")) => format!("{} handed", side),
            Some(slot) => format!("{} slot", slot),
            None => "no slot".to_string(),
        }
    }
}

/// Result of drawing one template from a rarity tier.
#[derive(Debug, PartialEq, Eq)]
pub enum TierPick<'a> {
    Picked(&'a ItemTemplate),
    /// The drawn template is already taken; another roll may succeed.
    Duplicate,
    /// Every template in the tier is taken, or the tier is empty.
    Exhausted,
}

#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    tiers: HashMap<Rarity, Vec<ItemTemplate>>,
}

impl ItemCatalog {
    pub fn new(items: Vec<ItemTemplate>) -> Self {
        let mut tiers: HashMap<Rarity, Vec<ItemTemplate>> = HashMap::new();
        for item in items {
            let tier = tiers.entry(item.rarity).or_default();
            if tier.iter().any(|existing| existing.name == item.name) {
                log::warn!("catalog: duplicate item '{}' ignored", item.name);
                continue;
            }
            tier.push(item);
        }
        Self { tiers }
    }

    /// Catalog shipped with the crate.
    pub fn bundled() -> Result<Self, CartError> {
        Self::from_json_str(BUNDLED_ITEMS)
    }

    pub fn from_json_str(json: &str) -> Result<Self, CartError> {
        let items: Vec<ItemTemplate> =
            serde_json::from_str(json).map_err(|e| CartError::Catalog(e.to_string()))?;
        Ok(Self::new(items))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CartError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| CartError::Catalog(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&contents)
            .map_err(|e| CartError::Catalog(format!("{}: {}", path.display(), e)))
    }

    pub fn tier(&self, rarity: Rarity) -> &[ItemTemplate] {
        self.tiers.get(&rarity).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.tiers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Draw one template uniformly from `rarity`. `taken` reports names already stocked.
    pub fn draw(
        &self,
        rarity: Rarity,
        dice: &mut dyn Dice,
        taken: impl Fn(&str) -> bool,
    ) -> TierPick<'_> {
        let tier = self.tier(rarity);
        if tier.iter().all(|item| taken(&item.name)) {
            return TierPick::Exhausted;
        }
        let item = &tier[dice.pick(tier.len())];
        if taken(&item.name) {
            TierPick::Duplicate
        } else {
            TierPick::Picked(item)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::dice::ScriptedDice;

    fn item(name: &str, rarity: Rarity, slots: &[&str], att: i32, cha: i32, int: i32) -> ItemTemplate {
        ItemTemplate {
            name: name.to_string(),
            rarity,
            slots: slots.iter().map(|s| s.to_string()).collect(),
            stats: Stats {
                att,
                cha,
                int,
                luck: 1,
                dex: -1,
            },
            lvl: 3,
        }
    }

    #[test]
    fn two_handed_doubles_every_bonus() {
        let great = item("greatsword", Rarity::Rare, &["left", "right"], 4, 1, 0);
        let stats = great.effective_stats();
        assert_eq!(stats, Stats { att: 8, cha: 2, int: 0, luck: 2, dex: -2 });
        assert_eq!(great.price_weight(), 10);
        assert_eq!(great.hand_label(), "two handed");
    }

    #[test]
    fn weight_never_drops_below_one() {
        let cursed = item("cursed ring", Rarity::Common, &["ring"], -3, 0, 1);
        assert_eq!(cursed.price_weight(), 1);
        assert_eq!(cursed.hand_label(), "ring slot");
        let dagger = item("dagger", Rarity::Common, &["right"], 1, 0, 0);
        assert_eq!(dagger.hand_label(), "right handed");
    }

    #[test]
    fn draw_reports_duplicate_and_exhausted() {
        let catalog = ItemCatalog::new(vec![
            item("a", Rarity::Epic, &["head"], 1, 1, 1),
            item("b", Rarity::Epic, &["head"], 1, 1, 1),
        ]);
        let mut dice = ScriptedDice::new().picks([0, 1]);
        assert_eq!(catalog.draw(Rarity::Epic, &mut dice, |n| n == "a"), TierPick::Duplicate);
        match catalog.draw(Rarity::Epic, &mut dice, |n| n == "a") {
            TierPick::Picked(t) => assert_eq!(t.name, "b"),
            other => panic!("expected pick, got {:?}", other),
        }
        assert_eq!(catalog.draw(Rarity::Epic, &mut dice, |_| true), TierPick::Exhausted);
        assert_eq!(catalog.draw(Rarity::Common, &mut dice, |_| false), TierPick::Exhausted);
    }

    #[test]
    fn bundled_catalog_covers_every_tier() {
        let catalog = ItemCatalog::bundled().expect("bundled catalog parses");
        for rarity in [Rarity::Common, Rarity::Rare, Rarity::Epic] {
            assert!(catalog.tier(rarity).len() >= 3, "{} tier too small", rarity.as_str());
        }
    }
}
