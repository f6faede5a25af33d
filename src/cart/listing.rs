//! Plain-text rendering of a cart's stock and purchase messages.

use crate::cart::stock::{Offer, OfferKind};
use crate::cart::types::humanize_number;

/// Announcement plus one numbered line per offer, then the call to action.
pub fn format_offer_listing(cart_name: &str, stock: &[Offer], currency: &str) -> String {
    let mut text = format!("[{} is bringing the cart around!]\n", cart_name);
    for (index, offer) in stock.iter().enumerate() {
        let price = humanize_number(offer.price);
        let line = match &offer.kind {
            OfferKind::Item(template) => {
                let s = template.effective_stats();
                format!(
                    "[{}] Lvl req {} | {} (Attack: {}, Intelligence: {}, Charisma: {}, Luck: {}, Dexterity: {} [{}]) for {} {}.\n",
                    index + 1,
                    offer.level_requirement,
                    offer.display_name,
                    s.att,
                    s.int,
                    s.cha,
                    s.luck,
                    s.dex,
                    template.hand_label(),
                    price,
                    currency
                )
            }
            OfferKind::Chest(_) => format!(
                "[{}] {} for {} {}.\n",
                index + 1,
                offer.display_name,
                price,
                currency
            ),
        };
        text.push_str(&line);
    }
    text.push_str("Do you want to buy any of these fine items? Tell me which one below:");
    text
}

pub fn quantity_prompt(user: &str, offer: &Offer) -> String {
    format!(
        "{}, how many {} - {} would you like to buy?",
        user,
        offer.display_name,
        humanize_number(offer.price)
    )
}

pub fn purchase_announcement(user: &str, quantity: u64, offer: &Offer, total: u64, currency: &str) -> String {
    format!(
        "{} bought {} {} for {} {} and put it into their backpack.",
        user,
        quantity,
        offer.display_name,
        humanize_number(total),
        currency
    )
}

pub const WASTING_TIME: &str = "You're wasting my time.";

pub fn insufficient_funds(user: &str, currency: &str) -> String {
    format!("{}, you do not have enough {}.", user, currency)
}

pub fn purchase_not_recorded(user: &str, refunded: bool) -> String {
    if refunded {
        format!("{}, the cart could not record your purchase; you were refunded.", user)
    } else {
        format!("{}, the cart could not record your purchase.", user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::catalog::{ItemTemplate, Rarity, Stats};
    use crate::cart::stock::ChestTier;

    #[test]
    fn listing_numbers_offers_from_one() {
        let axe = ItemTemplate {
            name: "Woodsman's Axe".into(),
            rarity: Rarity::Common,
            slots: vec!["left".into(), "right".into()],
            stats: Stats {
                att: 2,
                luck: 1,
                ..Stats::default()
            },
            lvl: 4,
        };
        let stock = vec![Offer::item(axe, 320), Offer::chest(ChestTier::Epic, 100_000)];
        let text = format_offer_listing("Hawl's brother", &stock, "gold");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "[Hawl's brother is bringing the cart around!]");
        assert_eq!(
            lines[1],
            "[1] Lvl req 4 | Woodsman's Axe (Attack: 4, Intelligence: 0, Charisma: 0, Luck: 2, Dexterity: 0 [two handed]) for 320 gold."
        );
        assert_eq!(lines[2], "[2] epic chest for 100,000 gold.");
        assert!(lines[3].starts_with("Do you want to buy"));
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn empty_stock_still_asks() {
        let text = format_offer_listing("Old Marta", &[], "credits");
        assert_eq!(
            text,
            "[Old Marta is bringing the cart around!]\nDo you want to buy any of these fine items? Tell me which one below:"
        );
    }

    #[test]
    fn failure_notice_mentions_refund_only_when_made() {
        assert_eq!(
            purchase_not_recorded("<@1>", true),
            "<@1>, the cart could not record your purchase; you were refunded."
        );
        assert_eq!(
            purchase_not_recorded("<@1>", false),
            "<@1>, the cart could not record your purchase."
        );
    }
}
