use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

snowflake!(
    /// Server (guild) the cart visits. One live cart per guild.
    GuildId
);
snowflake!(
    /// Player identity; the key for balances, character sheets and purchase locks.
    UserId
);
snowflake!(ChannelId);
snowflake!(MessageId);

/// A posted message as seen by the cart: where it lives and its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub channel: ChannelId,
    pub id: MessageId,
}

/// A reaction added by a player to some message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub guild: GuildId,
    pub message: MessageRef,
    pub user: UserId,
    pub emoji: String,
}

/// A typed message from a player (used for quantity replies).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub message: MessageRef,
    pub author: UserId,
    pub content: String,
}

/// Keycap emoji used as purchase controls; position `i` selects stock index `i`.
pub const NUMBER_EMOJIS: [&str; 9] = [
    "1\u{fe0f}\u{20e3}",
    "2\u{fe0f}\u{20e3}",
    "3\u{fe0f}\u{20e3}",
    "4\u{fe0f}\u{20e3}",
    "5\u{fe0f}\u{20e3}",
    "6\u{fe0f}\u{20e3}",
    "7\u{fe0f}\u{20e3}",
    "8\u{fe0f}\u{20e3}",
    "9\u{fe0f}\u{20e3}",
];

/// Map a keycap emoji back to its stock index. Bare digits are accepted too so
/// text surfaces can react with `1`..`9`.
pub fn reaction_index(emoji: &str) -> Option<usize> {
    if let Some(pos) = NUMBER_EMOJIS.iter().position(|e| *e == emoji) {
        return Some(pos);
    }
    match emoji.trim().parse::<usize>() {
        Ok(n) if (1..=NUMBER_EMOJIS.len()).contains(&n) => Some(n - 1),
        _ => None,
    }
}

/// Format an amount with thousands separators (`12345` → `12,345`).
pub fn humanize_number(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
