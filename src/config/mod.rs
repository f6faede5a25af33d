//! # Configuration
//!
//! TOML configuration for the cart service. Global cart behaviour lives under
//! `[cart]`; each guild may override its cart under `[guilds."<guild id>"]`.
//!
//! ```toml
//! [cart]
//! cart_name = "Hawl's brother"
//! enable_chests = true
//! stock_count = 2
//! countdown_cap_secs = 180
//! reply_timeout_secs = 30
//!
//! [guilds."1001"]
//! cart_channels = [2001]
//! cart_name = "Old Marta"
//! cooldown = 900
//! cartroom = 2002
//! cart_timeout = 10800
//!
//! [storage]
//! data_dir = "./data"
//!
//! [bank]
//! currency_name = "gold"
//! starting_balance = 0
//!
//! [logging]
//! level = "info"
//! file = "wagonwheel.log"
//! ```
//!
//! ```rust,no_run
//! use wagonwheel::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("config.toml").await?;
//!     let config = Config::load("config.toml").await?;
//!     println!("cart: {}", config.cart.cart_name);
//!     Ok(())
//! }
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

use crate::cart::types::{ChannelId, GuildId, NUMBER_EMOJIS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cart: CartConfig,
    /// Per-guild overrides keyed by guild id.
    #[serde(default)]
    pub guilds: HashMap<String, GuildConfig>,
    pub storage: StorageConfig,
    #[serde(default)]
    pub bank: BankConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartConfig {
    #[serde(default = "default_cart_name")]
    pub cart_name: String,
    #[serde(default = "default_true")]
    pub enable_chests: bool,
    /// Offers per cart. Each needs its own number reaction, so at most 9.
    #[serde(default = "default_stock_count")]
    pub stock_count: usize,
    /// Longest a cart stays open, in seconds.
    #[serde(default = "default_countdown_cap")]
    pub countdown_cap_secs: u64,
    /// How long a buyer has to type a quantity.
    #[serde(default = "default_reply_timeout")]
    pub reply_timeout_secs: u64,
    /// Fixed RNG seed for reproducible stock (testing servers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
}

fn default_cart_name() -> String {
    "Hawl's brother".to_string()
}

fn default_true() -> bool {
    true
}

fn default_stock_count() -> usize {
    2
}

fn default_countdown_cap() -> u64 {
    180
}

fn default_reply_timeout() -> u64 {
    30
}

fn default_cart_timeout() -> u64 {
    10_800
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            cart_name: default_cart_name(),
            enable_chests: true,
            stock_count: default_stock_count(),
            countdown_cap_secs: default_countdown_cap(),
            reply_timeout_secs: default_reply_timeout(),
            rng_seed: None,
        }
    }
}

impl CartConfig {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildConfig {
    /// Channels the console scheduler opens carts in.
    #[serde(default)]
    pub cart_channels: Vec<u64>,
    /// Overrides `[cart] cart_name` when non-empty.
    #[serde(default)]
    pub cart_name: String,
    /// Seconds between scheduled open attempts; 0 turns the scheduler off.
    #[serde(default)]
    pub cooldown: u64,
    /// Channel every cart is posted in, whatever channel opened it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cartroom: Option<u64>,
    /// Seconds after an open before another open is allowed.
    #[serde(default = "default_cart_timeout")]
    pub cart_timeout: u64,
}

impl Default for GuildConfig {
    fn default() -> Self {
        Self {
            cart_channels: Vec::new(),
            cart_name: String::new(),
            cooldown: 0,
            cartroom: None,
            cart_timeout: default_cart_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Item catalog JSON; the bundled catalog is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankConfig {
    #[serde(default = "default_currency")]
    pub currency_name: String,
    /// Balance granted the first time a player is seen by the console.
    #[serde(default)]
    pub starting_balance: u64,
}

fn default_currency() -> String {
    "credits".to_string()
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            currency_name: default_currency(),
            starting_balance: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;
        config.validate()?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.cart.stock_count == 0 || self.cart.stock_count > NUMBER_EMOJIS.len() {
            return Err(anyhow!(
                "cart.stock_count must be between 1 and {} (got {})",
                NUMBER_EMOJIS.len(),
                self.cart.stock_count
            ));
        }
        if self.cart.cart_name.trim().is_empty() {
            return Err(anyhow!("cart.cart_name must not be empty"));
        }
        for key in self.guilds.keys() {
            if key.parse::<u64>().is_err() {
                return Err(anyhow!("guild key '{}' is not a numeric id", key));
            }
        }
        Ok(())
    }

    /// Settings for `guild`, falling back to defaults for unknown guilds.
    pub fn guild(&self, guild: GuildId) -> GuildConfig {
        self.guilds
            .get(&guild.to_string())
            .cloned()
            .unwrap_or_default()
    }

    /// Guild override when set, global name otherwise.
    pub fn cart_name(&self, guild: GuildId) -> String {
        let override_name = self.guild(guild).cart_name;
        if override_name.trim().is_empty() {
            self.cart.cart_name.clone()
        } else {
            override_name
        }
    }

    /// Where a cart opened from `invoked_in` is posted.
    pub fn cart_channel(&self, guild: GuildId, invoked_in: ChannelId) -> ChannelId {
        self.guild(guild)
            .cartroom
            .map(ChannelId)
            .unwrap_or(invoked_in)
    }

    /// Guild ids with scheduled carts, sorted.
    pub fn scheduled_guilds(&self) -> Vec<(GuildId, GuildConfig)> {
        let mut out: Vec<(GuildId, GuildConfig)> = self
            .guilds
            .iter()
            .filter(|(_, g)| g.cooldown > 0 && !g.cart_channels.is_empty())
            .filter_map(|(k, g)| k.parse::<u64>().ok().map(|id| (GuildId(id), g.clone())))
            .collect();
        out.sort_by_key(|(id, _)| *id);
        out
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir).join("cart")
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut guilds = HashMap::new();
        guilds.insert(
            "1".to_string(),
            GuildConfig {
                cart_channels: vec![1],
                ..GuildConfig::default()
            },
        );
        Config {
            cart: CartConfig::default(),
            guilds,
            storage: StorageConfig {
                data_dir: "./data".to_string(),
                catalog_file: None,
            },
            bank: BankConfig {
                currency_name: "gold".to_string(),
                starting_balance: 250_000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("wagonwheel.log".to_string()),
            },
        }
    }
}
