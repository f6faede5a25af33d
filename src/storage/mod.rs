//! # Storage
//!
//! Sled-backed persistence for the two records the cart touches: player balances and
//! character sheets. [`CartStore`] implements both [`Ledger`] and [`CharacterStore`].
//!
//! ```text
//! <data_dir>/cart/
//! ├── characters   ← "characters:<user id>" → bincode(Character)
//! └── balances     ← "balances:<user id>"   → u64 big-endian
//! ```
//!
//! Balance updates go through `fetch_and_update`, so a withdrawal either applies in
//! full or not at all even with several tasks spending for the same player.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sled::IVec;

use crate::cart::character::{Character, CHARACTER_SCHEMA_VERSION};
use crate::cart::errors::{LedgerError, StoreError};
use crate::cart::ledger::{CharacterStore, Ledger, DEFAULT_CURRENCY};
use crate::cart::types::{GuildId, UserId};

const TREE_CHARACTERS: &str = "characters";
const TREE_BALANCES: &str = "balances";

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct CartStoreBuilder {
    path: PathBuf,
    currency_name: String,
    starting_balance: u64,
}

impl CartStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            currency_name: DEFAULT_CURRENCY.to_string(),
            starting_balance: 0,
        }
    }

    pub fn currency_name(mut self, name: impl Into<String>) -> Self {
        self.currency_name = name.into();
        self
    }

    /// Balance granted by [`CartStore::ensure_account`] to players seen for the first time.
    pub fn starting_balance(mut self, amount: u64) -> Self {
        self.starting_balance = amount;
        self
    }

    pub fn open(self) -> Result<CartStore, StoreError> {
        let mut store = CartStore::open(self.path)?;
        store.currency_name = self.currency_name;
        store.starting_balance = self.starting_balance;
        Ok(store)
    }
}

/// Sled-backed balances and character sheets. Cheap to clone.
#[derive(Clone)]
pub struct CartStore {
    _db: Arc<sled::Db>,
    characters: sled::Tree,
    balances: sled::Tree,
    currency_name: String,
    starting_balance: u64,
}

impl CartStore {
    /// Open (or create) the store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let characters = db.open_tree(TREE_CHARACTERS)?;
        let balances = db.open_tree(TREE_BALANCES)?;
        Ok(Self {
            _db: Arc::new(db),
            characters,
            balances,
            currency_name: DEFAULT_CURRENCY.to_string(),
            starting_balance: 0,
        })
    }

    fn character_key(user: UserId) -> Vec<u8> {
        format!("characters:{}", user).into_bytes()
    }

    fn balance_key(user: UserId) -> Vec<u8> {
        format!("balances:{}", user).into_bytes()
    }

    fn decode_balance(bytes: &[u8]) -> Result<u64, StoreError> {
        let raw: [u8; 8] = bytes
            .try_into()
            .map_err(|_| StoreError::Corrupt(format!("balance of {} bytes", bytes.len())))?;
        Ok(u64::from_be_bytes(raw))
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: IVec) -> Result<T, StoreError> {
        Ok(bincode::deserialize::<T>(&bytes)?)
    }

    /// Fetch a character sheet, if one was ever saved.
    pub fn get_character(&self, user: UserId) -> Result<Option<Character>, StoreError> {
        let Some(bytes) = self.characters.get(Self::character_key(user))? else {
            return Ok(None);
        };
        let record: Character = Self::deserialize(bytes)?;
        if record.schema_version != CHARACTER_SCHEMA_VERSION {
            return Err(StoreError::SchemaMismatch {
                entity: "character",
                expected: CHARACTER_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        Ok(Some(record))
    }

    /// Insert or update a character sheet.
    pub fn put_character(&self, character: &Character) -> Result<(), StoreError> {
        let mut record = character.clone();
        record.schema_version = CHARACTER_SCHEMA_VERSION;
        let bytes = bincode::serialize(&record)?;
        self.characters.insert(Self::character_key(record.user), bytes)?;
        self.characters.flush()?;
        Ok(())
    }

    pub fn get_balance(&self, user: UserId) -> Result<u64, StoreError> {
        match self.balances.get(Self::balance_key(user))? {
            Some(bytes) => Self::decode_balance(&bytes),
            None => Ok(0),
        }
    }

    pub fn set_balance(&self, user: UserId, amount: u64) -> Result<(), StoreError> {
        self.balances
            .insert(Self::balance_key(user), amount.to_be_bytes().to_vec())?;
        self.balances.flush()?;
        Ok(())
    }

    /// Grant the starting balance to a player with no balance record. Returns whether
    /// a grant was made.
    pub fn ensure_account(&self, user: UserId) -> Result<bool, StoreError> {
        let key = Self::balance_key(user);
        let created = self
            .balances
            .compare_and_swap(
                key,
                None as Option<&[u8]>,
                Some(self.starting_balance.to_be_bytes().to_vec()),
            )?
            .is_ok();
        if created {
            self.balances.flush()?;
            log::info!("opened account for {} with {}", user, self.starting_balance);
        }
        Ok(created)
    }

    /// Apply `op` to a balance atomically. `op` returns the new balance or refuses.
    fn update_balance<F>(&self, user: UserId, op: F) -> Result<u64, LedgerError>
    where
        F: Fn(u64) -> Result<u64, LedgerError>,
    {
        let key = Self::balance_key(user);
        let mut refusal: Option<LedgerError> = None;
        let mut corrupt = false;
        let previous = self
            .balances
            .fetch_and_update(&key, |current| {
                refusal = None;
                let balance = match current.map(Self::decode_balance).transpose() {
                    Ok(b) => b.unwrap_or(0),
                    Err(_) => {
                        corrupt = true;
                        return current.map(|c| c.to_vec());
                    }
                };
                match op(balance) {
                    Ok(next) => Some(next.to_be_bytes().to_vec()),
                    Err(e) => {
                        refusal = Some(e);
                        current.map(|c| c.to_vec())
                    }
                }
            })
            .map_err(StoreError::from)?;
        if corrupt {
            return Err(StoreError::Corrupt(format!("balance for {}", user)).into());
        }
        if let Some(e) = refusal {
            return Err(e);
        }
        self.balances.flush().map_err(StoreError::from)?;
        let before = match previous {
            Some(bytes) => Self::decode_balance(&bytes)?,
            None => 0,
        };
        op(before)
    }

    pub fn len_characters(&self) -> usize {
        self.characters.len()
    }
}

#[async_trait]
impl Ledger for CartStore {
    async fn can_spend(&self, user: UserId, amount: u64) -> Result<bool, LedgerError> {
        Ok(self.get_balance(user)? >= amount)
    }

    async fn withdraw(&self, user: UserId, amount: u64) -> Result<u64, LedgerError> {
        self.update_balance(user, |balance| {
            balance
                .checked_sub(amount)
                .ok_or(LedgerError::InsufficientFunds {
                    user,
                    needed: amount,
                    available: balance,
                })
        })
    }

    async fn deposit(&self, user: UserId, amount: u64) -> Result<u64, LedgerError> {
        self.update_balance(user, |balance| {
            balance
                .checked_add(amount)
                .ok_or(LedgerError::BalanceTooHigh(user))
        })
    }

    async fn balance(&self, user: UserId) -> Result<u64, LedgerError> {
        Ok(self.get_balance(user)?)
    }

    async fn currency_name(&self, _guild: GuildId) -> String {
        self.currency_name.clone()
    }
}

#[async_trait]
impl CharacterStore for CartStore {
    async fn load(&self, user: UserId) -> Result<Character, StoreError> {
        Ok(self
            .get_character(user)?
            .unwrap_or_else(|| Character::new(user)))
    }

    async fn save(&self, character: &Character) -> Result<(), StoreError> {
        self.put_character(character)
    }
}
