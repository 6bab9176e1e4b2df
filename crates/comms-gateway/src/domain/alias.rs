//! Address → alias registry.
//!
//! A single table shared by every connection of this process. Insertions happen
//! when a handshake succeeds and removals when a connection closes; both go
//! through one mutex so they are serialized across I/O tasks.

use crate::domain::types::{normalize_address, Alias, SYSTEM_ALIAS};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// First alias handed out. `0` is reserved for system messages.
const FIRST_ALIAS: Alias = 1;

struct AliasTable {
    by_address: HashMap<String, Alias>,
    in_use: HashSet<Alias>,
    next: Alias,
}

impl AliasTable {
    /// Next free alias. After wrapping, aliases still mapped are skipped.
    fn issue(&mut self) -> Alias {
        loop {
            let alias = self.next;
            self.next = match self.next.checked_add(1) {
                Some(next) => next,
                None => FIRST_ALIAS,
            };
            if !self.in_use.contains(&alias) {
                return alias;
            }
        }
    }
}

/// Registry mapping verified addresses to process-local aliases.
///
/// Lookups are case-insensitive: every address is normalized on the way in.
pub struct AliasRegistry {
    table: Mutex<AliasTable>,
}

impl AliasRegistry {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(AliasTable {
                by_address: HashMap::new(),
                in_use: HashSet::new(),
                next: FIRST_ALIAS,
            }),
        }
    }

    /// Return the alias already mapped to `address`, or issue the next one.
    ///
    /// An address that reconnects while its previous mapping is still present
    /// gets the existing alias back; both connections then share it.
    pub fn assign_or_reuse(&self, address: &str) -> Alias {
        let address = normalize_address(address);
        let mut table = self.table.lock();

        if let Some(alias) = table.by_address.get(&address) {
            debug!(address = %address, alias = *alias, "Reusing existing alias");
            return *alias;
        }

        let alias = table.issue();
        debug_assert_ne!(alias, SYSTEM_ALIAS);
        table.by_address.insert(address.clone(), alias);
        table.in_use.insert(alias);
        debug!(address = %address, alias, "Assigned alias");
        alias
    }

    /// Alias currently mapped to `address`, if any.
    pub fn lookup(&self, address: &str) -> Option<Alias> {
        let address = normalize_address(address);
        self.table.lock().by_address.get(&address).copied()
    }

    /// Remove the mapping for `address`. Idempotent.
    pub fn release(&self, address: &str) -> Option<Alias> {
        let address = normalize_address(address);
        let mut table = self.table.lock();
        let released = table.by_address.remove(&address);
        if let Some(alias) = released {
            table.in_use.remove(&alias);
            debug!(address = %address, alias, "Released alias");
        }
        released
    }

    /// Number of mapped addresses
    pub fn len(&self) -> usize {
        self.table.lock().by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn set_next(&self, next: Alias) {
        self.table.lock().next = next;
    }
}

impl Default for AliasRegistry {
    fn default() -> Self {
        Self::new()
    }
}
