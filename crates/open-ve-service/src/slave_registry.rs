//! Slave Registry (master side): an in-memory index from
//! `validation_id` to the slave that claims it.

use std::collections::HashMap;
use std::sync::RwLock;

use open_ve_core::SlaveNode;

pub struct SlaveRegistry {
    slaves: RwLock<HashMap<String, SlaveNode>>,
    /// `validation_id -> owning slave id`, maintained alongside
    /// `slaves` so ownership conflicts between two *different* slaves
    /// resolve deterministically to whichever registered most
    /// recently, rather than to HashMap iteration order (§3: "if two
    /// slaves claim the same ID, last-writer-wins; lookup returns the
    /// current owner").
    owners: RwLock<HashMap<String, String>>,
}

impl SlaveRegistry {
    pub fn new() -> Self {
        Self {
            slaves: RwLock::new(HashMap::new()),
            owners: RwLock::new(HashMap::new()),
        }
    }

    /// Upsert: overwrites any prior record with the same slave id, and
    /// every `validation_id` in the new record points to this slave
    /// afterward — including stealing ownership from a different
    /// slave that previously claimed it. A validation id this slave
    /// owned before but dropped from this registration no longer
    /// resolves to it.
    pub fn register_slave(&self, record: SlaveNode) {
        let mut slaves = self.slaves.write().expect("slave registry lock poisoned");
        let mut owners = self.owners.write().expect("slave registry lock poisoned");

        owners.retain(|_, owner| owner != &record.id);
        for id in &record.validation_ids {
            owners.insert(id.clone(), record.id.clone());
        }
        slaves.insert(record.id.clone(), record);
    }

    pub fn find_slave(&self, validation_id: &str) -> Option<SlaveNode> {
        let owners = self.owners.read().expect("slave registry lock poisoned");
        let slave_id = owners.get(validation_id)?;
        let slaves = self.slaves.read().expect("slave registry lock poisoned");
        slaves.get(slave_id).cloned()
    }
}

impl Default for SlaveRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use open_ve_core::AuthnConfig;

    fn node(id: &str, ids: &[&str]) -> SlaveNode {
        SlaveNode {
            id: id.to_string(),
            http_address: format!("http://{id}"),
            tls_enabled: false,
            validation_ids: ids.iter().map(|s| s.to_string()).collect(),
            authn: AuthnConfig::default(),
        }
    }

    #[test]
    fn finds_the_slave_owning_an_id() {
        let registry = SlaveRegistry::new();
        registry.register_slave(node("s1", &["x-price"]));
        let found = registry.find_slave("x-price").unwrap();
        assert_eq!(found.id, "s1");
    }

    #[test]
    fn unknown_id_is_not_found() {
        let registry = SlaveRegistry::new();
        assert!(registry.find_slave("nope").is_none());
    }

    #[test]
    fn last_writer_wins_on_conflicting_ownership() {
        let registry = SlaveRegistry::new();
        registry.register_slave(node("s1", &["x"]));
        registry.register_slave(node("s2", &["x"]));
        // s2 registered "x" most recently, so it wins the conflict even
        // though s1's record (sans "x") is still present in the registry.
        assert_eq!(registry.find_slave("x").unwrap().id, "s2");

        registry.register_slave(node("s1", &["x"]));
        assert_eq!(registry.find_slave("x").unwrap().id, "s1");
    }

    #[test]
    fn registering_the_same_slave_id_again_replaces_the_record() {
        let registry = SlaveRegistry::new();
        registry.register_slave(node("s1", &["a"]));
        registry.register_slave(node("s1", &["b"]));
        assert!(registry.find_slave("a").is_none());
        assert_eq!(registry.find_slave("b").unwrap().id, "s1");
    }
}
