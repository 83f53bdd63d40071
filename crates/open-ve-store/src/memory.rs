//! In-memory Store variant: a concurrent mapping guarded by a
//! reader/writer lock. Keys are node-prefixed so one process can host
//! more than one node's state without collision; `reset()` walks only
//! the keys under the current node's prefix, leaving every other
//! node's entries untouched.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use open_ve_core::{Dsl, Variable};

use crate::error::StoreError;
use crate::{ast_key, schema_key, variables_key, Store};

/// Node-prefixed `Arc<RwLock<HashMap<String, Vec<u8>>>>`.
pub struct MemoryStore {
    node: String,
    data: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn prefix(&self) -> String {
        format!("{}:", self.node)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn reset(&self) -> Result<(), StoreError> {
        let prefix = self.prefix();
        let mut data = self.data.write().await;
        data.retain(|k, _| !k.starts_with(&prefix));
        Ok(())
    }

    async fn write_schema(&self, dsl: &Dsl) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(dsl)
            .map_err(|e| StoreError::Unavailable(format!("encode schema: {e}")))?;
        self.data.write().await.insert(schema_key(&self.node), bytes);
        Ok(())
    }

    async fn read_schema(&self) -> Result<Dsl, StoreError> {
        let data = self.data.read().await;
        let bytes = data
            .get(&schema_key(&self.node))
            .ok_or_else(|| StoreError::KeyMissing(schema_key(&self.node)))?;
        serde_json::from_slice(bytes).map_err(|e| StoreError::Unavailable(format!("decode schema: {e}")))
    }

    async fn write_variables(&self, id: &str, variables: &[Variable]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(variables)
            .map_err(|e| StoreError::Unavailable(format!("encode variables: {e}")))?;
        self.data
            .write()
            .await
            .insert(variables_key(&self.node, id), bytes);
        Ok(())
    }

    async fn read_variables(&self, id: &str) -> Result<Vec<Variable>, StoreError> {
        let data = self.data.read().await;
        let key = variables_key(&self.node, id);
        let bytes = data.get(&key).ok_or_else(|| StoreError::KeyMissing(key))?;
        serde_json::from_slice(bytes).map_err(|e| StoreError::Unavailable(format!("decode variables: {e}")))
    }

    async fn write_all_ast(&self, id: &str, asts: &[Vec<u8>]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(asts)
            .map_err(|e| StoreError::Unavailable(format!("encode ast list: {e}")))?;
        self.data.write().await.insert(ast_key(&self.node, id), bytes);
        Ok(())
    }

    async fn read_all_ast(&self, id: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        let data = self.data.read().await;
        let key = ast_key(&self.node, id);
        match data.get(&key) {
            Some(bytes) => {
                serde_json::from_slice(bytes).map_err(|e| StoreError::Unavailable(format!("decode ast list: {e}")))
            }
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use open_ve_core::VariableType;

    fn dsl() -> Dsl {
        Dsl {
            validations: vec![],
        }
    }

    #[tokio::test]
    async fn reset_only_clears_this_nodes_keys() {
        let a = MemoryStore::new("a");

        a.write_schema(&dsl()).await.unwrap();
        a.write_variables("x", &[Variable { name: "n".into(), var_type: VariableType::Int }])
            .await
            .unwrap();

        let shared = MemoryStore {
            node: "b".to_string(),
            data: a.data.clone(),
        };
        shared.write_schema(&dsl()).await.unwrap();

        a.reset().await.unwrap();

        assert!(a.read_schema().await.is_err());
        assert!(shared.read_schema().await.is_ok());
    }

    #[tokio::test]
    async fn read_missing_variables_is_key_missing() {
        let s = MemoryStore::new("n");
        let err = s.read_variables("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::KeyMissing(_)));
    }

    #[tokio::test]
    async fn read_all_ast_for_unwritten_id_is_empty() {
        let s = MemoryStore::new("n");
        let asts = s.read_all_ast("nope").await.unwrap();
        assert!(asts.is_empty());
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let s = MemoryStore::new("n");
        let vars = vec![Variable {
            name: "num".into(),
            var_type: VariableType::Int,
        }];
        s.write_variables("x", &vars).await.unwrap();
        assert_eq!(s.read_variables("x").await.unwrap(), vars);

        let asts = vec![vec![1u8, 2, 3], vec![4, 5]];
        s.write_all_ast("x", &asts).await.unwrap();
        assert_eq!(s.read_all_ast("x").await.unwrap(), asts);
    }
}
