//! Redis-backed Store variant: same surface as the in-memory one,
//! delegating to an external KV service. `reset()` enumerates keys by
//! the current node's `<node>:*` prefix via `SCAN` and deletes them in
//! a pipeline, rather than flushing the whole database — several
//! nodes can share one Redis instance without stepping on each other's
//! state.

use futures::StreamExt;
use redis::{aio::ConnectionManager, AsyncCommands};

use open_ve_core::{Dsl, Variable};

use crate::error::StoreError;
use crate::{ast_key, schema_key, variables_key, Store};

#[derive(Clone)]
pub struct RedisStore {
    node: String,
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(addr: &str, node: impl Into<String>) -> Result<Self, StoreError> {
        let client =
            redis::Client::open(addr).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let conn = client
            .get_tokio_connection_manager()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            node: node.into(),
            conn,
        })
    }

    pub fn new(conn: ConnectionManager, node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            conn,
        }
    }
}

#[async_trait::async_trait]
impl Store for RedisStore {
    async fn reset(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}:*", self.node);
        let keys: Vec<String> = conn
            .scan_match(&pattern)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .collect()
            .await;
        if keys.is_empty() {
            return Ok(());
        }
        conn.del(keys)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn write_schema(&self, dsl: &Dsl) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(dsl)
            .map_err(|e| StoreError::Unavailable(format!("encode schema: {e}")))?;
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(schema_key(&self.node), bytes)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn read_schema(&self) -> Result<Dsl, StoreError> {
        let mut conn = self.conn.clone();
        let key = schema_key(&self.node);
        let bytes: Option<Vec<u8>> = conn
            .get(&key)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let bytes = bytes.ok_or(StoreError::KeyMissing(key))?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Unavailable(format!("decode schema: {e}")))
    }

    async fn write_variables(&self, id: &str, variables: &[Variable]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(variables)
            .map_err(|e| StoreError::Unavailable(format!("encode variables: {e}")))?;
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(variables_key(&self.node, id), bytes)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn read_variables(&self, id: &str) -> Result<Vec<Variable>, StoreError> {
        let mut conn = self.conn.clone();
        let key = variables_key(&self.node, id);
        let bytes: Option<Vec<u8>> = conn
            .get(&key)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let bytes = bytes.ok_or(StoreError::KeyMissing(key))?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Unavailable(format!("decode variables: {e}")))
    }

    async fn write_all_ast(&self, id: &str, asts: &[Vec<u8>]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(asts)
            .map_err(|e| StoreError::Unavailable(format!("encode ast list: {e}")))?;
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(ast_key(&self.node, id), bytes)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn read_all_ast(&self, id: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut conn = self.conn.clone();
        let key = ast_key(&self.node, id);
        let bytes: Option<Vec<u8>> = conn
            .get(&key)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        match bytes {
            Some(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| StoreError::Unavailable(format!("decode ast list: {e}")))
            }
            None => Ok(Vec::new()),
        }
    }
}
