//! Pluggable key-value Store (§4.2): a node-scoped persistence
//! capability behind a single `async_trait`, with two concrete
//! variants — `memory` (an in-process concurrent map) and `redis` (an
//! external KV service). Keys used: `<node>:schema`,
//! `<node>:variables:<id>`, `<node>:ast:<id>`.

pub mod error;
pub mod memory;
pub mod redis;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use redis::RedisStore;

use async_trait::async_trait;

use open_ve_core::{Dsl, Variable};

/// `reset`, `write_schema`/`read_schema`, `write_variables`/
/// `read_variables`, `write_all_ast`/`read_all_ast` — the six
/// operations §4.2 names, plus `reset` for re-registration. All
/// backends must be safe for concurrent use; the Store makes no
/// cross-key transactional guarantee (§4.2 Guarantees).
#[async_trait]
pub trait Store: Send + Sync {
    /// Delete every key prefixed by this store's node ID.
    async fn reset(&self) -> Result<(), StoreError>;

    async fn write_schema(&self, dsl: &Dsl) -> Result<(), StoreError>;
    async fn read_schema(&self) -> Result<Dsl, StoreError>;

    async fn write_variables(&self, id: &str, variables: &[Variable]) -> Result<(), StoreError>;
    async fn read_variables(&self, id: &str) -> Result<Vec<Variable>, StoreError>;

    async fn write_all_ast(&self, id: &str, asts: &[Vec<u8>]) -> Result<(), StoreError>;
    async fn read_all_ast(&self, id: &str) -> Result<Vec<Vec<u8>>, StoreError>;
}

/// `<node>:schema`
pub(crate) fn schema_key(node: &str) -> String {
    format!("{node}:schema")
}

/// `<node>:variables:<id>`
pub(crate) fn variables_key(node: &str, id: &str) -> String {
    format!("{node}:variables:{id}")
}

/// `<node>:ast:<id>`
pub(crate) fn ast_key(node: &str, id: &str) -> String {
    format!("{node}:ast:{id}")
}
