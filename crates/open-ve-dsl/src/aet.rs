//! The Compiled AET (§3): "an opaque binary blob — the serialized,
//! type-checked expression tree." The `cel` crate does not expose an
//! AST (de)serializer the way Go's `cel-go` + protobuf `CheckedExpr`
//! does, so the blob here is a `bincode`-serialized `Aet`: the source
//! text plus the variable schema it was checked against. Type-checking
//! happens once at `compile` time (see `compiler::typecheck`) and is
//! re-verified at evaluation time by re-parsing and re-binding into a
//! fresh `cel::Context` — this is slightly more work per evaluation
//! than a pre-parsed AST would be, but keeps the blob format entirely
//! under our control instead of depending on unstable internals of the
//! `cel` crate's parser types.

use serde::{Deserialize, Serialize};

use open_ve_core::Variable;

use crate::error::DslError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aet {
    pub source: String,
    pub variable_schema: Vec<Variable>,
}

impl Aet {
    pub fn to_bytes(&self) -> Result<Vec<u8>, DslError> {
        bincode::serialize(self).map_err(|e| DslError::Serialize(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DslError> {
        bincode::deserialize(bytes).map_err(|e| DslError::Deserialize(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use open_ve_core::VariableType;

    #[test]
    fn round_trips_through_bincode() {
        let aet = Aet {
            source: "num > 0".to_string(),
            variable_schema: vec![Variable {
                name: "num".to_string(),
                var_type: VariableType::Int,
            }],
        };
        let bytes = aet.to_bytes().unwrap();
        let back = Aet::from_bytes(&bytes).unwrap();
        assert_eq!(back.source, aet.source);
        assert_eq!(back.variable_schema, aet.variable_schema);
    }

    #[test]
    fn rejects_garbage_bytes() {
        assert!(Aet::from_bytes(&[0xff, 0x00, 0x01]).is_err());
    }
}
