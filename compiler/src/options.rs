use brine_wire_schema::ByteOrder;
use serde::{Deserialize, Serialize};

/// Knobs for the front end and verifier. Loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Order applied to members declared without `native` or `network`.
    pub default_byte_order: ByteOrder,
    /// Names no declaration may take.
    pub reserved_names: Vec<String>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            default_byte_order: ByteOrder::Native,
            reserved_names:     vec!["ByteBuffer".to_string(), "scope".to_string()],
        }
    }
}

impl CompilerOptions {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let options = CompilerOptions::from_json(r#"{"default_byte_order": "network"}"#).unwrap();
        assert_eq!(options.default_byte_order, ByteOrder::Network);
        assert_eq!(options.reserved_names, CompilerOptions::default().reserved_names);
    }
}
