use serde::{Deserialize, Serialize};

use crate::{expression::JunctionOperator, id::DEFAULT_ROOT_ID, keystore::KeyStyle, utils::error::TreeResult};

/// Construction-time settings shared by trees, expression trees and the obfuscation layer.
///
/// Every field has a default so partial TOML documents are accepted:
///
/// ```rust
/// # use pathtree::{TreeConfig, JunctionOperator};
/// let conf = TreeConfig::from_toml_str(r#"
///     root_node_id = "query"
///     default_junction = "$or"
/// "#).unwrap();
/// assert_eq!(conf.root_node_id, "query");
/// assert_eq!(conf.default_junction, JunctionOperator::Or);
/// assert!(conf.validate_on_import);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Identifier given to the root of freshly created trees.
    pub root_node_id: String,

    /// Junction used when a leaf has to be promoted implicitly (grafting onto a leaf).
    pub default_junction: JunctionOperator,

    /// Whether expression trees run the "no single child" check after import.
    pub validate_on_import: bool,

    /// Textual form of the opaque keys minted by the obfuscation layer.
    pub key_style: KeyStyle,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            root_node_id: DEFAULT_ROOT_ID.to_string(),
            default_junction: JunctionOperator::And,
            validate_on_import: true,
            key_style: KeyStyle::Simple,
        }
    }
}

impl TreeConfig {
    /// Parse a configuration from a TOML document.
    pub fn from_toml_str(source: &str) -> TreeResult<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Render this configuration as a TOML document.
    pub fn to_toml_string(&self) -> TreeResult<String> {
        Ok(toml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let conf = TreeConfig::from_toml_str("").unwrap();
        assert_eq!(conf, TreeConfig::default());
    }

    #[test]
    fn key_style_is_parsed() {
        let conf = TreeConfig::from_toml_str("key_style = \"hyphenated\"").unwrap();
        assert_eq!(conf.key_style, KeyStyle::Hyphenated);
    }

    #[test]
    fn invalid_document_is_a_configuration_error() {
        let err = TreeConfig::from_toml_str("validate_on_import = 3").unwrap_err();
        assert!(err.kind().is_configuration());
    }

    #[test]
    fn toml_round_trip() {
        let conf = TreeConfig {
            root_node_id: "q".into(),
            default_junction: JunctionOperator::Or,
            validate_on_import: false,
            key_style: KeyStyle::Hyphenated,
        };
        let text = conf.to_toml_string().unwrap();
        assert_eq!(TreeConfig::from_toml_str(&text).unwrap(), conf);
    }
}
