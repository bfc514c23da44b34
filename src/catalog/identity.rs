use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Owning crate of a set of facts (e.g., `serde_json`).
///
/// Implementor tables are keyed by crate name, so this is the unit callers
/// query by.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupKey(pub String);

/// Fully qualified trait path (e.g., `core::iter::traits::iterator::Iterator`).
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraitPath(pub String);

impl GroupKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TraitPath {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, which is what rustdoc shows as the trait name.
    pub fn name(&self) -> &str {
        self.0.rsplit("::").next().unwrap_or(&self.0)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TraitPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Item kind of a linked entity, taken from the anchor's `class` attribute.
///
/// Known variants keep serialization consistent; `Other` preserves forward
/// compatibility with rustdoc versions that introduce new item classes.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum ItemKind {
    Struct,
    Enum,
    Union,
    Trait,
    Primitive,
    TypeAlias,
    ForeignType,
    Other(String),
}

impl Serialize for ItemKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ItemKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from_class(&value))
    }
}

impl ItemKind {
    pub fn as_str(&self) -> &str {
        match self {
            ItemKind::Struct => "struct",
            ItemKind::Enum => "enum",
            ItemKind::Union => "union",
            ItemKind::Trait => "trait",
            ItemKind::Primitive => "primitive",
            ItemKind::TypeAlias => "type",
            ItemKind::ForeignType => "foreigntype",
            ItemKind::Other(value) => value.as_str(),
        }
    }

    pub fn from_class(value: &str) -> Self {
        match value {
            "struct" => ItemKind::Struct,
            "enum" => ItemKind::Enum,
            "union" => ItemKind::Union,
            "trait" => ItemKind::Trait,
            "primitive" => ItemKind::Primitive,
            "type" => ItemKind::TypeAlias,
            "foreigntype" => ItemKind::ForeignType,
            other => ItemKind::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_kind_keeps_unknown_classes() {
        let known: ItemKind = serde_json::from_str("\"struct\"").unwrap();
        assert_eq!(known, ItemKind::Struct);
        assert_eq!(serde_json::to_string(&known).unwrap(), "\"struct\"");

        let custom: ItemKind = serde_json::from_str("\"opaque\"").unwrap();
        assert_eq!(custom, ItemKind::Other("opaque".to_string()));
        assert_eq!(serde_json::to_string(&custom).unwrap(), "\"opaque\"");
    }

    #[test]
    fn keys_serialize_transparently() {
        let key = GroupKey::new("serde_json");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"serde_json\"");

        let path: TraitPath =
            serde_json::from_str("\"core::iter::traits::iterator::Iterator\"").unwrap();
        assert_eq!(path.name(), "Iterator");
    }

    #[test]
    fn trait_name_without_module_is_whole_path() {
        assert_eq!(TraitPath::new("Iterator").name(), "Iterator");
    }
}
