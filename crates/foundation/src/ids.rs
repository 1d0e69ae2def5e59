use std::fmt;

use serde::{Deserialize, Serialize};

/// Process-wide unique identifier of a catalog model.
///
/// Identifiers are opaque strings. Group members refer to their children by
/// this id, and `<parent>/<name>` is used when a definition doesn't carry one.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    pub fn new(id: impl Into<String>) -> Self {
        ModelId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives a child id from this id and a child name.
    pub fn child(&self, name: &str) -> Self {
        ModelId(format!("{}/{}", self.0, name))
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelId {
    fn from(s: &str) -> Self {
        ModelId(s.to_string())
    }
}

impl From<String> for ModelId {
    fn from(s: String) -> Self {
        ModelId(s)
    }
}

impl AsRef<str> for ModelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::ModelId;

    #[test]
    fn child_ids_nest_with_slash() {
        let root = ModelId::new("root");
        assert_eq!(root.child("rivers").as_str(), "root/rivers");
    }

    #[test]
    fn ids_order_lexically() {
        let mut ids = vec![ModelId::from("b"), ModelId::from("a")];
        ids.sort();
        assert_eq!(ids, vec![ModelId::from("a"), ModelId::from("b")]);
    }
}
