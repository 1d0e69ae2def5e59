use std::collections::BTreeMap;
use std::sync::LazyLock;

use parking_lot::RwLock;

use crate::error::ModelError;

/// Names of the strata every model can write to.
pub struct CommonStrata;

impl CommonStrata {
    pub const DEFAULTS: &'static str = "defaults";
    pub const UNDERRIDE: &'static str = "underride";
    pub const DEFINITION: &'static str = "definition";
    pub const USER: &'static str = "user";
    pub const USER_OVERRIDE: &'static str = "userOverride";
}

/// Precedence levels, lowest first.
///
/// `Source` holds strata written by metadata loads: configured definitions
/// override loaded metadata, which in turn overrides underrides and defaults.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StratumLevel {
    Defaults,
    Underride,
    Source,
    Definition,
    User,
    UserOverride,
}

/// Total order position of a stratum: level first, then position within the
/// level (only source strata share a level).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StratumRank {
    pub level: StratumLevel,
    pub position: u32,
}

#[derive(Debug, Clone)]
pub struct StratumOrder {
    ranks: BTreeMap<String, StratumRank>,
    next_source_position: u32,
}

impl StratumOrder {
    /// The order containing only the common strata.
    pub fn standard() -> Self {
        let mut ranks = BTreeMap::new();
        for (name, level) in [
            (CommonStrata::DEFAULTS, StratumLevel::Defaults),
            (CommonStrata::UNDERRIDE, StratumLevel::Underride),
            (CommonStrata::DEFINITION, StratumLevel::Definition),
            (CommonStrata::USER, StratumLevel::User),
            (CommonStrata::USER_OVERRIDE, StratumLevel::UserOverride),
        ] {
            ranks.insert(name.to_string(), StratumRank { level, position: 0 });
        }
        Self {
            ranks,
            next_source_position: 0,
        }
    }

    pub fn rank(&self, name: &str) -> Option<StratumRank> {
        self.ranks.get(name).copied()
    }

    /// Adds a source stratum. Later registrations rank above earlier ones.
    ///
    /// Registering an existing source stratum again returns its rank.
    pub fn add_source_stratum(&mut self, name: &str) -> Result<StratumRank, ModelError> {
        if name.trim().is_empty() {
            return Err(ModelError::UnknownStratum(name.to_string()));
        }
        if let Some(rank) = self.rank(name) {
            return match rank.level {
                StratumLevel::Source => Ok(rank),
                _ => Err(ModelError::UnknownStratum(format!(
                    "{name} (already a {:?} stratum)",
                    rank.level
                ))),
            };
        }
        let rank = StratumRank {
            level: StratumLevel::Source,
            position: self.next_source_position,
        };
        self.next_source_position += 1;
        self.ranks.insert(name.to_string(), rank);
        Ok(rank)
    }

    /// Sorts stratum names from highest to lowest precedence. Unknown names
    /// go last, in name order.
    pub fn sort_top_to_bottom(&self, names: &mut [String]) {
        names.sort_by(|a, b| {
            let ra = self.rank(a);
            let rb = self.rank(b);
            rb.cmp(&ra).then_with(|| a.cmp(b))
        });
    }
}

impl Default for StratumOrder {
    fn default() -> Self {
        Self::standard()
    }
}

static STRATUM_ORDER: LazyLock<RwLock<StratumOrder>> =
    LazyLock::new(|| RwLock::new(StratumOrder::standard()));

/// Looks up a stratum in the process-wide order.
pub fn stratum_rank(name: &str) -> Result<StratumRank, ModelError> {
    STRATUM_ORDER
        .read()
        .rank(name)
        .ok_or_else(|| ModelError::UnknownStratum(name.to_string()))
}

/// Registers a source stratum in the process-wide order.
pub fn register_source_stratum(name: &str) -> Result<StratumRank, ModelError> {
    STRATUM_ORDER.write().add_source_stratum(name)
}

/// A copy of the process-wide order.
pub fn stratum_order() -> StratumOrder {
    STRATUM_ORDER.read().clone()
}

#[cfg(test)]
mod tests {
    use super::{CommonStrata, StratumLevel, StratumOrder};

    #[test]
    fn common_strata_follow_the_fixed_order() {
        let order = StratumOrder::standard();
        let mut names: Vec<String> = [
            CommonStrata::DEFINITION,
            CommonStrata::DEFAULTS,
            CommonStrata::USER_OVERRIDE,
            CommonStrata::UNDERRIDE,
            CommonStrata::USER,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        order.sort_top_to_bottom(&mut names);
        assert_eq!(
            names,
            vec!["userOverride", "user", "definition", "underride", "defaults"]
        );
    }

    #[test]
    fn source_strata_slot_between_underride_and_definition() {
        let mut order = StratumOrder::standard();
        let first = order.add_source_stratum("capabilities").unwrap();
        let second = order.add_source_stratum("featureInfo").unwrap();
        assert_eq!(first.level, StratumLevel::Source);
        assert!(second > first);
        assert!(order.rank(CommonStrata::DEFINITION).unwrap() > second);
        assert!(order.rank(CommonStrata::UNDERRIDE).unwrap() < first);

        // Idempotent for source strata.
        assert_eq!(order.add_source_stratum("capabilities").unwrap(), first);
    }

    #[test]
    fn common_names_cannot_become_source_strata() {
        let mut order = StratumOrder::standard();
        assert!(order.add_source_stratum(CommonStrata::USER).is_err());
        assert!(order.add_source_stratum("  ").is_err());
    }
}
