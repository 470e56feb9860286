//! Identifier resolution: decides which lookup a sparse set of query
//! identifiers requests, against a fixed per-entity hierarchy of
//! primary identifiers and their allowed secondaries.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The closed set of identifier query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierType {
    AppId,
    ApiProductName,
    AppName,
    ApiResource,
    DeveloperId,
    DeveloperEmail,
    ConsumerKey,
    CompanyName,
}

impl IdentifierType {
    pub const ALL: [IdentifierType; 8] = [
        IdentifierType::AppId,
        IdentifierType::ApiProductName,
        IdentifierType::AppName,
        IdentifierType::ApiResource,
        IdentifierType::DeveloperId,
        IdentifierType::DeveloperEmail,
        IdentifierType::ConsumerKey,
        IdentifierType::CompanyName,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierType::AppId => "appid",
            IdentifierType::ApiProductName => "apiproductname",
            IdentifierType::AppName => "appname",
            IdentifierType::ApiResource => "apiresource",
            IdentifierType::DeveloperId => "developerid",
            IdentifierType::DeveloperEmail => "developeremail",
            IdentifierType::ConsumerKey => "consumerkey",
            IdentifierType::CompanyName => "companyname",
        }
    }
}

impl fmt::Display for IdentifierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentifierType {
    type Err = String;

    /// Parameter names match case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| format!("Unknown identifier: {}", s))
    }
}

/// Entity kinds served by the lookup endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    App,
    ApiProduct,
    Company,
    CompanyDeveloper,
    Developer,
    AppCredential,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::App,
        EntityKind::ApiProduct,
        EntityKind::Company,
        EntityKind::CompanyDeveloper,
        EntityKind::Developer,
        EntityKind::AppCredential,
    ];
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::App => "app",
            EntityKind::ApiProduct => "apiProduct",
            EntityKind::Company => "company",
            EntityKind::CompanyDeveloper => "companyDeveloper",
            EntityKind::Developer => "developer",
            EntityKind::AppCredential => "appCredential",
        };
        f.write_str(name)
    }
}

/// Identifiers supplied with a lookup, one value per type.
pub type Identifiers = BTreeMap<IdentifierType, String>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidIdentifiers {
    #[error("no identifiers supplied")]
    Empty,
    #[error("at most two identifiers may be supplied")]
    TooMany,
    #[error("no supplied identifier is a primary identifier for {0}")]
    NoPrimary(EntityKind),
    #[error("more than one supplied identifier is a primary identifier for {0}")]
    AmbiguousPrimary(EntityKind),
    #[error("{secondary} cannot narrow a lookup by {primary}")]
    UnsupportedSecondary {
        primary: IdentifierType,
        secondary: IdentifierType,
    },
    #[error("secondary identifier {0} has an empty value")]
    EmptySecondary(IdentifierType),
}

/// The lookup selected for a set of identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentifiers {
    pub primary_type: IdentifierType,
    pub primary_value: String,
    pub secondary_type: Option<IdentifierType>,
    pub secondary_value: String,
}

impl ResolvedIdentifiers {
    pub fn primary(primary_type: IdentifierType, value: impl Into<String>) -> Self {
        Self {
            primary_type,
            primary_value: value.into(),
            secondary_type: None,
            secondary_value: String::new(),
        }
    }

    pub fn with_secondary(mut self, secondary_type: IdentifierType, value: impl Into<String>) -> Self {
        self.secondary_type = Some(secondary_type);
        self.secondary_value = value.into();
        self
    }

    /// Secondary type as echoed in responses; empty when none was used.
    pub fn secondary_type_str(&self) -> &'static str {
        self.secondary_type.map(|t| t.as_str()).unwrap_or("")
    }
}

/// Immutable hierarchy: kind → primary → allowed secondaries.
#[derive(Debug, Clone)]
pub struct IdentifierTree {
    hierarchy: HashMap<EntityKind, HashMap<IdentifierType, Vec<IdentifierType>>>,
}

impl Default for IdentifierTree {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentifierTree {
    pub fn new() -> Self {
        use IdentifierType::*;

        let entries: [(EntityKind, Vec<(IdentifierType, Vec<IdentifierType>)>); 6] = [
            (
                EntityKind::ApiProduct,
                vec![
                    (ApiProductName, vec![]),
                    (AppId, vec![ApiResource]),
                    (
                        AppName,
                        vec![ApiResource, DeveloperEmail, DeveloperId, CompanyName],
                    ),
                    (ConsumerKey, vec![ApiResource]),
                ],
            ),
            (
                EntityKind::App,
                vec![
                    (AppId, vec![]),
                    (AppName, vec![DeveloperEmail, DeveloperId, CompanyName]),
                    (ConsumerKey, vec![]),
                ],
            ),
            (
                EntityKind::Company,
                vec![(AppId, vec![]), (CompanyName, vec![]), (ConsumerKey, vec![])],
            ),
            (EntityKind::CompanyDeveloper, vec![(CompanyName, vec![])]),
            (EntityKind::AppCredential, vec![(ConsumerKey, vec![])]),
            (
                EntityKind::Developer,
                vec![
                    (DeveloperEmail, vec![]),
                    (AppId, vec![]),
                    (DeveloperId, vec![]),
                    (ConsumerKey, vec![]),
                ],
            ),
        ];

        let hierarchy = entries
            .into_iter()
            .map(|(kind, primaries)| (kind, primaries.into_iter().collect()))
            .collect();

        Self { hierarchy }
    }

    /// Allowed secondaries for a primary, or `None` if it is not a primary for the kind.
    pub fn secondaries(&self, kind: EntityKind, primary: IdentifierType) -> Option<&[IdentifierType]> {
        self.hierarchy
            .get(&kind)
            .and_then(|primaries| primaries.get(&primary))
            .map(Vec::as_slice)
    }

    pub fn resolve(
        &self,
        kind: EntityKind,
        identifiers: &Identifiers,
    ) -> Result<ResolvedIdentifiers, InvalidIdentifiers> {
        if identifiers.is_empty() {
            return Err(InvalidIdentifiers::Empty);
        }
        if identifiers.len() > 2 {
            return Err(InvalidIdentifiers::TooMany);
        }

        let mut primaries = identifiers
            .keys()
            .filter(|t| self.secondaries(kind, **t).is_some());

        let primary_type = *primaries.next().ok_or(InvalidIdentifiers::NoPrimary(kind))?;
        if primaries.next().is_some() {
            return Err(InvalidIdentifiers::AmbiguousPrimary(kind));
        }

        let allowed = self.secondaries(kind, primary_type).unwrap_or_default();
        let resolved = ResolvedIdentifiers::primary(primary_type, identifiers[&primary_type].clone());

        match identifiers.iter().find(|(t, _)| **t != primary_type) {
            None => Ok(resolved),
            Some((secondary, _)) if !allowed.contains(secondary) => {
                Err(InvalidIdentifiers::UnsupportedSecondary {
                    primary: primary_type,
                    secondary: *secondary,
                })
            }
            Some((secondary, value)) if value.is_empty() => {
                Err(InvalidIdentifiers::EmptySecondary(*secondary))
            }
            Some((secondary, value)) => Ok(resolved.with_secondary(*secondary, value.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use IdentifierType::*;

    fn ids(pairs: &[(IdentifierType, &str)]) -> Identifiers {
        pairs.iter().map(|(t, v)| (*t, v.to_string())).collect()
    }

    #[test]
    fn resolves_single_primary() {
        let tree = IdentifierTree::new();
        let resolved = tree.resolve(EntityKind::App, &ids(&[(AppId, "a1")])).unwrap();
        assert_eq!(resolved, ResolvedIdentifiers::primary(AppId, "a1"));
        assert_eq!(resolved.secondary_type_str(), "");
        assert_eq!(resolved.secondary_value, "");
    }

    #[test]
    fn resolves_declared_primary_secondary_pair() {
        let tree = IdentifierTree::new();
        let resolved = tree
            .resolve(
                EntityKind::App,
                &ids(&[(AppName, "foo"), (DeveloperEmail, "x@y.com")]),
            )
            .unwrap();
        assert_eq!(resolved.primary_type, AppName);
        assert_eq!(resolved.primary_value, "foo");
        assert_eq!(resolved.secondary_type, Some(DeveloperEmail));
        assert_eq!(resolved.secondary_value, "x@y.com");
    }

    #[test]
    fn three_or_more_identifiers_are_rejected_for_every_kind() {
        let tree = IdentifierTree::new();
        let supplied = ids(&[(AppName, "a"), (DeveloperEmail, "e"), (ApiResource, "/r")]);
        for kind in EntityKind::ALL {
            assert_eq!(tree.resolve(kind, &supplied), Err(InvalidIdentifiers::TooMany));
        }
    }

    #[test]
    fn undeclared_pairs_are_rejected_for_every_kind() {
        let tree = IdentifierTree::new();
        for kind in EntityKind::ALL {
            for primary in IdentifierType::ALL {
                let Some(allowed) = tree.secondaries(kind, primary) else {
                    continue;
                };
                for secondary in IdentifierType::ALL {
                    if secondary == primary || allowed.contains(&secondary) {
                        continue;
                    }
                    let result = tree.resolve(kind, &ids(&[(primary, "p"), (secondary, "s")]));
                    assert!(result.is_err(), "{kind}: {primary} + {secondary}");
                }
            }
        }
    }

    #[test]
    fn empty_or_unmatched_identifiers_are_rejected() {
        let tree = IdentifierTree::new();
        assert_eq!(
            tree.resolve(EntityKind::Company, &Identifiers::new()),
            Err(InvalidIdentifiers::Empty)
        );
        assert_eq!(
            tree.resolve(EntityKind::AppCredential, &ids(&[(AppId, "a1")])),
            Err(InvalidIdentifiers::NoPrimary(EntityKind::AppCredential))
        );
    }

    #[test]
    fn empty_secondary_value_is_rejected() {
        let tree = IdentifierTree::new();
        assert_eq!(
            tree.resolve(EntityKind::ApiProduct, &ids(&[(AppId, "a1"), (ApiResource, "")])),
            Err(InvalidIdentifiers::EmptySecondary(ApiResource))
        );
    }

    #[test]
    fn two_primaries_are_ambiguous() {
        let tree = IdentifierTree::new();
        assert_eq!(
            tree.resolve(EntityKind::App, &ids(&[(AppId, "a1"), (ConsumerKey, "k1")])),
            Err(InvalidIdentifiers::AmbiguousPrimary(EntityKind::App))
        );
    }

    #[test]
    fn resolution_is_deterministic() {
        let tree = IdentifierTree::new();
        let supplied = ids(&[(ConsumerKey, "k1"), (ApiResource, "/orders")]);
        let first = tree.resolve(EntityKind::ApiProduct, &supplied);
        for _ in 0..16 {
            assert_eq!(tree.resolve(EntityKind::ApiProduct, &supplied), first);
        }
        assert!(first.is_ok());
    }

    #[test]
    fn identifier_names_parse_case_insensitively() {
        assert_eq!("AppName".parse::<IdentifierType>(), Ok(AppName));
        assert_eq!("CONSUMERKEY".parse::<IdentifierType>(), Ok(ConsumerKey));
        assert!("organization".parse::<IdentifierType>().is_err());
    }
}
