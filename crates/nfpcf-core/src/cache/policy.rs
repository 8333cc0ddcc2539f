//! Discovery match predicates
//!
//! A cached profile answers a discovery query only when every predicate in
//! the [`MatchPolicy`] accepts it. Which S-NSSAI and requester rules apply is
//! configurable, since the NRF's exact semantics are not reproduced here.

use nfpcf_proxy::NfProfile;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::query::DiscoveryQuery;

/// Error type for parsing a match mode
#[derive(Debug, Clone)]
pub struct ParseMatchModeError(String);

impl fmt::Display for ParseMatchModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid match mode: {}", self.0)
    }
}

impl std::error::Error for ParseMatchModeError {}

/// How requested S-NSSAIs are compared against a profile's declared ones
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SnssaiMatchMode {
    /// Any requested S-NSSAI satisfies a profile that declares slices
    #[default]
    Any,
    /// SST must be equal, and SD too when the request carries one
    Exact,
}

impl SnssaiMatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnssaiMatchMode::Any => "any",
            SnssaiMatchMode::Exact => "exact",
        }
    }
}

impl FromStr for SnssaiMatchMode {
    type Err = ParseMatchModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "any" => Ok(SnssaiMatchMode::Any),
            "exact" => Ok(SnssaiMatchMode::Exact),
            _ => Err(ParseMatchModeError(s.to_string())),
        }
    }
}

/// Whether a profile may be offered to the requesting NF type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RequesterMatchMode {
    /// Every requester is compatible
    #[default]
    Any,
    /// Honour the profile's `allowedNfTypes` list when it has one
    AllowedNfTypes,
}

impl RequesterMatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequesterMatchMode::Any => "any",
            RequesterMatchMode::AllowedNfTypes => "allowed-nf-types",
        }
    }
}

impl FromStr for RequesterMatchMode {
    type Err = ParseMatchModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "any" => Ok(RequesterMatchMode::Any),
            "allowed-nf-types" => Ok(RequesterMatchMode::AllowedNfTypes),
            _ => Err(ParseMatchModeError(s.to_string())),
        }
    }
}

/// One filter dimension of a discovery query
pub trait MatchPredicate: Send + Sync {
    fn name(&self) -> &'static str;

    fn matches(&self, profile: &NfProfile, query: &DiscoveryQuery) -> bool;
}

/// S-NSSAI filter. Profiles without slices are wildcards.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnssaiMatch {
    pub mode: SnssaiMatchMode,
}

impl MatchPredicate for SnssaiMatch {
    fn name(&self) -> &'static str {
        "snssai"
    }

    fn matches(&self, profile: &NfProfile, query: &DiscoveryQuery) -> bool {
        let requested = query.snssais();
        if requested.is_empty() {
            return true;
        }

        let declared = match profile.s_nssais.as_deref() {
            Some(declared) if !declared.is_empty() => declared,
            _ => return true,
        };

        match self.mode {
            SnssaiMatchMode::Any => true,
            SnssaiMatchMode::Exact => requested.iter().any(|want| {
                declared.iter().any(|have| {
                    have.sst == want.sst && want.sd.as_deref().is_none_or(|sd| have.sd_eq(sd))
                })
            }),
        }
    }
}

/// DNN filter. Profiles without an SMF info list are wildcards.
#[derive(Debug, Clone, Copy, Default)]
pub struct DnnMatch;

impl MatchPredicate for DnnMatch {
    fn name(&self) -> &'static str {
        "dnn"
    }

    fn matches(&self, profile: &NfProfile, query: &DiscoveryQuery) -> bool {
        let Some(dnn) = query.dnn() else {
            return true;
        };

        match profile.smf_info.as_ref() {
            Some(info) if info.s_nssai_smf_info_list.is_some() => {
                info.dnns().any(|declared| declared == dnn)
            }
            _ => true,
        }
    }
}

/// Requester NF type compatibility
#[derive(Debug, Clone, Copy, Default)]
pub struct RequesterTypeMatch {
    pub mode: RequesterMatchMode,
}

impl MatchPredicate for RequesterTypeMatch {
    fn name(&self) -> &'static str {
        "requester-nf-type"
    }

    fn matches(&self, profile: &NfProfile, query: &DiscoveryQuery) -> bool {
        match (self.mode, query.requester_nf_type()) {
            (RequesterMatchMode::Any, _) | (_, None) => true,
            (RequesterMatchMode::AllowedNfTypes, Some(requester)) => {
                match profile.allowed_nf_types.as_deref() {
                    Some(allowed) if !allowed.is_empty() => {
                        allowed.iter().any(|t| t.eq_ignore_ascii_case(requester))
                    }
                    _ => true,
                }
            }
        }
    }
}

/// All predicates a cached profile has to pass
pub struct MatchPolicy {
    predicates: Vec<Box<dyn MatchPredicate>>,
}

impl MatchPolicy {
    pub fn new(predicates: Vec<Box<dyn MatchPredicate>>) -> Self {
        Self { predicates }
    }

    /// The built-in predicates: requester type, S-NSSAI, then DNN
    pub fn from_modes(snssai: SnssaiMatchMode, requester: RequesterMatchMode) -> Self {
        Self::new(vec![
            Box::new(RequesterTypeMatch { mode: requester }),
            Box::new(SnssaiMatch { mode: snssai }),
            Box::new(DnnMatch),
        ])
    }

    pub fn matches(&self, profile: &NfProfile, query: &DiscoveryQuery) -> bool {
        self.predicates.iter().all(|p| p.matches(profile, query))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.predicates.iter().map(|p| p.name()).collect()
    }
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self::from_modes(SnssaiMatchMode::default(), RequesterMatchMode::default())
    }
}

impl fmt::Debug for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchPolicy")
            .field("predicates", &self.names())
            .finish()
    }
}
