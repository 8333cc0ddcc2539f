//! Discovery query parameters

use nfpcf_proxy::Snssai;
use std::fmt;
use thiserror::Error;

pub const TARGET_NF_TYPE: &str = "target-nf-type";
pub const REQUESTER_NF_TYPE: &str = "requester-nf-type";
pub const SNSSAIS: &str = "snssais";
pub const DNN: &str = "dnn";

/// A query parameter that could not be interpreted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid query parameter {param}: {reason}")]
pub struct QueryError {
    pub param: String,
    pub reason: String,
}

/// Fingerprint of the coarse discovery-result cache.
///
/// Only the target and requester NF types take part; S-NSSAI, DNN and every
/// other filter are ignored, so queries differing only in those share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    pub target_nf_type: String,
    pub requester_nf_type: String,
}

impl fmt::Display for SearchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.target_nf_type, self.requester_nf_type)
    }
}

/// A parsed NF discovery query.
///
/// The raw pairs are kept in arrival order so a cache miss can forward them
/// to the NRF untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryQuery {
    params: Vec<(String, String)>,
    target_nf_type: Option<String>,
    requester_nf_type: Option<String>,
    snssais: Vec<Snssai>,
    dnn: Option<String>,
}

impl DiscoveryQuery {
    /// Parse query pairs. Repeated parameters keep their first value, even an
    /// empty one, except `snssais` which accumulates. Empty means absent.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut query = DiscoveryQuery::default();

        for (name, value) in pairs {
            let (name, value) = (name.into(), value.into());
            let repeated = query.params.iter().any(|(seen, _)| *seen == name);
            match name.as_str() {
                TARGET_NF_TYPE if !repeated => query.target_nf_type = non_empty(&value),
                REQUESTER_NF_TYPE if !repeated => query.requester_nf_type = non_empty(&value),
                DNN if !repeated => query.dnn = non_empty(&value),
                SNSSAIS => query.snssais.extend(parse_snssais(&value)?),
                _ => {}
            }
            query.params.push((name, value));
        }

        Ok(query)
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn target_nf_type(&self) -> Option<&str> {
        self.target_nf_type.as_deref()
    }

    pub fn requester_nf_type(&self) -> Option<&str> {
        self.requester_nf_type.as_deref()
    }

    pub fn snssais(&self) -> &[Snssai] {
        &self.snssais
    }

    pub fn dnn(&self) -> Option<&str> {
        self.dnn.as_deref()
    }

    /// First mandatory parameter the query lacks, if any
    pub fn missing_mandatory(&self) -> Option<&'static str> {
        if self.target_nf_type.is_none() {
            Some(TARGET_NF_TYPE)
        } else if self.requester_nf_type.is_none() {
            Some(REQUESTER_NF_TYPE)
        } else {
            None
        }
    }

    pub fn search_key(&self) -> SearchKey {
        SearchKey {
            target_nf_type: self.target_nf_type.clone().unwrap_or_default(),
            requester_nf_type: self.requester_nf_type.clone().unwrap_or_default(),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Accepts a JSON array of S-NSSAIs, a single object, or comma-separated objects
fn parse_snssais(value: &str) -> Result<Vec<Snssai>, QueryError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(Vec::new());
    }

    let parsed = if value.starts_with('[') {
        serde_json::from_str::<Vec<Snssai>>(value)
    } else {
        serde_json::from_str::<Snssai>(value)
            .map(|snssai| vec![snssai])
            .or_else(|_| serde_json::from_str::<Vec<Snssai>>(&format!("[{}]", value)))
    };

    parsed.map_err(|e| QueryError {
        param: SNSSAIS.to_string(),
        reason: e.to_string(),
    })
}
