//! NF profile and problem-details wire models
//!
//! Only the fields the cache indexes or matches on are typed; everything else
//! in a profile is carried through untouched in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Single Network Slice Selection Assistance Information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Snssai {
    /// Slice/Service Type
    pub sst: u8,
    /// Slice Differentiator, 6 hex digits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sd: Option<String>,
}

impl Snssai {
    pub fn new(sst: u8, sd: Option<&str>) -> Self {
        Self {
            sst,
            sd: sd.map(|s| s.to_string()),
        }
    }

    /// Compare slice differentiators, ignoring hex case
    pub fn sd_eq(&self, other: &str) -> bool {
        self.sd
            .as_deref()
            .is_some_and(|sd| sd.eq_ignore_ascii_case(other))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DnnSmfInfoItem {
    pub dnn: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnssaiSmfInfoItem {
    pub s_nssai: Snssai,
    #[serde(default)]
    pub dnn_smf_info_list: Vec<DnnSmfInfoItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SmfInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s_nssai_smf_info_list: Option<Vec<SnssaiSmfInfoItem>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SmfInfo {
    /// Iterate every DNN the SMF declares, across all slices
    pub fn dnns(&self) -> impl Iterator<Item = &str> {
        self.s_nssai_smf_info_list
            .iter()
            .flatten()
            .flat_map(|item| item.dnn_smf_info_list.iter())
            .map(|info| info.dnn.as_str())
    }
}

/// NF profile as registered with and discovered from the NRF
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NfProfile {
    pub nf_instance_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nf_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nf_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s_nssais: Option<Vec<Snssai>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_nf_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smf_info: Option<SmfInfo>,
    /// Remaining profile attributes, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NfProfile {
    pub fn new(nf_instance_id: impl Into<String>, nf_type: Option<&str>) -> Self {
        Self {
            nf_instance_id: nf_instance_id.into(),
            nf_type: nf_type.map(|t| t.to_string()),
            nf_status: None,
            s_nssais: None,
            allowed_nf_types: None,
            smf_info: None,
            extra: Map::new(),
        }
    }

    /// NF type, treating an empty string the same as an absent one
    pub fn nf_type(&self) -> Option<&str> {
        self.nf_type.as_deref().filter(|t| !t.is_empty())
    }
}

/// Discovery response body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity_period: Option<u32>,
    #[serde(default)]
    pub nf_instances: Vec<NfProfile>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SearchResult {
    pub fn from_profiles(nf_instances: Vec<NfProfile>) -> Self {
        Self {
            nf_instances,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvalidParam {
    pub param: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// RFC 7807 problem details, with the 3GPP `cause` extension
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_params: Option<Vec<InvalidParam>>,
}

impl ProblemDetails {
    pub fn new(status: u16, cause: &str) -> Self {
        Self {
            status: Some(status),
            cause: Some(cause.to_string()),
            ..Default::default()
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_invalid_param(mut self, param: &str, reason: &str) -> Self {
        self.invalid_params.get_or_insert_with(Vec::new).push(InvalidParam {
            param: param.to_string(),
            reason: Some(reason.to_string()),
        });
        self
    }

    /// HTTP status to answer with, 500 when the backend left it out
    pub fn status_code(&self) -> u16 {
        self.status.unwrap_or(500)
    }
}
