use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::ContentAddress;
use crate::error::TypeError;
use crate::hint::DiscoveryHint;

/// Default JSON-LD context for anchor credentials.
pub const CREDENTIALS_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";

/// Default credential type.
pub const CREDENTIAL_TYPE: &str = "VerifiableCredential";

/// The subject of an anchor credential: one batch of identifier operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorPayload {
    /// Identifier method family this anchor belongs to.
    pub namespace: String,
    /// Protocol version governing how the operations are applied.
    pub version: u64,
    /// Pointer to the batch of operations committed by this anchor.
    pub core_index: String,
    #[serde(default)]
    pub operation_count: u64,
    #[serde(default)]
    pub anchor_origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
    /// Suffix -> address of the preceding anchor for that suffix, or `""`
    /// when this is the suffix's first anchor.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub previous_anchors: BTreeMap<String, String>,
}

impl AnchorPayload {
    /// Minimal payload with no touched suffixes.
    pub fn new(namespace: impl Into<String>, version: u64, core_index: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            version,
            core_index: core_index.into(),
            operation_count: 0,
            anchor_origin: String::new(),
            published: None,
            previous_anchors: BTreeMap::new(),
        }
    }

    /// Builder-style helper: record `suffix` with its previous anchor.
    pub fn with_previous(mut self, suffix: impl Into<String>, previous: Option<&ContentAddress>) -> Self {
        let value = previous.map(|a| a.to_string()).unwrap_or_default();
        self.previous_anchors.insert(suffix.into(), value);
        self
    }

    /// Suffixes touched by this anchor, in sorted order.
    pub fn suffixes(&self) -> impl Iterator<Item = &str> {
        self.previous_anchors.keys().map(String::as_str)
    }

    /// Whether this anchor touches `suffix` at all.
    pub fn touches(&self, suffix: &str) -> bool {
        self.previous_anchors.contains_key(suffix)
    }

    /// The anchor that preceded this one for `suffix`.
    ///
    /// `Ok(None)` means this is the suffix's first anchor. A suffix that is
    /// not listed, or a link that is not a valid address, is malformed.
    pub fn previous_anchor(&self, suffix: &str) -> Result<Option<ContentAddress>, TypeError> {
        let link = self.previous_anchors.get(suffix).ok_or_else(|| {
            TypeError::InvalidPayload(format!("suffix {suffix} is not referenced by this anchor"))
        })?;
        if link.is_empty() {
            return Ok(None);
        }
        ContentAddress::parse(link).map(Some)
    }

    /// Structural checks that do not depend on any other anchor.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.namespace.trim().is_empty() {
            return Err(TypeError::InvalidPayload("namespace must not be empty".into()));
        }
        for (suffix, link) in &self.previous_anchors {
            if suffix.is_empty() {
                return Err(TypeError::InvalidPayload("empty suffix in previousAnchors".into()));
            }
            if !link.is_empty() {
                ContentAddress::parse(link)?;
            }
        }
        Ok(())
    }
}

/// An externally signed, immutable document wrapping an [`AnchorPayload`].
///
/// The proof is carried opaquely; signature checks happen before an anchor
/// reaches this node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorCredential {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub issuer: String,
    pub issuance_date: DateTime<Utc>,
    pub credential_subject: AnchorPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<serde_json::Value>,
}

impl AnchorCredential {
    /// Unsigned credential issued now by `issuer`.
    pub fn new(issuer: impl Into<String>, payload: AnchorPayload) -> Self {
        Self {
            context: vec![CREDENTIALS_CONTEXT.to_string()],
            id: None,
            types: vec![CREDENTIAL_TYPE.to_string()],
            issuer: issuer.into(),
            issuance_date: Utc::now(),
            credential_subject: payload,
            proof: None,
        }
    }

    pub fn payload(&self) -> &AnchorPayload {
        &self.credential_subject
    }

    pub fn to_json(&self) -> Result<Vec<u8>, TypeError> {
        serde_json::to_vec(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Decode and validate a credential.
    pub fn from_json(data: &[u8]) -> Result<Self, TypeError> {
        let credential: Self =
            serde_json::from_slice(data).map_err(|e| TypeError::Serialization(e.to_string()))?;
        credential.credential_subject.validate()?;
        Ok(credential)
    }
}

/// Reference to a newly published anchor, as carried on the anchor stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorInfo {
    pub content_address: ContentAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Hint describing where the publishing node itself serves the anchor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_hint: Option<String>,
}

impl AnchorInfo {
    pub fn new(content_address: ContentAddress) -> Self {
        Self {
            content_address,
            hint: None,
            local_hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_local_hint(mut self, hint: impl Into<String>) -> Self {
        self.local_hint = Some(hint.into());
        self
    }

    /// Parsed discovery hint, if one was supplied.
    ///
    /// The remote `hint` wins over `local_hint` when both are present.
    pub fn discovery_hint(&self) -> Result<Option<DiscoveryHint>, TypeError> {
        self.hint
            .as_deref()
            .or(self.local_hint.as_deref())
            .map(DiscoveryHint::parse)
            .transpose()
    }

    pub fn to_json(&self) -> Result<Vec<u8>, TypeError> {
        serde_json::to_vec(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    pub fn from_json(data: &[u8]) -> Result<Self, TypeError> {
        serde_json::from_slice(data).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}
