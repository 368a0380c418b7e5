//! Canvassing node model
//!
//! A [`Node`] is one record of the canvassing graph: an address pin, a unit
//! inside a multi-unit address, or a survey taken at either. Parent links are
//! ids, never references; all traversal goes through the index.

use crate::id::NodeId;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Epoch seconds
pub type Epoch = i64;

/// Survey answers keyed by question key
pub type SurveyAnswers = serde_json::Map<String, serde_json::Value>;

/// Current epoch seconds
#[inline]
#[must_use]
pub fn now_epoch() -> Epoch {
    chrono::Utc::now().timestamp()
}

/// Geographic coordinate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    #[inline]
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Street address, serialized as the `[street, city, state, zip]` tuple
///
/// Missing or `null` tuple entries decode as empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Option<String>>", into = "[String; 4]")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl Address {
    #[must_use]
    pub fn new(
        street: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        zip: impl Into<String>,
    ) -> Self {
        Self {
            street: street.into(),
            city: city.into(),
            state: state.into(),
            zip: zip.into(),
        }
    }

    /// Borrowed `[street, city, state, zip]` view
    #[inline]
    #[must_use]
    pub fn to_tuple(&self) -> [&str; 4] {
        [&self.street, &self.city, &self.state, &self.zip]
    }

    /// Copy with every component trimmed
    #[must_use]
    pub fn trimmed(&self) -> Self {
        Self::new(
            self.street.trim(),
            self.city.trim(),
            self.state.trim(),
            self.zip.trim(),
        )
    }
}

impl From<Vec<Option<String>>> for Address {
    fn from(parts: Vec<Option<String>>) -> Self {
        let mut parts = parts.into_iter().map(Option::unwrap_or_default);
        Self {
            street: parts.next().unwrap_or_default(),
            city: parts.next().unwrap_or_default(),
            state: parts.next().unwrap_or_default(),
            zip: parts.next().unwrap_or_default(),
        }
    }
}

impl From<Address> for [String; 4] {
    fn from(address: Address) -> Self {
        [address.street, address.city, address.state, address.zip]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {} {}", self.street, self.city, self.state, self.zip)
    }
}

/// Outcome recorded by a survey
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "&'static str")]
pub enum SurveyStatus {
    Home,
    NotHome,
    NotInterested,
    /// No outcome recorded (also absorbs unknown values)
    #[default]
    NoStatus,
}

impl SurveyStatus {
    /// Wire name of the status
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::NotHome => "not home",
            Self::NotInterested => "not interested",
            Self::NoStatus => "",
        }
    }
}

impl From<Option<String>> for SurveyStatus {
    fn from(value: Option<String>) -> Self {
        match value.as_deref() {
            Some("home") => Self::Home,
            Some("not home") => Self::NotHome,
            Some("not interested") => Self::NotInterested,
            _ => Self::NoStatus,
        }
    }
}

impl From<SurveyStatus> for &'static str {
    fn from(status: SurveyStatus) -> Self {
        status.as_str()
    }
}

impl fmt::Display for SurveyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node type discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Address,
    Unit,
    Survey,
}

impl NodeType {
    /// Whether a node of this type may hang below a node of `parent` type
    #[must_use]
    pub const fn accepts_parent(&self, parent: NodeType) -> bool {
        matches!(
            (self, parent),
            (Self::Unit, Self::Address) | (Self::Survey, Self::Address) | (Self::Survey, Self::Unit)
        )
    }

    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Address => "address",
            Self::Unit => "unit",
            Self::Survey => "survey",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific node payload, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Payload {
    Address {
        #[serde(default)]
        address: Address,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        latlng: Option<LatLng>,
        #[serde(default, deserialize_with = "nullable")]
        multi_unit: bool,
    },
    Unit {
        #[serde(default, deserialize_with = "nullable")]
        unit: String,
    },
    Survey {
        #[serde(default)]
        status: SurveyStatus,
        #[serde(default, deserialize_with = "nullable")]
        survey: SurveyAnswers,
    },
    /// A node type this build does not know; kept so the store still loads
    #[serde(other)]
    Other,
}

impl Payload {
    /// Type of the payload, `None` for unknown node types
    #[must_use]
    pub const fn node_type(&self) -> Option<NodeType> {
        match self {
            Self::Address { .. } => Some(NodeType::Address),
            Self::Unit { .. } => Some(NodeType::Unit),
            Self::Survey { .. } => Some(NodeType::Survey),
            Self::Other => None,
        }
    }
}

/// One record of the canvassing graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    #[serde(default)]
    pub created: Epoch,
    #[serde(default)]
    pub updated: Epoch,
    #[serde(default, deserialize_with = "nullable")]
    pub canvasser: String,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Node {
    #[inline]
    #[must_use]
    pub const fn node_type(&self) -> Option<NodeType> {
        self.payload.node_type()
    }

    #[inline]
    #[must_use]
    pub fn is_type(&self, node_type: NodeType) -> bool {
        self.node_type() == Some(node_type)
    }

    /// Address tuple, for address nodes
    #[must_use]
    pub fn address(&self) -> Option<&Address> {
        match &self.payload {
            Payload::Address { address, .. } => Some(address),
            _ => None,
        }
    }

    /// Coordinate, for address nodes that carry one
    #[must_use]
    pub fn latlng(&self) -> Option<LatLng> {
        match &self.payload {
            Payload::Address { latlng, .. } => *latlng,
            _ => None,
        }
    }

    #[must_use]
    pub fn is_multi_unit(&self) -> bool {
        matches!(self.payload, Payload::Address { multi_unit: true, .. })
    }

    /// Unit label, for unit nodes
    #[must_use]
    pub fn unit(&self) -> Option<&str> {
        match &self.payload {
            Payload::Unit { unit } => Some(unit),
            _ => None,
        }
    }

    /// Survey status, for survey nodes
    #[must_use]
    pub fn status(&self) -> Option<SurveyStatus> {
        match &self.payload {
            Payload::Survey { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Survey answers, for survey nodes
    #[must_use]
    pub fn answers(&self) -> Option<&SurveyAnswers> {
        match &self.payload {
            Payload::Survey { survey, .. } => Some(survey),
            _ => None,
        }
    }
}

/// A node about to be added: id is optional, timestamps are stamped on insert
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    #[serde(flatten)]
    pub payload: Payload,
}

impl NodeDraft {
    /// Address pin; its id is derived from the address tuple
    #[must_use]
    pub fn address(address: Address, latlng: LatLng, multi_unit: bool) -> Self {
        let address = address.trimmed();
        Self {
            id: Some(NodeId::for_address(&address)),
            parent_id: None,
            payload: Payload::Address {
                address,
                latlng: Some(latlng),
                multi_unit,
            },
        }
    }

    /// Unit below an address
    #[must_use]
    pub fn unit(parent: NodeId, unit: impl Into<String>) -> Self {
        Self {
            id: None,
            parent_id: Some(parent),
            payload: Payload::Unit { unit: unit.into() },
        }
    }

    /// Survey below an address or unit
    #[must_use]
    pub fn survey(parent: NodeId, status: SurveyStatus, survey: SurveyAnswers) -> Self {
        Self {
            id: None,
            parent_id: Some(parent),
            payload: Payload::Survey { status, survey },
        }
    }

    /// Use an explicit id
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }
}

/// Decode `null` as the type's default
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
