//! Store schema detection and the version-1 "pins" upgrade
//!
//! Version 1 stores kept a flat list of pins, each pin one visit at an
//! address with a colour for the outcome. Loading such a store converts
//! every pin into address, unit and survey nodes once; nothing outside this
//! module knows the old shape.

use crate::id::NodeId;
use crate::node::{Address, Epoch, LatLng, Node, Payload, SurveyAnswers, SurveyStatus};
use crate::store::NodeStore;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

/// Schema of a persisted store document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreSchema {
    /// Version 1: `pins` list
    PinsV1,
    /// Current: `nodes` list
    Nodes,
}

impl StoreSchema {
    /// Detect the schema of a parsed document
    #[must_use]
    pub fn detect(doc: &Value) -> Self {
        match doc.get("pins") {
            Some(pins) if !pins.is_null() => Self::PinsV1,
            _ => Self::Nodes,
        }
    }
}

/// Version 1 store document
#[derive(Debug, Deserialize)]
struct PinsStore {
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    last_synced: Epoch,
    #[serde(default)]
    last_saved: Option<Epoch>,
    #[serde(default)]
    canvasser: Option<String>,
    pins: Pins,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Pins {
    List(Vec<Pin>),
    Keyed(IndexMap<String, Pin>),
}

impl Pins {
    fn into_vec(self) -> Vec<Pin> {
        match self {
            Self::List(pins) => pins,
            Self::Keyed(pins) => pins.into_values().collect(),
        }
    }
}

/// Version 1 pin: `[street, unit, city, state, zip]` plus outcome colour
#[derive(Debug, Deserialize)]
struct Pin {
    /// Epoch the pin was dropped; doubles as its identity
    id: Epoch,
    #[serde(default)]
    address: Vec<Option<String>>,
    #[serde(default)]
    latlng: Option<PinLatLng>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    survey: Option<SurveyAnswers>,
}

/// Coordinates were sometimes written as strings
#[derive(Debug, Deserialize)]
struct PinLatLng {
    #[serde(default)]
    latitude: Value,
    #[serde(default)]
    longitude: Value,
}

impl PinLatLng {
    fn to_latlng(&self) -> Option<LatLng> {
        Some(LatLng::new(
            coordinate(&self.latitude)?,
            coordinate(&self.longitude)?,
        ))
    }
}

fn coordinate(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn status_from_color(color: Option<&str>) -> SurveyStatus {
    match color {
        Some("green") => SurveyStatus::Home,
        Some("yellow") => SurveyStatus::NotHome,
        Some("red") => SurveyStatus::NotInterested,
        _ => SurveyStatus::NoStatus,
    }
}

/// Upgrade a parsed document of any known schema to the current store
///
/// # Errors
/// Returns the decode error when the document matches neither schema
pub fn upgrade(doc: Value) -> Result<NodeStore, serde_json::Error> {
    match StoreSchema::detect(&doc) {
        StoreSchema::Nodes => serde_json::from_value(doc),
        StoreSchema::PinsV1 => {
            let legacy: PinsStore = serde_json::from_value(doc)?;
            let pins = legacy.pins.into_vec();
            tracing::info!(pins = pins.len(), "upgrading version 1 pin store");
            Ok(migrate_pins(
                NodeStore {
                    nodes: legacy.nodes,
                    last_synced: legacy.last_synced,
                    last_saved: legacy.last_saved,
                },
                pins,
                legacy.canvasser.unwrap_or_default(),
            ))
        }
    }
}

fn migrate_pins(mut store: NodeStore, pins: Vec<Pin>, canvasser: String) -> NodeStore {
    let mut seen: HashSet<NodeId> = store.nodes.iter().map(|n| n.id.clone()).collect();

    for pin in pins {
        let mut parts = pin.address;
        let unit = if parts.len() > 1 {
            parts.remove(1).unwrap_or_default()
        } else {
            String::new()
        };
        let mut address = Address::from(parts);
        address.city = address.city.trim().to_string();

        let address_id = NodeId::for_address(&address);
        let has_unit = !unit.is_empty();

        if seen.insert(address_id.clone()) {
            store.push(Node {
                id: address_id.clone(),
                parent_id: None,
                created: pin.id,
                updated: pin.id,
                canvasser: canvasser.clone(),
                payload: Payload::Address {
                    address,
                    latlng: pin.latlng.as_ref().and_then(PinLatLng::to_latlng),
                    multi_unit: has_unit,
                },
            });
        }

        let mut parent = address_id;
        if has_unit {
            let unit_id = NodeId::derive(&[parent.as_str().as_bytes(), unit.as_bytes()]);
            if seen.insert(unit_id.clone()) {
                store.push(Node {
                    id: unit_id.clone(),
                    parent_id: Some(parent.clone()),
                    created: pin.id,
                    updated: pin.id,
                    canvasser: canvasser.clone(),
                    payload: Payload::Unit { unit },
                });
            }
            parent = unit_id;
        }

        let survey = pin.survey.unwrap_or_default();
        let survey_json = serde_json::to_vec(&survey).unwrap_or_default();
        let stamp = pin.id.to_string();
        let survey_id = NodeId::derive(&[
            parent.as_str().as_bytes(),
            survey_json.as_slice(),
            stamp.as_bytes(),
        ]);
        if seen.insert(survey_id.clone()) {
            store.push(Node {
                id: survey_id,
                parent_id: Some(parent),
                created: pin.id,
                updated: pin.id,
                canvasser: canvasser.clone(),
                payload: Payload::Survey {
                    status: status_from_color(pin.color.as_deref()),
                    survey,
                },
            });
        }
    }

    store
}
