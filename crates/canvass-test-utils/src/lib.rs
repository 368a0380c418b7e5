//! Testing utilities for the canvass workspace
//!
//! Shared fixtures, node builders and a scripted HTTP transport.

#![allow(missing_docs)]

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use canvass_convert::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use canvass_graph::storage::keys;
use canvass_graph::{
    Address, Epoch, KeyValueStore, LatLng, Node, NodeId, Payload, SurveyAnswers, SurveyStatus,
};
use canvass_sync::{Form, Question, User};
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::io::Write;

pub const TEST_CANVASSER: &str = "Pat Tester";

pub fn springfield() -> Address {
    Address::new("1 Main St", "Springfield", "IL", "62701")
}

pub fn springfield_latlng() -> LatLng {
    LatLng::new(39.7817, -89.6501)
}

pub fn address_node(id: &str, address: Address, latlng: Option<LatLng>, updated: Epoch) -> Node {
    Node {
        id: NodeId::new(id),
        parent_id: None,
        created: updated,
        updated,
        canvasser: TEST_CANVASSER.to_string(),
        payload: Payload::Address {
            address,
            latlng,
            multi_unit: false,
        },
    }
}

pub fn unit_node(id: &str, parent: &str, unit: &str, updated: Epoch) -> Node {
    Node {
        id: NodeId::new(id),
        parent_id: Some(NodeId::new(parent)),
        created: updated,
        updated,
        canvasser: TEST_CANVASSER.to_string(),
        payload: Payload::Unit {
            unit: unit.to_string(),
        },
    }
}

pub fn survey_node(
    id: &str,
    parent: &str,
    status: SurveyStatus,
    answers: Value,
    updated: Epoch,
) -> Node {
    let survey: SurveyAnswers = match answers {
        Value::Object(map) => map,
        _ => SurveyAnswers::new(),
    };
    Node {
        id: NodeId::new(id),
        parent_id: Some(NodeId::new(parent)),
        created: updated - 1,
        updated,
        canvasser: TEST_CANVASSER.to_string(),
        payload: Payload::Survey { status, survey },
    }
}

/// Form asking for the well-known name and party questions plus one custom question
pub fn sample_form(id: &str) -> Form {
    Form::new(id, format!("Form {id}"), format!("/canvass/{id}"))
        .with_author("acct-owner")
        .with_question("FullName", Question::new("Full Name", "String"))
        .with_question("PartyAffiliation", Question::new("Party Affiliation", "List"))
        .with_question("FavoriteIssue", Question::new("Favorite Issue", "String"))
}

pub fn owner() -> User {
    User::new("vol-owner", "acct-owner").with_display_name("Olive Owner")
}

pub fn volunteer() -> User {
    User::new("vol-2", "acct-2").with_display_name("Val Volunteer")
}

/// Legacy node blob: `{"nodes": {id: node}}`, gzip-compressed and base64-wrapped
pub fn legacy_blob(nodes: &[Node]) -> String {
    let doc = legacy_doc(nodes);
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(doc.to_string().as_bytes()).unwrap();
    STANDARD.encode(enc.finish().unwrap())
}

/// Legacy node document as plain JSON
pub fn legacy_doc(nodes: &[Node]) -> Value {
    let map: serde_json::Map<String, Value> = nodes
        .iter()
        .map(|n| (n.id.to_string(), serde_json::to_value(n).unwrap()))
        .collect();
    json!({ "nodes": map })
}

/// Store a legacy blob for a form
pub fn store_legacy(storage: &dyn KeyValueStore, form_id: &str, nodes: &[Node]) {
    storage.set(&keys::pins(form_id), &legacy_blob(nodes)).unwrap();
}

#[derive(Debug)]
struct Route {
    suffix: String,
    queued: VecDeque<HttpResponse>,
    fallback: Option<HttpResponse>,
}

/// HTTP transport answering by URL suffix and recording every request
///
/// Unmatched requests get `200 {}`.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Server that creates `ORG1`, is immediately ready, and hands out ids
    pub fn org_server() -> Self {
        let transport = Self::new();
        transport.always("/orgid/v1/new", HttpResponse::new(200, json!({"orgid": "ORG1"})));
        transport.always("/uncle", HttpResponse::new(200, json!({})));
        transport.always("/turf/create", HttpResponse::new(200, json!({"turfId": "TURF1"})));
        transport.always(
            "/attribute/create",
            HttpResponse::new(200, json!({"attributeId": "ATTR-NEW"})),
        );
        transport.always("/form/create", HttpResponse::new(200, json!({"formId": "RFORM1"})));
        transport
    }

    fn with_route(&self, suffix: &str, f: impl FnOnce(&mut Route)) {
        let mut routes = self.routes.lock();
        match routes.iter_mut().find(|r| r.suffix == suffix) {
            Some(route) => f(route),
            None => {
                let mut route = Route {
                    suffix: suffix.to_string(),
                    queued: VecDeque::new(),
                    fallback: None,
                };
                f(&mut route);
                routes.push(route);
            }
        }
    }

    /// Answer the next request ending in `suffix` once
    pub fn once(&self, suffix: &str, response: HttpResponse) {
        self.with_route(suffix, |route| route.queued.push_back(response));
    }

    /// Answer every request ending in `suffix` (after queued answers run out)
    pub fn always(&self, suffix: &str, response: HttpResponse) {
        self.with_route(suffix, |route| route.fallback = Some(response));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn calls_to(&self, suffix: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.ends_with(suffix))
            .cloned()
            .collect()
    }

    /// Request bodies sent to `suffix`
    pub fn bodies(&self, suffix: &str) -> Vec<Value> {
        self.calls_to(suffix)
            .into_iter()
            .filter_map(|r| r.body)
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let response = {
            let mut routes = self.routes.lock();
            routes
                .iter_mut()
                .find(|r| request.url.ends_with(&r.suffix))
                .and_then(|r| r.queued.pop_front().or_else(|| r.fallback.clone()))
                .unwrap_or_else(|| HttpResponse::new(200, json!({})))
        };
        self.requests.lock().push(request);
        Ok(response)
    }
}
