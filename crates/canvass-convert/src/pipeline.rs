//! Legacy conversion pipeline
//!
//! Moves every locally stored legacy form, and the canvassing data recorded
//! against it, onto a freshly created organization. Steps run strictly in
//! order:
//!
//! 1. create the organization (fatal on failure)
//! 2. poll until it is ready (fatal on an unexpected status or timeout)
//! 3. say hello, create the unrestricted turf and join it (best-effort)
//! 4. per form: create missing attributes, the form, join it, replay nodes
//!
//! A form whose attributes or remote form cannot be created is skipped; any
//! other error halts the pipeline for good. Remote resources created before
//! a failure are left in place.

use crate::attributes::AttributeMap;
use crate::client::OrgApiClient;
use crate::error::{ConvertError, Result};
use crate::fingerprint::address_fingerprint;
use crate::legacy::{decode_legacy_blob, LegacyNodes};
use canvass_graph::storage::{self, keys};
use canvass_graph::{is_answered, KeyValueStore, LatLng, Node, NodeId, Payload, SurveyStatus};
use canvass_sync::{load_forms, Form};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Name of the turf every converted organization starts with
pub const UNRESTRICTED_TURF: &str = "Unrestricted";

/// Bounding polygon of the continental United States (GeoJSON)
#[must_use]
pub fn continental_us() -> Value {
    const WEST: f64 = -124.848_974;
    const EAST: f64 = -66.885_444;
    const SOUTH: f64 = 24.396_308;
    const NORTH: f64 = 49.384_358;
    json!({
        "type": "Polygon",
        "coordinates": [[
            [WEST, SOUTH],
            [EAST, SOUTH],
            [EAST, NORTH],
            [WEST, NORTH],
            [WEST, SOUTH],
        ]],
    })
}

/// Who and where the conversion runs
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionContext {
    pub device_id: String,
    /// Volunteer id assigned to the turf and forms
    pub user_id: String,
    /// Device position, also stamped on every visit
    pub position: LatLng,
    /// Free-form device metadata sent with hello
    pub device_info: Value,
}

impl ConversionContext {
    #[must_use]
    pub fn new(device_id: impl Into<String>, user_id: impl Into<String>, position: LatLng) -> Self {
        Self {
            device_id: device_id.into(),
            user_id: user_id.into(),
            position,
            device_info: Value::Object(Map::new()),
        }
    }

    #[must_use]
    pub fn with_device_info(mut self, info: Value) -> Self {
        self.device_info = info;
        self
    }
}

/// What one form produced remotely
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormReport {
    pub form_id: String,
    pub remote_form_id: String,
    /// Attribute ids of the remote form, in question order
    pub attributes: Vec<String>,
    pub addresses: usize,
    pub units: usize,
    pub visits_updated: usize,
    pub visits_added: usize,
    /// Nodes that could not be replayed
    pub skipped_nodes: usize,
}

/// A form left out of the conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedForm {
    pub form_id: String,
    pub reason: String,
}

/// Result of a completed conversion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionReport {
    pub org_id: String,
    pub poll_attempts: u32,
    pub turf_id: Option<String>,
    pub forms: Vec<FormReport>,
    pub skipped_forms: Vec<SkippedForm>,
}

/// Lifecycle of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineStatus {
    #[default]
    Idle,
    Running,
    Done,
    /// Terminal; the pipeline refuses to run again
    Failed,
}

/// One-shot conversion of legacy data onto the organization API
#[derive(Debug)]
pub struct ConversionPipeline {
    client: OrgApiClient,
    storage: Arc<dyn KeyValueStore>,
    status: Mutex<PipelineStatus>,
}

impl ConversionPipeline {
    #[must_use]
    pub fn new(client: OrgApiClient, storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            client,
            storage,
            status: Mutex::new(PipelineStatus::Idle),
        }
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> PipelineStatus {
        *self.status.lock()
    }

    /// Run the conversion
    ///
    /// # Errors
    /// Returns [`ConvertError::DisclosurePending`] without starting when the
    /// guidelines were not accepted, otherwise the error that halted the
    /// pipeline. Once failed, every later call returns [`ConvertError::Halted`].
    #[tracing::instrument(skip_all, fields(device = %ctx.device_id, state = %self.client.config().state))]
    pub async fn run(&self, ctx: &ConversionContext) -> Result<ConversionReport> {
        if !storage::disclosure_accepted(self.storage.as_ref())? {
            return Err(ConvertError::DisclosurePending);
        }
        {
            let mut status = self.status.lock();
            match *status {
                PipelineStatus::Failed => return Err(ConvertError::Halted),
                PipelineStatus::Running => return Err(ConvertError::Busy),
                PipelineStatus::Idle | PipelineStatus::Done => *status = PipelineStatus::Running,
            }
        }

        let result = self.convert(ctx).await;
        let next = match &result {
            Ok(report) => {
                info!(
                    org_id = %report.org_id,
                    forms = report.forms.len(),
                    skipped = report.skipped_forms.len(),
                    "conversion complete"
                );
                PipelineStatus::Done
            }
            Err(e) => {
                error!(error = %e, "conversion failed");
                PipelineStatus::Failed
            }
        };
        *self.status.lock() = next;
        result
    }

    async fn convert(&self, ctx: &ConversionContext) -> Result<ConversionReport> {
        let org_id = self.client.create_org().await?;
        let poll_attempts = self.client.poll_ready(&org_id).await?;

        self.client
            .send(
                &org_id,
                "/hello",
                json!({
                    "longitude": ctx.position.longitude,
                    "latitude": ctx.position.latitude,
                    "dinfo": ctx.device_info,
                }),
            )
            .await;

        let turf_id = self.join_turf(&org_id, ctx).await;

        let forms = load_forms(self.storage.as_ref())?;
        info!(forms = forms.len(), "converting forms");

        let mut report = ConversionReport {
            org_id,
            poll_attempts,
            turf_id,
            ..ConversionReport::default()
        };
        let mut attributes = AttributeMap::new();

        for form in &forms {
            match self
                .convert_form(&report.org_id, ctx, form, &mut attributes)
                .await
            {
                Ok(form_report) => report.forms.push(form_report),
                Err(ConvertError::FormSkipped { form, reason }) => {
                    error!(form = %form, reason = %reason, "form skipped");
                    report.skipped_forms.push(SkippedForm {
                        form_id: form,
                        reason,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    async fn join_turf(&self, org_id: &str, ctx: &ConversionContext) -> Option<String> {
        let turf = self
            .client
            .send(
                org_id,
                "/turf/create",
                json!({ "name": UNRESTRICTED_TURF, "geometry": continental_us() }),
            )
            .await;

        let Some(turf_id) = turf.get("turfId").and_then(Value::as_str) else {
            warn!("turf creation returned no turfId, skipping assignment");
            return None;
        };

        self.client
            .send(
                org_id,
                "/turf/assigned/volunteer/add",
                json!({ "turfId": turf_id, "vId": ctx.user_id }),
            )
            .await;
        Some(turf_id.to_string())
    }

    async fn convert_form(
        &self,
        org_id: &str,
        ctx: &ConversionContext,
        form: &Form,
        attributes: &mut AttributeMap,
    ) -> Result<FormReport> {
        let mut order = Vec::with_capacity(form.questions_order.len());
        for key in form.ordered_keys() {
            if let Some(id) = attributes.get(key) {
                order.push(id.to_string());
                continue;
            }

            let question = form.questions.get(key).ok_or_else(|| {
                ConvertError::form_skipped(&form.id, format!("question `{key}` is not defined"))
            })?;
            let created = self
                .client
                .send(
                    org_id,
                    "/attribute/create",
                    json!({ "name": question.label, "type": question.kind.to_lowercase() }),
                )
                .await;
            let id = created
                .get("attributeId")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    ConvertError::form_skipped(
                        &form.id,
                        format!("attribute creation failed for `{key}`"),
                    )
                })?;
            debug!(key, attribute = id, "attribute created");
            attributes.insert(key, id);
            order.push(id.to_string());
        }

        let created = self
            .client
            .send(
                org_id,
                "/form/create",
                json!({ "name": form.name, "attributes": order }),
            )
            .await;
        let remote_form_id = created
            .get("formId")
            .and_then(Value::as_str)
            .ok_or_else(|| ConvertError::form_skipped(&form.id, "form creation failed"))?
            .to_string();

        self.client
            .send(
                org_id,
                "/form/assigned/volunteer/add",
                json!({ "formId": remote_form_id, "vId": ctx.user_id }),
            )
            .await;

        let nodes = match self.storage.get(&keys::pins(&form.id))? {
            Some(raw) => decode_legacy_blob(&raw),
            None => LegacyNodes::new(),
        };
        info!(form = %form.id, nodes = nodes.len(), "replaying form data");

        let mut report = FormReport {
            form_id: form.id.clone(),
            remote_form_id: remote_form_id.clone(),
            attributes: order,
            ..FormReport::default()
        };
        let replay = Replay {
            client: &self.client,
            org_id,
            ctx,
            form_id: &remote_form_id,
            nodes: &nodes,
            attributes,
        };
        replay.run(&mut report).await;
        Ok(report)
    }
}

/// Replays one form's decoded nodes
struct Replay<'a> {
    client: &'a OrgApiClient,
    org_id: &'a str,
    ctx: &'a ConversionContext,
    form_id: &'a str,
    nodes: &'a LegacyNodes,
    attributes: &'a AttributeMap,
}

/// Remote address reference of a replayed address node
struct Located {
    fingerprint: String,
    latlng: LatLng,
}

impl<'a> Replay<'a> {
    async fn run(&self, report: &mut FormReport) {
        let mut located: HashMap<&NodeId, Located> = HashMap::new();

        // addresses first so units and surveys can reference them
        for node in self.nodes.values() {
            let Payload::Address {
                address, latlng, ..
            } = &node.payload
            else {
                continue;
            };
            if address.to_tuple().iter().all(|part| part.is_empty()) {
                report.skipped_nodes += 1;
                continue;
            }
            let Some(latlng) = *latlng else {
                warn!(node = %node.id, "address without coordinates skipped");
                report.skipped_nodes += 1;
                continue;
            };

            let fingerprint = address_fingerprint(address);
            self.post(
                "/address/add/location",
                json!({
                    "deviceId": self.ctx.device_id,
                    "formId": self.form_id,
                    "timestamp": node.created,
                    "longitude": latlng.longitude,
                    "latitude": latlng.latitude,
                    "street": address.street,
                    "city": address.city,
                    "state": address.state,
                    "zip": address.zip,
                }),
            )
            .await;
            report.addresses += 1;
            located.insert(
                &node.id,
                Located {
                    fingerprint,
                    latlng,
                },
            );
        }

        for node in self.nodes.values() {
            let Payload::Unit { unit } = &node.payload else {
                continue;
            };
            let Some(parent) = node.parent_id.as_ref().and_then(|p| located.get(p)) else {
                warn!(node = %node.id, "unit without a replayed address skipped");
                report.skipped_nodes += 1;
                continue;
            };

            self.post(
                "/address/add/unit",
                json!({
                    "deviceId": self.ctx.device_id,
                    "formId": self.form_id,
                    "timestamp": node.created,
                    "longitude": parent.latlng.longitude,
                    "latitude": parent.latlng.latitude,
                    "unit": unit,
                    "addressId": parent.fingerprint,
                }),
            )
            .await;
            report.units += 1;
        }

        for node in self.nodes.values() {
            let Payload::Survey { status, survey } = &node.payload else {
                continue;
            };
            let (address_id, unit) = self.resolve_address(node, &located);

            let mut input = json!({
                "deviceId": self.ctx.device_id,
                "addressId": address_id,
                "formId": self.form_id,
                "status": visit_status(*status),
                "start": node.created,
                "end": node.updated,
                "longitude": self.ctx.position.longitude,
                "latitude": self.ctx.position.latitude,
            });

            if let Some(unit) = unit {
                input["unit"] = json!(unit);
            }

            if *status == SurveyStatus::Home {
                let attrs: Vec<Value> = self
                    .attributes
                    .iter()
                    .filter_map(|(key, id)| {
                        survey
                            .get(key)
                            .filter(|value| is_answered(value))
                            .map(|value| json!({ "id": id, "value": value }))
                    })
                    .collect();
                input["personId"] = json!(uuid::Uuid::new_v4().to_string());
                input["attrs"] = Value::Array(attrs);
                self.post("/people/visit/add", input).await;
                report.visits_added += 1;
            } else {
                self.post("/people/visit/update", input).await;
                report.visits_updated += 1;
            }
        }
    }

    /// Address fingerprint for a survey, plus the unit label when the survey
    /// hangs below a unit
    ///
    /// Falls back to the survey's own id when no fingerprint is reachable.
    fn resolve_address(
        &self,
        survey: &Node,
        located: &HashMap<&NodeId, Located>,
    ) -> (String, Option<&'a str>) {
        let parent = survey.parent_id.as_ref().and_then(|id| self.nodes.get(id));
        let Some(parent) = parent else {
            debug!(node = %survey.id, "orphan survey keyed by its own id");
            return (survey.id.to_string(), None);
        };

        if let Some(found) = located.get(&parent.id) {
            return (found.fingerprint.clone(), None);
        }

        let unit = parent.unit().filter(|u| !u.is_empty());
        let fingerprint = parent
            .parent_id
            .as_ref()
            .and_then(|id| located.get(id))
            .map(|found| found.fingerprint.clone());
        match fingerprint {
            Some(fingerprint) => (fingerprint, unit),
            None => (survey.id.to_string(), unit),
        }
    }

    async fn post(&self, uri: &str, body: Value) {
        self.client.send(self.org_id, uri, body).await;
    }
}

/// Visit status code for a survey outcome
#[must_use]
pub fn visit_status(status: SurveyStatus) -> u8 {
    match status {
        SurveyStatus::Home => 1,
        SurveyStatus::NotInterested => 2,
        SurveyStatus::NotHome | SurveyStatus::NoStatus => 0,
    }
}
