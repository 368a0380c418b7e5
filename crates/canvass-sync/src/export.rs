//! CSV export of survey results
//!
//! One row per survey node, oldest first:
//! `Street,City,State,Zip,Unit,longitude,latitude,canvasser,datetime,status,<question keys>`.
//! Surveys taken at a unit are reported against the unit's address with the
//! unit label filled in. Orphaned surveys are skipped.

use crate::form::Form;
use canvass_graph::{Epoch, Node, NodeId, NodeType};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Fixed leading columns
pub const CSV_COLUMNS: [&str; 10] = [
    "Street",
    "City",
    "State",
    "Zip",
    "Unit",
    "longitude",
    "latitude",
    "canvasser",
    "datetime",
    "status",
];

/// Rendered export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub contents: String,
    pub rows: usize,
    pub skipped: usize,
}

/// Render `M/D/YYYY h:mm:ss AM` in UTC
#[must_use]
pub fn format_timestamp(epoch: Epoch) -> String {
    DateTime::<Utc>::from_timestamp(epoch, 0)
        .map(|dt| dt.format("%-m/%-d/%Y %-I:%M:%S %p").to_string())
        .unwrap_or_default()
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn answer_text(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Render every survey in `nodes` as CSV for `form`
#[must_use]
pub fn render_csv(nodes: &[Node], form: &Form) -> CsvExport {
    let by_id: HashMap<&NodeId, &Node> = nodes.iter().map(|n| (&n.id, n)).collect();
    let keys = form.ordered_keys();

    let mut contents = CSV_COLUMNS.join(",");
    for key in &keys {
        contents.push(',');
        contents.push_str(key);
    }
    contents.push('\n');

    let mut surveys: Vec<&Node> = nodes.iter().filter(|n| n.is_type(NodeType::Survey)).collect();
    surveys.sort_by_key(|n| n.updated);

    let mut rows = 0;
    let mut skipped = 0;
    for survey in surveys {
        let parent = survey.parent_id.as_ref().and_then(|id| by_id.get(id).copied());
        let (address, unit) = match parent {
            Some(p) if p.is_type(NodeType::Unit) => (
                p.parent_id.as_ref().and_then(|id| by_id.get(id).copied()),
                p.unit().unwrap_or_default(),
            ),
            Some(p) => (Some(p), ""),
            None => {
                skipped += 1;
                continue;
            }
        };

        let tuple = address.and_then(Node::address);
        let latlng = address.and_then(Node::latlng);
        let tuple_cells = match tuple {
            Some(a) => a.to_tuple().iter().map(|s| quoted(s)).collect::<Vec<_>>().join(","),
            None => String::from(",,,"),
        };
        let (lng, lat) = latlng
            .map(|l| (l.longitude.to_string(), l.latitude.to_string()))
            .unwrap_or_default();

        contents.push_str(&format!(
            "{tuple_cells},{},{lng},{lat},{},{},{}",
            quoted(unit),
            quoted(&survey.canvasser),
            format_timestamp(survey.updated),
            survey.status().unwrap_or_default(),
        ));
        let answers = survey.answers();
        for key in &keys {
            let value = answer_text(answers.and_then(|a| a.get(*key)));
            contents.push(',');
            contents.push_str(&quoted(&value));
        }
        contents.push('\n');
        rows += 1;
    }

    CsvExport {
        contents,
        rows,
        skipped,
    }
}
