//! Commands against a temporary storage directory and remote folder

use canvass_cli::config::{ConvertSection, DeviceConfig, PositionConfig, UserConfig};
use canvass_cli::{App, CliConfig};
use canvass_graph::storage::disclosure_accepted;
use canvass_graph::{NodeDraft, SurveyAnswers, SurveyStatus};
use canvass_sync::save_forms;
use canvass_test_utils::{sample_form, springfield, springfield_latlng, ScriptedTransport};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

fn config(dir: &Path) -> CliConfig {
    CliConfig {
        storage_dir: dir.join("kv"),
        remote_root: dir.join("remote"),
        device: DeviceConfig {
            id: "dev-1".into(),
            name: "tablet".into(),
            info: json!({"UniqueID": "dev-1"}),
        },
        user: UserConfig {
            id: "vol-owner".into(),
            account_id: "acct-owner".into(),
            display_name: "Olive Owner".into(),
        },
        position: PositionConfig {
            latitude: 40.0,
            longitude: -75.0,
        },
        convert: ConvertSection {
            state: "il".into(),
            api_token: "tok".into(),
            poll_interval_secs: 0,
            ..ConvertSection::default()
        },
        log_filter: "debug".into(),
    }
}

fn app_with_form(dir: &Path) -> App {
    let app = App::open(config(dir)).unwrap();
    save_forms(app.storage().as_ref(), &[sample_form("f1")]).unwrap();
    app
}

async fn record_visit(app: &App) {
    let mut session = app.session("f1").await.unwrap();
    let graph = session.graph_mut();
    let address = graph
        .add_node(NodeDraft::address(springfield(), springfield_latlng(), false))
        .unwrap();
    let mut answers = SurveyAnswers::new();
    answers.insert("FullName".into(), json!("Sam Smith"));
    graph
        .add_node(NodeDraft::survey(address.id, SurveyStatus::Home, answers))
        .unwrap();
}

#[tokio::test]
async fn sync_uploads_and_aggregates() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with_form(dir.path());
    record_visit(&app).await;

    let outcome = app.sync("f1").await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(
        outcome.notice.map(|n| n.message()),
        Some("Data sync successful!")
    );
    let folder = dir.path().join("remote/canvass/f1");
    assert!(folder.join("dev-1.jtxt").is_file());
    assert!(folder.join("exported.jtrf").is_file());

    let report = outcome.result.unwrap();
    assert_eq!(report.aggregate.map(|nodes| nodes.len()), Some(2));
}

#[tokio::test]
async fn export_writes_csv_next_to_the_data() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with_form(dir.path());
    record_visit(&app).await;

    let report = app.export("f1").await.unwrap();

    assert_eq!(report.rows, 1);
    assert_eq!(report.path, "/canvass/f1/Form f1.csv");
    let csv = std::fs::read_to_string(dir.path().join("remote/canvass/f1/Form f1.csv")).unwrap();
    assert!(csv.starts_with("Street,City,State,Zip,Unit"));
    assert!(csv.contains("Sam Smith"));
}

#[tokio::test]
async fn unknown_form_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with_form(dir.path());

    let err = app.sync("nope").await.unwrap_err();
    assert!(err.to_string().contains("nope"));
}

#[tokio::test]
async fn settings_are_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with_form(dir.path());

    let settings = app.settings("f1", Some(true), None).await.unwrap();
    assert!(settings.show_only_my_turf);

    let reopened = App::open(config(dir.path())).unwrap();
    let settings = reopened.settings("f1", None, None).await.unwrap();
    assert!(settings.show_only_my_turf);
}

#[tokio::test]
async fn convert_needs_accepted_terms() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with_form(dir.path());
    let transport = Arc::new(ScriptedTransport::org_server());

    assert!(app.convert_with(transport.clone(), false).await.is_err());
    assert!(transport.requests().is_empty());

    let report = app.convert_with(transport.clone(), true).await.unwrap();
    assert_eq!(report.org_id, "ORG1");
    assert_eq!(report.forms.len(), 1);
    assert!(disclosure_accepted(app.storage().as_ref()).unwrap());
    assert_eq!(
        transport.bodies("/hello")[0]["dinfo"],
        json!({"UniqueID": "dev-1"})
    );
}
