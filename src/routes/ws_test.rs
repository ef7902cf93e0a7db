use super::*;
use std::sync::Arc;

use crate::modules::VersionRegistry;

fn harness() -> LayoutHarness {
    LayoutHarness::new(Arc::new(VersionRegistry::empty()))
}

fn request_model(graph: &str) -> ClientAction {
    ClientAction::RequestModel { format: "elkt".into(), graph: graph.into() }
}

#[test]
fn client_actions_parse_from_json() {
    let action: ClientAction = serde_json::from_str(r#"{"kind":"requestModel","graph":"{}"}"#).unwrap();
    assert_eq!(action, ClientAction::RequestModel { format: "json".into(), graph: "{}".into() });

    let action: ClientAction = serde_json::from_str(r#"{"kind":"versionChange","version":"0.9.1"}"#).unwrap();
    assert_eq!(action, ClientAction::VersionChange { version: "0.9.1".into() });
}

#[test]
fn server_actions_serialize_with_kind_tag() {
    let action = ServerAction::Error(ErrorBody::new(FailureKind::Input, "bad"));
    let json = serde_json::to_value(&action).unwrap();
    assert_eq!(json, serde_json::json!({ "kind": "error", "message": "bad", "type": "input" }));
}

#[tokio::test]
async fn request_model_replies_with_diagram() {
    let mut session = DiagramSession::new();
    let reply = session.handle(&harness(), request_model("node a\nnode b\nedge a -> b")).await.unwrap();
    let ServerAction::SetModel { new_root } = reply else {
        panic!("expected setModel, got {reply:?}");
    };
    assert_eq!(new_root.id, "graph");
    assert!(new_root.find("graph.b").is_some());

    let json = serde_json::to_value(ServerAction::SetModel { new_root }).unwrap();
    assert_eq!(json["kind"], "setModel");
    assert_eq!(json["newRoot"]["type"], "graph");
}

#[tokio::test]
async fn malformed_model_is_an_input_error() {
    let mut session = DiagramSession::new();
    let reply = session.handle(&harness(), request_model("node {")).await.unwrap();
    let ServerAction::Error(body) = reply else {
        panic!("expected error, got {reply:?}");
    };
    assert_eq!(body.kind, FailureKind::Input);
    assert!(body.diagnostics.is_some());
}

#[tokio::test]
async fn unknown_format_is_a_request_error() {
    let mut session = DiagramSession::new();
    let action = ClientAction::RequestModel { format: "dot".into(), graph: String::new() };
    let reply = session.handle(&harness(), action).await.unwrap();
    assert!(matches!(reply, ServerAction::Error(ErrorBody { kind: FailureKind::Request, .. })));
}

#[tokio::test]
async fn version_change_without_model_is_silent() {
    let mut session = DiagramSession::new();
    let reply = session.handle(&harness(), ClientAction::VersionChange { version: CURRENT_ENGINE.into() }).await;
    assert!(reply.is_none());
    assert_eq!(session.version(), CURRENT_ENGINE);
}

#[tokio::test]
async fn unknown_version_without_model_is_rejected() {
    let harness = harness();
    let mut session = DiagramSession::new();
    let reply = session.handle(&harness, ClientAction::VersionChange { version: "x".into() }).await.unwrap();
    let ServerAction::Error(body) = reply else {
        panic!("expected error, got {reply:?}");
    };
    assert_eq!(body.kind, FailureKind::Configuration);
    assert_eq!(session.version(), CURRENT_ENGINE);

    // The session still renders with the engine it had.
    let reply = session.handle(&harness, request_model("node a")).await;
    assert!(matches!(reply, Some(ServerAction::SetModel { .. })));
}

#[tokio::test]
async fn unknown_version_is_rejected_and_previous_kept() {
    let harness = harness();
    let mut session = DiagramSession::new();
    session.handle(&harness, request_model("node a")).await.unwrap();

    let reply = session.handle(&harness, ClientAction::VersionChange { version: "0.1.0".into() }).await.unwrap();
    let ServerAction::Error(body) = reply else {
        panic!("expected error, got {reply:?}");
    };
    assert_eq!(body.kind, FailureKind::Configuration);
    assert_eq!(body.message, "Unknown layouter version: 0.1.0.");
    assert_eq!(session.version(), CURRENT_ENGINE);
}

#[tokio::test]
async fn version_change_re_renders_last_model() {
    let harness = harness();
    let mut session = DiagramSession::new();
    session.handle(&harness, request_model("node a")).await.unwrap();

    let reply = session.handle(&harness, ClientAction::VersionChange { version: CURRENT_ENGINE.into() }).await;
    assert!(matches!(reply, Some(ServerAction::SetModel { .. })));
}

#[tokio::test]
async fn invalid_json_is_reported() {
    let mut session = DiagramSession::new();
    let reply = process_inbound_text(&harness(), &mut session, "not json").await.unwrap();
    assert!(matches!(reply, ServerAction::Error(ErrorBody { kind: FailureKind::Request, .. })));
}
