use super::*;
use crate::error::ErrorCode;

#[cfg(unix)]
fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
fn echo_module(dir: &Path) -> PathBuf {
    script(
        dir,
        "echo-1",
        &format!("if [ \"$1\" = \"{HANDSHAKE_FLAG}\" ]; then echo {PROTOCOL_VERSION}; exit 0; fi\ncat"),
    )
}

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn missing_program_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = ModuleBridge::load("x", &dir.path().join("nope"), TIMEOUT).await.unwrap_err();
    assert_eq!(err.error_code(), "E_MODULE_MISSING");
}

#[cfg(unix)]
#[tokio::test]
async fn handshake_accepts_protocol_speakers() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = ModuleBridge::load("echo", &echo_module(dir.path()), TIMEOUT).await.unwrap();
    assert_eq!(bridge.label(), "echo");
    assert!(bridge.program().ends_with("echo-1"));
}

#[cfg(unix)]
#[tokio::test]
async fn handshake_rejects_other_programs() {
    let dir = tempfile::tempdir().unwrap();
    let path = script(dir.path(), "liar-1", "echo something-else");
    let err = ModuleBridge::load("liar", &path, TIMEOUT).await.unwrap_err();
    assert_eq!(err.error_code(), "E_MODULE_HANDSHAKE");
}

#[cfg(unix)]
#[tokio::test]
async fn silent_handshake_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let path = script(dir.path(), "sleepy-1", "sleep 5");
    let err = ModuleBridge::load("sleepy", &path, Duration::from_millis(100)).await.unwrap_err();
    assert_eq!(err.error_code(), "E_MODULE_HANDSHAKE_TIMEOUT");
}

#[cfg(unix)]
#[tokio::test]
async fn layout_round_trips_through_the_process() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = ModuleBridge::load("echo", &echo_module(dir.path()), TIMEOUT).await.unwrap();

    let mut graph = GraphNode::named("root");
    graph.children.push(GraphNode::named("a"));
    graph.children[0].bounds.width = 30.0;
    graph.children[0].bounds.height = 30.0;

    assert_eq!(bridge.layout(&graph).await, Some(graph));
}

#[cfg(unix)]
#[tokio::test]
async fn failing_module_yields_none() {
    let dir = tempfile::tempdir().unwrap();
    let module = ModuleBridge { label: "bad".into(), program: script(dir.path(), "bad-1", "echo boom >&2\nexit 3") };
    assert_eq!(module.layout(&GraphNode::named("g")).await, None);
}

#[cfg(unix)]
#[tokio::test]
async fn garbage_output_yields_none() {
    let dir = tempfile::tempdir().unwrap();
    let module = ModuleBridge { label: "junk".into(), program: script(dir.path(), "junk-1", "cat >/dev/null\necho junk") };
    assert_eq!(module.layout(&GraphNode::named("g")).await, None);
}

#[cfg(unix)]
#[tokio::test]
async fn empty_output_yields_none() {
    let dir = tempfile::tempdir().unwrap();
    let module = ModuleBridge { label: "mute".into(), program: script(dir.path(), "mute-1", "cat >/dev/null") };
    assert_eq!(module.layout(&GraphNode::named("g")).await, None);
}

#[test]
fn missing_input_pipe_is_absent() {
    let bridge = ModuleBridge { label: "0.9.0".into(), program: PathBuf::from("module-0.9.0") };
    assert!(bridge.input_pipe(None).is_none());
}
