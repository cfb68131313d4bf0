//! Plays scenario lists through the tokio player with a channel bus

use scenario_core::{ScenarioStatus, WireMessage};
use scenario_player::{
    ChannelBus, Error, Outbound, Player, PlayerConfig, PlayerHandle, PlayerReport, RunMode,
};
use scenario_script::{MessageDoc, RonMessageCodec};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

const ATTACH: &str = r#"#![enable(implicit_some)]
(
    name: "attach",
    steps: [
        Var(name: "UE_ID", value: "0x10"),
        Message(action: Send, file: "msg/attach_request.ron", peer: "TASK_S1AP"),
        Message(
            action: Receive,
            file: "msg/auth_request.ron",
            time: "5",
            time_ref: "-1",
            peer: "TASK_NAS_MME",
        ),
    ],
)"#;

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn fixture(list: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "msg/attach_request.ron",
        r#"(kind: "ATTACH_REQUEST", fields: {"ue": "$UE_ID"})"#,
    );
    write(
        root,
        "msg/auth_request.ron",
        r#"(kind: "AUTH_REQUEST", fields: {"ue": "$UE_ID", "rand": "ANY"})"#,
    );
    write(root, "attach.ron", ATTACH);
    write(
        root,
        "broken.ron",
        r#"(name: "broken", steps: [IncrVar(name: "MISSING")])"#,
    );
    write(root, "more/list.ron", r#"(scenarios: [Scenario("../attach.ron")])"#);
    write(root, "list.ron", list);
    dir
}

type Running = (
    JoinHandle<scenario_player::Result<PlayerReport>>,
    UnboundedReceiver<Outbound>,
    PlayerHandle,
);

fn start(dir: &TempDir) -> Running {
    let config = PlayerConfig::new(dir.path().join("list.ron"));
    let (bus, outbound) = ChannelBus::new();
    let player = Player::from_config(&config, Box::new(RonMessageCodec), Box::new(bus)).unwrap();
    let handle = player.handle();
    (tokio::spawn(player.run()), outbound, handle)
}

fn auth_request(ue: &str) -> WireMessage {
    let doc = MessageDoc {
        kind: "AUTH_REQUEST".into(),
        fields: [("ue", ue), ("rand", "0011")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    };
    RonMessageCodec.encode(&doc).unwrap().from_task("TASK_NAS_MME")
}

#[tokio::test(start_paused = true)]
async fn test_reply_within_deadline_passes() {
    let dir = fixture(r#"(scenarios: [Scenario("attach.ron")])"#);
    let (run, mut outbound, handle) = start(&dir);

    let sent = outbound.recv().await.unwrap();
    assert_eq!(sent.destination.as_str(), "TASK_S1AP");
    let doc = RonMessageCodec.decode(&sent.message).unwrap();
    assert_eq!(doc.fields["ue"], "16");

    tokio::time::sleep(Duration::from_secs(2)).await;
    handle.deliver(auth_request("16")).unwrap();

    let report = run.await.unwrap().unwrap();
    assert!(report.all_passed());
    assert_eq!(report.scenarios.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_reply_times_out() {
    let dir = fixture(r#"(scenarios: [Scenario("attach.ron")])"#);
    let (run, mut outbound, _handle) = start(&dir);

    outbound.recv().await.unwrap();
    let started = tokio::time::Instant::now();
    let report = run.await.unwrap().unwrap();

    assert!(started.elapsed() >= Duration::from_secs(5));
    let result = &report.scenarios[0];
    assert_eq!(result.status, ScenarioStatus::PlayFailed);
    assert!(result.reason.as_deref().unwrap().contains("timed out"));
}

#[tokio::test(start_paused = true)]
async fn test_playlist_with_include_and_load_failure() {
    let dir = fixture(
        r#"(scenarios: [Scenario("broken.ron"), Include("more/list.ron"), Scenario("attach.ron")])"#,
    );
    let (run, mut outbound, handle) = start(&dir);

    // the included attach gets a wrong reply, the second one a good reply
    outbound.recv().await.unwrap();
    handle.deliver(auth_request("17")).unwrap();
    outbound.recv().await.unwrap();
    handle.deliver(auth_request("16")).unwrap();

    let report = run.await.unwrap().unwrap();
    let statuses: Vec<_> = report.scenarios.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![
            ScenarioStatus::LoadFailed,
            ScenarioStatus::PlayFailed,
            ScenarioStatus::PlaySuccess,
        ]
    );
    assert!(!report.all_passed());

    let path = dir.path().join("results.ron");
    report.write_to(&path).unwrap();
    assert!(fs::read_to_string(path).unwrap().contains("LOAD_FAILED"));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_reports_current_state() {
    let dir = fixture(r#"(scenarios: [Scenario("attach.ron")])"#);
    let (run, mut outbound, handle) = start(&dir);

    outbound.recv().await.unwrap();
    handle.shutdown().unwrap();

    let report = run.await.unwrap().unwrap();
    assert_eq!(report.scenarios[0].status, ScenarioStatus::Paused);
    // the player is gone
    assert!(matches!(
        handle.deliver(auth_request("16")),
        Err(Error::ChannelClosed)
    ));
}

#[test]
fn test_disabled_run_mode() {
    let dir = fixture(r#"(scenarios: [])"#);
    let mut config = PlayerConfig::new(dir.path().join("list.ron"));
    config.run_mode = RunMode::Normal;
    let (bus, _outbound) = ChannelBus::new();
    let result = Player::from_config(&config, Box::new(RonMessageCodec), Box::new(bus));
    assert!(matches!(result, Err(Error::NotEnabled)));
}
