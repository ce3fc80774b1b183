mod common;

use apkd_common::error::ApkdError;
use apkd_common::Notification;
use apkd_core::{Change, EntryOutcome};
use common::TestEnv;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve_apk(server: &MockServer, route: &str, body: &[u8]) {
    server.reset().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

fn direct_entry(server: &MockServer, version: Option<&str>) -> serde_json::Value {
    let mut entry = json!({
        "title": "Kino",
        "description": "Movies",
        "url": "https://apps.example/apks/Kino.apk",
        "sourceUpdate": format!("{}/latest/kino.apk", server.uri()),
        "sourceMethod": "direct"
    });
    if let Some(v) = version {
        entry["ver"] = json!(v);
    }
    entry
}

#[tokio::test]
async fn new_direct_entry_is_added() {
    let mut env = TestEnv::new();
    let server = MockServer::start().await;
    serve_apk(&server, "/latest/kino.apk", b"kino-v1").await;
    env.write_catalog(json!({"apps": [direct_entry(&server, None)]}));
    env.set_tool_version(Some("1.0.0"));

    let report = env.reconciler().run_pass().await.unwrap();

    assert_eq!(report.updated(), 1);
    assert_eq!(env.artifact("Kino.apk").as_deref(), Some(&b"kino-v1"[..]));
    let app = &env.catalog().apps[0];
    assert_eq!(app.version.as_deref(), Some("1.0.0"));
    assert!(app.last_updated.is_some());
    assert_eq!(app.description.as_deref(), Some("Movies"));
    assert_eq!(
        env.drain_notifications(),
        vec![
            Notification::Added {
                title: "Kino".into(),
                version: "1.0.0".into()
            },
            Notification::PassSummary { updated: 1 },
        ]
    );
    assert!(env.tmp_entries().is_empty(), "staging area left behind");
}

#[tokio::test]
async fn failed_extraction_on_new_entry_records_unknown() {
    let env = TestEnv::new();
    let server = MockServer::start().await;
    serve_apk(&server, "/latest/kino.apk", b"kino-v1").await;
    env.write_catalog(json!({"apps": [direct_entry(&server, None)]}));
    env.set_tool_version(None);

    env.reconciler().run_pass().await.unwrap();

    assert_eq!(env.catalog().apps[0].version.as_deref(), Some("Unknown"));
    assert!(env.artifact("Kino.apk").is_some());
}

#[tokio::test]
async fn unchanged_artifact_is_idempotent() {
    let mut env = TestEnv::new();
    let server = MockServer::start().await;
    serve_apk(&server, "/latest/kino.apk", b"kino-v1").await;
    env.write_catalog(json!({"apps": [direct_entry(&server, None)]}));
    env.set_tool_version(Some("1.0.0"));

    env.reconciler().run_pass().await.unwrap();
    let after_first = env.catalog();
    env.drain_notifications();

    let report = env.reconciler().run_pass().await.unwrap();

    assert_eq!(report.updated(), 0);
    assert!(matches!(report.entries[0].outcome, EntryOutcome::Unchanged));
    assert_eq!(env.catalog(), after_first);
    assert!(env.drain_notifications().is_empty());
}

#[tokio::test]
async fn same_version_rebuild_is_promoted() {
    let mut env = TestEnv::new();
    let server = MockServer::start().await;
    serve_apk(&server, "/latest/kino.apk", b"kino-rebuild").await;
    env.write_catalog(json!({"apps": [direct_entry(&server, Some("1.0.0"))]}));
    env.put_artifact("Kino.apk", b"kino-original");
    env.set_tool_version(Some("1.0.0"));

    let report = env.reconciler().run_pass().await.unwrap();

    assert!(matches!(
        &report.entries[0].outcome,
        EntryOutcome::Committed(Change::Updated { from, to }) if from == "1.0.0" && to == "1.0.0"
    ));
    assert_eq!(env.artifact("Kino.apk").as_deref(), Some(&b"kino-rebuild"[..]));
    assert_eq!(
        env.drain_notifications()[0],
        Notification::Updated {
            title: "Kino".into(),
            from: "1.0.0".into(),
            to: "1.0.0".into()
        }
    );
}

#[tokio::test]
async fn newer_version_replaces_artifact() {
    let env = TestEnv::new();
    let server = MockServer::start().await;
    serve_apk(&server, "/latest/kino.apk", b"kino-v2").await;
    env.write_catalog(json!({"apps": [direct_entry(&server, Some("1.9.9"))]}));
    env.put_artifact("Kino.apk", b"kino-v1");
    env.set_tool_version(Some("2.0.0"));

    env.reconciler().run_pass().await.unwrap();

    assert_eq!(env.catalog().apps[0].version.as_deref(), Some("2.0.0"));
    assert_eq!(env.artifact("Kino.apk").as_deref(), Some(&b"kino-v2"[..]));
}

#[tokio::test]
async fn downgrade_is_skipped_silently() {
    let mut env = TestEnv::new();
    let server = MockServer::start().await;
    serve_apk(&server, "/latest/kino.apk", b"kino-old").await;
    env.write_catalog(json!({"apps": [direct_entry(&server, Some("1.0.0"))]}));
    env.put_artifact("Kino.apk", b"kino-current");
    env.set_tool_version(Some("0.9.0"));
    let before = env.catalog();

    let report = env.reconciler().run_pass().await.unwrap();

    assert!(matches!(
        report.entries[0].outcome,
        EntryOutcome::Downgrade { .. }
    ));
    assert_eq!(env.artifact("Kino.apk").as_deref(), Some(&b"kino-current"[..]));
    assert_eq!(env.catalog(), before);
    assert!(env.drain_notifications().is_empty());
}

#[tokio::test]
async fn github_release_picks_filtered_asset() {
    let env = TestEnv::new();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/tv/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "assets": [
                {"name": "app-arm7.apk", "browser_download_url": format!("{}/dl/app-arm7.apk", server.uri())},
                {"name": "app-arm64.apk", "browser_download_url": format!("{}/dl/app-arm64.apk", server.uri())}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dl/app-arm64.apk"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"arm64".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dl/app-arm7.apk"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"arm7".to_vec()))
        .expect(0)
        .mount(&server)
        .await;
    env.write_catalog(json!({"apps": [{
        "title": "TV",
        "url": "https://apps.example/apks/TV.apk",
        "sourceUpdate": format!("{}/repos/acme/tv/releases/latest", server.uri()),
        "sourceMethod": "github_release",
        "sourceFilter": "arm64"
    }]}));
    env.set_tool_version(Some("3.1"));

    env.reconciler().run_pass().await.unwrap();

    assert_eq!(env.artifact("TV.apk").as_deref(), Some(&b"arm64"[..]));
}

#[tokio::test]
async fn entry_failures_do_not_stop_the_pass() {
    let mut env = TestEnv::new();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok.apk"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/empty.apk"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    env.write_catalog(json!({"apps": [
        {"title": "Empty", "url": "/apks/Empty.apk", "sourceUpdate": format!("{}/empty.apk", server.uri())},
        {"title": "Broken", "url": "/apks/bad:name.apk", "sourceUpdate": format!("{}/ok.apk", server.uri())},
        {"title": "Filterless", "url": "/apks/F.apk", "sourceUpdate": server.uri(), "sourceMethod": "gitlab_release"},
        {"title": "Manual", "url": "/apks/Manual.apk", "sourceMethod": "manual"},
        {"title": "Good", "url": "/apks/Good.apk", "sourceUpdate": format!("{}/ok.apk", server.uri())}
    ]}));
    env.set_tool_version(Some("1.0"));

    let report = env.reconciler().run_pass().await.unwrap();

    assert_eq!(report.updated(), 1);
    assert_eq!(report.failed(), 3);
    assert!(matches!(report.entries[3].outcome, EntryOutcome::NoSource));
    assert!(env.artifact("Empty.apk").is_none());
    assert_eq!(env.artifact("Good.apk").as_deref(), Some(&b"ok"[..]));
    assert_eq!(
        env.drain_notifications(),
        vec![
            Notification::Failed {
                title: "Empty".into(),
                reason: "downloaded file is empty".into()
            },
            Notification::Failed {
                title: "Broken".into(),
                reason: "catalog entry misconfigured".into()
            },
            Notification::Failed {
                title: "Filterless".into(),
                reason: "source filter invalid".into()
            },
            Notification::Added {
                title: "Good".into(),
                version: "1.0".into()
            },
            Notification::PassSummary { updated: 1 },
        ]
    );
}

#[tokio::test]
async fn promote_failure_leaves_catalog_untouched() {
    let mut env = TestEnv::new();
    let server = MockServer::start().await;
    serve_apk(&server, "/latest/kino.apk", b"kino-v2").await;
    env.write_catalog(json!({"apps": [direct_entry(&server, Some("1.0.0"))]}));
    env.set_tool_version(Some("2.0.0"));
    // The artifact directory cannot be created under a regular file.
    let blocker = env.root.path().join("not-a-dir");
    std::fs::write(&blocker, b"").unwrap();
    env.config.apks_dir = blocker.join("apks");
    let before = env.catalog();

    let report = env.reconciler().run_pass().await.unwrap();

    assert!(matches!(
        report.entries[0].outcome,
        EntryOutcome::Failed(ApkdError::Promote(_))
    ));
    assert_eq!(env.catalog(), before);
    assert_eq!(
        env.drain_notifications(),
        vec![Notification::Failed {
            title: "Kino".into(),
            reason: "write denied".into()
        }]
    );
}

#[tokio::test]
async fn fatal_conditions_abort_before_any_entry() {
    let mut env = TestEnv::new();
    let err = env.reconciler().run_pass().await.unwrap_err();
    assert!(matches!(err, ApkdError::CatalogUnreadable(..)));

    env.write_catalog(json!({"apps": []}));
    env.config.version_tool = env.root.path().join("missing-aapt");
    let err = env.reconciler().run_pass().await.unwrap_err();
    assert!(matches!(err, ApkdError::ToolMissing(_)));
    assert!(env
        .drain_notifications()
        .iter()
        .all(|n| matches!(n, Notification::Failed { .. })));
}

#[tokio::test]
async fn overlapping_pass_is_rejected() {
    let env = TestEnv::new();
    env.write_catalog(json!({"apps": []}));
    let _running = env.state.try_begin_pass().unwrap();

    let err = env.reconciler().run_pass().await.unwrap_err();

    assert!(matches!(err, ApkdError::PassInProgress));
}

#[tokio::test]
async fn unreadable_version_never_replaces_known_one() {
    let mut env = TestEnv::new();
    let server = MockServer::start().await;
    serve_apk(&server, "/latest/kino.apk", b"kino-v2").await;
    env.write_catalog(json!({"apps": [direct_entry(&server, Some("1.0.0"))]}));
    env.put_artifact("Kino.apk", b"kino-v1");
    env.set_tool_version(None);

    let report = env.reconciler().run_pass().await.unwrap();

    match &report.entries[0].outcome {
        EntryOutcome::Downgrade {
            candidate,
            recorded,
        } => {
            assert_eq!(candidate, "Unknown");
            assert_eq!(recorded, "1.0.0");
        }
        other => panic!("expected a skipped candidate, got {other:?}"),
    }
    assert_eq!(env.artifact("Kino.apk").as_deref(), Some(&b"kino-v1"[..]));
    assert_eq!(env.catalog().apps[0].version.as_deref(), Some("1.0.0"));
    assert!(env.drain_notifications().is_empty());
}

#[tokio::test]
async fn commit_failure_after_promote_is_reported_and_pass_continues() {
    let mut env = TestEnv::new();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok.apk"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .mount(&server)
        .await;
    let later = json!({"title": "Later", "url": "/apks/Later.apk", "sourceUpdate": format!("{}/ok.apk", server.uri())});
    // Resolving Vanish swaps in a catalog that no longer lists it.
    let replacement = env.root.path().join("replacement.json");
    std::fs::write(&replacement, serde_json::to_vec(&json!({"apps": [later.clone()]})).unwrap()).unwrap();
    let command = format!(
        "cp '{}' '{}' && echo {}/ok.apk",
        replacement.display(),
        env.config.catalog_path.display(),
        server.uri()
    );
    env.write_catalog(json!({"apps": [
        {"title": "Vanish", "url": "/apks/Vanish.apk", "sourceUpdate": command, "sourceMethod": "custom"},
        later
    ]}));
    env.set_tool_version(Some("1.0"));

    let report = env.reconciler().run_pass().await.unwrap();

    assert!(matches!(
        report.entries[0].outcome,
        EntryOutcome::Failed(ApkdError::Commit(_))
    ));
    assert!(matches!(report.entries[1].outcome, EntryOutcome::Committed(_)));
    assert_eq!(env.artifact("Later.apk").as_deref(), Some(&b"ok"[..]));
    assert_eq!(env.catalog().apps[0].version.as_deref(), Some("1.0"));
    assert_eq!(
        env.drain_notifications(),
        vec![
            Notification::Failed {
                title: "Vanish".into(),
                reason: "catalog entry disappeared".into()
            },
            Notification::Added {
                title: "Later".into(),
                version: "1.0".into()
            },
            Notification::PassSummary { updated: 1 },
        ]
    );
}

#[tokio::test]
async fn catalog_corrupted_mid_pass_stops_the_pass() {
    let mut env = TestEnv::new();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok.apk"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/next.apk"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"next".to_vec()))
        .expect(0)
        .mount(&server)
        .await;
    let command = format!(
        "printf '{{' > '{}' && echo {}/ok.apk",
        env.config.catalog_path.display(),
        server.uri()
    );
    env.write_catalog(json!({"apps": [
        {"title": "Breaker", "url": "/apks/Breaker.apk", "sourceUpdate": command, "sourceMethod": "custom"},
        {"title": "Next", "url": "/apks/Next.apk", "sourceUpdate": format!("{}/next.apk", server.uri())}
    ]}));
    env.set_tool_version(Some("1.0"));

    let report = env.reconciler().run_pass().await.unwrap();

    assert_eq!(report.entries.len(), 1);
    assert!(matches!(
        report.entries[0].outcome,
        EntryOutcome::Failed(ApkdError::CatalogMalformed(..))
    ));
    assert_eq!(
        env.drain_notifications(),
        vec![Notification::Failed {
            title: "Breaker".into(),
            reason: "catalog unavailable".into()
        }]
    );
}
