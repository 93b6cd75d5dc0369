//! End-to-end behavior of the launcher: gating, stage ordering, failure,
//! invalidation and single-flight.

mod common;

use serde_json::json;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

use artiflow::pipeline::StageStatus;
use artiflow::{ArtiflowError, GatingKey, RunStatus};
use common::{behavioral_config, eventually, launcher, pcap, split_config, zip, Probe};

fn both() -> GatingKey {
    GatingKey::new(["archive", "capture"])
}

#[tokio::test]
async fn empty_slots_do_not_satisfy_the_gate() {
    let probe = Arc::new(Probe::new());
    let launcher = launcher(behavioral_config(true, false), probe.clone());

    assert!(!launcher.is_satisfied(&both()).await);

    let err = assert_err!(launcher.trigger(&both()).await);
    match err {
        ArtiflowError::PreconditionNotMet { key, missing } => {
            assert_eq!(key, both());
            assert_eq!(missing, vec!["archive", "capture"]);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(launcher.status(&both()).await.is_none());
    assert!(probe.calls().is_empty());
}

#[tokio::test]
async fn partial_inputs_never_launch() {
    let probe = Arc::new(Probe::new());
    let launcher = launcher(behavioral_config(true, false), probe.clone());

    let launched = assert_ok!(launcher.provide_artifact("archive", zip("code.zip")).await);
    assert!(launched.is_empty());
    assert_eq!(launcher.missing(&both()).await, vec!["capture"]);
    assert!(launcher.active_runs().await.is_empty());
}

#[tokio::test]
async fn full_inputs_run_all_stages_in_order() {
    let probe = Arc::new(Probe::new());
    let launcher = launcher(behavioral_config(true, false), probe.clone());

    assert_ok!(launcher.provide_artifact("archive", zip("code.zip")).await);
    let launched = assert_ok!(launcher.provide_artifact("capture", pcap("trace.pcap")).await);
    assert_eq!(launched.len(), 1);

    let snapshot = launched[0].wait().await;
    assert_eq!(snapshot.status, RunStatus::Completed);
    assert_eq!(snapshot.completed_stages(), 3);
    assert_eq!(
        snapshot.results.values().cloned().collect::<Vec<_>>(),
        vec![json!("O1"), json!("O2"), json!("O3")]
    );

    let calls = probe.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].previous, None);
    assert_eq!(calls[1].previous, Some(json!("O1")));
    assert_eq!(calls[2].previous, Some(json!("O2")));
    assert_eq!(calls[2].earlier, vec!["extract", "static_analysis"]);
    assert!(calls.iter().all(|c| c.archive.as_deref() == Some("code.zip")));

    // Nothing new starts until an input changes
    assert!(launcher.on_input_changed().await.is_empty());
}

#[tokio::test]
async fn stage_failure_stops_the_run() {
    let probe = Arc::new(Probe::new().failing("static_analysis", "bad format"));
    let launcher = launcher(behavioral_config(true, false), probe.clone());

    assert_ok!(launcher.provide_artifact("archive", zip("code.zip")).await);
    let launched = assert_ok!(launcher.provide_artifact("capture", pcap("trace.pcap")).await);

    let snapshot = launched[0].wait().await;
    assert_eq!(snapshot.status, RunStatus::Failed);

    let error = snapshot.error.clone().unwrap();
    assert_eq!(error.stage_index, 1);
    assert_eq!(error.stage, "static_analysis");
    assert_eq!(error.message, "bad format");

    assert_eq!(snapshot.stages[2].status, StageStatus::Pending);
    assert_eq!(snapshot.result("extract"), Some(&json!("O1")));
    assert_eq!(probe.stages_called(), vec!["extract", "static_analysis"]);

    // Inputs are kept by default
    assert!(launcher.artifact("archive").await.is_some());

    let err = assert_err!(snapshot.into_result());
    assert!(matches!(err, ArtiflowError::StageFailed { stage_index: 1, .. }));
}

#[tokio::test]
async fn clearing_a_slot_invalidates_the_run() {
    let probe = Arc::new(Probe::new().holding("static_analysis"));
    let launcher = launcher(behavioral_config(true, false), probe.clone());

    assert_ok!(launcher.provide_artifact("archive", zip("code.zip")).await);
    let launched = assert_ok!(launcher.provide_artifact("capture", pcap("trace.pcap")).await);
    let first = launched[0].clone();

    probe.entered.notified().await;
    assert_eq!(first.snapshot().current_stage_index, Some(1));

    let removed = assert_ok!(launcher.remove_artifact("archive").await);
    assert_eq!(removed.unwrap().name, "code.zip");

    let snapshot = first.wait().await;
    assert_eq!(snapshot.status, RunStatus::Invalidated);
    assert_eq!(snapshot.invalidated_by.as_deref(), Some("archive"));
    assert_eq!(snapshot.stages[1].status, StageStatus::Aborted);
    assert_eq!(snapshot.stages[2].status, StageStatus::Pending);
    assert!(matches!(
        snapshot.into_result(),
        Err(ArtiflowError::Invalidated { .. })
    ));

    // Re-satisfying the gate starts a fresh run
    probe.release();
    let relaunched = assert_ok!(launcher.provide_artifact("archive", zip("code-v2.zip")).await);
    assert_eq!(relaunched.len(), 1);
    assert_ne!(relaunched[0].job_id(), first.job_id());

    let snapshot = relaunched[0].wait().await;
    assert_eq!(snapshot.status, RunStatus::Completed);
    assert_eq!(
        probe.calls().last().unwrap().archive.as_deref(),
        Some("code-v2.zip")
    );
    assert!(!probe
        .calls()
        .iter()
        .any(|c| c.stage == "behavioral_analysis" && c.archive.as_deref() == Some("code.zip")));
}

#[tokio::test]
async fn replacing_an_artifact_restarts_the_job() {
    let probe = Arc::new(Probe::new().holding("extract"));
    let launcher = launcher(behavioral_config(true, false), probe.clone());

    assert_ok!(launcher.provide_artifact("archive", zip("a.zip")).await);
    let launched = assert_ok!(launcher.provide_artifact("capture", pcap("t.pcap")).await);
    probe.entered.notified().await;

    let replaced = assert_ok!(launcher.provide_artifact("archive", zip("b.zip")).await);
    assert_eq!(replaced.len(), 1);
    assert_eq!(launched[0].wait().await.status, RunStatus::Invalidated);

    probe.release();
    let snapshot = replaced[0].wait().await;
    assert_eq!(snapshot.status, RunStatus::Completed);
    assert_eq!(snapshot.results.len(), 3);
}

#[tokio::test]
async fn concurrent_triggers_start_one_run() {
    let probe = Arc::new(Probe::new().holding("extract"));
    let launcher = launcher(behavioral_config(false, false), probe.clone());

    assert!(assert_ok!(launcher.provide_artifact("archive", zip("code.zip")).await).is_empty());
    assert!(assert_ok!(launcher.provide_artifact("capture", pcap("t.pcap")).await).is_empty());

    let (key_a, key_b) = (both(), both());
    let (a, b) = tokio::join!(launcher.trigger(&key_a), launcher.trigger(&key_b));
    let (run, err) = match (a, b) {
        (Ok(run), Err(err)) | (Err(err), Ok(run)) => (run, err),
        other => panic!("expected exactly one run, got {other:?}"),
    };

    match err {
        ArtiflowError::AlreadyRunning { key, job_id } => {
            assert_eq!(key, both());
            assert_eq!(job_id, run.job_id());
        }
        other => panic!("unexpected error: {other}"),
    }

    probe.release();
    assert_eq!(run.wait().await.status, RunStatus::Completed);
    assert_eq!(probe.stages_called().len(), 3);

    // A terminal run no longer occupies the key
    let again = assert_ok!(launcher.trigger(&both()).await);
    assert_ne!(again.job_id(), run.job_id());
}

#[tokio::test]
async fn cancel_stops_the_in_flight_stage() {
    let probe = Arc::new(Probe::new().holding("static_analysis"));
    let launcher = launcher(behavioral_config(true, false), probe.clone());

    assert_ok!(launcher.provide_artifact("archive", zip("code.zip")).await);
    let launched = assert_ok!(launcher.provide_artifact("capture", pcap("t.pcap")).await);
    probe.entered.notified().await;

    assert!(launcher.cancel(&both()).await);
    assert!(!launcher.cancel(&both()).await);

    let snapshot = launched[0].wait().await;
    assert_eq!(snapshot.status, RunStatus::Cancelled);
    assert_eq!(snapshot.stages[1].status, StageStatus::Aborted);
    assert_eq!(probe.stages_called(), vec!["extract", "static_analysis"]);

    // Cancelling leaves the inputs alone
    assert!(launcher.is_satisfied(&both()).await);
}

#[tokio::test]
async fn failed_run_clears_consumed_inputs_when_asked() {
    let probe = Arc::new(Probe::new().failing("extract", "corrupt archive"));
    let launcher = launcher(behavioral_config(true, true), probe.clone());

    assert_ok!(launcher.provide_artifact("archive", zip("code.zip")).await);
    let launched = assert_ok!(launcher.provide_artifact("capture", pcap("t.pcap")).await);
    assert_eq!(launched[0].wait().await.status, RunStatus::Failed);

    let handle = launcher.clone();
    eventually(move || {
        let launcher = handle.clone();
        async move { launcher.artifact("archive").await.is_none() }
    })
    .await;
    assert!(launcher.artifact("capture").await.is_none());
    assert_eq!(launcher.missing(&both()).await, vec!["archive", "capture"]);
}

#[tokio::test]
async fn jobs_are_gated_independently() {
    let probe = Arc::new(Probe::new());
    let launcher = launcher(split_config(), probe.clone());

    let launched = assert_ok!(launcher.provide_artifact("archive", zip("code.zip")).await);
    assert_eq!(launched.len(), 1);
    assert_eq!(launched[0].snapshot().job, "static");
    let static_run = launched[0].clone();

    // The capture only concerns the behavioral job
    let launched = assert_ok!(launcher.provide_artifact("capture", pcap("t.pcap")).await);
    assert_eq!(launched.len(), 1);
    assert_eq!(launched[0].snapshot().job, "behavioral");

    assert_eq!(static_run.wait().await.status, RunStatus::Completed);
    assert_eq!(launched[0].wait().await.status, RunStatus::Completed);

    let static_key = GatingKey::new(["archive"]);
    assert_eq!(
        launcher.status(&static_key).await.unwrap().job_id,
        static_run.job_id()
    );
}

#[tokio::test]
async fn events_report_every_transition() {
    let probe = Arc::new(Probe::new());
    let launcher = launcher(behavioral_config(true, false), probe.clone());
    let mut events = launcher.subscribe();

    assert_ok!(launcher.provide_artifact("archive", zip("code.zip")).await);
    let launched = assert_ok!(launcher.provide_artifact("capture", pcap("t.pcap")).await);
    launched[0].wait().await;

    let mut statuses = Vec::new();
    while let Ok(event) = events.try_recv() {
        statuses.push((event.snapshot.status, event.snapshot.completed_stages()));
    }

    // Three starts and three completions
    assert_eq!(statuses.len(), 6);
    assert_eq!(statuses.first(), Some(&(RunStatus::Running, 0)));
    assert_eq!(statuses.last(), Some(&(RunStatus::Completed, 3)));
}
