// Wire format checks for the task envelope. The same bytes cross the queue
// (scheduler -> consumer) and the store (producer -> scheduler).

use chrono::{Duration, TimeZone, Utc};
use herald_core::{
    DisinfoPenalty, ModeRemoval, Owner, PersistentChannel, Reconnect, Reminder, Repeat,
    TaskKind, TaskPayload, TaskRecord, TaskStatus, VoiceRequests,
};
use serde_json::{json, Value};

fn one_of_each() -> Vec<TaskPayload> {
    let mode = ModeRemoval {
        mask: "*!*@bad.example".into(),
        channel: "#test".into(),
    };
    let disinfo = DisinfoPenalty {
        nick: "troll".into(),
        mask: "troll!*@*".into(),
        channel: "#news".into(),
    };
    vec![
        TaskPayload::Reminder(Reminder {
            user: "alice".into(),
            destination: "#test".into(),
            content: "buy milk".into(),
        }),
        TaskPayload::BanRemoval(mode.clone()),
        TaskPayload::MuteRemoval(mode),
        TaskPayload::NotifyVoiceRequests(VoiceRequests {
            channel: "#voice".into(),
            nicks: vec!["bob".into(), "carol".into()],
        }),
        TaskPayload::PersistentChannel(PersistentChannel {
            channel: "#home".into(),
        }),
        TaskPayload::Reconnect(Reconnect {
            network: "libera".into(),
            reason: Some("ping timeout".into()),
        }),
        TaskPayload::DisinfoBanRemoval(disinfo.clone()),
        TaskPayload::DisinfoMuteRemoval(disinfo),
    ]
}

#[test]
fn every_kind_round_trips() {
    let payloads = one_of_each();
    assert_eq!(payloads.len(), TaskKind::ALL.len());

    for payload in payloads {
        let kind = payload.kind();
        let record = TaskRecord::new(payload, Utc::now() + Duration::minutes(5));
        let bytes = record.encode().unwrap();

        let decoded = TaskRecord::decode(&bytes).unwrap();
        assert_eq!(decoded.kind(), kind);
        assert_eq!(decoded, record);

        // serialize(deserialize(bytes)) == bytes, ignoring field order
        let again = decoded.encode().unwrap();
        let a: Value = serde_json::from_slice(&bytes).unwrap();
        let b: Value = serde_json::from_slice(&again).unwrap();
        assert_eq!(a, b, "kind {kind}");
    }
}

#[test]
fn reminder_envelope_shape() {
    let due = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
    let mut record = TaskRecord::new(
        TaskPayload::Reminder(Reminder {
            user: "alice".into(),
            destination: "#test".into(),
            content: "buy milk".into(),
        }),
        due,
    );
    record.id = "r-1".into();
    record.created_at = due - Duration::hours(1);

    let doc = record.to_document().unwrap();
    assert_eq!(
        doc,
        json!({
            "id": "r-1",
            "type": "reminder",
            "created_at": "2026-03-01T08:30:00.000Z",
            "due_at": "2026-03-01T09:30:00.000Z",
            "status": "pending",
            "owner": "user:alice",
            "data": {"user": "alice", "destination": "#test", "content": "buy milk"}
        })
    );
    // runs/repeat are absent for one-shot tasks
    assert!(doc.get("runs").is_none());
    assert!(doc.get("repeat").is_none());
}

#[test]
fn decode_dispatches_on_type() {
    let bytes = br##"{
        "id": "t-1",
        "type": "mute-removal",
        "created_at": "2026-03-01T08:30:00.000Z",
        "due_at": "2026-03-01T09:30:00.000Z",
        "status": "pending",
        "owner": "channel:#test",
        "data": {"mask": "*!*@x", "channel": "#test"}
    }"##;
    let record = TaskRecord::decode(bytes).unwrap();
    assert_eq!(record.kind(), TaskKind::MuteRemoval);
    assert_eq!(record.owner, Owner::channel("#test"));
    match record.payload {
        TaskPayload::MuteRemoval(m) => assert_eq!(m.mask, "*!*@x"),
        other => panic!("expected mute removal, got {other:?}"),
    }
}

#[test]
fn unknown_type_is_reported() {
    let bytes = br#"{
        "id": "t-2",
        "type": "launch-rockets",
        "created_at": "2026-03-01T08:30:00.000Z",
        "due_at": "2026-03-01T09:30:00.000Z",
        "status": "pending",
        "data": {}
    }"#;
    let err = TaskRecord::decode(bytes).unwrap_err();
    assert_eq!(err.code(), "UNKNOWN_KIND");
    assert!(err.to_string().contains("launch-rockets"));
}

#[test]
fn missing_owner_defaults_to_global() {
    let bytes = br#"{
        "id": "t-3",
        "type": "reconnect",
        "created_at": "2026-03-01T08:30:00Z",
        "due_at": "2026-03-01T09:30:00Z",
        "status": "complete",
        "data": {"network": "libera"}
    }"#;
    let record = TaskRecord::decode(bytes).unwrap();
    assert_eq!(record.owner, Owner::Global);
    assert_eq!(record.status, TaskStatus::Complete);
    assert_eq!(record.path(), "tasks/t-3");
}

#[test]
fn owner_paths() {
    assert_eq!(Owner::Global.record_path("x"), "tasks/x");
    assert_eq!(
        Owner::channel("#test").record_path("x"),
        "channels/#test/tasks/x"
    );
    assert_eq!(Owner::user("alice").collection_path(), "users/alice/tasks");
    assert!(Owner::user("a/b").validate().is_err());
    assert!("user:".parse::<Owner>().is_err());
    assert!("team:x".parse::<Owner>().is_err());
    assert_eq!("channel:#a".parse::<Owner>().unwrap(), Owner::channel("#a"));
}

#[test]
fn repeat_is_capped_by_max_runs() {
    let now = Utc::now();
    let record = TaskRecord::new(
        TaskPayload::PersistentChannel(PersistentChannel {
            channel: "#home".into(),
        }),
        now,
    )
    .with_repeat(Repeat {
        every_secs: 60,
        max_runs: Some(2),
    });
    assert_eq!(record.runs, Some(0));

    let next = record.next_occurrence(now).expect("first run reschedules");
    assert!(next > now);

    let mut spent = record.clone();
    spent.runs = Some(1);
    assert!(spent.next_occurrence(now).is_none());

    let one_shot = TaskRecord::new(
        TaskPayload::Reconnect(Reconnect {
            network: "libera".into(),
            reason: None,
        }),
        now,
    );
    assert!(one_shot.next_occurrence(now).is_none());
}
