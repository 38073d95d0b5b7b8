use std::fs;
use std::sync::Arc;

use bundle_repack::bundles::{BundleCatalog, DirectoryCatalog};
use bundle_repack::container::MemoryContainer;
use bundle_repack::context::RepackContext;
use bundle_repack::repack::{JsonPlanWriter, RepackManager, RepackOutcome};
use bundle_repack::types::ExternalRef;
use parking_lot::Mutex;

use crate::integration::support::{write_container, Fixture, E1, SHARED_BUNDLE};

fn paths(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn repacks_requested_children_without_their_parent() {
    let fixture = Fixture::new();
    let context = RepackContext::new(fixture.config()).unwrap();
    let index = context.bundle_index().unwrap();
    let manager = context.repack_manager().unwrap();

    let report = manager
        .repack("scenes/tut_01", &paths(&["Root/Child1", "Root/Child2"]), Some(index))
        .unwrap();
    let data = match &report.outcome {
        RepackOutcome::Repacked { data } => data.clone(),
        other => panic!("expected a repack, got {:?}", other),
    };

    let anchors: Vec<&str> = data.game_object_assets.values().map(String::as_str).collect();
    assert_eq!(anchors, vec!["Root/Child1", "Root/Child2"]);
    assert!(data.non_repacked_assets.is_empty());
    assert!(data.can_load("Root").is_none());

    let target = data.can_load("Root/Child1").unwrap();
    assert_eq!(target.entry, "assets/repacked/scenes_tut_01/root/child1.prefab");
    assert_eq!(target.relative, None);

    assert!(data.external_dependencies.contains(&ExternalRef::new(1, E1)));
    assert_eq!(
        data.dependency_bundles.iter().collect::<Vec<_>>(),
        vec![SHARED_BUNDLE]
    );
    assert_eq!(data.repack_strategy.as_deref(), Some("stripped"));
    assert_eq!(data.bundle_name.as_deref(), Some("repacked_scenes_tut_01"));
    assert!(data.cab_name.as_deref().unwrap().starts_with("CAB-"));

    let plan_path = JsonPlanWriter::plan_path(
        &fixture.output_dir().join("repacked_scenes_tut_01.bundle"),
    );
    let plan: serde_json::Value = serde_json::from_str(&fs::read_to_string(plan_path).unwrap()).unwrap();
    let object_ids: Vec<i64> = plan["object_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_i64().unwrap())
        .collect();
    assert_eq!(object_ids, vec![3, 4, 5, 6, 7]);
    for entry in plan["entries"].as_array().unwrap() {
        assert_eq!(entry["deparent"], serde_json::Value::Bool(true));
    }

    assert!(fixture.output_dir().join("repack_data.json").is_file());
}

#[test]
fn nonexistent_path_is_reported_not_repacked() {
    let fixture = Fixture::new();
    let context = RepackContext::new(fixture.config()).unwrap();
    let manager = context.repack_manager().unwrap();

    let report = manager
        .repack("scenes/tut_01", &paths(&["Root/Missing", "Root/Child2"]), None)
        .unwrap();
    let data = report.outcome.data().unwrap();

    assert_eq!(data.non_repacked_assets, vec!["Root/Missing"]);
    assert_eq!(data.game_object_assets.len(), 1);
    assert!(data.tried_to_repack("Root/Missing/Below"));
    assert!(!data.tried_to_repack("Root"));
}

#[test]
fn stored_record_is_reused_then_widened() {
    let fixture = Fixture::new();
    {
        let context = RepackContext::new(fixture.config()).unwrap();
        context
            .repack_manager()
            .unwrap()
            .repack("scenes/tut_01", &paths(&["Root/Child1"]), None)
            .unwrap();
        context.flush().unwrap();
    }

    let context = RepackContext::new(fixture.config()).unwrap();
    let manager = context.repack_manager().unwrap();

    let report = manager
        .repack("scenes/tut_01", &paths(&["Root/Child1/Deeper"]), None)
        .unwrap();
    assert!(matches!(report.outcome, RepackOutcome::Skipped { .. }));

    let report = manager
        .repack("scenes/tut_01", &paths(&["Root"]), None)
        .unwrap();
    let data = match &report.outcome {
        RepackOutcome::Repacked { data } => data,
        other => panic!("expected a repack, got {:?}", other),
    };
    let anchors: Vec<&str> = data.game_object_assets.values().map(String::as_str).collect();
    assert_eq!(anchors, vec!["Root"]);
    assert_eq!(
        data.can_load("Root/Child1").unwrap().relative.as_deref(),
        Some("Child1")
    );
    assert_eq!(manager.stored("scenes/tut_01").as_ref(), Some(data));
}

#[test]
fn changed_content_version_forces_a_repack() {
    let fixture = Fixture::new();
    {
        let context = RepackContext::new(fixture.config()).unwrap();
        context
            .repack_manager()
            .unwrap()
            .repack("scenes/tut_01", &paths(&["Root/Child1"]), None)
            .unwrap();
        context.flush().unwrap();
    }

    let mut config = fixture.config();
    config.versions.content_version = "1.0.30000".to_string();
    let context = RepackContext::new(config).unwrap();
    let manager = context.repack_manager().unwrap();

    assert!(manager.stored("scenes/tut_01").is_none());
    let report = manager
        .repack("scenes/tut_01", &paths(&["Root/Child1"]), None)
        .unwrap();
    assert!(matches!(report.outcome, RepackOutcome::Repacked { .. }));
    assert_eq!(
        report.outcome.data().unwrap().content_version.as_deref(),
        Some("1.0.30000")
    );
}

#[test]
fn failures_are_reported_per_container_and_callback_fires() {
    let fixture = Fixture::new();
    write_container(
        &fixture.bundle_dir(),
        "empty.bundle",
        &MemoryContainer::new("CAB-EMPTY"),
    );

    let config = fixture.config();
    let catalog: Arc<dyn BundleCatalog> = Arc::new(DirectoryCatalog::new(fixture.bundle_dir()));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&seen);
    let manager = RepackManager::open(
        catalog,
        Arc::new(JsonPlanWriter),
        config.version_policy().unwrap(),
        config.scan_config(),
        fixture.output_dir(),
    )
    .unwrap()
    .on_complete(move |report| recorded.lock().push(report.key.clone()));

    let mut requests = std::collections::BTreeMap::new();
    requests.insert("empty".to_string(), paths(&["Root"]));
    requests.insert("missing".to_string(), paths(&["Root"]));
    requests.insert("scenes/tut_01".to_string(), paths(&["Root/Child2"]));

    let reports = manager.repack_all(&requests, None).unwrap();
    assert_eq!(reports.len(), 3);
    assert!(matches!(reports[0].outcome, RepackOutcome::Failed { .. }));
    assert!(matches!(reports[1].outcome, RepackOutcome::Failed { .. }));
    assert!(matches!(reports[2].outcome, RepackOutcome::Repacked { .. }));

    assert_eq!(*seen.lock(), vec!["empty", "missing", "scenes/tut_01"]);
}

#[test]
fn unreadable_bundle_fails_alone() {
    let fixture = Fixture::new();
    fs::write(fixture.bundle_dir().join("broken.bundle"), "{ truncated").unwrap();

    let context = RepackContext::new(fixture.config()).unwrap();
    let index = context.bundle_index().unwrap();
    assert!(index.bundle_for_cab("cab-scene").is_some());

    let mut requests = std::collections::BTreeMap::new();
    requests.insert("broken".to_string(), paths(&["Root"]));
    requests.insert("scenes/tut_01".to_string(), paths(&["Root/Child2"]));

    let reports = context
        .repack_manager()
        .unwrap()
        .repack_all(&requests, Some(index))
        .unwrap();
    match &reports[0].outcome {
        RepackOutcome::Failed { error } => assert!(error.contains("broken")),
        other => panic!("expected a failure, got {:?}", other),
    }
    assert!(matches!(reports[1].outcome, RepackOutcome::Repacked { .. }));
}
