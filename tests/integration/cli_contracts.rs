use std::fs;

use bundle_repack::error::ApiError;
use bundle_repack::tooling::cli::{CliContext, Commands};

use crate::integration::support::{Fixture, E1, SHARED_BUNDLE};

fn cli(fixture: &Fixture) -> CliContext {
    CliContext::from_config(fixture.config()).unwrap()
}

fn json(output: &str) -> serde_json::Value {
    serde_json::from_str(output).unwrap()
}

#[test]
fn hierarchy_json_lists_every_path() {
    let fixture = Fixture::new();
    let output = cli(&fixture)
        .execute(&Commands::Hierarchy {
            container: "scenes/tut_01".to_string(),
            format: "json".to_string(),
        })
        .unwrap();

    let parsed = json(&output);
    assert_eq!(parsed["container"], "scenes/tut_01");
    let paths: Vec<&str> = parsed["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["path"].as_str().unwrap())
        .collect();
    assert_eq!(paths, vec!["Root", "Root/Child1", "Root/Child2"]);
    assert!(parsed["nodes"][0]["object_id"].as_i64().is_some());
    assert!(parsed["nodes"][0]["transform_id"].as_i64().is_some());
}

#[test]
fn hierarchy_text_is_a_table() {
    let fixture = Fixture::new();
    let output = cli(&fixture)
        .execute(&Commands::Hierarchy {
            container: "scenes/tut_01".to_string(),
            format: "text".to_string(),
        })
        .unwrap();
    assert!(output.contains("Root/Child1"));
    assert!(output.contains("3 objects"));
}

#[test]
fn resolve_unknown_path_is_an_error() {
    let fixture = Fixture::new();
    let context = cli(&fixture);
    let output = context
        .execute(&Commands::Resolve {
            container: "scenes/tut_01".to_string(),
            path: "Root/Child2".to_string(),
            format: "json".to_string(),
        })
        .unwrap();
    assert_eq!(json(&output)["object_id"], 5);

    let err = context
        .execute(&Commands::Resolve {
            container: "scenes/tut_01".to_string(),
            path: "Root/Nope".to_string(),
            format: "json".to_string(),
        })
        .unwrap_err();
    assert!(matches!(err, ApiError::PathNotFound(_)));
}

#[test]
fn deps_json_contract() {
    let fixture = Fixture::new();
    let context = cli(&fixture);

    let closure = json(
        &context
            .execute(&Commands::Deps {
                container: "scenes/tut_01".to_string(),
                node_id: 3,
                immediate: false,
                format: "json".to_string(),
            })
            .unwrap(),
    );
    assert_eq!(closure["mode"], "closure");
    assert_eq!(closure["internal"], serde_json::json!([4, 7]));
    assert_eq!(closure["external"][0]["node_id"], E1);
    assert_eq!(closure["external"][0]["origin"], "archive:/CAB-SHARED/CAB-SHARED");
    assert!(closure["stats"]["misses"].as_u64().unwrap() >= 3);

    let immediate = json(
        &context
            .execute(&Commands::Deps {
                container: "scenes/tut_01".to_string(),
                node_id: 1,
                immediate: true,
                format: "json".to_string(),
            })
            .unwrap(),
    );
    assert_eq!(immediate["mode"], "immediate");
    assert_eq!(immediate["internal"], serde_json::json!([2]));
}

#[test]
fn repack_json_contract_and_second_run_skips() {
    let fixture = Fixture::new();
    let command = Commands::Repack {
        container: Some("scenes/tut_01".to_string()),
        paths: vec!["Root/Child1".to_string(), "Root/Child2".to_string()],
        request: None,
        format: "json".to_string(),
    };

    let first = json(&cli(&fixture).execute(&command).unwrap());
    let report = &first[0];
    assert_eq!(report["container"], "scenes/tut_01");
    assert_eq!(report["key"], "scenes/tut_01");
    assert_eq!(report["status"], "repacked");
    assert_eq!(report["data"]["repack_strategy"], "stripped");
    assert_eq!(report["data"]["dependency_bundles"], serde_json::json!([SHARED_BUNDLE]));
    assert_eq!(
        report["data"]["game_object_assets"]
            .as_object()
            .unwrap()
            .len(),
        2
    );

    let second = json(&cli(&fixture).execute(&command).unwrap());
    assert_eq!(second[0]["status"], "skipped");
}

#[test]
fn repack_from_request_file() {
    let fixture = Fixture::new();
    let request = fixture.dir.path().join("request.json");
    fs::write(
        &request,
        r#"{"scenes/tut_01": ["Root/Child2", "Root/Gone"], "nowhere": ["Root"]}"#,
    )
    .unwrap();

    let output = cli(&fixture)
        .execute(&Commands::Repack {
            container: None,
            paths: Vec::new(),
            request: Some(request),
            format: "text".to_string(),
        })
        .unwrap();
    assert!(output.contains("failed"));
    assert!(output.contains("repacked"));
    assert!(output.contains("(not repacked) Root/Gone"));
}

#[test]
fn bundle_deps_and_config() {
    let fixture = Fixture::new();
    let context = cli(&fixture);

    let deps = json(
        &context
            .execute(&Commands::BundleDeps {
                bundle: "scenes/tut_01".to_string(),
                transitive: true,
                format: "json".to_string(),
            })
            .unwrap(),
    );
    assert_eq!(deps["dependencies"], serde_json::json!([SHARED_BUNDLE]));
    assert!(fixture.cache_dir().join("direct_deps.json").is_file());

    let config = context
        .execute(&Commands::Config {
            format: "toml".to_string(),
        })
        .unwrap();
    assert!(config.contains("[paths]"));
    assert!(config.contains("content_version = \"1.0.28324\""));
}

#[test]
fn unsupported_format_is_rejected() {
    let fixture = Fixture::new();
    let err = cli(&fixture)
        .execute(&Commands::Hierarchy {
            container: "scenes/tut_01".to_string(),
            format: "yaml".to_string(),
        })
        .unwrap_err();
    assert!(matches!(err, ApiError::ConfigError(_)));
}
