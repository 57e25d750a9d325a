//! Manifest loading and build pipeline tests

use cloudgrant::config::{LogFormat, SubResourceManifest, build_app, load_manifest_from_str};
use cloudgrant::error::{ConfigError, SynthError};
use cloudgrant::synth::ConstructKind;
use serde_json::json;

const MINIMAL_MANIFEST: &str = r#"
[app]
name = "notes"
account = "123456789012"
"#;

const FULL_MANIFEST: &str = r#"
[app]
name = "notes"
stage = "dev"
region = "us-east-1"
account = "123456789012"

[logging]
level = "debug"
format = "json"

[defaults]
timeout = 10
environment = { STAGE = "dev" }
permissions = ["cloudwatch"]

[[units]]
name = "storage"

[[units.resources]]
id = "notes"
kind = "table"

[[units.resources]]
id = "events"
kind = "topic"
arn = "arn:aws:sns:us-east-1:123456789012:shared-events"

[[units]]
name = "api"

[units.defaults]
memory_size = 512
permissions = [{ resource = "notes", unit = "storage" }]

[[units.constructs]]
id = "Api"
kind = "api"
permissions = ["s3"]

[units.constructs.defaults.function]
timeout = 20

[units.constructs.routes]
"GET /notes" = "src/list.main"
"POST /notes" = { handler = "src/create.main", permissions = [{ resource = "events", unit = "storage", grant = "grantPublish" }] }

[[units.attach]]
construct = "Api"
key = "GET /notes"
permissions = ["sqs:SendMessage"]
"#;

// =============================================================================
// Parsing
// =============================================================================

#[test]
fn test_minimal_manifest() {
    let manifest = load_manifest_from_str(MINIMAL_MANIFEST).unwrap();

    assert_eq!(manifest.app.name, "notes");
    assert_eq!(manifest.app.stage, "dev"); // Default stage
    assert_eq!(manifest.app.region, "us-east-1"); // Default region
    assert!(!manifest.app.dedupe_statements);
    assert_eq!(manifest.logging.level, "info");
    assert_eq!(manifest.logging.format, LogFormat::Pretty);
    assert!(manifest.units.is_empty());
}

#[test]
fn test_full_manifest() {
    let manifest = load_manifest_from_str(FULL_MANIFEST).unwrap();

    // Logging
    assert_eq!(manifest.logging.level, "debug");
    assert_eq!(manifest.logging.format, LogFormat::Json);

    // App defaults
    assert_eq!(manifest.defaults.props.timeout, Some(10));
    assert!(manifest.defaults.permissions.is_some());

    // Units
    assert_eq!(manifest.units.len(), 2);
    let storage = &manifest.units[0];
    assert_eq!(storage.resources.len(), 2);
    assert!(storage.resources[1].arn.is_some());

    let api = &manifest.units[1];
    assert_eq!(api.defaults.props.memory_size, Some(512));
    let construct = &api.constructs[0];
    assert_eq!(construct.kind, ConstructKind::Api);
    assert_eq!(
        construct.defaults.function.as_ref().unwrap().props.timeout,
        Some(20)
    );
    // Route order follows the manifest
    let keys: Vec<_> = construct.routes.keys().collect();
    assert_eq!(keys, vec!["GET /notes", "POST /notes"]);
    assert!(matches!(
        construct.routes["GET /notes"],
        SubResourceManifest::Handler(_)
    ));
    assert_eq!(api.attach[0].key.as_deref(), Some("GET /notes"));
}

#[test]
fn test_consumers_alias() {
    let manifest = load_manifest_from_str(
        r#"
[app]
name = "notes"
account = "123456789012"

[[units]]
name = "jobs"

[[units.constructs]]
id = "Queue"
kind = "queue"

[units.constructs.consumers]
consumer = "src/consumer.main"
"#,
    )
    .unwrap();
    assert_eq!(manifest.units[0].constructs[0].routes.len(), 1);
}

#[test]
fn test_invalid_stage_name() {
    let result = load_manifest_from_str(
        r#"
[app]
name = "notes"
stage = "my stage"
account = "123456789012"
"#,
    );
    assert!(matches!(result, Err(ConfigError::Invalid { .. })));
}

#[test]
fn test_attach_key_requires_construct() {
    let result = load_manifest_from_str(
        r#"
[app]
name = "notes"
account = "123456789012"

[[units]]
name = "api"

[[units.attach]]
function = "handler"
key = "GET /"
permissions = ["s3"]
"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_existing_function_route_rejects_props() {
    let result = load_manifest_from_str(
        r#"
[app]
name = "notes"
account = "123456789012"

[[units]]
name = "jobs"

[[units.functions]]
id = "worker"
handler = "src/worker.main"

[[units.constructs]]
id = "Queue"
kind = "queue"

[units.constructs.routes]
consumer = { function = "worker", timeout = 3 }
"#,
    );
    let err = result.unwrap_err();
    assert!(err.to_string().contains("'timeout' cannot be combined with 'function'"));
}

// =============================================================================
// Build pipeline
// =============================================================================

#[test]
fn test_build_full_manifest() {
    let manifest = load_manifest_from_str(FULL_MANIFEST).unwrap();
    let mut app = build_app(&manifest).unwrap();

    let get = app.function_id("api", "Api-GET_notes").unwrap();
    let config = app.function(get).config();
    assert_eq!(config.timeout, Some(20));
    assert_eq!(config.memory_size, Some(512));
    assert_eq!(config.environment.as_ref().unwrap()["STAGE"], "dev");
    assert_eq!(config.handler.as_deref(), Some("src/list.main"));

    // baseline, app defaults, unit defaults, construct-wide, attach
    let statements = app.function(get).policy().statements();
    let first_actions: Vec<&str> = statements.iter().map(|s| s.actions[0].as_str()).collect();
    assert_eq!(
        first_actions,
        vec![
            "xray:PutTraceSegments",
            "cloudwatch:*",
            "dynamodb:*",
            "s3:*",
            "sqs:SendMessage"
        ]
    );

    let post = app.function_id("api", "Api-POST_notes").unwrap();
    let statements = app.function(post).policy().statements();
    assert_eq!(statements[3].actions, vec!["sns:Publish"]);
    assert_eq!(
        statements[3].resources,
        vec!["arn:aws:sns:us-east-1:123456789012:shared-events"]
    );

    let output = app.synthesize().unwrap();
    let json = serde_json::to_value(&output).unwrap();
    assert_eq!(json["units"][0]["exports"], json!(["events", "notes"]));
    assert_eq!(
        json["units"][1]["imports"],
        json!(["storage/events", "storage/notes"])
    );
    assert_eq!(
        json["units"][1]["constructs"][0]["sub_resources"][1]["function"],
        "Api-POST_notes"
    );
}

#[test]
fn test_build_rejects_unknown_grant_method() {
    let manifest = load_manifest_from_str(
        r#"
[app]
name = "notes"
account = "123456789012"

[[units]]
name = "api"

[[units.resources]]
id = "jobs"
kind = "queue"

[[units.functions]]
id = "handler"
handler = "src/a.main"
permissions = [{ resource = "jobs", grant = "grantPublish" }]
"#,
    )
    .unwrap();

    let err = build_app(&manifest).unwrap_err();
    assert!(matches!(err, SynthError::UnsupportedPermission(_)));
}

#[test]
fn test_build_rejects_forward_reference() {
    let manifest = load_manifest_from_str(
        r#"
[app]
name = "notes"
account = "123456789012"

[[units]]
name = "api"

[[units.functions]]
id = "handler"
handler = "src/a.main"
permissions = [{ resource = "notes", unit = "storage" }]

[[units]]
name = "storage"

[[units.resources]]
id = "notes"
kind = "table"
"#,
    )
    .unwrap();

    let err = build_app(&manifest).unwrap_err();
    assert!(matches!(err, SynthError::CrossUnitReference(e) if e.unit == "storage"));
}

#[test]
fn test_build_freezes_earlier_units() {
    let manifest = load_manifest_from_str(
        r#"
[app]
name = "notes"
account = "123456789012"

[[units]]
name = "api"

[[units.functions]]
id = "handler"
handler = "src/a.main"

[[units]]
name = "late"

[[units.attach]]
function = "handler"
unit = "api"
permissions = ["s3"]
"#,
    )
    .unwrap();

    let err = build_app(&manifest).unwrap_err();
    assert!(matches!(err, SynthError::PolicyFrozen(e) if e.unit == "api"));
}

#[test]
fn test_build_binds_resources_after_permissions() {
    let manifest = load_manifest_from_str(
        r#"
[app]
name = "notes"
account = "123456789012"

[[units]]
name = "storage"

[[units.resources]]
id = "notes"
kind = "table"

[[units.resources]]
id = "uploads"
kind = "bucket"

[[units]]
name = "api"

[units.defaults]
bind = [{ resource = "notes", unit = "storage" }]

[[units.functions]]
id = "handler"
handler = "src/a.main"
permissions = ["sns"]
bind = [{ resource = "uploads", unit = "storage" }]
"#,
    )
    .unwrap();

    let mut app = build_app(&manifest).unwrap();
    let fid = app.function_id("api", "handler").unwrap();
    let bound: Vec<&str> = app
        .function(fid)
        .config()
        .bind
        .as_ref()
        .unwrap()
        .iter()
        .map(|handle| handle.id.as_str())
        .collect();
    assert_eq!(bound, vec!["notes", "uploads"]);

    let actions: Vec<String> = app
        .function(fid)
        .policy()
        .statements()
        .into_iter()
        .skip(1)
        .flat_map(|s| s.actions)
        .collect();
    assert_eq!(actions, vec!["sns:*", "dynamodb:*", "s3:*"]);

    let output = app.synthesize().unwrap();
    let json = serde_json::to_value(&output).unwrap();
    assert_eq!(json["units"][1]["imports"], json!(["storage/notes", "storage/uploads"]));
}

#[test]
fn test_build_with_dedupe() {
    let manifest = load_manifest_from_str(
        r#"
[app]
name = "notes"
account = "123456789012"
dedupe_statements = true

[[units]]
name = "api"

[[units.functions]]
id = "handler"
handler = "src/a.main"
permissions = ["s3", "s3"]
"#,
    )
    .unwrap();

    let app = build_app(&manifest).unwrap();
    let fid = app.function_id("api", "handler").unwrap();
    assert_eq!(app.function(fid).policy().len(), 2);
}

// =============================================================================
// File loading and environment overrides
// =============================================================================

const FILE_MANIFEST: &str = r#"
[app]
name = "notes"
stage = "dev"
region = "us-east-1"
account = "123456789012"

[[units]]
name = "api"
"#;

fn clear_env() {
    unsafe {
        for var in [
            "CLOUDGRANT__APP__STAGE",
            "CLOUDGRANT__APP__REGION",
            "CLOUDGRANT__APP__ACCOUNT",
            "CLOUDGRANT__LOGGING__LEVEL",
            "AWS_REGION",
            "AWS_DEFAULT_REGION",
            "CDK_DEFAULT_ACCOUNT",
        ] {
            std::env::remove_var(var);
        }
    }
}

#[test]
#[serial_test::serial]
fn test_load_manifest_from_file() {
    use cloudgrant::config::load_manifest;
    use std::fs;
    use tempfile::tempdir;

    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("cloudgrant.toml");
    fs::write(&path, FILE_MANIFEST).unwrap();

    let manifest = load_manifest(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(manifest.app.region, "us-east-1");
    assert_eq!(manifest.units[0].name, "api");
}

#[test]
#[serial_test::serial]
fn test_env_overrides_stage_and_logging() {
    use cloudgrant::config::load_manifest;
    use std::env;
    use std::fs;
    use tempfile::tempdir;

    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("cloudgrant.toml");
    fs::write(&path, FILE_MANIFEST).unwrap();

    unsafe {
        env::set_var("CLOUDGRANT__APP__STAGE", "prod");
        env::set_var("CLOUDGRANT__LOGGING__LEVEL", "warn");
    }

    let manifest = load_manifest(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(manifest.app.stage, "prod");
    assert_eq!(manifest.app.name, "notes");
    assert_eq!(manifest.logging.level, "warn");

    clear_env();
}

#[test]
#[serial_test::serial]
fn test_aws_region_fallback() {
    use cloudgrant::config::load_manifest;
    use std::env;
    use std::fs;
    use tempfile::tempdir;

    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("cloudgrant.toml");
    fs::write(&path, FILE_MANIFEST).unwrap();

    unsafe {
        env::set_var("AWS_REGION", "eu-west-1");
        env::set_var("CDK_DEFAULT_ACCOUNT", "210987654321");
    }

    let manifest = load_manifest(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(manifest.app.region, "eu-west-1");
    assert_eq!(manifest.app.account, "210987654321");

    clear_env();
}

#[test]
#[serial_test::serial]
fn test_prefixed_region_over_aws_region() {
    use cloudgrant::config::load_manifest;
    use std::env;
    use std::fs;
    use tempfile::tempdir;

    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("cloudgrant.toml");
    fs::write(&path, FILE_MANIFEST).unwrap();

    unsafe {
        env::set_var("CLOUDGRANT__APP__REGION", "ap-southeast-2");
        env::set_var("AWS_REGION", "eu-west-1");
    }

    let manifest = load_manifest(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(manifest.app.region, "ap-southeast-2");

    clear_env();
}

#[test]
#[serial_test::serial]
fn test_invalid_region_from_env() {
    use cloudgrant::config::load_manifest;
    use std::env;
    use std::fs;
    use tempfile::tempdir;

    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("cloudgrant.toml");
    fs::write(&path, FILE_MANIFEST).unwrap();

    unsafe {
        env::set_var("AWS_REGION", "nowhere");
    }

    let result = load_manifest(Some(path.to_str().unwrap()));
    assert!(matches!(result, Err(ConfigError::Invalid { .. })));

    clear_env();
}

#[test]
fn test_missing_explicit_path() {
    use cloudgrant::config::load_manifest;

    let err = load_manifest(Some("/nonexistent/cloudgrant.toml")).unwrap_err();
    assert!(err.to_string().contains("not found"));
}
