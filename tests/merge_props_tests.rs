//! Props merger integration tests
//!
//! Covers the per-field merge policies:
//! - Scalars: override wins if set
//! - Environment: shallow key union, override wins per key
//! - Permissions: wildcard absorbs, otherwise concatenated with duplicates kept
//! - Bundle: tri-state wholesale replacement
//! - Layers and bound resources: strict append

use cloudgrant::permissions::{AwsEnv, PermissionDescriptor, Permissions, ResourceHandle, ResourceKind};
use cloudgrant::props::{Bundle, BundleOptions, FunctionProps, LayerRef, Runtime, merge_all, merge_props};
use rstest::rstest;
use serde_json::json;

// =============================================================================
// Test Helpers
// =============================================================================

fn props(value: serde_json::Value) -> FunctionProps {
    serde_json::from_value(value).expect("valid function props")
}

fn full_props() -> FunctionProps {
    props(json!({
        "handler": "src/lambda.main",
        "src_path": "services",
        "runtime": "nodejs18.x",
        "timeout": 5,
        "memory_size": 256,
        "environment": { "A": "1" },
        "permissions": ["s3"],
        "bundle": { "minify": true },
        "layers": ["arn:aws:lambda:us-east-1:123:layer:shared:1"]
    }))
}

// =============================================================================
// 1. Identity
// =============================================================================

mod identity {
    use super::*;

    #[test]
    fn test_merge_with_empty_is_identity() {
        let x = full_props();
        assert_eq!(merge_props(&x, &FunctionProps::default()), x);
    }

    #[test]
    fn test_empty_base_is_identity() {
        let x = full_props();
        assert_eq!(merge_props(&FunctionProps::default(), &x), x);
    }

    #[test]
    fn test_merge_all_of_nothing_is_empty() {
        let merged: FunctionProps = merge_all(std::iter::empty());
        assert!(merged.is_empty());
    }
}

// =============================================================================
// 2. Scalars
// =============================================================================

mod scalars {
    use super::*;

    #[test]
    fn test_timeout_and_src_path() {
        let merged = merge_props(
            &props(json!({ "timeout": 5, "src_path": "path" })),
            &props(json!({ "timeout": 10 })),
        );
        assert_eq!(merged, props(json!({ "timeout": 10, "src_path": "path" })));
    }

    #[rstest]
    #[case(json!({ "handler": "b.main" }))]
    #[case(json!({ "runtime": "python3.11" }))]
    #[case(json!({ "memory_size": 1024 }))]
    #[case(json!({ "architecture": "arm64" }))]
    #[case(json!({ "description": "override" }))]
    fn test_override_wins_when_set(#[case] override_value: serde_json::Value) {
        let over = props(override_value.clone());
        let merged = merge_props(&full_props(), &over);

        let merged_json = serde_json::to_value(&merged).unwrap();
        for (key, value) in override_value.as_object().unwrap() {
            assert_eq!(&merged_json[key], value, "field {key}");
        }
    }

    #[test]
    fn test_unset_override_keeps_base() {
        let merged = merge_props(&full_props(), &props(json!({ "timeout": 30 })));
        assert_eq!(merged.runtime, Some(Runtime::Nodejs18));
        assert_eq!(merged.memory_size, Some(256));
    }
}

// =============================================================================
// 3. Environment
// =============================================================================

mod environment {
    use super::*;

    #[test]
    fn test_key_union_override_wins() {
        let merged = merge_props(
            &props(json!({ "environment": { "A": "1", "B": "2" } })),
            &props(json!({ "environment": { "B": "3", "C": "4" } })),
        );
        assert_eq!(
            serde_json::to_value(merged.environment).unwrap(),
            json!({ "A": "1", "B": "3", "C": "4" })
        );
    }

    #[test]
    fn test_empty_override_map_keeps_base_keys() {
        let merged = merge_props(
            &props(json!({ "environment": { "A": "1" } })),
            &props(json!({ "environment": {} })),
        );
        assert_eq!(merged.environment.unwrap().len(), 1);
    }
}

// =============================================================================
// 4. Permissions
// =============================================================================

mod permissions {
    use super::*;

    #[rstest]
    #[case(json!(["s3"]), json!("*"))]
    #[case(json!("*"), json!(["s3"]))]
    #[case(json!("*"), json!("*"))]
    fn test_wildcard_absorbs(#[case] base: serde_json::Value, #[case] over: serde_json::Value) {
        let merged = merge_props(
            &props(json!({ "permissions": base })),
            &props(json!({ "permissions": over })),
        );
        assert_eq!(merged.permissions, Some(Permissions::All));
    }

    #[test]
    fn test_lists_concatenate_in_order() {
        let merged = merge_props(
            &props(json!({ "permissions": ["s3"] })),
            &props(json!({ "permissions": ["dynamodb"] })),
        );
        assert_eq!(
            merged.permissions,
            Some(Permissions::List(vec![
                PermissionDescriptor::service("s3"),
                PermissionDescriptor::service("dynamodb"),
            ]))
        );
    }

    #[test]
    fn test_duplicates_are_kept() {
        let merged = merge_props(
            &props(json!({ "permissions": ["s3"] })),
            &props(json!({ "permissions": ["s3"] })),
        );
        assert_eq!(merged.permissions.unwrap().descriptors().len(), 2);
    }

    #[test]
    fn test_wildcard_absorbs_through_fold() {
        let partials = [
            props(json!({ "permissions": ["s3"] })),
            props(json!({ "permissions": "*" })),
            props(json!({ "permissions": ["sns"] })),
        ];
        let merged = merge_all(partials.iter());
        assert_eq!(merged.permissions, Some(Permissions::All));
    }
}

// =============================================================================
// 5. Bundle
// =============================================================================

mod bundle {
    use super::*;

    #[test]
    fn test_boolean_replaces_object() {
        let merged = merge_props(
            &props(json!({ "bundle": { "external_modules": [] } })),
            &props(json!({ "bundle": true })),
        );
        assert_eq!(merged.bundle, Some(Bundle::Enabled(true)));
    }

    #[test]
    fn test_object_replaces_boolean() {
        let merged = merge_props(
            &props(json!({ "bundle": false })),
            &props(json!({ "bundle": { "minify": false } })),
        );
        assert_eq!(
            merged.bundle,
            Some(Bundle::Options(BundleOptions {
                minify: Some(false),
                ..Default::default()
            }))
        );
    }

    #[test]
    fn test_undefined_override_keeps_base() {
        let merged = merge_props(&props(json!({ "bundle": false })), &props(json!({})));
        assert_eq!(merged.bundle, Some(Bundle::Enabled(false)));
    }
}

// =============================================================================
// 6. Layers
// =============================================================================

mod layers {
    use super::*;

    #[test]
    fn test_layers_append() {
        let merged = merge_props(
            &props(json!({ "layers": ["a", "b"] })),
            &props(json!({ "layers": ["b", "c"] })),
        );
        assert_eq!(
            merged.layers.unwrap(),
            vec![
                LayerRef::new("a"),
                LayerRef::new("b"),
                LayerRef::new("b"),
                LayerRef::new("c"),
            ]
        );
    }

    #[test]
    fn test_bind_appends() {
        let env = AwsEnv::default();
        let bucket_a = ResourceHandle::new(&env, ResourceKind::Bucket, "a", "dev-notes-a");
        let bucket_b = ResourceHandle::new(&env, ResourceKind::Bucket, "b", "dev-notes-b");

        let merged = merge_props(
            &FunctionProps::with_bind(vec![bucket_a.clone()]),
            &FunctionProps::with_bind(vec![bucket_b.clone()]),
        );
        assert_eq!(merged.bind, Some(vec![bucket_a.clone(), bucket_b]));

        let merged = merge_props(&FunctionProps::with_bind(vec![bucket_a.clone()]), &FunctionProps::default());
        assert_eq!(merged.bind, Some(vec![bucket_a]));
    }
}

// =============================================================================
// 7. Cascade
// =============================================================================

mod cascade {
    use super::*;

    #[test]
    fn test_nested_merge_matches_fold() {
        let app = props(json!({ "timeout": 3, "environment": { "LEVEL": "app" }, "permissions": ["s3"] }));
        let unit = props(json!({ "environment": { "LEVEL": "unit", "UNIT": "api" } }));
        let resource = props(json!({ "memory_size": 2048, "permissions": ["sns"] }));
        let inline = props(json!({ "timeout": 30, "handler": "src/get.main" }));

        let nested = merge_props(&merge_props(&merge_props(&app, &unit), &resource), &inline);
        let folded = merge_all([&app, &unit, &resource, &inline]);
        assert_eq!(nested, folded);

        assert_eq!(nested.timeout, Some(30));
        assert_eq!(nested.memory_size, Some(2048));
        assert_eq!(nested.environment.as_ref().unwrap()["LEVEL"], "unit");
        assert_eq!(nested.permissions.unwrap().descriptors().len(), 2);
    }
}
