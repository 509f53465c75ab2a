//! End-to-end behavior of the warehouse models over both backends.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::TryStreamExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use warehouse_models::entities::{package, package_cache};
use warehouse_models::{FindQuery, ModelError, WarehouseModels};
use warehouse_store::{
    ErrorKind, MemoryBackend, RedbBackend, Record, StoreError, TableOptions, blob,
};

fn rec(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn string_set(value: &Value) -> BTreeSet<String> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

async fn memory_models() -> WarehouseModels {
    let models = WarehouseModels::new(Arc::new(MemoryBackend::new()));
    models.ensure(&TableOptions::default()).await.unwrap();
    models
}

async fn redb_models() -> (WarehouseModels, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let backend = RedbBackend::open(&dir.path().join("warehouse.redb")).unwrap();
    let models = WarehouseModels::new(Arc::new(backend));
    models.ensure(&TableOptions::default()).await.unwrap();
    (models, dir)
}

// ── Scenarios ─────────────────────────────────────────────────────

async fn build_resolves_gz_files(models: &WarehouseModels) {
    models
        .build_file
        .create(rec(json!({
            "fingerprint": "a.gz",
            "build_id": "prod!pkg!1.0.0!en-US",
            "url": "https://cdn.example.com/a.gz",
            "env": "prod",
            "locale": "en-US",
            "name": "pkg",
            "version": "1.0.0",
            "extension": ".js",
            "filename": "app.js",
            "source": blob(b"module.exports = 1;"),
            "sourcemap": blob(b"{}"),
            "shrinkwrap": { "dep": "1.0.0" },
        })))
        .await
        .unwrap();

    let stored = models
        .build
        .create(rec(json!({
            "env": "prod",
            "name": "pkg",
            "version": "1.0.0",
            "locale": "en-US",
            "build_id": "prod!pkg!1.0.0!en-US",
            "fingerprints": ["a.gz", "a"],
        })))
        .await
        .unwrap();
    assert_eq!(stored["key"], "prod!pkg!1.0.0");

    let build = models
        .build
        .get(&rec(json!({
            "env": "prod",
            "name": "pkg",
            "version": "1.0.0",
            "locale": "en-US",
        })))
        .await
        .unwrap()
        .expect("build stored");

    let files = models.build.fetch_files(&build).await.unwrap();
    assert_eq!(files.len(), 1);
    let file = &files[0];
    assert_eq!(file["fingerprint"], "a");
    assert_eq!(file["url"], "https://cdn.example.com/a.gz");
    assert_eq!(file["filename"], "app.js");
    for heavy in ["source", "sourcemap", "shrinkwrap"] {
        assert!(file.get(heavy).is_none(), "{heavy} should be stripped");
    }
}

async fn build_head_with_missing_file_fails(models: &WarehouseModels) {
    let head = models
        .build_head
        .create(rec(json!({
            "env": "prod",
            "name": "pkg",
            "locale": "en-US",
            "version": "1.0.0",
            "fingerprints": ["gone.gz"],
        })))
        .await
        .unwrap();
    assert_eq!(head["key"], "prod!pkg");

    let err = models.build_head.fetch_files(&head).await.unwrap_err();
    assert!(matches!(err, ModelError::MissingBuildFile(print) if print == "gone.gz"));
}

async fn build_head_partition_streams_every_locale(models: &WarehouseModels) {
    for locale in ["de-DE", "en-US", "fr-FR", "ja-JP"] {
        models
            .build_head
            .create(rec(json!({
                "env": "test",
                "name": "app",
                "locale": locale,
                "version": "2.0.0",
            })))
            .await
            .unwrap();
    }
    models
        .build_head
        .create(rec(json!({ "env": "test", "name": "other", "locale": "en-US" })))
        .await
        .unwrap();

    let query = FindQuery::new(rec(json!({ "env": "test", "name": "app" })))
        .fields(["locale", "version"]);
    let buffered = models.build_head.find_all(query.clone()).await.unwrap();
    let streamed: Vec<Record> = models
        .build_head
        .find_all_stream(query)
        .try_collect()
        .await
        .unwrap();

    assert_eq!(buffered, streamed);
    let locales: Vec<&str> = buffered
        .iter()
        .map(|item| item["locale"].as_str().unwrap())
        .collect();
    assert_eq!(locales, ["de-DE", "en-US", "fr-FR", "ja-JP"]);
    assert!(buffered.iter().all(|item| item.len() == 2));
}

async fn dependents_are_a_set(models: &WarehouseModels) {
    models
        .dependent
        .create(rec(json!({ "name": "left-pad", "dependents": ["c", "b", "b"] })))
        .await
        .unwrap();

    let found = models
        .dependent
        .find_one(&rec(json!({ "name": "left-pad" })))
        .await
        .unwrap()
        .expect("dependent stored");
    assert_eq!(
        string_set(&found["dependents"]),
        BTreeSet::from(["b".to_string(), "c".to_string()])
    );
}

async fn missing_build_file_is_none(models: &WarehouseModels) {
    let found = models
        .build_file
        .get(&rec(json!({ "fingerprint": "does-not-exist" })))
        .await
        .unwrap();
    assert!(found.is_none());
}

async fn cache_matches(models: &WarehouseModels, name: &str) {
    let stored = models
        .package
        .get(&rec(json!({ "name": name })))
        .await
        .unwrap();
    let cached = models
        .package_cache
        .get(&rec(json!({ "partitioner": package_cache::PARTITIONER, "name": name })))
        .await
        .unwrap()
        .map(|mut entry| {
            assert_eq!(entry.remove("partitioner"), Some(json!("cached")));
            package::deserialize_record(entry)
        });
    assert_eq!(stored, cached);
}

async fn package_cache_mirrors_writes(models: &WarehouseModels) {
    models
        .package
        .create(rec(json!({
            "name": "my-package",
            "version": "1.0.0",
            "description": "first",
            "keywords": ["b", "a"],
            "dependencies": { "left-pad": "^1.0.0" },
        })))
        .await
        .unwrap();
    cache_matches(models, "my-package").await;

    models
        .package
        .update(rec(json!({ "name": "my-package", "description": "second" })))
        .await
        .unwrap();
    cache_matches(models, "my-package").await;

    let listed = models.package_cache.find_all(package_cache::all()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["description"], "second");
    assert_eq!(listed[0]["version"], "1.0.0");

    models
        .package
        .remove(&rec(json!({ "name": "my-package" })))
        .await
        .unwrap();
    cache_matches(models, "my-package").await;
    assert!(
        models
            .package
            .get(&rec(json!({ "name": "my-package" })))
            .await
            .unwrap()
            .is_none()
    );
}

async fn published_package_round_trips_config(models: &WarehouseModels) {
    let payload = json!({
        "_id": "my-package",
        "name": "my-package",
        "dist-tags": { "latest": "1.0.0" },
        "versions": {
            "1.0.0": {
                "name": "my-package",
                "version": "1.0.0",
                "config": { "locales": ["en-US", "de-DE"], "port": 8080, "mode": "fast" },
                "main": "index.js",
                "webpack": {}
            }
        },
        "maintainers": [{ "name": "indexzero" }]
    });

    let created = models
        .package
        .create(package::from_publish(&payload))
        .await
        .unwrap();
    assert_eq!(created["config"]["locales"], "[\"en-US\",\"de-DE\"]");

    let found = models
        .package
        .get(&rec(json!({ "name": "my-package" })))
        .await
        .unwrap()
        .expect("package stored");
    assert_eq!(found["config"]["locales"], json!(["en-US", "de-DE"]));
    assert_eq!(found["config"]["port"], 8080);
    assert_eq!(found["config"]["mode"], "fast");
    assert_eq!(found["distTags"]["latest"], "1.0.0");
    assert_eq!(found["extended"]["maintainers"][0]["name"], "indexzero");

    let all = models
        .package
        .find_all(rec(json!({ "name": "my-package" })))
        .await
        .unwrap();
    assert_eq!(all, vec![found]);
}

async fn release_line_deps_share_a_partition(models: &WarehouseModels) {
    for (dependent, version) in [("b", "2.0.0"), ("a", "1.1.0")] {
        models
            .release_line_dep
            .create(rec(json!({
                "pkg": "core",
                "version": "3.0.0",
                "previous_version": "2.9.0",
                "dependent": dependent,
                "dependent_version": version,
            })))
            .await
            .unwrap();
    }
    let deps = models
        .release_line_dep
        .find_all(rec(json!({ "pkg": "core", "version": "3.0.0" })))
        .await
        .unwrap();
    let names: Vec<&str> = deps.iter().map(|d| d["dependent"].as_str().unwrap()).collect();
    assert_eq!(names, ["a", "b"]);
    assert!(deps.iter().all(|d| d["key"] == "core!3.0.0"));
}

async fn invalid_attributes_are_validation_errors(models: &WarehouseModels) {
    let err = models
        .dependent_of
        .create(rec(json!({ "pkg": "a", "dependent_of": "b", "unknown": 1 })))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

async fn run_all(models: &WarehouseModels) {
    build_resolves_gz_files(models).await;
    build_head_with_missing_file_fails(models).await;
    build_head_partition_streams_every_locale(models).await;
    dependents_are_a_set(models).await;
    missing_build_file_is_none(models).await;
    package_cache_mirrors_writes(models).await;
    published_package_round_trips_config(models).await;
    release_line_deps_share_a_partition(models).await;
    invalid_attributes_are_validation_errors(models).await;
}

// ── Backends ──────────────────────────────────────────────────────

#[tokio::test]
async fn memory_backend_scenarios() {
    let models = memory_models().await;
    run_all(&models).await;
}

#[tokio::test]
async fn redb_backend_scenarios() {
    let (models, _dir) = redb_models().await;
    run_all(&models).await;
}

#[tokio::test]
async fn redb_data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("warehouse.redb");
    {
        let models = WarehouseModels::new(Arc::new(RedbBackend::open(&path).unwrap()));
        models.ensure(&TableOptions::default()).await.unwrap();
        models
            .release_line_head
            .create(rec(json!({ "pkg": "core", "version": "3.0.0" })))
            .await
            .unwrap();
    }

    let models = WarehouseModels::new(Arc::new(RedbBackend::open(&path).unwrap()));
    let head = models
        .release_line_head
        .get(&rec(json!({ "pkg": "core" })))
        .await
        .unwrap()
        .expect("head persisted");
    assert_eq!(head["version"], "3.0.0");
}

#[tokio::test]
async fn dropped_tables_reject_operations() {
    let (models, _dir) = redb_models().await;
    models.drop().await.unwrap();

    let err = models
        .version
        .get(&rec(json!({ "name": "pkg", "version": "1.0.0" })))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::TableNotFound(_)));

    models.drop().await.unwrap();
    models.ensure(&TableOptions::default()).await.unwrap();
    let found = models
        .version
        .get(&rec(json!({ "name": "pkg", "version": "1.0.0" })))
        .await
        .unwrap();
    assert!(found.is_none());
}
