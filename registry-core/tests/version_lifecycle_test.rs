//! Integration tests for version retrieval, publishing and destruction

mod common;

use common::*;
use registry_core::{
    ArtifactStore, DocumentStore, PackageDraft, RegistryError, VersionLifecycleManager,
};
use serde_json::json;

async fn publish(setup: &TestSetup, name: &str, versions: &[&str]) {
    setup
        .packages()
        .create(PackageDraft::from_value(
            &package_body(name, versions),
            setup.author.id,
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_get_version_by_name() {
    let setup = create_test_setup().await;
    publish(&setup, "left-pad", &["1.0.0", "1.1.0"]).await;

    let version = setup.versions().get("left-pad", "1.1.0").await.unwrap();
    assert_eq!(version.name, "1.1.0");
    assert_eq!(version.description.as_deref(), Some("release 1.1.0"));
}

#[tokio::test]
async fn test_get_unknown_version_or_package_is_not_found() {
    let setup = create_test_setup().await;
    publish(&setup, "left-pad", &["1.0.0"]).await;

    let err = setup.versions().get("left-pad", "9.9.9").await.unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)));
    assert_eq!(
        err.to_string(),
        "version 9.9.9 of package left-pad not found"
    );

    let err = setup.versions().get("right-pad", "1.0.0").await.unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)));
    assert!(err.to_string().contains("package right-pad not found"));
}

#[tokio::test]
async fn test_destroy_sole_version_is_refused() {
    let setup = create_test_setup().await;
    publish(&setup, "left-pad", &["1.0.0"]).await;

    let err = setup
        .versions()
        .destroy("left-pad", "1.0.0")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidOperation(_)));

    let package = setup.packages().get("left-pad").await.unwrap().unwrap();
    assert_eq!(package.versions.len(), 1);
    assert!(setup.artifacts.exists(&package.versions[0].archive).await);
}

#[tokio::test]
async fn test_destroy_one_of_several_versions() {
    let setup = create_test_setup().await;
    publish(&setup, "left-pad", &["1.0.0", "1.1.0"]).await;
    let doomed = setup.versions().get("left-pad", "1.0.0").await.unwrap();

    setup.versions().destroy("left-pad", "1.0.0").await.unwrap();

    let package = setup.packages().get("left-pad").await.unwrap().unwrap();
    let names: Vec<_> = package.versions.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["1.1.0"]);
    assert!(setup.store.find_versions(&[doomed.id]).await.unwrap().is_empty());
    assert_artifacts_gone(&setup, &[doomed]).await;

    let err = setup
        .versions()
        .destroy("left-pad", "1.1.0")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidOperation(_)));
}

#[tokio::test]
async fn test_destroy_unknown_version_is_not_found() {
    let setup = create_test_setup().await;
    publish(&setup, "left-pad", &["1.0.0", "1.1.0"]).await;

    let err = setup
        .versions()
        .destroy("left-pad", "3.0.0")
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)));
}

#[tokio::test]
async fn test_add_version_to_existing_package() {
    let setup = create_test_setup().await;
    publish(&setup, "left-pad", &["1.0.0"]).await;

    let version = setup
        .packages()
        .add_version("left-pad", &version_body("1.1.0"))
        .await
        .unwrap();
    assert_eq!(version.name, "1.1.0");

    let package = setup.packages().get("left-pad").await.unwrap().unwrap();
    assert_eq!(package.latest().unwrap().id, version.id);
    assert_eq!(package.versions.len(), 2);
}

#[tokio::test]
async fn test_add_version_to_missing_package() {
    let setup = create_test_setup().await;

    let err = setup
        .versions()
        .add(
            "ghost",
            VersionLifecycleManager::sanitize(&version_body("1.0.0")),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)));
    assert!(artifact_files(&setup).is_empty());
}

#[tokio::test]
async fn test_add_duplicate_version_is_rolled_back() {
    let setup = create_test_setup().await;
    publish(&setup, "left-pad", &["1.0.0"]).await;

    let err = setup
        .packages()
        .add_version("left-pad", &version_body("1.0.0"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Conflict(_)));
    assert_eq!(artifact_files(&setup).len(), 1);
}

#[tokio::test]
async fn test_failed_attach_removes_new_version() {
    let setup = create_test_setup().await;
    publish(&setup, "left-pad", &["1.0.0"]).await;
    setup.store.fail_append_version(true);

    let err = setup
        .packages()
        .add_version("left-pad", &version_body("2.0.0"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Internal(_)));

    let attempted = setup.store.attempted_versions();
    assert_eq!(attempted.len(), 1);
    assert!(setup.store.find_versions(&attempted).await.unwrap().is_empty());
    assert_eq!(artifact_files(&setup).len(), 1);

    let package = setup.packages().get("left-pad").await.unwrap().unwrap();
    assert_eq!(package.versions.len(), 1);
}

#[tokio::test]
async fn test_invalid_version_input_is_rejected_before_storage() {
    let setup = create_test_setup().await;
    publish(&setup, "left-pad", &["1.0.0"]).await;

    let err = setup
        .packages()
        .add_version("left-pad", &json!({"name": "2.0", "archive": payload("x")}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("`2.0` is not a valid version name"));
    assert_eq!(artifact_files(&setup).len(), 1);
}
