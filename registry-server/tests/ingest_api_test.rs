//! Ingestion and service endpoint integration tests

use axum::http::StatusCode;
use base64::{engine::general_purpose, Engine as _};
use registry_server::package_id;
use serde_json::{json, Value};

mod common;
use common::{create_test_app, manifest, tgz_with_entries, RegistryBuilder};

fn sample_tgz() -> Vec<u8> {
    tgz_with_entries(&[(
        "package/package.json",
        manifest("sample", "0.2.0", &[]).as_bytes(),
    )])
}

#[tokio::test]
async fn test_upload_returns_metadata() {
    let app = create_test_app(RegistryBuilder::new()).await;

    let response = app
        .server
        .post("/package")
        .json(&json!({
            "Name": "Sample",
            "Version": "0.2.0",
            "Content": general_purpose::STANDARD.encode(sample_tgz()),
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    assert_eq!(body["metadata"]["Name"], "Sample");
    assert_eq!(body["metadata"]["Version"], "0.2.0");
    assert_eq!(body["metadata"]["ID"], package_id("sample", "0.2.0"));

    let id = package_id("sample", "0.2.0");
    assert!(app
        .temp_dir
        .path()
        .join("packages")
        .join(&id)
        .join("package.tgz")
        .exists());
}

#[tokio::test]
async fn test_upload_defaults_version() {
    let app = create_test_app(RegistryBuilder::new()).await;
    let id = app.upload("sample", None, &sample_tgz()).await;
    assert_eq!(id, package_id("sample", "1.0.0"));
}

#[tokio::test]
async fn test_duplicate_upload_conflicts() {
    let app = create_test_app(RegistryBuilder::new()).await;
    app.upload("sample", Some("1.2.3"), &sample_tgz()).await;

    let response = app
        .server
        .post("/package")
        .json(&json!({
            "Name": "sample",
            "Version": "1.2.3",
            "Content": general_purpose::STANDARD.encode(sample_tgz()),
        }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["code"], "conflict");
}

#[tokio::test]
async fn test_missing_fields_are_rejected() {
    let app = create_test_app(RegistryBuilder::new()).await;
    let content = general_purpose::STANDARD.encode(sample_tgz());

    for body in [
        json!({"Content": content}),
        json!({"Name": "sample"}),
        json!({}),
    ] {
        let response = app.server.post("/package").json(&body).await;
        response.assert_status_bad_request();
        assert_eq!(
            response.json::<Value>()["error"],
            "Missing field(s) in PackageData"
        );
    }
}

#[tokio::test]
async fn test_invalid_content_is_rejected() {
    let app = create_test_app(RegistryBuilder::new()).await;

    let not_base64 = app
        .server
        .post("/package")
        .json(&json!({"Name": "sample", "Content": "%%% not base64 %%%"}))
        .await;
    not_base64.assert_status_bad_request();

    let not_an_archive = app
        .server
        .post("/package")
        .json(&json!({
            "Name": "sample",
            "Content": general_purpose::STANDARD.encode(b"just some text"),
        }))
        .await;
    not_an_archive.assert_status_bad_request();

    let bad_name = app
        .server
        .post("/package")
        .json(&json!({
            "Name": "../escape",
            "Content": general_purpose::STANDARD.encode(sample_tgz()),
        }))
        .await;
    bad_name.assert_status_bad_request();
}

#[tokio::test]
async fn test_download_returns_uploaded_archive() {
    let app = create_test_app(RegistryBuilder::new()).await;
    let archive = sample_tgz();
    let id = app.upload("sample", Some("0.2.0"), &archive).await;

    let response = app.server.get(&format!("/package/{id}")).await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(
        body["metadata"],
        json!({"Name": "sample", "Version": "0.2.0", "ID": id})
    );
    let content = body["data"]["Content"].as_str().unwrap();
    assert_eq!(general_purpose::STANDARD.decode(content).unwrap(), archive);
}

#[tokio::test]
async fn test_download_unknown_package_is_not_found() {
    let app = create_test_app(RegistryBuilder::new()).await;

    let response = app.server.get("/package/does-not-exist").await;
    response.assert_status_not_found();
    assert_eq!(response.json::<Value>()["error"], "Package does not exist");

    app.server.get("/package/%20").await.assert_status_bad_request();
}

#[tokio::test]
async fn test_reset_clears_the_store() {
    let app = create_test_app(RegistryBuilder::new()).await;

    let empty = app.server.delete("/reset").await;
    empty.assert_status_ok();
    assert_eq!(empty.json::<Value>()["message"], "Registry already empty");

    let id = app.upload("sample", None, &sample_tgz()).await;
    app.server
        .get(&format!("/package/{id}/cost"))
        .await
        .assert_status_ok();

    let reset = app.server.delete("/reset").await;
    reset.assert_status_ok();
    assert_eq!(
        reset.json::<Value>()["message"],
        "Registry successfully reset to default state"
    );

    app.server
        .get(&format!("/package/{id}/cost"))
        .await
        .assert_status_not_found();
    app.server
        .get(&format!("/package/{id}"))
        .await
        .assert_status_not_found();
    assert_eq!(app.server.get("/status").await.json::<Value>()["packages"], 0);

    // The same package can be uploaded again afterwards.
    assert_eq!(app.upload("sample", None, &sample_tgz()).await, id);
}

#[tokio::test]
async fn test_health_and_status() {
    let app = create_test_app(RegistryBuilder::new()).await;

    let health = app.server.get("/health").await;
    health.assert_status_ok();
    assert_eq!(health.json::<Value>(), json!({"status": "healthy"}));

    app.upload("sample", None, &sample_tgz()).await;
    let status = app.server.get("/status").await;
    status.assert_status_ok();

    let body: Value = status.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["packages"], 1);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["upstream"]["npm_url"], app.registry.url.as_str());
    assert_eq!(
        body["data_directory"],
        app.temp_dir.path().display().to_string()
    );
}

#[tokio::test]
async fn test_invalid_endpoint_returns_404() {
    let app = create_test_app(RegistryBuilder::new()).await;
    app.server.get("/api/nonexistent").await.assert_status_not_found();
}
