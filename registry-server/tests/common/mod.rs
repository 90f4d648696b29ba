//! Common test utilities and helpers
//!
//! Archive builders, a fake npm registry served over real HTTP, and a test
//! setup that wires both into the application router.

#![allow(dead_code)]

use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use axum_test::TestServer;
use flate2::{write::GzEncoder, Compression};
use registry_server::{build_router, AppState, Config};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use zip::write::SimpleFileOptions;

pub const MIB: usize = 1024 * 1024;

/// Build a gzip-compressed tarball holding `entries`.
pub fn tgz_with_entries(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, *contents).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// npm-style tarball (`package/package.json`) padded with trailing zeros to
/// exactly `total_len` bytes. Gzip readers stop after the first member, so
/// the padding only affects the size.
pub fn padded_tgz(manifest: &str, total_len: usize) -> Vec<u8> {
    let mut tarball = tgz_with_entries(&[("package/package.json", manifest.as_bytes())]);
    assert!(tarball.len() <= total_len, "target size below archive size");
    tarball.resize(total_len, 0);
    tarball
}

/// Zip archive of exactly `total_len` bytes containing `manifest` as
/// `package.json` plus an uncompressed filler entry.
pub fn padded_zip(manifest: &str, total_len: usize) -> Vec<u8> {
    let build = |filler: usize| {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("package.json", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(manifest.as_bytes()).unwrap();
        writer
            .start_file(
                "filler.bin",
                SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored),
            )
            .unwrap();
        writer.write_all(&vec![0u8; filler]).unwrap();
        writer.finish().unwrap().into_inner()
    };

    let overhead = build(0).len();
    let archive = build(total_len - overhead);
    assert_eq!(archive.len(), total_len);
    archive
}

/// Manifest JSON with the given production dependencies.
pub fn manifest(name: &str, version: &str, dependencies: &[(&str, &str)]) -> String {
    let deps: serde_json::Map<String, Value> = dependencies
        .iter()
        .map(|(n, c)| (n.to_string(), json!(c)))
        .collect();
    json!({"name": name, "version": version, "dependencies": deps}).to_string()
}

enum TarballLink {
    Absolute,
    Relative,
    Missing,
}

struct PublishedVersion {
    name: String,
    version: String,
    tarball: Vec<u8>,
    link: TarballLink,
}

/// Builder for a fake npm registry.
#[derive(Default)]
pub struct RegistryBuilder {
    versions: Vec<PublishedVersion>,
    tags: Vec<(String, String, String)>,
    delays: HashMap<String, Duration>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `name@version` with an absolute tarball URL.
    pub fn version(self, name: &str, version: &str, tarball: Vec<u8>) -> Self {
        self.publish(name, version, tarball, TarballLink::Absolute)
    }

    /// Publish `name@version` with a registry-relative tarball URL.
    pub fn version_with_relative_tarball(self, name: &str, version: &str, tarball: Vec<u8>) -> Self {
        self.publish(name, version, tarball, TarballLink::Relative)
    }

    /// Publish `name@version` without any tarball URL.
    pub fn version_without_tarball(self, name: &str, version: &str) -> Self {
        self.publish(name, version, Vec::new(), TarballLink::Missing)
    }

    pub fn tag(mut self, name: &str, tag: &str, version: &str) -> Self {
        self.tags
            .push((name.to_string(), tag.to_string(), version.to_string()));
        self
    }

    /// Delay every document response for `name`.
    pub fn delay(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }

    fn publish(mut self, name: &str, version: &str, tarball: Vec<u8>, link: TarballLink) -> Self {
        self.versions.push(PublishedVersion {
            name: name.to_string(),
            version: version.to_string(),
            tarball,
            link,
        });
        self
    }

    pub async fn spawn(self) -> FakeRegistry {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let mut documents: HashMap<String, Value> = HashMap::new();
        let mut tarballs = HashMap::new();
        for published in self.versions {
            let file = tarball_file(&published.name, &published.version);
            let dist = match published.link {
                TarballLink::Absolute => json!({"tarball": format!("{url}/tarballs/{file}")}),
                TarballLink::Relative => json!({"tarball": format!("/tarballs/{file}")}),
                TarballLink::Missing => json!({}),
            };
            let document = documents
                .entry(published.name.clone())
                .or_insert_with(|| json!({"name": published.name, "dist-tags": {}, "versions": {}}));
            document["versions"][&published.version] = json!({
                "name": published.name,
                "version": published.version,
                "dist": dist,
            });
            tarballs.insert(file, published.tarball);
        }
        for (name, tag, version) in self.tags {
            if let Some(document) = documents.get_mut(&name) {
                document["dist-tags"][&tag] = json!(version);
            }
        }

        let inner = Arc::new(RegistryState {
            documents,
            tarballs,
            delays: self.delays,
            hits: Mutex::new(HashMap::new()),
        });

        let app = Router::new()
            .route("/{name}", get(serve_document))
            .route("/tarballs/{file}", get(serve_tarball))
            .with_state(inner.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        FakeRegistry { url, inner }
    }
}

fn tarball_file(name: &str, version: &str) -> String {
    format!("{}-{}.tgz", name.replace('/', "__"), version)
}

struct RegistryState {
    documents: HashMap<String, Value>,
    tarballs: HashMap<String, Vec<u8>>,
    delays: HashMap<String, Duration>,
    hits: Mutex<HashMap<String, usize>>,
}

impl RegistryState {
    fn hit(&self, key: String) {
        *self.hits.lock().unwrap().entry(key).or_insert(0) += 1;
    }
}

async fn serve_document(
    AxumPath(name): AxumPath<String>,
    State(state): State<Arc<RegistryState>>,
) -> Response {
    state.hit(format!("doc:{name}"));
    if let Some(delay) = state.delays.get(&name) {
        tokio::time::sleep(*delay).await;
    }
    match state.documents.get(&name) {
        Some(document) => Json(document.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"error": "Not found"}))).into_response(),
    }
}

async fn serve_tarball(
    AxumPath(file): AxumPath<String>,
    State(state): State<Arc<RegistryState>>,
) -> Response {
    state.hit(format!("tarball:{file}"));
    match state.tarballs.get(&file) {
        Some(bytes) => bytes.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// A running fake npm registry.
pub struct FakeRegistry {
    pub url: String,
    inner: Arc<RegistryState>,
}

impl FakeRegistry {
    pub fn document_hits(&self, name: &str) -> usize {
        self.hits(&format!("doc:{name}"))
    }

    pub fn tarball_hits(&self, name: &str, version: &str) -> usize {
        self.hits(&format!("tarball:{}", tarball_file(name, version)))
    }

    fn hits(&self, key: &str) -> usize {
        self.inner.hits.lock().unwrap().get(key).copied().unwrap_or(0)
    }
}

/// Application under test backed by a temporary data directory and a
/// fake registry.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub registry: FakeRegistry,
    pub temp_dir: TempDir,
}

pub async fn create_test_app(registry: RegistryBuilder) -> TestApp {
    let registry = registry.spawn().await;
    let temp_dir = TempDir::new().unwrap();

    let mut config = Config::default();
    config.upstream.npm_url = registry.url.clone();
    config.upstream.request_timeout_secs = 5;
    config.resolver.fetch_timeout_secs = 10;

    let state = Arc::new(
        AppState::from_config(
            config,
            temp_dir.path().to_path_buf(),
            "http://localhost:3080".to_string(),
        )
        .unwrap(),
    );
    let server = TestServer::new(build_router(state.clone())).expect("Failed to create test server");

    TestApp {
        server,
        state,
        registry,
        temp_dir,
    }
}

impl TestApp {
    /// Upload an archive through the HTTP API and return its id.
    pub async fn upload(&self, name: &str, version: Option<&str>, archive: &[u8]) -> String {
        use base64::{engine::general_purpose, Engine as _};

        let mut body = json!({
            "Name": name,
            "Content": general_purpose::STANDARD.encode(archive),
        });
        if let Some(version) = version {
            body["Version"] = json!(version);
        }

        let response = self.server.post("/package").json(&body).await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        body["metadata"]["ID"].as_str().unwrap().to_string()
    }
}
