//! Shared test helpers for integration tests.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use axum::Router;
use axum::body::Body;
use http::{HeaderMap, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use glb2step_api::AppState;
use glb2step_core::config::AppConfig;

/// Converter that copies its input to the requested output.
pub const COPY_CONVERTER: &str = "#!/bin/sh\n[ \"$1\" = export ] || exit 64\ncp \"$2\" \"$3\"\n";

/// Shell prologue for fake CAD tools: sets `$out` from the request file.
const READ_OUTPUT_PATH: &str =
    "out=$(sed -n 's/.*\"output_path\":\"\\([^\"]*\\)\".*/\\1/p' \"$GLB2STEP_CAD_REQUEST\")\n";

/// STEP payload written by the succeeding fake CAD tool.
pub const STEP_BODY: &str = "ISO-10303-21;\nHEADER;\nENDSEC;\nDATA;\nENDSEC;\nEND-ISO-10303-21;\n";

/// Fake CAD tail that writes [`STEP_BODY`] and a face report.
pub fn cad_success() -> String {
    format!(
        "printf '{}' > \"$out\"\necho 'GLB2STEP_REPORT {{\"faces_total\": 4, \"faces_built\": 4, \"face_errors\": 0}}'\n",
        STEP_BODY.replace('\n', "\\n")
    )
}

const BOUNDARY: &str = "glb2step-test-boundary";

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Application config
    pub config: AppConfig,
    storage: tempfile::TempDir,
    _tools: tempfile::TempDir,
}

impl TestApp {
    /// Build an app whose external tools are the given shell scripts.
    pub fn new(converter: &str, cad_tail: &str) -> Self {
        Self::with_config(converter, cad_tail, |_| {})
    }

    /// Like [`TestApp::new`], with a hook to adjust the config.
    pub fn with_config(converter: &str, cad_tail: &str, adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let tools = tempfile::tempdir().expect("Failed to create tools dir");
        let storage = tempfile::tempdir().expect("Failed to create storage dir");

        let mut config = AppConfig::default();
        config.storage.root = storage.path().to_path_buf();
        config.conversion.converter_command = write_tool(tools.path(), "fake-assimp", converter);
        config.conversion.cad_command = write_tool(
            tools.path(),
            "fake-freecad",
            &format!("#!/bin/sh\n{READ_OUTPUT_PATH}{cad_tail}"),
        );
        adjust(&mut config);

        let router = glb2step_api::build_router(AppState::new(config.clone()));

        Self {
            router,
            config,
            storage,
            _tools: tools,
        }
    }

    /// Names of the entries left under the storage root.
    pub fn job_dirs(&self) -> Vec<String> {
        std::fs::read_dir(self.storage.path())
            .expect("Failed to list storage root")
            .map(|entry| {
                entry
                    .expect("Failed to read entry")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    /// Storage root path.
    pub fn storage_root(&self) -> &Path {
        self.storage.path()
    }

    /// POST a multipart upload to `/convert` under the given field name.
    pub async fn upload_field(&self, field: &str, file_name: &str, data: &[u8]) -> TestResponse {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: model/gltf-binary\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let req = Request::builder()
            .method("POST")
            .uri("/convert")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("Failed to build request");

        self.send(req).await
    }

    /// POST a `.glb` upload to `/convert`.
    pub async fn upload(&self, file_name: &str, data: &[u8]) -> TestResponse {
        self.upload_field("file", file_name, data).await
    }

    /// GET a path.
    pub async fn get(&self, path: &str) -> TestResponse {
        let req = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .expect("Failed to build request");

        self.send(req).await
    }

    async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), 16 * 1024 * 1024)
            .await
            .expect("Failed to read body")
            .to_vec();

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw body
    pub body: Vec<u8>,
}

impl TestResponse {
    /// Body parsed as JSON, `Null` when it is not JSON.
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    /// The `detail` field of an error body.
    pub fn detail(&self) -> String {
        self.json()
            .get("detail")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    /// A header value as a string.
    pub fn header(&self, name: &str) -> &str {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }
}

fn write_tool(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("Failed to write tool");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to chmod tool");
    path.to_string_lossy().into_owned()
}
