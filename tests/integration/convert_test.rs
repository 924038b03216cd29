//! Integration tests for the conversion endpoint.
#![cfg(unix)]

mod helpers;

use std::io::Read;

use http::StatusCode;

use helpers::{COPY_CONVERTER, STEP_BODY, TestApp, cad_success};

const GLB: &[u8] = b"glTF\x02\x00\x00\x00\x0c\x00\x00\x00";

#[tokio::test]
async fn test_convert_returns_zipped_step() {
    let app = TestApp::new(COPY_CONVERTER, &cad_success());

    let response = app.upload("chair.glb", GLB).await;

    assert_eq!(response.status, StatusCode::OK, "{:?}", response.detail());
    assert_eq!(response.header("content-type"), "application/zip");
    assert_eq!(
        response.header("content-disposition"),
        "attachment; filename=\"converted.zip\""
    );
    assert_eq!(
        response.header("content-length"),
        response.body.len().to_string()
    );

    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(response.body.clone())).expect("zip body");
    assert_eq!(archive.len(), 1);
    let mut entry = archive.by_name("converted.step").expect("step entry");
    let mut step = String::new();
    entry.read_to_string(&mut step).expect("extract");
    assert_eq!(step, STEP_BODY);

    assert!(app.job_dirs().is_empty(), "job directory should be removed");
}

#[tokio::test]
async fn test_extension_check_is_case_insensitive() {
    let app = TestApp::new(COPY_CONVERTER, &cad_success());

    let response = app.upload("MODEL.GLB", GLB).await;

    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_rejects_non_glb_upload() {
    let app = TestApp::new(COPY_CONVERTER, &cad_success());

    let response = app.upload("model.gltf", GLB).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.detail(), "Only .glb files are accepted");
    assert!(app.job_dirs().is_empty(), "no job should be created");
}

#[tokio::test]
async fn test_missing_file_field() {
    let app = TestApp::new(COPY_CONVERTER, &cad_success());

    let response = app.upload_field("model", "chair.glb", GLB).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.detail(), "file is required");
}

#[tokio::test]
async fn test_converter_failure_reports_exit_code() {
    let app = TestApp::new(
        "#!/bin/sh\necho 'unknown format' >&2\nexit 4\n",
        &cad_success(),
    );

    let response = app.upload("broken.glb", GLB).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = response.detail();
    assert!(detail.contains("Asset conversion failed with exit code 4"), "{detail}");
    assert!(detail.contains("unknown format"), "{detail}");
    assert!(app.job_dirs().is_empty());
}

#[tokio::test]
async fn test_hidden_diagnostics_omit_tool_output() {
    let app = TestApp::with_config(
        "#!/bin/sh\necho 'secret path /srv/x' >&2\nexit 4\n",
        &cad_success(),
        |config| config.conversion.expose_diagnostics = false,
    );

    let response = app.upload("broken.glb", GLB).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = response.detail();
    assert!(detail.contains("exit code 4"), "{detail}");
    assert!(!detail.contains("secret path"), "{detail}");
}

#[tokio::test]
async fn test_cad_success_without_output_is_error() {
    let app = TestApp::new(COPY_CONVERTER, "echo 'nothing written'\n");

    let response = app.upload("chair.glb", GLB).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!response.detail().is_empty());
    assert!(app.job_dirs().is_empty());
}

#[tokio::test]
async fn test_no_valid_faces() {
    let app = TestApp::new(
        COPY_CONVERTER,
        "echo 'Created 0 valid faces (4 errors)'\necho 'ERROR: No valid faces created'\nexit 3\n",
    );

    let response = app.upload("degenerate.glb", GLB).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = response.detail();
    assert!(detail.contains("no valid faces"), "{detail}");
    assert!(detail.contains("(exit code 3)"), "{detail}");
}

#[tokio::test]
async fn test_compression_fallback_returns_raw_step() {
    let tail = format!(
        "mkdir \"$(dirname \"$out\")/output.zip\"\n{}",
        cad_success()
    );
    let app = TestApp::new(COPY_CONVERTER, &tail);

    let response = app.upload("chair.glb", GLB).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-type"), "application/octet-stream");
    assert_eq!(
        response.header("content-disposition"),
        "attachment; filename=\"converted.step\""
    );
    assert_eq!(response.body, STEP_BODY.as_bytes());

    let health = app.get("/health").await.json();
    assert_eq!(health["jobs"]["compression_fallbacks"], 1);
}

#[tokio::test]
async fn test_concurrent_uploads_use_separate_jobs() {
    let app = TestApp::with_config(COPY_CONVERTER, &cad_success(), |config| {
        config.storage.retain_jobs = true;
    });

    let (first, second) = tokio::join!(app.upload("same.glb", GLB), app.upload("same.glb", GLB));

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.status, StatusCode::OK);

    let dirs = app.job_dirs();
    assert_eq!(dirs.len(), 2);
    assert_ne!(dirs[0], dirs[1]);
    for dir in &dirs {
        let input = std::fs::read(app.storage_root().join(dir).join("input.glb")).expect("input");
        assert_eq!(input, GLB);
    }
}

#[tokio::test]
async fn test_health_reports_counters() {
    let app = TestApp::new(COPY_CONVERTER, &cad_success());
    app.upload("chair.glb", GLB).await;
    app.upload("chair.txt", GLB).await;

    let response = app.get("/health").await;

    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["jobs"]["jobs_started"], 1);
    assert_eq!(body["jobs"]["jobs_succeeded"], 1);
    assert!(body["version"].is_string());
    assert!(app.config.conversion.expose_diagnostics);
}
