use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body, Bytes};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::Notify;
use tower::ServiceExt;

use animo_core::{ProgressReporter, RenderError, RenderJob, Renderer, RendererProbe};

use crate::config::Config;
use crate::middleware::trace::X_TRACE_ID;
use crate::state::AppState;

/// Writes the scene source as the "video" after an optional gate.
#[derive(Default)]
struct FakeRenderer {
    dir: PathBuf,
    gate: Option<Arc<Notify>>,
    fail_with: Option<RenderError>,
    installed: bool,
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn render(
        &self,
        job: &RenderJob,
        progress: &ProgressReporter,
    ) -> Result<PathBuf, RenderError> {
        progress.report(40).await;
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(e) = &self.fail_with {
            return Err(e.clone());
        }
        let path = self.dir.join(format!("{}.{}", job.job_id, job.format.extension()));
        tokio::fs::write(&path, job.source.as_bytes()).await?;
        Ok(path)
    }

    async fn probe(&self) -> RendererProbe {
        RendererProbe {
            installed: self.installed,
            version: self.installed.then(|| "Manim Community v0.18.1".to_owned()),
        }
    }
}

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    _dir: TempDir,
}

fn test_app(configure: impl FnOnce(&mut FakeRenderer)) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut renderer = FakeRenderer {
        dir: dir.path().to_path_buf(),
        installed: true,
        ..Default::default()
    };
    configure(&mut renderer);

    let config = Config {
        work_dir: dir.path().to_path_buf(),
        ..Config::from_lookup(|_| None)
    };
    let state = Arc::new(AppState::new(config, Arc::new(renderer)));
    TestApp {
        router: super::build(Arc::clone(&state)),
        state,
        _dir: dir,
    }
}

impl TestApp {
    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, HeaderMap, Bytes) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, bytes)
    }

    async fn json(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, _, bytes) = self.send(method, uri, body).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn wait_for(&self, job_id: &str, wanted: &str) -> Value {
        for _ in 0..200 {
            let (_, body) = self
                .json(Method::GET, &format!("/api/video/status/{job_id}"), None)
                .await;
            if body["status"] == wanted {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} never reached {wanted}");
    }
}

#[tokio::test]
async fn equation_job_end_to_end() {
    let app = test_app(|_| {});

    let (status, created) = app
        .json(
            Method::POST,
            "/api/video/create",
            Some(json!({ "type": "equation", "text": "x^2" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["status"], "queued");
    let id = created["job_id"].as_str().unwrap().to_owned();

    let done = app.wait_for(&id, "completed").await;
    assert_eq!(done["progress"], 100);
    assert!(done["error"].is_null());
    let download_url = format!("/api/video/download/{id}");
    assert_eq!(done["download_url"], download_url.as_str());

    let (status, headers, body) = app.send(Method::GET, &download_url, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"animo_{id}.mp4\"").as_str()
    );
    assert!(String::from_utf8_lossy(&body).contains("MathTex"));

    let (status, headers, streamed) = app
        .send(Method::GET, &format!("/api/video/stream/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.get(header::CONTENT_DISPOSITION).is_none());
    assert_eq!(streamed, body);

    let artifact = app.state.config.work_dir.join(format!("{id}.mp4"));
    assert!(artifact.exists());

    let (status, deleted) = app
        .json(Method::DELETE, &format!("/api/video/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["message"], "Video deleted successfully");
    assert!(!artifact.exists());

    let (status, body) = app
        .json(Method::GET, &format!("/api/video/status/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Job not found");

    let (status, _) = app
        .json(Method::DELETE, &format!("/api/video/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_job_is_not_found_on_every_route() {
    let app = test_app(|_| {});
    let id = uuid::Uuid::new_v4();
    for (method, uri) in [
        (Method::GET, format!("/api/video/status/{id}")),
        (Method::GET, format!("/api/video/download/{id}")),
        (Method::GET, format!("/api/video/stream/{id}")),
        (Method::DELETE, format!("/api/video/{id}")),
        (Method::GET, format!("/job/{id}")),
        (Method::GET, format!("/videos/{id}")),
    ] {
        let (status, body) = app.json(method.clone(), &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
        assert_eq!(body["error"], "Job not found");
    }
}

#[tokio::test]
async fn artifact_is_not_ready_while_rendering() {
    let gate = Arc::new(Notify::new());
    let app = test_app(|r| r.gate = Some(Arc::clone(&gate)));

    let (_, created) = app
        .json(Method::POST, "/api/video/create", Some(json!({ "text": "Kesirler" })))
        .await;
    let id = created["job_id"].as_str().unwrap().to_owned();
    let running = app.wait_for(&id, "processing").await;
    assert!(running["download_url"].is_null());

    let (status, body) = app
        .json(Method::GET, &format!("/api/video/download/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "video not ready (status: processing)");

    let (status, body) = app.json(Method::GET, &format!("/videos/{id}"), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "processing");

    gate.notify_one();
    app.wait_for(&id, "completed").await;
    let (status, _, _) = app
        .send(Method::GET, &format!("/api/video/stream/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn failed_render_is_reported_consistently() {
    let app = test_app(|r| r.fail_with = Some(RenderError::NoOutput));

    let (_, created) = app
        .json(Method::POST, "/api/video/create", Some(json!({ "type": "concept" })))
        .await;
    let id = created["job_id"].as_str().unwrap().to_owned();

    let failed = app.wait_for(&id, "failed").await;
    assert_eq!(failed["error"], "no video file generated");
    assert!(failed["download_url"].is_null());

    for _ in 0..2 {
        let (status, body) = app
            .json(Method::GET, &format!("/api/video/download/{id}"), None)
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "video generation failed: no video file generated");
    }
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let app = test_app(|_| {});
    for body in [
        json!({ "type": "equation" }),
        json!({ "type": "text", "text": "" }),
        json!({ "code": "import subprocess" }),
        json!({ "scene": "not a class" }),
        json!({ "topic": "t".repeat(201) }),
    ] {
        let (status, response) = app
            .json(Method::POST, "/api/video/create", Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert!(response["error"].is_string());
    }
    assert_eq!(app.state.jobs.stats().await.total(), 0);
}

#[tokio::test]
async fn malformed_bodies_get_json_bad_request() {
    let app = test_app(|_| {});
    for (uri, body) in [
        ("/api/video/create", json!({ "type": "video", "text": "x" })),
        ("/api/video/create", json!({ "quality": "ultra" })),
        ("/api/video/create", json!({ "format": "avi" })),
        ("/api/video/create", json!({ "grade": "nine" })),
        ("/create-video", json!({ "title": "t" })),
    ] {
        let (status, headers, bytes) = app.send(Method::POST, uri, Some(body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri} {body}");
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        let response: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(response["error"].is_string(), "{uri} {body}");
    }

    let (_, _, bytes) = app
        .send(Method::POST, "/create-video", Some(json!({ "title": "t" })))
        .await;
    let response: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(response["error"].as_str().unwrap().contains("script"));
    assert_eq!(app.state.jobs.stats().await.total(), 0);
}

#[tokio::test]
async fn script_endpoints_render_solution_scene() {
    let app = test_app(|_| {});
    let script = "from manim import *\n\nclass SolutionVideo(Scene):\n    def construct(self):\n        self.wait()\n";

    let (status, created) = app
        .json(
            Method::POST,
            "/create-video",
            Some(json!({ "script": script, "quality": "low_quality" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = created["job_id"].as_str().unwrap().to_owned();
    assert_eq!(created["video_url"], format!("/videos/{id}").as_str());
    assert_eq!(created["message"], "Video generation started");

    app.wait_for(&id, "completed").await;

    let (status, detail) = app.json(Method::GET, &format!("/job/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["request"]["scene"], "SolutionVideo");
    assert_eq!(detail["request"]["quality"], "low");
    assert!(detail["output_path"].as_str().unwrap().ends_with(".mp4"));

    let (status, _, body) = app.send(Method::GET, &format!("/videos/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, script.as_bytes());

    let (status, _) = app
        .json(
            Method::POST,
            "/create-video",
            Some(json!({ "script": "import os\nos.system('rm -rf /')" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn jobs_can_be_listed_by_status() {
    let app = test_app(|r| r.fail_with = Some(RenderError::NoOutput));
    let (_, created) = app
        .json(Method::POST, "/api/video/create", Some(json!({})))
        .await;
    let id = created["job_id"].as_str().unwrap().to_owned();
    app.wait_for(&id, "failed").await;

    let (status, all) = app.json(Method::GET, "/api/video/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 1);

    let (_, completed) = app
        .json(Method::GET, "/api/video/jobs?status=completed", None)
        .await;
    assert!(completed.as_array().unwrap().is_empty());

    let (_, failed) = app
        .json(Method::GET, "/api/video/jobs?status=failed", None)
        .await;
    assert_eq!(failed[0]["job_id"], id.as_str());

    let (status, _) = app
        .json(Method::GET, "/api/video/jobs?status=finished", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_degraded_without_renderer() {
    let app = test_app(|r| r.installed = false);
    let (status, body) = app.json(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["service"], "animo-server");
    assert_eq!(body["renderer_installed"], false);
    assert_eq!(body["active_jobs"], 0);
    assert_eq!(body["jobs"]["completed"], 0);

    let app = test_app(|_| {});
    let (_, body) = app.json(Method::GET, "/health", None).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["renderer_version"], "Manim Community v0.18.1");
}

#[tokio::test]
async fn trace_id_is_propagated() {
    let app = test_app(|_| {});
    let (_, headers, _) = app.send(Method::GET, "/health", None).await;
    assert!(headers.get(X_TRACE_ID).is_some());

    let trace_id = uuid::Uuid::new_v4().to_string();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(X_TRACE_ID, &trace_id)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()[X_TRACE_ID], trace_id.as_str());
}

#[tokio::test]
async fn openapi_document_lists_video_routes() {
    let app = test_app(|_| {});
    let (status, doc) = app.json(Method::GET, "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/api/video/create"].is_object());
    assert!(doc["paths"]["/create-video"].is_object());
}
