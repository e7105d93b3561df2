//! ============================================================================
//! HeyGen Client - Authenticated, logged access to the HeyGen API
//! ============================================================================
//! Every call goes through `request()`:
//! - refuses to dispatch without an API key (AuthenticationMissing)
//! - injects `X-Api-Key` / `Accept: application/json`
//! - records REQUEST before and RESPONSE after the call in the ActivityLog
//! - logs transport and parse failures as ERROR entries
//! - locks the vault on 401 instead of retrying
//!
//! The named operations turn non-2xx responses into `RemoteApiError`.
//! ============================================================================

use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::payload::{build_payload, endpoint_path};
use super::transport::{HttpRequest, HttpTransport, ReqwestTransport};
use crate::activity_log::ActivityLog;
use crate::config::StudioConfig;
use crate::content_type;
use crate::types::{
    ClientError, EngineVariant, GenerationJob, GenerationRequest, JobState, UploadResult,
    VideoStatus, VoiceOption,
};
use crate::vault::CredentialStore;
use crate::voices::parse_voices;

/// Longest raw error text carried into a `RemoteApiError`
const MAX_RAW_ERROR_CHARS: usize = 200;

/// Body attached to a request, with its Content-Type
#[derive(Debug, Clone)]
pub struct RequestBody {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl RequestBody {
    pub fn json(value: &Value) -> Self {
        Self {
            content_type: "application/json".to_string(),
            bytes: value.to_string().into_bytes(),
        }
    }

    pub fn binary(content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes,
        }
    }
}

/// Parsed response, whatever the HTTP status
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub ok: bool,
    /// Parsed JSON; `Null` when a non-2xx body was not JSON
    pub body: Value,
    pub raw: String,
}

/// Client for the HeyGen JSON and upload endpoints
pub struct HeyGenClient {
    transport: Arc<dyn HttpTransport>,
    vault: Arc<CredentialStore>,
    log: ActivityLog,
    api_base: String,
    upload_url: String,
}

impl HeyGenClient {
    /// Create a client that talks to HeyGen over reqwest
    pub fn new(config: &StudioConfig, vault: Arc<CredentialStore>, log: ActivityLog) -> Self {
        Self::with_transport(config, vault, log, Arc::new(ReqwestTransport::new()))
    }

    pub fn with_transport(
        config: &StudioConfig,
        vault: Arc<CredentialStore>,
        log: ActivityLog,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            vault,
            log,
            api_base: config.api_base_url.trim_end_matches('/').to_string(),
            upload_url: config.upload_url.clone(),
        }
    }

    pub fn vault(&self) -> &Arc<CredentialStore> {
        &self.vault
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    // ========================================================================
    // Core request pipeline
    // ========================================================================

    /// Send an authenticated request and parse the body.
    ///
    /// Non-2xx statuses are returned as `ApiResponse { ok: false, .. }`.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<RequestBody>,
    ) -> Result<ApiResponse, ClientError> {
        let credential = match self.vault.get() {
            Some(c) => c,
            None => {
                let err = ClientError::AuthenticationMissing;
                self.log.record_error("Client", &err.to_string());
                return Err(err);
            }
        };

        let method_name = method.as_str().to_string();
        self.log.record_request_start(&method_name, url);
        debug!("{} {}", method_name, url);

        let mut headers = vec![
            ("X-Api-Key".to_string(), credential.expose().to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ];
        let payload = body.map(|b| {
            headers.push(("Content-Type".to_string(), b.content_type));
            b.bytes
        });

        let request = HttpRequest {
            method,
            url: url.to_string(),
            headers,
            body: payload,
        };

        let response = match self.transport.send(request).await {
            Ok(r) => r,
            Err(message) => {
                warn!("{} {} failed: {}", method_name, url, message);
                self.log.record_error("Network", &message);
                return Err(ClientError::TransportError(message));
            }
        };

        let status = response.status;
        let ok = (200..300).contains(&status);
        self.log.record_request_end(&method_name, url, status, ok);
        debug!("{} {} -> {}", method_name, url, status);

        if status == 401 {
            self.lock_vault();
        }

        let body = match serde_json::from_str::<Value>(&response.body) {
            Ok(v) => v,
            Err(e) if ok => {
                let message = format!("{} {} returned non-JSON body: {}", method_name, url, e);
                self.log.record_error("Parse", &message);
                return Err(ClientError::MalformedResponse(message));
            }
            Err(_) => Value::Null,
        };

        Ok(ApiResponse {
            status,
            ok,
            body,
            raw: response.body,
        })
    }

    /// `request()` that fails on non-2xx, returning the parsed body
    async fn call(&self, method: Method, url: &str, body: Option<RequestBody>) -> Result<Value, ClientError> {
        let response = self.request(method, url, body).await?;
        if !response.ok {
            return Err(ClientError::RemoteApiError {
                status: response.status,
                message: extract_error_message(response.status, &response.body, &response.raw),
            });
        }
        Ok(response.body)
    }

    async fn get(&self, path: &str) -> Result<Value, ClientError> {
        self.call(Method::GET, &self.url(path), None).await
    }

    fn lock_vault(&self) {
        warn!("HeyGen rejected the API key (401); locking vault");
        if let Err(e) = self.vault.clear() {
            warn!("Failed to remove remembered API key: {}", e);
        }
        self.log
            .record_error("Auth", "API key rejected (401 Unauthorized); vault locked");
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    /// Voices, custom first then by name
    pub async fn list_voices(&self) -> Result<Vec<VoiceOption>, ClientError> {
        let body = self.get("/v2/voices").await?;
        let voices = parse_voices(&body);
        info!("Loaded {} voices", voices.len());
        Ok(voices)
    }

    /// Current-generation avatars (`data.avatars` / `data.talking_photos`)
    pub async fn list_avatars(&self) -> Result<Value, ClientError> {
        self.get("/v2/avatars").await
    }

    /// Photo avatar groups (`data.avatar_group_list`)
    pub async fn list_avatar_groups(&self) -> Result<Value, ClientError> {
        self.get("/v2/avatar_group.list").await
    }

    /// Looks inside one avatar group
    pub async fn get_group_detail(&self, group_id: &str) -> Result<Value, ClientError> {
        let path = format!("/v2/avatar_group/{}/avatars", urlencoding::encode(group_id));
        self.get(&path).await
    }

    /// Legacy (v1) talking photos
    pub async fn list_legacy_talking_photos(&self) -> Result<Value, ClientError> {
        self.get("/v1/talking_photo.list").await
    }

    /// Generic account assets (v1)
    pub async fn list_assets(&self) -> Result<Value, ClientError> {
        self.get("/v1/asset.list").await
    }

    // ========================================================================
    // Upload
    // ========================================================================

    /// Upload an image. The Content-Type comes from the bytes, not the caller.
    pub async fn upload_asset(
        &self,
        bytes: Vec<u8>,
        declared_type: Option<&str>,
    ) -> Result<UploadResult, ClientError> {
        if bytes.is_empty() {
            return Err(ClientError::InvalidRequest("upload payload is empty".to_string()));
        }

        let content_type = content_type::resolve(&bytes, declared_type);
        info!("Uploading {} bytes as {}", bytes.len(), content_type);

        let url = self.upload_url.clone();
        let body = self
            .call(Method::POST, &url, Some(RequestBody::binary(content_type, bytes)))
            .await?;

        let data = body.get("data").unwrap_or(&Value::Null);
        let id = string_field(data, "id");
        let image_key = string_field(data, "image_key");

        let asset_id = id.or_else(|| image_key.clone()).ok_or_else(|| {
            ClientError::MalformedResponse("upload response has neither id nor image_key".to_string())
        })?;

        info!("Upload complete: asset {}", asset_id);
        Ok(UploadResult { asset_id, image_key })
    }

    // ========================================================================
    // Generation
    // ========================================================================

    /// Submit a generation job with the schema of `engine`
    pub async fn generate_video(
        &self,
        request: &GenerationRequest,
        engine: EngineVariant,
    ) -> Result<GenerationJob, ClientError> {
        let payload = build_payload(request, engine)?;
        let url = self.url(endpoint_path(engine));

        info!("Submitting {} generation: {}", engine.as_str(), request.title);
        let body = self
            .call(Method::POST, &url, Some(RequestBody::json(&payload)))
            .await?;

        let video_id = body
            .get("data")
            .and_then(|d| string_field(d, "video_id"))
            .ok_or_else(|| ClientError::MalformedResponse("no video_id in generate response".to_string()))?;

        info!("Render started, video_id: {}", video_id);
        Ok(GenerationJob {
            video_id,
            title: request.title.clone(),
            script: request.script.clone(),
            voice_id: request.voice_id.clone(),
            speed: request.speed,
            engine_variant: engine,
            visual_asset_ref: request.visual_asset_ref.clone(),
        })
    }

    /// Current state of a submitted job
    pub async fn poll_status(&self, video_id: &str) -> Result<VideoStatus, ClientError> {
        let path = format!("/v1/video_status.get?video_id={}", urlencoding::encode(video_id));
        let body = self.get(&path).await?;
        let data = body
            .get("data")
            .filter(|d| d.is_object())
            .ok_or_else(|| ClientError::MalformedResponse("no data in status response".to_string()))?;

        let status = data
            .get("status")
            .and_then(Value::as_str)
            .map(JobState::parse)
            .ok_or_else(|| ClientError::MalformedResponse("no status in status response".to_string()))?;

        let error = match data.get("error") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(obj @ Value::Object(_)) => obj
                .get("message")
                .or_else(|| obj.get("detail"))
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        };

        Ok(VideoStatus {
            video_id: string_field(data, "id").unwrap_or_else(|| video_id.to_string()),
            status,
            video_url: string_field(data, "video_url"),
            thumbnail_url: string_field(data, "thumbnail_url"),
            duration: data.get("duration").and_then(Value::as_f64),
            error,
        })
    }

    /// Poll until the job completes or fails, or `timeout` elapses.
    ///
    /// On timeout the last observed status is returned.
    pub async fn wait_for_completion(
        &self,
        video_id: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<VideoStatus, ClientError> {
        let start = Instant::now();
        loop {
            let status = self.poll_status(video_id).await?;
            if status.status.is_terminal() {
                return Ok(status);
            }
            if start.elapsed() >= timeout {
                warn!(
                    "Video {} still {:?} after {}s",
                    video_id,
                    status.status,
                    start.elapsed().as_secs()
                );
                return Ok(status);
            }

            info!(
                "Video {} in progress (status: {:?}, elapsed: {}s)",
                video_id,
                status.status,
                start.elapsed().as_secs()
            );
            tokio::time::sleep(interval).await;
        }
    }
}

/// Message for a non-2xx response: `message`, then `error`, then raw text,
/// then a generic `HTTP Error <status>`.
pub fn extract_error_message(status: u16, body: &Value, raw: &str) -> String {
    let from_body = body
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| match body.get("error") {
            Some(Value::String(s)) => Some(s.as_str()),
            Some(obj @ Value::Object(_)) => obj.get("message").and_then(Value::as_str),
            _ => None,
        })
        .map(str::trim)
        .filter(|m| !m.is_empty());

    if let Some(message) = from_body {
        return message.to_string();
    }

    let raw = raw.trim();
    if !raw.is_empty() {
        return raw.chars().take(MAX_RAW_ERROR_CHARS).collect();
    }

    format!("HTTP Error {}", status)
}

/// String or numeric field as an owned, non-empty string
fn string_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity_log::EntryKind;
    use crate::client::testing::{test_client, ScriptedTransport};
    use serde_json::json;

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00];

    #[tokio::test]
    async fn test_missing_credential_makes_no_call() {
        let transport = ScriptedTransport::new();
        let (client, vault, log) = test_client(&transport);
        vault.clear().unwrap();

        let result = client.list_voices().await;
        assert_eq!(result, Err(ClientError::AuthenticationMissing));
        assert_eq!(transport.call_count(), 0);
        assert_eq!(log.snapshot().last().map(|e| e.kind), Some(EntryKind::Error));
    }

    #[tokio::test]
    async fn test_request_injects_headers_and_logs() {
        let transport = ScriptedTransport::new();
        transport.reply("/v2/voices", 200, json!({ "data": { "voices": [] } }));
        let (client, _vault, log) = test_client(&transport);

        client.list_voices().await.unwrap();

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, Method::GET);
        assert_eq!(sent[0].url, "https://api.test/v2/voices");
        assert_eq!(sent[0].header("x-api-key"), Some("test-key"));
        assert_eq!(sent[0].header("Accept"), Some("application/json"));

        let entries = log.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, EntryKind::Request);
        assert_eq!(entries[1].kind, EntryKind::Response);
        assert!(entries[1].ok);

        // The key never reaches the log
        let dump = serde_json::to_string(&entries).unwrap();
        assert!(!dump.contains("test-key"));
    }

    #[tokio::test]
    async fn test_unauthorized_locks_vault() {
        let transport = ScriptedTransport::new();
        transport.reply("/v2/voices", 401, json!({ "error": { "message": "Unauthorized" } }));
        let (client, vault, log) = test_client(&transport);

        let err = client.list_voices().await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(vault.get().is_none());
        assert!(log
            .snapshot()
            .iter()
            .any(|e| e.kind == EntryKind::Error && e.source.as_deref() == Some("Auth")));

        let next = client.list_voices().await;
        assert_eq!(next, Err(ClientError::AuthenticationMissing));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_non_2xx_is_logged_and_parsed() {
        let transport = ScriptedTransport::new();
        transport.reply("/v2/avatars", 400, json!({ "message": "bad request" }));
        let (client, _vault, log) = test_client(&transport);

        let raw = client
            .request(Method::GET, "https://api.test/v2/avatars", None)
            .await
            .unwrap();
        assert!(!raw.ok);
        assert_eq!(raw.status, 400);
        assert_eq!(raw.body["message"], "bad request");

        let err = client.list_avatars().await.unwrap_err();
        assert_eq!(
            err,
            ClientError::RemoteApiError { status: 400, message: "bad request".to_string() }
        );

        let last = log.snapshot().pop().unwrap();
        assert_eq!(last.kind, EntryKind::Response);
        assert!(!last.ok);
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(extract_error_message(400, &json!({ "message": "m" }), ""), "m");
        assert_eq!(extract_error_message(400, &json!({ "error": "e" }), ""), "e");
        assert_eq!(
            extract_error_message(400, &json!({ "error": { "code": 1, "message": "nested" } }), ""),
            "nested"
        );
        assert_eq!(extract_error_message(502, &Value::Null, "Bad Gateway"), "Bad Gateway");
        assert_eq!(extract_error_message(500, &Value::Null, "  "), "HTTP Error 500");
        assert_eq!(extract_error_message(500, &json!({ "message": "" }), ""), "HTTP Error 500");
    }

    #[tokio::test]
    async fn test_transport_failure_is_logged_as_network() {
        let transport = ScriptedTransport::new();
        transport.fail("/v2/voices", "dns error: no such host");
        let (client, _vault, log) = test_client(&transport);

        let err = client.list_voices().await.unwrap_err();
        assert!(matches!(err, ClientError::TransportError(ref m) if m.contains("dns")));

        let last = log.snapshot().pop().unwrap();
        assert_eq!(last.kind, EntryKind::Error);
        assert_eq!(last.source.as_deref(), Some("Network"));
    }

    #[tokio::test]
    async fn test_malformed_success_body() {
        let transport = ScriptedTransport::new();
        transport.reply_raw("/v1/asset.list", 200, "<html>oops</html>");
        let (client, _vault, log) = test_client(&transport);

        let err = client.list_assets().await.unwrap_err();
        assert!(matches!(err, ClientError::MalformedResponse(_)));
        assert_eq!(log.snapshot().pop().unwrap().source.as_deref(), Some("Parse"));
    }

    #[tokio::test]
    async fn test_upload_overrides_declared_type() {
        let transport = ScriptedTransport::new();
        transport.reply(
            "https://upload.test/v1/asset",
            200,
            json!({ "data": { "id": "asset_1", "image_key": "image/asset_1.png" } }),
        );
        let (client, _vault, _log) = test_client(&transport);

        let result = client.upload_asset(PNG.to_vec(), Some("image/jpeg")).await.unwrap();
        assert_eq!(result.asset_id, "asset_1");
        assert_eq!(result.image_key.as_deref(), Some("image/asset_1.png"));

        let sent = transport.requests();
        assert_eq!(sent[0].method, Method::POST);
        assert_eq!(sent[0].header("Content-Type"), Some("image/png"));
        assert_eq!(sent[0].body.as_deref(), Some(PNG));
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_payload() {
        let transport = ScriptedTransport::new();
        let (client, _vault, _log) = test_client(&transport);

        let err = client.upload_asset(Vec::new(), Some("image/png")).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_falls_back_to_image_key() {
        let transport = ScriptedTransport::new();
        transport.reply("upload.test", 200, json!({ "data": { "image_key": "image/k" } }));
        let (client, _vault, _log) = test_client(&transport);

        let result = client.upload_asset(b"unknown".to_vec(), None).await.unwrap();
        assert_eq!(result.asset_id, "image/k");
        assert_eq!(transport.requests()[0].header("content-type"), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn test_generate_simplified_body() {
        let transport = ScriptedTransport::new();
        transport.reply("/v2/video/av4/generate", 200, json!({ "data": { "video_id": "vid_1" } }));
        let (client, _vault, _log) = test_client(&transport);

        let request = GenerationRequest::new("abc", "hi", "v1").with_speed(1.25);
        let job = client
            .generate_video(&request, EngineVariant::Simplified)
            .await
            .unwrap();
        assert_eq!(job.video_id, "vid_1");
        assert_eq!(job.engine_variant, EngineVariant::Simplified);

        let sent = transport.requests();
        assert_eq!(sent[0].url, "https://api.test/v2/video/av4/generate");
        assert_eq!(sent[0].header("Content-Type"), Some("application/json"));
        let body: Value = serde_json::from_slice(sent[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["voice_settings"]["speed"], 1.25);
        assert_eq!(body["image_key"], "abc");
        assert!(body.get("video_inputs").is_none());
    }

    #[tokio::test]
    async fn test_generate_structured_endpoint() {
        let transport = ScriptedTransport::new();
        transport.reply("/v2/video/generate", 200, json!({ "data": { "video_id": "vid_2" } }));
        let (client, _vault, _log) = test_client(&transport);

        let request = GenerationRequest::new("tp_1", "hello there", "v1");
        let job = client
            .generate_video(&request, EngineVariant::Structured)
            .await
            .unwrap();
        assert_eq!(job.video_id, "vid_2");

        let sent = transport.requests();
        assert_eq!(sent[0].url, "https://api.test/v2/video/generate");
        let body: Value = serde_json::from_slice(sent[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["video_inputs"][0]["character"]["talking_photo_id"], "tp_1");
    }

    #[tokio::test]
    async fn test_generate_without_video_id_is_malformed() {
        let transport = ScriptedTransport::new();
        transport.reply("/v2/video/av4/generate", 200, json!({ "data": {} }));
        let (client, _vault, _log) = test_client(&transport);

        let request = GenerationRequest::new("abc", "hi", "v1");
        let err = client
            .generate_video(&request, EngineVariant::Simplified)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_poll_status() {
        let transport = ScriptedTransport::new();
        transport.reply(
            "/v1/video_status.get",
            200,
            json!({ "data": {
                "id": "vid 1",
                "status": "completed",
                "video_url": "https://cdn.test/v.mp4",
                "duration": 12.5,
                "error": null
            } }),
        );
        let (client, _vault, _log) = test_client(&transport);

        let status = client.poll_status("vid 1").await.unwrap();
        assert_eq!(status.status, JobState::Completed);
        assert_eq!(status.video_url.as_deref(), Some("https://cdn.test/v.mp4"));
        assert_eq!(status.duration, Some(12.5));
        assert!(status.error.is_none());
        assert!(transport.requests()[0].url.ends_with("video_id=vid%201"));
    }

    #[tokio::test]
    async fn test_wait_returns_on_terminal_state() {
        let transport = ScriptedTransport::new();
        transport.reply(
            "/v1/video_status.get",
            200,
            json!({ "data": { "status": "failed", "error": { "message": "bad photo" } } }),
        );
        let (client, _vault, _log) = test_client(&transport);

        let status = client
            .wait_for_completion("vid_1", Duration::from_millis(1), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(status.status, JobState::Failed);
        assert_eq!(status.error.as_deref(), Some("bad photo"));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_wait_gives_up_after_timeout() {
        let transport = ScriptedTransport::new();
        transport.reply("/v1/video_status.get", 200, json!({ "data": { "status": "processing" } }));
        let (client, _vault, _log) = test_client(&transport);

        let status = client
            .wait_for_completion("vid_1", Duration::from_millis(1), Duration::from_millis(0))
            .await
            .unwrap();
        assert_eq!(status.status, JobState::Processing);
    }
}
