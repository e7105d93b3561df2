//! Scripted transport for client and discovery tests.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};

use super::api::HeyGenClient;
use super::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::activity_log::ActivityLog;
use crate::config::StudioConfig;
use crate::vault::CredentialStore;

#[derive(Clone)]
enum Reply {
    Respond { status: u16, body: String },
    Fail(String),
}

#[derive(Default)]
struct Script {
    routes: Vec<(String, Reply)>,
    requests: Vec<HttpRequest>,
}

/// Answers by the longest route fragment contained in the URL; replies are
/// reusable. Unrouted URLs get a 404.
#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(&self, fragment: &str, status: u16, body: Value) {
        self.route(fragment, Reply::Respond { status, body: body.to_string() });
    }

    pub(crate) fn reply_raw(&self, fragment: &str, status: u16, body: &str) {
        self.route(fragment, Reply::Respond { status, body: body.to_string() });
    }

    pub(crate) fn fail(&self, fragment: &str, message: &str) {
        self.route(fragment, Reply::Fail(message.to_string()));
    }

    fn route(&self, fragment: &str, reply: Reply) {
        let mut script = self.script.lock().unwrap();
        script.routes.retain(|(f, _)| f != fragment);
        script.routes.push((fragment.to_string(), reply));
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.script.lock().unwrap().requests.clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.script.lock().unwrap().requests.len()
    }

    /// Requests whose URL contains `fragment`
    pub(crate) fn calls_to(&self, fragment: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|r| r.url.contains(fragment))
            .count()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let mut script = self.script.lock().unwrap();
        let reply = script
            .routes
            .iter()
            .filter(|(fragment, _)| request.url.contains(fragment.as_str()))
            .max_by_key(|(fragment, _)| fragment.len())
            .map(|(_, reply)| reply.clone());
        script.requests.push(request);

        match reply {
            Some(Reply::Respond { status, body }) => Ok(HttpResponse { status, body }),
            Some(Reply::Fail(message)) => Err(message),
            None => Ok(HttpResponse {
                status: 404,
                body: r#"{"message":"not found"}"#.to_string(),
            }),
        }
    }
}

pub(crate) fn test_config() -> StudioConfig {
    StudioConfig {
        api_base_url: "https://api.test".to_string(),
        upload_url: "https://upload.test/v1/asset".to_string(),
        ..StudioConfig::default()
    }
}

/// Client over `transport`, unlocked with key `test-key`
pub(crate) fn test_client(
    transport: &ScriptedTransport,
) -> (HeyGenClient, Arc<CredentialStore>, ActivityLog) {
    let vault = Arc::new(CredentialStore::in_memory());
    vault.set("test-key", false).unwrap();
    let log = ActivityLog::new();
    let client = HeyGenClient::with_transport(
        &test_config(),
        vault.clone(),
        log.clone(),
        Arc::new(transport.clone()),
    );
    (client, vault, log)
}
