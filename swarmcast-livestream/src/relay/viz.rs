// Streaming visualisation events.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::address::StreamAddress;

/// Observability sink for broadcast and consumption events. Fire-and-forget.
pub trait VizSink: Send + Sync {
    fn log_broadcast(&self, address: &StreamAddress);
    fn log_consume(&self, address: &StreamAddress);
}

#[derive(Debug, Clone, Serialize)]
struct VizEvent<'a> {
    name: &'static str,
    node: &'a str,
    stream_id: &'a str,
    timestamp: i64,
}

/// Logs every event and, when a collector endpoint is configured, POSTs it
/// there from a background task.
pub struct VizClient {
    node: String,
    endpoint: Option<Arc<str>>,
    http: reqwest::Client,
}

impl VizClient {
    #[must_use]
    pub fn new(node: impl Into<String>, endpoint: Option<String>) -> Self {
        Self {
            node: node.into(),
            endpoint: endpoint.map(|e| Arc::from(e.trim_end_matches('/'))),
            http: reqwest::Client::new(),
        }
    }

    fn emit(&self, name: &'static str, address: &StreamAddress) {
        info!(event = name, stream_id = %address, "viz");

        let Some(endpoint) = self.endpoint.clone() else {
            return;
        };
        // Outside a runtime there is nowhere to run the upload
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let body = match serde_json::to_vec(&VizEvent {
            name,
            node: &self.node,
            stream_id: address.as_str(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }) {
            Ok(body) => body,
            Err(e) => {
                debug!("Failed to encode viz event: {}", e);
                return;
            }
        };

        let http = self.http.clone();
        runtime.spawn(async move {
            let url = format!("{endpoint}/event");
            let result = http
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await;
            if let Err(e) = result {
                debug!(url = %url, "Viz upload failed: {}", e);
            }
        });
    }
}

impl VizSink for VizClient {
    fn log_broadcast(&self, address: &StreamAddress) {
        self.emit("broadcast", address);
    }

    fn log_consume(&self, address: &StreamAddress) {
        self.emit("consume", address);
    }
}
