use reqwest::blocking::Client;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;
use tracing::debug;

use super::AnkiClient;
use crate::core::AnkimdError;

pub const DEFAULT_URL: &str = "http://127.0.0.1:8765";
const API_VERSION: u32 = 6;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub result: Option<T>,
    pub error: Option<String>,
}

/// Blocking AnkiConnect client. Every action is one POST of
/// `{action, version, params}` against the local HTTP server.
pub struct HttpClient {
    client: Client,
    url: String,
}

impl HttpClient {
    pub fn new(url: impl Into<String>) -> Self {
        HttpClient { client: Client::new(), url: url.into() }
    }

    /// Probes the server before a run so a missing Anki instance fails with
    /// one clear message instead of failing the first real action.
    pub fn check_connection(&self) -> Result<u64, AnkimdError> {
        self.version().map_err(|_| {
            AnkimdError::Custom(
                "could not reach AnkiConnect. Check that Anki is open and AnkiConnect is installed"
                    .to_string(),
            )
        })
    }
}

impl AnkiClient for HttpClient {
    fn call(&self, action: &str, params: Value) -> Result<Value, AnkimdError> {
        debug!("requesting action '{}'", action);

        let mut body = serde_json::Map::new();
        body.insert("action".to_string(), Value::String(action.to_string()));
        body.insert("version".to_string(), Value::Number(API_VERSION.into()));

        if !params.is_null() {
            body.insert("params".to_string(), params);
        }

        let response: ApiResponse<Value> =
            self.client.post(&self.url).json(&body).send()?.json()?;

        if let Some(message) = response.error {
            return Err(AnkimdError::Anki { action: action.to_string(), message });
        }

        Ok(response.result.unwrap_or(Value::Null))
    }
}
