//! `http_request` — call an external API.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::{ParamDescriptor, Trigger, TriggerContext, TriggerDescriptor, TriggerError};

const METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE"];

pub struct HttpRequestTrigger {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpRequestTrigger {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HttpRequestParams {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct HttpResponse {
    pub status: u16,
    /// Parsed JSON when the body is JSON, the raw text otherwise.
    pub body: Value,
}

#[async_trait]
impl Trigger for HttpRequestTrigger {
    type Params = HttpRequestParams;
    type Output = HttpResponse;

    fn descriptor(&self) -> TriggerDescriptor {
        TriggerDescriptor {
            id: "http_request".into(),
            name: "API request".into(),
            description: "Sends an HTTP request and returns the response".into(),
            language: "http".into(),
            params: vec![
                ParamDescriptor::string("url", "URL").required(),
                ParamDescriptor::select("method", "Method", METHODS)
                    .required()
                    .with_default(json!("GET")),
                ParamDescriptor::json("body", "Body")
                    .describe("JSON body, sent for POST, PUT and PATCH"),
                ParamDescriptor::object("headers", "Headers")
                    .describe("Header names mapped to values"),
            ],
        }
    }

    async fn execute(
        &self,
        params: HttpRequestParams,
        _ctx: &TriggerContext,
    ) -> Result<HttpResponse, TriggerError> {
        let method = Method::from_bytes(params.method.to_uppercase().as_bytes())
            .map_err(|_| TriggerError::InvalidParams(format!("unknown method {}", params.method)))?;
        debug!(%method, url = %params.url, "sending request");

        let mut request = self
            .client
            .request(method.clone(), &params.url)
            .timeout(self.timeout);
        for (key, value) in &params.headers {
            request = request.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &params.body {
            if method == Method::POST || method == Method::PUT || method == Method::PATCH {
                request = request.json(&parse_body(body));
            }
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TriggerError::failed(format!("HTTP {status}")));
        }

        let text = response.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(HttpResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// Form inputs deliver the body as a string; send it as JSON when it parses.
fn parse_body(body: &Value) -> Value {
    match body {
        Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| body.clone()),
        other => other.clone(),
    }
}
