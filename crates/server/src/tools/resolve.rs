//! resolve tool implementation.
//!
//! Runs one request through the full interception pipeline and reports
//! what a host should do with it.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use overcast_core::Error;
use overcast_engine::{Disposition, Engine, InterceptRequest};

/// Parameters for the resolve tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResolveParams {
    /// The request URL.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Referrer, if the request has one.
    #[serde(default)]
    pub referrer: Option<String>,

    /// True for a top-level navigation.
    #[serde(default)]
    pub navigate: bool,

    /// Accept header, if the host passes one through.
    #[serde(default)]
    pub accept: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the resolve tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResolveOutput {
    /// False means pass-through: forward to default handling unmodified.
    pub intercepted: bool,
    /// Where the response came from (cache, network, fallback,
    /// offline-page); absent on pass-through.
    pub source: Option<String>,
    pub status: Option<u16>,
    pub content_type: Option<String>,
    /// Body for textual content types; binary bodies report length only.
    pub body_text: Option<String>,
    pub body_len: usize,
}

/// Implementation of the resolve tool.
pub async fn resolve_impl(engine: &Engine, params: ResolveParams) -> Result<CallToolResult, McpError> {
    if params.url.is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let mut request = InterceptRequest::get(params.url).with_method(params.method);
    request.navigate = params.navigate;
    request.referrer = params.referrer;
    request.accept = params.accept;

    let output = match engine.intercept(&request).await {
        Disposition::PassThrough => ResolveOutput {
            intercepted: false,
            source: None,
            status: None,
            content_type: None,
            body_text: None,
            body_len: 0,
        },
        Disposition::Response(resolved) => {
            let body_text = textual(resolved.content_type.as_deref())
                .then(|| String::from_utf8_lossy(&resolved.body).to_string());
            ResolveOutput {
                intercepted: true,
                source: Some(resolved.source.to_string()),
                status: Some(resolved.status),
                content_type: resolved.content_type,
                body_text,
                body_len: resolved.body.len(),
            }
        }
    };

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

fn textual(content_type: Option<&str>) -> bool {
    match content_type {
        None => false,
        Some(ct) => {
            ct.starts_with("text/")
                || ct.contains("json")
                || ct.contains("javascript")
                || ct.contains("xml")
                || ct.contains("svg")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use overcast_client::{FetchConfig, NetClient};
    use overcast_core::{AppConfig, CacheStore};
    use std::sync::Arc;

    async fn idle_engine() -> Engine {
        let store = CacheStore::open_in_memory().await.unwrap();
        let net = Arc::new(NetClient::new(FetchConfig::default()).unwrap());
        Engine::new(Arc::new(AppConfig::default()), store, net)
    }

    fn output_of(result: &CallToolResult) -> ResolveOutput {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_empty_url_is_invalid() {
        let engine = idle_engine().await;
        let params = ResolveParams {
            url: String::new(),
            method: "GET".into(),
            referrer: None,
            navigate: false,
            accept: None,
        };

        let result = resolve_impl(&engine, params).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_resolve_before_install_passes_through() {
        let engine = idle_engine().await;
        let params = ResolveParams {
            url: "http://localhost:8000/a.css".into(),
            method: "GET".into(),
            referrer: None,
            navigate: false,
            accept: None,
        };

        let result = resolve_impl(&engine, params).await.unwrap();
        let output = output_of(&result);
        assert!(!output.intercepted);
        assert!(output.status.is_none());
    }

    #[test]
    fn test_textual_content_types() {
        assert!(textual(Some("text/css")));
        assert!(textual(Some("application/json; charset=utf-8")));
        assert!(textual(Some("image/svg+xml")));
        assert!(!textual(Some("image/png")));
        assert!(!textual(None));
    }
}
