use std::fmt;

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::helpers::time::now_i64;

/// inbound distributed-trace header
pub const TRACE_HEADER: &str = "x-amzn-trace-id";
/// outbound id header, always set
pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Id from a trace header value, or a freshly generated one.
    pub fn resolve(trace_header: Option<&str>) -> Self {
        trace_header
            .and_then(parse_trace_id)
            .map(Self)
            .unwrap_or_else(Self::generate)
    }

    pub fn generate() -> Self {
        Self(new_trace_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `Root=1-5759e988-bd862e3fe1be46a994272793;Parent=53995c3f42cd8ad8;Sampled=1`
/// yields `1-5759e988-bd862e3fe1be46a994272793`.
pub fn parse_trace_id(header: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|part| part.trim().split_once('='))
        .find(|(key, _)| key.trim() == "Root")
        .map(|(_, value)| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// X-Ray layout: version, epoch seconds as 8 hex digits, 96 random bits.
pub fn new_trace_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("1-{:08x}-{}", now_i64() as u32, &random[..24])
}

/// Resolves the id, runs the rest of the pipeline inside a span carrying it, echoes it back.
pub async fn correlation_id(mut req: Request, next: Next) -> Response {
    let trace_header = req
        .headers()
        .get(TRACE_HEADER)
        .and_then(|value| value.to_str().ok());
    let id = CorrelationId::resolve(trace_header);

    req.extensions_mut().insert(id.clone());
    let span = info_span!("request", correlation_id = %id);
    let mut response = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}
