use bytes::Bytes;
use http::Request;
use std::borrow::Cow;
use std::net::SocketAddr;

/// A response payload could not be turned into loggable bytes.
#[derive(Debug, Clone, thiserror::Error)]
#[error("payload can not be rendered: {0}")]
pub struct RenderError(pub String);

/// Capability of a response payload to describe itself in an access log.
///
/// Payload types that have no stable encoding should return an error; the
/// access log then substitutes a fixed marker for the body.
pub trait LogRender: Send + Sync {
    fn render_for_log(&self) -> Result<Cow<'_, [u8]>, RenderError>;
}

impl LogRender for Bytes {
    fn render_for_log(&self) -> Result<Cow<'_, [u8]>, RenderError> {
        Ok(Cow::Borrowed(self.as_ref()))
    }
}

impl LogRender for Vec<u8> {
    fn render_for_log(&self) -> Result<Cow<'_, [u8]>, RenderError> {
        Ok(Cow::Borrowed(self.as_slice()))
    }
}

impl LogRender for String {
    fn render_for_log(&self) -> Result<Cow<'_, [u8]>, RenderError> {
        Ok(Cow::Borrowed(self.as_bytes()))
    }
}

impl LogRender for &'static str {
    fn render_for_log(&self) -> Result<Cow<'_, [u8]>, RenderError> {
        Ok(Cow::Borrowed(self.as_bytes()))
    }
}

impl LogRender for serde_json::Value {
    fn render_for_log(&self) -> Result<Cow<'_, [u8]>, RenderError> {
        serde_json::to_vec(self)
            .map(Cow::Owned)
            .map_err(|e| RenderError(e.to_string()))
    }
}

/// Payload with no log representation (streams, handles, foreign objects).
#[derive(Debug, Clone, Copy)]
pub struct Opaque(pub &'static str);

impl LogRender for Opaque {
    fn render_for_log(&self) -> Result<Cow<'_, [u8]>, RenderError> {
        Err(RenderError(format!("{} has no log encoding", self.0)))
    }
}

/// Per-request state shared by every filter of a chain.
///
/// Downstream handling records its outcome here: the invocation error (if
/// any) in `err` and the produced payload in `target_resp`.
pub struct HttpContext {
    pub request: Request<Bytes>,
    /// Peer address of the client connection.
    pub remote_addr: SocketAddr,
    /// Error raised while invoking the downstream service.
    pub err: Option<anyhow::Error>,
    /// Response produced by downstream handling.
    pub target_resp: Option<Box<dyn LogRender>>,
    /// Status the host sends back. Owned by the host and its endpoint;
    /// filters may read it but the access-log line does not include it.
    pub response_status: Option<u16>,
}

impl HttpContext {
    pub fn new(request: Request<Bytes>, remote_addr: SocketAddr) -> Self {
        Self {
            request,
            remote_addr,
            err: None,
            target_resp: None,
            response_status: None,
        }
    }

    /// Destination host: the `Host` header, else the URI authority.
    pub fn host(&self) -> &str {
        if let Some(host) = self
            .request
            .headers()
            .get(http::header::HOST)
            .and_then(|v| v.to_str().ok())
        {
            return host;
        }
        self.request
            .uri()
            .authority()
            .map(|a| a.as_str())
            .unwrap_or("")
    }

    /// Query string without the leading `?`, empty when absent.
    #[inline]
    pub fn raw_query(&self) -> &str {
        self.request.uri().query().unwrap_or("")
    }

    /// Query parameters in request order. Values are not percent-decoded.
    pub fn query_params(&self) -> Vec<(&str, &str)> {
        self.raw_query()
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
            .collect()
    }

    pub fn set_response(&mut self, payload: impl LogRender + 'static) {
        self.target_resp = Some(Box::new(payload));
    }

    pub fn set_error(&mut self, err: impl Into<anyhow::Error>) {
        self.err = Some(err.into());
    }
}
