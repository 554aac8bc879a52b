use reqwest::Url;
use tracing::debug;

use crate::config::Config;
use crate::errors::ChatError;
use crate::models::HandshakeContext;

/// Port the interviewer backend listens on when the endpoint is derived from the page origin.
pub const BACKEND_PORT: u16 = 8000;
pub const CHAT_PATH: &str = "/api/chat";

/// Which precedence rule produced an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointSource {
    Context,
    Config,
    Constructed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub url: String,
    pub source: EndpointSource,
}

/// Chat endpoint resolution. First match wins:
/// 1. `websocketUrl` from the handshake context
/// 2. the process-wide configured URL
/// 3. `ws(s)://<origin host>:8000/api/chat`, secure iff the origin is `https`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPolicy {
    configured: Option<String>,
    page_origin: String,
}

impl EndpointPolicy {
    pub fn new(configured: Option<String>, page_origin: impl Into<String>) -> Self {
        Self {
            configured,
            page_origin: page_origin.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.ws_url.clone(), config.page_origin.clone())
    }

    pub fn resolve(&self, context: Option<&HandshakeContext>) -> Result<ResolvedEndpoint, ChatError> {
        if let Some(url) = context.and_then(|c| non_blank(c.websocket_url.as_deref())) {
            return Ok(ResolvedEndpoint {
                url: url.to_string(),
                source: EndpointSource::Context,
            });
        }

        if let Some(url) = non_blank(self.configured.as_deref()) {
            return Ok(ResolvedEndpoint {
                url: url.to_string(),
                source: EndpointSource::Config,
            });
        }

        let url = self.construct(context)?;
        debug!("Constructed chat endpoint {url} from origin {}", self.page_origin);
        Ok(ResolvedEndpoint {
            url,
            source: EndpointSource::Constructed,
        })
    }

    fn construct(&self, context: Option<&HandshakeContext>) -> Result<String, ChatError> {
        let origin = Url::parse(self.page_origin.trim())
            .map_err(|e| ChatError::InvalidEndpoint(format!("page origin '{}': {e}", self.page_origin)))?;

        let scheme = if origin.scheme() == "https" { "wss" } else { "ws" };
        let host = origin.host_str().ok_or_else(|| {
            ChatError::InvalidEndpoint(format!("page origin '{}' has no host", self.page_origin))
        })?;

        let mut url = Url::parse(&format!("{scheme}://{host}:{BACKEND_PORT}{CHAT_PATH}"))
            .map_err(|e| ChatError::InvalidEndpoint(e.to_string()))?;

        // The backend refuses chat sockets that do not identify the application.
        if let Some(ctx) = context {
            let mut query = url.query_pairs_mut();
            if let Some(id) = ctx.application_id {
                query.append_pair("applicationId", &id.to_string());
            }
            if let Some(id) = ctx.user_id {
                query.append_pair("userId", &id.to_string());
            }
        }

        // `query_pairs_mut` leaves a bare `?` behind when nothing was appended.
        if url.query() == Some("") {
            url.set_query(None);
        }

        Ok(url.to_string())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
