// Request routing
// Maps (method, path) pairs onto handlers and handler results onto responses

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::handlers::{timestamp, ApiContext};
use super::schemas::ErrorResponse;
use crate::error::RsaError;
use crate::session::DEFAULT_SESSION;

/// One request as received by the transport
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiRequest {
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub body: Option<Value>,
}

/// One response for the transport to hand back
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub id: Option<Value>,
    pub status: u16,
    pub body: Value,
}

/// Failures of the routing layer itself, plus engine errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Rsa(#[from] RsaError),

    #[error("No route for {0}")]
    NotFound(String),

    #[error("Method {method} not allowed for {path}")]
    MethodNotAllowed { method: String, path: String },
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Rsa(e) => e.status(),
            ApiError::NotFound(_) => 404,
            ApiError::MethodNotAllowed { .. } => 405,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Rsa(e) => e.kind(),
            ApiError::NotFound(_) => "not_found",
            ApiError::MethodNotAllowed { .. } => "method_not_allowed",
        }
    }

    fn detail(&self) -> String {
        match self {
            ApiError::Rsa(e) => e.detail().to_string(),
            other => other.to_string(),
        }
    }

    pub fn to_response_body(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.kind().to_string(),
            detail: self.detail(),
            timestamp: timestamp(),
        }
    }
}

const ROUTES: [(&str, &str); 16] = [
    ("GET", "/"),
    ("POST", "/sessions"),
    ("DELETE", "/sessions"),
    ("POST", "/primes/generate"),
    ("GET", "/primes/current"),
    ("DELETE", "/primes/clear"),
    ("POST", "/keys/generate"),
    ("GET", "/keys/current"),
    ("POST", "/keys/validate"),
    ("POST", "/crypto/encrypt"),
    ("POST", "/crypto/decrypt"),
    ("POST", "/crypto/encrypt-with-stored-keys"),
    ("POST", "/crypto/decrypt-with-stored-keys"),
    ("GET", "/health"),
    ("GET", "/health/ready"),
    ("GET", "/health/live"),
];

#[derive(Clone)]
pub struct Router {
    context: ApiContext,
}

impl Router {
    pub fn new(context: ApiContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &ApiContext {
        &self.context
    }

    /// Handle one request; never fails, errors become error responses
    pub async fn handle(&self, request: ApiRequest) -> ApiResponse {
        let method = request.method.to_ascii_uppercase();
        let path = normalize_path(&request.path);
        let session = request.session_id.as_deref().unwrap_or(DEFAULT_SESSION);
        log::debug!("{} {} (session {})", method, path, session);

        let body = request.body.unwrap_or(Value::Null);
        match self.route(&method, &path, session, body).await {
            Ok(body) => ApiResponse {
                id: request.id,
                status: 200,
                body,
            },
            Err(err) => {
                if err.status() >= 500 {
                    log::error!("{} {} failed: {}", method, path, err);
                } else {
                    log::warn!("{} {} rejected: {}", method, path, err);
                }
                ApiResponse {
                    id: request.id,
                    status: err.status(),
                    body: serde_json::to_value(err.to_response_body()).unwrap_or(Value::Null),
                }
            }
        }
    }

    /// Handle one JSON-encoded request line. A line that does not decode
    /// into a request gets a 400 response, echoing its `id` when one is readable.
    pub async fn handle_line(&self, line: &str) -> ApiResponse {
        match serde_json::from_str::<ApiRequest>(line) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                log::warn!("Unparsable request line: {}", e);
                malformed_request(line, &e)
            }
        }
    }

    async fn route(&self, method: &str, path: &str, session: &str, body: Value) -> Result<Value, ApiError> {
        let ctx = &self.context;
        match (method, path) {
            ("GET", "/") => Ok(ctx.info()),
            ("POST", "/sessions") => to_json(ctx.create_session()),
            ("DELETE", "/sessions") => to_json(ctx.delete_session(session)?),
            ("POST", "/primes/generate") => to_json(ctx.generate_primes(session, parse_body(body)?).await?),
            ("GET", "/primes/current") => to_json(ctx.current_primes(session)?),
            ("DELETE", "/primes/clear") => to_json(ctx.clear_primes(session)?),
            ("POST", "/keys/generate") => to_json(ctx.generate_keys(session, parse_body(body)?).await?),
            ("GET", "/keys/current") => to_json(ctx.current_keys(session)?),
            ("POST", "/keys/validate") => to_json(ctx.validate_keys(session)?),
            ("POST", "/crypto/encrypt") => to_json(ctx.encrypt(parse_body(body)?).await?),
            ("POST", "/crypto/decrypt") => to_json(ctx.decrypt(parse_body(body)?).await?),
            ("POST", "/crypto/encrypt-with-stored-keys") => {
                to_json(ctx.encrypt_with_stored_keys(session, parse_body(body)?).await?)
            }
            ("POST", "/crypto/decrypt-with-stored-keys") => {
                to_json(ctx.decrypt_with_stored_keys(session, parse_body(body)?).await?)
            }
            ("GET", "/health") => to_json(ctx.health(session)?),
            ("GET", "/health/ready") => Ok(ctx.readiness(session)?),
            ("GET", "/health/live") => Ok(ctx.liveness()),
            _ if ROUTES.iter().any(|(_, known)| *known == path) => Err(ApiError::MethodNotAllowed {
                method: method.to_string(),
                path: path.to_string(),
            }),
            _ => Err(ApiError::NotFound(path.to_string())),
        }
    }
}

fn malformed_request(line: &str, err: &serde_json::Error) -> ApiResponse {
    let id = serde_json::from_str::<Value>(line)
        .ok()
        .and_then(|value| value.get("id").cloned());
    let error = ApiError::Rsa(RsaError::InvalidParameter(format!("malformed request: {}", err)));
    ApiResponse {
        id,
        status: error.status(),
        body: serde_json::to_value(error.to_response_body()).unwrap_or(Value::Null),
    }
}

/// Strip the optional `/api` prefix and any trailing slash
fn normalize_path(path: &str) -> String {
    let path = path.split('?').next().unwrap_or_default();
    let path = match path.strip_prefix("/api") {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => path,
    };
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Absent bodies deserialize as `{}` so optional-field requests need none
fn parse_body<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    let body = if body.is_null() { Value::Object(Default::default()) } else { body };
    serde_json::from_value(body)
        .map_err(|e| ApiError::Rsa(RsaError::InvalidParameter(format!("malformed request body: {}", e))))
}

fn to_json<T: Serialize>(value: T) -> Result<Value, ApiError> {
    serde_json::to_value(value)
        .map_err(|e| ApiError::Rsa(RsaError::Internal(format!("response serialization failed: {}", e))))
}
