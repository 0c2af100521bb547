//! Every backend call goes through [`RequestPipeline`]: bearer attach, envelope
//! unwrapping, failure classification and operator notifications.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use shared::{
    error::{
        Failure, FailureKind, DEFAULT_FAILURE_MESSAGE, DEFAULT_SUCCESS_MESSAGE,
        NETWORK_ERROR_MESSAGE,
    },
    protocol::Envelope,
};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    config::{normalize_base_url, ConsoleSettings},
    navigation::{is_at_path, HeadlessNavigator, Navigator},
    notify::{Notifier, NotifyKind, TracingNotifier},
    session::{AuthSession, SessionError, SessionStore},
    transport::{Method, ReqwestTransport, Transport, TransportRequest, TransportResponse},
};

/// Malformed calls. Expected failures never surface here; they come back as a
/// failed [`RequestResult`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid base url '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("invalid request path '{path}': {source}")]
    InvalidPath {
        path: String,
        source: url::ParseError,
    },
    #[error("request body is not serializable: {0}")]
    InvalidBody(#[source] serde_json::Error),
    #[error("query parameters must serialize to a flat object: {0}")]
    InvalidQuery(String),
    #[error("invalid request option: {0}")]
    InvalidOption(&'static str),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    pub show_success_message: bool,
    pub show_error_message: bool,
    /// The caller displays errors itself.
    pub skip_error_handler: bool,
    pub timeout: Option<Duration>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            show_success_message: false,
            show_error_message: true,
            skip_error_handler: false,
            timeout: None,
        }
    }
}

impl RequestOptions {
    pub fn announce_success() -> Self {
        Self {
            show_success_message: true,
            ..Self::default()
        }
    }

    pub fn quiet() -> Self {
        Self {
            show_error_message: false,
            ..Self::default()
        }
    }

    pub fn caller_handles_errors() -> Self {
        Self {
            skip_error_handler: true,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if matches!(self.timeout, Some(timeout) if timeout.is_zero()) {
            return Err(PipelineError::InvalidOption("timeout must be non-zero"));
        }
        Ok(())
    }

    fn error_notifications_enabled(&self) -> bool {
        self.show_error_message && !self.skip_error_handler
    }
}

/// Normalized outcome of one call. `message` is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
    /// `None` exactly when `success` is true.
    pub failure: Option<FailureKind>,
}

impl<T> RequestResult<T> {
    pub(crate) fn succeeded(data: Option<T>, message: String) -> Self {
        Self {
            success: true,
            data,
            message,
            failure: None,
        }
    }

    pub(crate) fn failed(failure: Failure, data: Option<T>) -> Self {
        Self {
            success: false,
            data,
            message: failure.message,
            failure: Some(failure.kind),
        }
    }

    pub fn into_result(self) -> Result<Option<T>, Failure> {
        match self.failure {
            None => Ok(self.data),
            Some(kind) => Err(Failure::new(kind, self.message)),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RequestResult<U> {
        RequestResult {
            success: self.success,
            data: self.data.map(f),
            message: self.message,
            failure: self.failure,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub base_url: String,
    pub timeout: Duration,
    pub login_path: String,
    pub redirect_delay: Duration,
}

impl From<&ConsoleSettings> for PipelineOptions {
    fn from(settings: &ConsoleSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            timeout: settings.timeout(),
            login_path: settings.login_path.clone(),
            redirect_delay: settings.redirect_delay(),
        }
    }
}

pub struct RequestPipeline {
    base_url: Url,
    transport: Arc<dyn Transport>,
    session: AuthSession,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    timeout: Duration,
    login_path: String,
    redirect_delay: Duration,
    redirect_pending: Arc<AtomicBool>,
}

impl RequestPipeline {
    pub fn new(
        settings: &ConsoleSettings,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, PipelineError> {
        Self::new_with_dependencies(
            PipelineOptions::from(settings),
            Arc::new(ReqwestTransport::new()),
            store,
            Arc::new(TracingNotifier),
            Arc::new(HeadlessNavigator::default()),
        )
    }

    pub fn new_with_dependencies(
        options: PipelineOptions,
        transport: Arc<dyn Transport>,
        store: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, PipelineError> {
        if options.timeout.is_zero() {
            return Err(PipelineError::InvalidOption("timeout must be non-zero"));
        }
        let normalized = normalize_base_url(&options.base_url);
        let base_url = Url::parse(&normalized).map_err(|source| PipelineError::InvalidBaseUrl {
            url: normalized.clone(),
            source,
        })?;
        if base_url.cannot_be_a_base() {
            return Err(PipelineError::InvalidBaseUrl {
                url: normalized,
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            });
        }

        Ok(Self {
            base_url,
            transport,
            session: AuthSession::new(store),
            notifier,
            navigator,
            timeout: options.timeout,
            login_path: options.login_path,
            redirect_delay: options.redirect_delay,
            redirect_pending: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        query: Option<Value>,
        options: RequestOptions,
    ) -> Result<RequestResult<T>, PipelineError> {
        options.validate()?;
        let url = self.resolve(path)?;
        let query = query_pairs(query.unwrap_or(Value::Null))?;

        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(token) = self.session.token() {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }

        let request = TransportRequest {
            method,
            url,
            headers,
            body: body.filter(|body| !body.is_null()),
            query,
            timeout: options.timeout.unwrap_or(self.timeout),
        };

        debug!(%method, path, "request: dispatching");
        let result = match self.transport.send(request).await {
            Ok(response) => self.classify(method, path, response),
            Err(err) => {
                warn!(%method, path, error = %err, "request: no response received");
                RequestResult::failed(
                    Failure::new(FailureKind::Network, NETWORK_ERROR_MESSAGE),
                    None,
                )
            }
        };

        self.announce(&result, &options);
        Ok(result)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &(impl Serialize + ?Sized),
        options: RequestOptions,
    ) -> Result<RequestResult<T>, PipelineError> {
        let query = serde_json::to_value(query)
            .map_err(|err| PipelineError::InvalidQuery(err.to_string()))?;
        self.execute(Method::Get, path, None, Some(query), options)
            .await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &(impl Serialize + ?Sized),
        options: RequestOptions,
    ) -> Result<RequestResult<T>, PipelineError> {
        let body = serde_json::to_value(body).map_err(PipelineError::InvalidBody)?;
        self.execute(Method::Post, path, Some(body), None, options)
            .await
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &(impl Serialize + ?Sized),
        options: RequestOptions,
    ) -> Result<RequestResult<T>, PipelineError> {
        let body = serde_json::to_value(body).map_err(PipelineError::InvalidBody)?;
        self.execute(Method::Put, path, Some(body), None, options)
            .await
    }

    pub async fn patch<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &(impl Serialize + ?Sized),
        options: RequestOptions,
    ) -> Result<RequestResult<T>, PipelineError> {
        let body = serde_json::to_value(body).map_err(PipelineError::InvalidBody)?;
        self.execute(Method::Patch, path, Some(body), None, options)
            .await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<RequestResult<T>, PipelineError> {
        self.execute(Method::Delete, path, None, None, options)
            .await
    }

    fn resolve(&self, path: &str) -> Result<Url, PipelineError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|source| PipelineError::InvalidPath {
                path: path.to_string(),
                source,
            })
    }

    fn classify<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        response: TransportResponse,
    ) -> RequestResult<T> {
        let status = response.status;
        if !response.is_success() {
            let kind = FailureKind::from_status(status);
            warn!(%method, path, status, "request: http failure");
            if kind.requires_reauth() {
                self.expire_session();
            }
            let message = backend_error_message(&response.body);
            return RequestResult::failed(Failure::with_fallback(kind, message.as_deref()), None);
        }

        let envelope: Envelope<Value> = match serde_json::from_slice(&response.body) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%method, path, status, error = %err, "request: undecodable envelope");
                return malformed();
            }
        };

        let code = envelope.code;
        let data = envelope.data.filter(|data| !data.is_null());
        if code == 0 {
            let data = match data.map(serde_json::from_value::<T>).transpose() {
                Ok(data) => data,
                Err(err) => {
                    warn!(%method, path, error = %err, "request: envelope data has unexpected shape");
                    return malformed();
                }
            };
            return RequestResult::succeeded(
                data,
                message_or_default(envelope.message, DEFAULT_SUCCESS_MESSAGE),
            );
        }

        debug!(%method, path, code, "request: business failure");
        let data = data.and_then(|data| serde_json::from_value::<T>(data).ok());
        RequestResult::failed(
            Failure::new(
                FailureKind::Business(code),
                message_or_default(envelope.message, DEFAULT_FAILURE_MESSAGE),
            ),
            data,
        )
    }

    pub(crate) fn announce<T>(&self, result: &RequestResult<T>, options: &RequestOptions) {
        if result.success {
            if options.show_success_message {
                self.notifier.notify(NotifyKind::Success, &result.message);
            }
        } else if options.error_notifications_enabled() {
            self.notifier.notify(NotifyKind::Error, &result.message);
        }
    }

    /// Tears the session down and schedules one delayed redirect to the login path.
    fn expire_session(&self) {
        let had_token = self.session.teardown();
        info!(had_token, "session: expired by server");

        if is_at_path(&self.navigator.current_path(), &self.login_path) {
            return;
        }
        if self.redirect_pending.swap(true, Ordering::SeqCst) {
            debug!("session: redirect already scheduled");
            return;
        }

        let navigator = self.navigator.clone();
        let pending = self.redirect_pending.clone();
        let login_path = self.login_path.clone();
        let delay = self.redirect_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !is_at_path(&navigator.current_path(), &login_path) {
                navigator.redirect_to(&login_path);
            }
            pending.store(false, Ordering::SeqCst);
        });
    }
}

fn malformed<T>() -> RequestResult<T> {
    RequestResult::failed(
        Failure::new(
            FailureKind::Malformed,
            FailureKind::Malformed.default_message(),
        ),
        None,
    )
}

fn message_or_default(message: String, default: &str) -> String {
    if message.trim().is_empty() {
        default.to_string()
    } else {
        message
    }
}

/// `message`, or `data.message`, from an error body if it is JSON.
fn backend_error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let non_empty = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
    };
    non_empty(value.get("message"))
        .or_else(|| non_empty(value.get("data").and_then(|data| data.get("message"))))
}

fn query_pairs(query: Value) -> Result<Vec<(String, String)>, PipelineError> {
    match query {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::Null => None,
                Value::String(s) => Some(Ok((key, s))),
                Value::Number(n) => Some(Ok((key, n.to_string()))),
                Value::Bool(b) => Some(Ok((key, b.to_string()))),
                Value::Array(_) | Value::Object(_) => Some(Err(PipelineError::InvalidQuery(
                    format!("nested value for key '{key}'"),
                ))),
            })
            .collect(),
        other => Err(PipelineError::InvalidQuery(format!(
            "expected an object, got {other}"
        ))),
    }
}

#[cfg(test)]
#[path = "tests/pipeline_tests.rs"]
mod tests;
