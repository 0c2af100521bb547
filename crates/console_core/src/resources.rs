//! REST resources the console manages, all served as `{ total, list }` pages
//! under one path prefix each.

use std::{fmt::Display, marker::PhantomData, sync::Arc};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{
        AiModel, AiModelForm, AiModelId, ModelSource, ModelSourceForm, ModelSourceId,
        ProxyService, ProxyServiceForm, ProxyServiceId, RequestLog, RequestLogId, SystemLog,
        SystemLogId, Token, TokenForm, TokenId,
    },
    protocol::{
        ListPage, LogPurgeRequest, LogPurgeResponse, PageQuery, RequestLogFilter,
        SystemLogFilter,
    },
};
use tracing::info;

use crate::{
    list_state::{ListSource, MutableSource},
    pipeline::{PipelineError, RequestOptions, RequestPipeline, RequestResult},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordFilter {
    pub keyword: Option<String>,
}

impl KeywordFilter {
    pub fn keyword(keyword: impl Into<String>) -> Self {
        let keyword = keyword.into();
        Self {
            keyword: Some(keyword).filter(|k| !k.trim().is_empty()),
        }
    }
}

pub struct RestResource<R, F, I> {
    pipeline: Arc<RequestPipeline>,
    base_path: &'static str,
    announce_mutations: bool,
    _marker: PhantomData<fn() -> (R, F, I)>,
}

impl<R, F, I> RestResource<R, F, I>
where
    R: DeserializeOwned,
    I: Display,
{
    pub fn new(pipeline: Arc<RequestPipeline>, base_path: &'static str) -> Self {
        Self {
            pipeline,
            base_path,
            announce_mutations: false,
            _marker: PhantomData,
        }
    }

    /// Emit a success notification after create, update and delete.
    pub fn announcing_mutations(mut self) -> Self {
        self.announce_mutations = true;
        self
    }

    pub fn base_path(&self) -> &'static str {
        self.base_path
    }

    pub async fn get(&self, id: I) -> Result<RequestResult<R>, PipelineError> {
        self.pipeline
            .get(&self.item_path(id), &(), RequestOptions::default())
            .await
    }

    fn item_path(&self, id: I) -> String {
        format!("{}/{id}", self.base_path)
    }

    fn mutation_options(&self) -> RequestOptions {
        if self.announce_mutations {
            RequestOptions::announce_success()
        } else {
            RequestOptions::default()
        }
    }
}

#[async_trait]
impl<R, F, I> ListSource for RestResource<R, F, I>
where
    R: DeserializeOwned + Clone + Send + Sync + 'static,
    F: Send + Sync + 'static,
    I: Display + Send + Sync + 'static,
{
    type Row = R;
    type Filter = KeywordFilter;

    async fn list(
        &self,
        page: u64,
        page_size: u64,
        filter: &KeywordFilter,
    ) -> Result<RequestResult<ListPage<R>>, PipelineError> {
        let query = PageQuery {
            page,
            page_size,
            keyword: filter.keyword.clone(),
        };
        self.pipeline
            .get(self.base_path, &query, RequestOptions::default())
            .await
    }
}

#[async_trait]
impl<R, F, I> MutableSource for RestResource<R, F, I>
where
    R: DeserializeOwned + Clone + Send + Sync + 'static,
    F: Serialize + Send + Sync + 'static,
    I: Display + Copy + Send + Sync + 'static,
{
    type Id = I;
    type Form = F;

    async fn create(&self, form: &F) -> Result<RequestResult<R>, PipelineError> {
        self.pipeline
            .post(self.base_path, form, self.mutation_options())
            .await
    }

    async fn update(&self, id: I, form: &F) -> Result<RequestResult<R>, PipelineError> {
        self.pipeline
            .put(&self.item_path(id), form, self.mutation_options())
            .await
    }

    async fn delete(&self, id: I) -> Result<RequestResult<serde_json::Value>, PipelineError> {
        self.pipeline
            .delete(&self.item_path(id), self.mutation_options())
            .await
    }
}

pub type ProxyServices = RestResource<ProxyService, ProxyServiceForm, ProxyServiceId>;
pub type AiModels = RestResource<AiModel, AiModelForm, AiModelId>;
pub type Tokens = RestResource<Token, TokenForm, TokenId>;
pub type ModelSources = RestResource<ModelSource, ModelSourceForm, ModelSourceId>;

pub fn proxy_services(pipeline: Arc<RequestPipeline>) -> ProxyServices {
    RestResource::new(pipeline, "/api/proxy-services")
}

pub fn ai_models(pipeline: Arc<RequestPipeline>) -> AiModels {
    RestResource::new(pipeline, "/api/ai-models").announcing_mutations()
}

pub fn tokens(pipeline: Arc<RequestPipeline>) -> Tokens {
    RestResource::new(pipeline, "/api/tokens").announcing_mutations()
}

pub fn model_sources(pipeline: Arc<RequestPipeline>) -> ModelSources {
    RestResource::new(pipeline, "/api/model-sources")
}

/// Read-only request log listing, served by the log service.
pub struct RequestLogs {
    pipeline: Arc<RequestPipeline>,
}

const REQUEST_LOGS_PATH: &str = "/api-logs/request-logs";

#[derive(Serialize)]
struct RequestLogQuery<'a> {
    page: u64,
    page_size: u64,
    #[serde(flatten)]
    filter: &'a RequestLogFilter,
}

impl RequestLogs {
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }

    pub async fn detail(&self, id: RequestLogId) -> Result<RequestResult<RequestLog>, PipelineError> {
        self.pipeline
            .get(
                &format!("{REQUEST_LOGS_PATH}/{id}"),
                &(),
                RequestOptions::default(),
            )
            .await
    }
}

#[async_trait]
impl ListSource for RequestLogs {
    type Row = RequestLog;
    type Filter = RequestLogFilter;

    async fn list(
        &self,
        page: u64,
        page_size: u64,
        filter: &RequestLogFilter,
    ) -> Result<RequestResult<ListPage<RequestLog>>, PipelineError> {
        let query = RequestLogQuery {
            page,
            page_size,
            filter,
        };
        self.pipeline
            .get(REQUEST_LOGS_PATH, &query, RequestOptions::default())
            .await
    }
}

/// Read-only system log listing, served by the log service.
pub struct SystemLogs {
    pipeline: Arc<RequestPipeline>,
}

const SYSTEM_LOGS_PATH: &str = "/api-logs/api/system-logs";

#[derive(Serialize)]
struct SystemLogQuery<'a> {
    page: u64,
    page_size: u64,
    #[serde(flatten)]
    filter: &'a SystemLogFilter,
}

impl SystemLogs {
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }

    pub async fn detail(&self, id: SystemLogId) -> Result<RequestResult<SystemLog>, PipelineError> {
        self.pipeline
            .get(
                &format!("{SYSTEM_LOGS_PATH}/{id}"),
                &(),
                RequestOptions::default(),
            )
            .await
    }
}

#[async_trait]
impl ListSource for SystemLogs {
    type Row = SystemLog;
    type Filter = SystemLogFilter;

    async fn list(
        &self,
        page: u64,
        page_size: u64,
        filter: &SystemLogFilter,
    ) -> Result<RequestResult<ListPage<SystemLog>>, PipelineError> {
        let query = SystemLogQuery {
            page,
            page_size,
            filter,
        };
        self.pipeline
            .get(SYSTEM_LOGS_PATH, &query, RequestOptions::default())
            .await
    }
}

/// Requests made with one API token, served by the gateway itself.
pub struct TokenUsageLogs {
    pipeline: Arc<RequestPipeline>,
    token: String,
}

const TOKEN_USAGE_LOGS_PATH: &str = "/api/token-usage-logs";

#[derive(Serialize)]
struct TokenUsageQuery<'a> {
    token: &'a str,
    page: u64,
    page_size: u64,
}

impl TokenUsageLogs {
    pub fn new(pipeline: Arc<RequestPipeline>, token: impl Into<String>) -> Self {
        Self {
            pipeline,
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

#[async_trait]
impl ListSource for TokenUsageLogs {
    type Row = RequestLog;
    type Filter = ();

    async fn list(
        &self,
        page: u64,
        page_size: u64,
        _filter: &(),
    ) -> Result<RequestResult<ListPage<RequestLog>>, PipelineError> {
        let query = TokenUsageQuery {
            token: &self.token,
            page,
            page_size,
        };
        self.pipeline
            .get(TOKEN_USAGE_LOGS_PATH, &query, RequestOptions::default())
            .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Request,
    System,
}

impl LogKind {
    fn purge_path(self) -> &'static str {
        match self {
            LogKind::Request => "/api-logs/api/request-logs/delete",
            LogKind::System => "/api-logs/api/system-logs/delete",
        }
    }
}

/// Permanently deletes every log of `kind` inside the request's time range.
pub async fn purge_logs(
    pipeline: &RequestPipeline,
    kind: LogKind,
    request: &LogPurgeRequest,
) -> Result<RequestResult<LogPurgeResponse>, PipelineError> {
    let result: RequestResult<LogPurgeResponse> = pipeline
        .post(kind.purge_path(), request, RequestOptions::default())
        .await?;
    if let (true, Some(response)) = (result.success, result.data.as_ref()) {
        info!(?kind, deleted = response.deleted_count, "logs: purged");
    }
    Ok(result)
}

#[cfg(test)]
#[path = "tests/resources_tests.rs"]
mod tests;
