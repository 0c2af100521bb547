//! Generic paginated list controller shared by every resource screen.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use shared::protocol::ListPage;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{
    pagination::{next_page_after_deletion, PaginationState},
    pipeline::{PipelineError, RequestResult},
};

pub const DEFAULT_PAGE_SIZE: u64 = 10;

#[async_trait]
pub trait ListSource: Send + Sync {
    type Row: Clone + Send + Sync + 'static;
    type Filter: Clone + Default + Send + Sync + 'static;

    async fn list(
        &self,
        page: u64,
        page_size: u64,
        filter: &Self::Filter,
    ) -> Result<RequestResult<ListPage<Self::Row>>, PipelineError>;
}

#[async_trait]
pub trait MutableSource: ListSource {
    type Id: Copy + Send + Sync + 'static;
    type Form: Send + Sync + 'static;

    async fn create(&self, form: &Self::Form) -> Result<RequestResult<Self::Row>, PipelineError>;
    async fn update(
        &self,
        id: Self::Id,
        form: &Self::Form,
    ) -> Result<RequestResult<Self::Row>, PipelineError>;
    async fn delete(&self, id: Self::Id)
        -> Result<RequestResult<serde_json::Value>, PipelineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current: u64,
    pub page_size: u64,
}

/// What presentation code renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListView<R> {
    pub data_source: Vec<R>,
    pub total: u64,
    pub loading: bool,
    pub pagination: Pagination,
}

impl<R> ListView<R> {
    fn empty(page_size: u64) -> Self {
        Self {
            data_source: Vec::new(),
            total: 0,
            loading: false,
            pagination: Pagination {
                current: 1,
                page_size: page_size.max(1),
            },
        }
    }

    pub fn pagination_state(&self) -> PaginationState {
        PaginationState::new(
            self.pagination.current,
            self.pagination.page_size,
            self.total,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// Rows, total and pagination left as they were.
    Failed,
    /// A newer load was issued before this one completed.
    Superseded,
}

struct ListState<R, F> {
    view: ListView<R>,
    filter: F,
}

pub struct ListController<S: ListSource> {
    source: S,
    generation: AtomicU64,
    state: RwLock<ListState<S::Row, S::Filter>>,
}

impl<S: ListSource> ListController<S> {
    pub fn new(source: S) -> Self {
        Self::with_page_size(source, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(source: S, page_size: u64) -> Self {
        Self {
            source,
            generation: AtomicU64::new(0),
            state: RwLock::new(ListState {
                view: ListView::empty(page_size),
                filter: S::Filter::default(),
            }),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn view(&self) -> ListView<S::Row> {
        self.state.read().await.view.clone()
    }

    pub async fn filter(&self) -> S::Filter {
        self.state.read().await.filter.clone()
    }

    /// Fetches one page and replaces the view, unless a newer load was issued meanwhile.
    ///
    /// `filter: None` keeps the active filter.
    pub async fn load_data(
        &self,
        page: u64,
        page_size: u64,
        filter: Option<S::Filter>,
    ) -> Result<LoadOutcome, PipelineError> {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let filter = {
            let mut state = self.state.write().await;
            state.view.loading = true;
            match filter {
                Some(filter) => {
                    state.filter = filter.clone();
                    filter
                }
                None => state.filter.clone(),
            }
        };

        debug!(generation, page, page_size, "list: loading");
        let outcome = self.source.list(page, page_size, &filter).await;

        let mut state = self.state.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "list: discarding superseded result");
            return outcome.map(|_| LoadOutcome::Superseded);
        }
        state.view.loading = false;

        let result = outcome?;
        match (result.success, result.data) {
            (true, Some(list_page)) => {
                state.view.data_source = list_page.list;
                state.view.total = list_page.total;
                // an empty list always sits on the first page
                state.view.pagination = Pagination {
                    current: if list_page.total == 0 { 1 } else { page },
                    page_size,
                };
                debug!(generation, total = state.view.total, "list: applied");
                Ok(LoadOutcome::Applied)
            }
            _ => Ok(LoadOutcome::Failed),
        }
    }

    pub async fn reload(&self) -> Result<LoadOutcome, PipelineError> {
        let pagination = self.state.read().await.view.pagination;
        self.load_data(pagination.current, pagination.page_size, None)
            .await
    }
}

impl<S: MutableSource> ListController<S> {
    pub async fn handle_create(&self, form: &S::Form) -> Result<bool, PipelineError> {
        let result = self.source.create(form).await?;
        if !result.success {
            return Ok(false);
        }
        self.reload().await?;
        Ok(true)
    }

    pub async fn handle_update(&self, id: S::Id, form: &S::Form) -> Result<bool, PipelineError> {
        let result = self.source.update(id, form).await?;
        if !result.success {
            return Ok(false);
        }
        self.reload().await?;
        Ok(true)
    }

    pub async fn handle_delete(&self, id: S::Id) -> Result<bool, PipelineError> {
        let before = self.state.read().await.view.pagination_state();
        let result = self.source.delete(id).await?;
        if !result.success {
            return Ok(false);
        }
        let page = next_page_after_deletion(&before, 1);
        if page != before.current {
            info!(from = before.current, to = page, "list: stepping back after delete");
        }
        self.load_data(page, before.page_size, None).await?;
        Ok(true)
    }

    /// Deletes each id in turn and reconciles once; returns how many succeeded.
    pub async fn handle_delete_many(&self, ids: &[S::Id]) -> Result<u64, PipelineError> {
        let before = self.state.read().await.view.pagination_state();
        let mut deleted = 0u64;
        for id in ids {
            if self.source.delete(*id).await?.success {
                deleted += 1;
            }
        }
        if deleted == 0 {
            return Ok(0);
        }
        let page = next_page_after_deletion(&before, deleted);
        self.load_data(page, before.page_size, None).await?;
        Ok(deleted)
    }
}

#[cfg(test)]
#[path = "tests/list_state_tests.rs"]
mod tests;
