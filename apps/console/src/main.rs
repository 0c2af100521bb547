use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use console_core::{
    load_settings,
    resources::{self, KeywordFilter, LogKind, RequestLogs, SystemLogs, TokenUsageLogs},
    FileSessionStore, ListController, ListSource, LoadOutcome, MutableSource, RequestPipeline,
    RequestResult,
};
use serde::Serialize;
use shared::{
    domain::{AiModelId, ModelSourceId, ProxyServiceId, RequestLogId, SystemLogId, TokenId},
    protocol::{LogPurgeRequest, RequestLogFilter, StatusFilter, SystemLogFilter},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "console", about = "Operator console for the AI proxy gateway")]
struct Args {
    /// Settings file; defaults to ./console.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Whoami,
    List {
        resource: Resource,
        #[arg(long, default_value_t = 1)]
        page: u64,
        #[arg(long)]
        page_size: Option<u64>,
        #[arg(long)]
        keyword: Option<String>,
    },
    Show {
        resource: Resource,
        id: i64,
    },
    /// Deletes rows, then reloads the page the list would land on.
    Delete {
        resource: Resource,
        #[arg(required = true)]
        ids: Vec<i64>,
        #[arg(long, default_value_t = 1)]
        page: u64,
        #[arg(long)]
        page_size: Option<u64>,
    },
    Logs {
        /// Show one log entry instead of a page.
        #[arg(long)]
        id: Option<i64>,
        #[arg(long, default_value_t = 1)]
        page: u64,
        #[arg(long)]
        page_size: Option<u64>,
        #[arg(long)]
        request_id: Option<String>,
        /// An HTTP status, or `other` for everything but 200/401/404/500.
        #[arg(long, value_parser = parse_status_filter)]
        status: Option<StatusFilter>,
        #[arg(long)]
        method: Option<String>,
        #[arg(long)]
        authorization: Option<String>,
        #[arg(long)]
        since: Option<DateTime<Utc>>,
        #[arg(long)]
        until: Option<DateTime<Utc>>,
    },
    SystemLogs {
        #[arg(long)]
        id: Option<i64>,
        #[arg(long, default_value_t = 1)]
        page: u64,
        #[arg(long)]
        page_size: Option<u64>,
        #[arg(long)]
        level: Option<String>,
        #[arg(long)]
        since: Option<DateTime<Utc>>,
        #[arg(long)]
        until: Option<DateTime<Utc>>,
    },
    /// Requests made with one API token.
    Usage {
        token: String,
        #[arg(long, default_value_t = 1)]
        page: u64,
        #[arg(long)]
        page_size: Option<u64>,
    },
    /// Permanently deletes logs inside a time range.
    PurgeLogs {
        kind: PurgeKind,
        #[arg(long)]
        since: DateTime<Utc>,
        #[arg(long)]
        until: DateTime<Utc>,
        #[arg(long)]
        system_token: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Resource {
    ProxyServices,
    AiModels,
    Tokens,
    ModelSources,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PurgeKind {
    Request,
    System,
}

impl From<PurgeKind> for LogKind {
    fn from(kind: PurgeKind) -> Self {
        match kind {
            PurgeKind::Request => LogKind::Request,
            PurgeKind::System => LogKind::System,
        }
    }
}

fn parse_status_filter(raw: &str) -> Result<StatusFilter, String> {
    if raw.eq_ignore_ascii_case("other") {
        return Ok(StatusFilter::Other);
    }
    raw.parse::<u16>()
        .map(StatusFilter::Exact)
        .map_err(|_| format!("expected an HTTP status or 'other', got '{raw}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(base_url) = args.base_url {
        settings.base_url = base_url;
    }
    let store = Arc::new(FileSessionStore::open(&settings.session_file));
    let pipeline = Arc::new(
        RequestPipeline::new(&settings, store).context("failed to build request pipeline")?,
    );
    info!(base_url = %pipeline.base_url(), "console: ready");
    let default_page_size = settings.default_page_size;

    match args.command {
        Command::Login { username, password } => {
            let result = pipeline.login(&username, &password).await?;
            let login = result.into_result()?.context("login response carried no token")?;
            println!("signed in as {}", login.username);
        }
        Command::Logout => {
            if pipeline.logout() {
                println!("signed out");
            } else {
                println!("not signed in");
            }
        }
        Command::Whoami => print_result(pipeline.current_user().await?)?,
        Command::List {
            resource,
            page,
            page_size,
            keyword,
        } => {
            let page_size = page_size.unwrap_or(default_page_size);
            let filter = keyword.map(KeywordFilter::keyword).unwrap_or_default();
            match resource {
                Resource::ProxyServices => {
                    list(resources::proxy_services(pipeline), page, page_size, filter).await?
                }
                Resource::AiModels => {
                    list(resources::ai_models(pipeline), page, page_size, filter).await?
                }
                Resource::Tokens => list(resources::tokens(pipeline), page, page_size, filter).await?,
                Resource::ModelSources => {
                    list(resources::model_sources(pipeline), page, page_size, filter).await?
                }
            }
        }
        Command::Show { resource, id } => match resource {
            Resource::ProxyServices => print_result(
                resources::proxy_services(pipeline)
                    .get(ProxyServiceId(id))
                    .await?,
            )?,
            Resource::AiModels => {
                print_result(resources::ai_models(pipeline).get(AiModelId(id)).await?)?
            }
            Resource::Tokens => print_result(resources::tokens(pipeline).get(TokenId(id)).await?)?,
            Resource::ModelSources => print_result(
                resources::model_sources(pipeline)
                    .get(ModelSourceId(id))
                    .await?,
            )?,
        },
        Command::Delete {
            resource,
            ids,
            page,
            page_size,
        } => {
            let page_size = page_size.unwrap_or(default_page_size);
            match resource {
                Resource::ProxyServices => {
                    let ids = ids.into_iter().map(ProxyServiceId).collect();
                    delete(resources::proxy_services(pipeline), ids, page, page_size).await?
                }
                Resource::AiModels => {
                    let ids = ids.into_iter().map(AiModelId).collect();
                    delete(resources::ai_models(pipeline), ids, page, page_size).await?
                }
                Resource::Tokens => {
                    let ids = ids.into_iter().map(TokenId).collect();
                    delete(resources::tokens(pipeline), ids, page, page_size).await?
                }
                Resource::ModelSources => {
                    let ids = ids.into_iter().map(ModelSourceId).collect();
                    delete(resources::model_sources(pipeline), ids, page, page_size).await?
                }
            }
        }
        Command::Logs {
            id,
            page,
            page_size,
            request_id,
            status,
            method,
            authorization,
            since,
            until,
        } => {
            let logs = RequestLogs::new(pipeline);
            if let Some(id) = id {
                print_result(logs.detail(RequestLogId(id)).await?)?;
                return Ok(());
            }
            let mut filter = RequestLogFilter {
                request_id,
                start_time: since,
                end_time: until,
                method: method.map(|m| m.to_uppercase()),
                authorization,
                ..RequestLogFilter::default()
            };
            if let Some(status) = status {
                filter = filter.with_status(status);
            }
            list(logs, page, page_size.unwrap_or(default_page_size), filter).await?;
        }
        Command::SystemLogs {
            id,
            page,
            page_size,
            level,
            since,
            until,
        } => {
            let logs = SystemLogs::new(pipeline);
            if let Some(id) = id {
                print_result(logs.detail(SystemLogId(id)).await?)?;
                return Ok(());
            }
            let filter = SystemLogFilter {
                level: level.map(|l| l.to_uppercase()),
                start_time: since,
                end_time: until,
            };
            list(logs, page, page_size.unwrap_or(default_page_size), filter).await?;
        }
        Command::Usage {
            token,
            page,
            page_size,
        } => {
            let usage = TokenUsageLogs::new(pipeline, token);
            list(usage, page, page_size.unwrap_or(default_page_size), ()).await?;
        }
        Command::PurgeLogs {
            kind,
            since,
            until,
            system_token,
        } => {
            if until < since {
                bail!("--until must not be earlier than --since");
            }
            let system_token = system_token.trim().to_string();
            if system_token.is_empty() {
                bail!("--system-token must not be blank");
            }
            let request = LogPurgeRequest {
                start_time: since,
                end_time: until,
                system_auth_token: system_token,
            };
            let result = resources::purge_logs(&pipeline, kind.into(), &request).await?;
            let purged = result.into_result()?.context("purge response carried no count")?;
            let label = match kind {
                PurgeKind::Request => "request",
                PurgeKind::System => "system",
            };
            println!("deleted {} {label} log entries", purged.deleted_count);
        }
    }

    Ok(())
}

async fn list<S>(source: S, page: u64, page_size: u64, filter: S::Filter) -> Result<()>
where
    S: ListSource,
    S::Row: Serialize,
{
    let controller = ListController::with_page_size(source, page_size);
    match controller.load_data(page, page_size, Some(filter)).await? {
        LoadOutcome::Applied => print_json(&controller.view().await),
        outcome => bail!("page {page} was not loaded ({outcome:?})"),
    }
}

async fn delete<S>(source: S, ids: Vec<S::Id>, page: u64, page_size: u64) -> Result<()>
where
    S: MutableSource,
    S::Row: Serialize,
{
    let controller = ListController::with_page_size(source, page_size);
    if controller.load_data(page, page_size, None).await? != LoadOutcome::Applied {
        bail!("page {page} was not loaded");
    }

    let deleted = match ids.as_slice() {
        [id] => u64::from(controller.handle_delete(*id).await?),
        ids => controller.handle_delete_many(ids).await?,
    };
    info!(requested = ids.len(), deleted, "console: delete finished");
    if deleted == 0 {
        bail!("nothing was deleted");
    }
    print_json(&controller.view().await)
}

fn print_result<T: Serialize>(result: RequestResult<T>) -> Result<()> {
    let data = result.into_result()?;
    print_json(&data)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
