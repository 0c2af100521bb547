use super::*;

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use shared::{domain::EnableStatus, error::FailureKind, protocol::StatusFilter};

use crate::{
    list_state::{ListController, LoadOutcome},
    notify::NotifyKind,
    test_support::{query_param, FakeTransport, Harness, Scripted},
    transport::Method,
};

fn token_row(id: i64) -> Value {
    json!({
        "id": id,
        "token": format!("sk-{id}"),
        "ai_model_id": 2,
        "order_no": "A-1",
        "status": 1,
        "expire_at": null,
        "usage_limit": 0,
        "remark": "",
        "created_at": "2024-05-01T00:00:00Z",
        "updated_at": "2024-05-01T00:00:00Z"
    })
}

fn log_row(id: i64, status: u16) -> Value {
    json!({
        "id": id,
        "time": "2024-05-01T10:00:00Z",
        "level": "INFO",
        "request_id": format!("req-{id}"),
        "method": "POST",
        "path": "/v1/chat/completions",
        "status": status,
        "latency_ms": 120
    })
}

/// Serves token pages and accepts every mutation.
fn token_backend() -> FakeTransport {
    FakeTransport::new(|request| match request.method {
        Method::Get => Scripted::json(
            200,
            json!({ "code": 0, "data": { "total": 2, "list": [token_row(1), token_row(2)] } }),
        ),
        Method::Delete => Scripted::json(200, json!({ "code": 0, "message": "deleted" })),
        _ => Scripted::json(200, json!({ "code": 0, "message": "saved", "data": token_row(3) })),
    })
}

#[tokio::test]
async fn list_sends_page_and_keyword() {
    let harness = Harness::new(token_backend());
    let tokens = tokens(harness.pipeline.clone());

    let result = tokens
        .list(2, 20, &KeywordFilter::keyword("sk-"))
        .await
        .expect("list");
    assert!(result.success);
    let page = result.data.expect("page");
    assert_eq!(page.total, 2);
    assert_eq!(page.list[1].token, "sk-2");
    assert_eq!(page.list[0].status, EnableStatus::Enabled);

    let requests = harness.transport.requests();
    let request = &requests[0];
    assert_eq!(request.method, Method::Get);
    assert_eq!(request.url.path(), "/api/tokens");
    assert_eq!(query_param(request, "page"), Some("2"));
    assert_eq!(query_param(request, "page_size"), Some("20"));
    assert_eq!(query_param(request, "keyword"), Some("sk-"));
}

#[test]
fn blank_keyword_is_not_a_filter() {
    assert_eq!(KeywordFilter::keyword("   "), KeywordFilter::default());
    assert_eq!(
        KeywordFilter::keyword("gpt").keyword.as_deref(),
        Some("gpt")
    );
}

#[tokio::test]
async fn mutations_use_rest_paths_and_verbs() {
    let harness = Harness::new(token_backend());
    let tokens = tokens(harness.pipeline.clone());
    let form = TokenForm {
        token: Some("sk-3".to_string()),
        ai_model_id: Some(AiModelId(2)),
        ..TokenForm::default()
    };

    tokens.create(&form).await.expect("create");
    tokens.update(TokenId(3), &form).await.expect("update");
    tokens.delete(TokenId(3)).await.expect("delete");
    tokens.get(TokenId(3)).await.expect("get");

    let requests = harness.transport.requests();
    let summary: Vec<(Method, &str)> = requests
        .iter()
        .map(|request| (request.method, request.url.path()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (Method::Post, "/api/tokens"),
            (Method::Put, "/api/tokens/3"),
            (Method::Delete, "/api/tokens/3"),
            (Method::Get, "/api/tokens/3"),
        ]
    );

    let body = requests[0].body.as_ref().expect("create body");
    assert_eq!(body["token"], json!("sk-3"));
    assert_eq!(body["ai_model_id"], json!(2));
    assert!(body.get("remark").is_none());
}

#[tokio::test]
async fn only_announcing_resources_notify_on_mutation_success() {
    let mut harness = Harness::new(token_backend());

    tokens(harness.pipeline.clone())
        .delete(TokenId(1))
        .await
        .expect("delete");
    let notifications = harness.drain_notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotifyKind::Success);
    assert_eq!(notifications[0].message, "deleted");

    proxy_services(harness.pipeline.clone())
        .delete(ProxyServiceId(1))
        .await
        .expect("delete");
    assert!(harness.drain_notifications().is_empty());

    model_sources(harness.pipeline.clone())
        .delete(ModelSourceId(1))
        .await
        .expect("delete");
    assert!(harness.drain_notifications().is_empty());
}

#[tokio::test]
async fn base_paths_match_backend_routes() {
    let harness = Harness::new(token_backend());
    assert_eq!(proxy_services(harness.pipeline.clone()).base_path(), "/api/proxy-services");
    assert_eq!(ai_models(harness.pipeline.clone()).base_path(), "/api/ai-models");
    assert_eq!(tokens(harness.pipeline.clone()).base_path(), "/api/tokens");
    assert_eq!(model_sources(harness.pipeline.clone()).base_path(), "/api/model-sources");
}

#[tokio::test]
async fn controller_over_rest_resource_steps_back_after_delete() {
    let harness = Harness::new(FakeTransport::new(|request| match request.method {
        Method::Delete => Scripted::json(200, json!({ "code": 0 })),
        _ => {
            let rows = if query_param(request, "page") == Some("2") {
                vec![token_row(11)]
            } else {
                (1..=10).map(token_row).collect()
            };
            Scripted::json(200, json!({ "code": 0, "data": { "total": 11, "list": rows } }))
        }
    }));
    let controller = ListController::new(tokens(harness.pipeline.clone()));

    assert_eq!(
        controller.load_data(2, 10, None).await.expect("load"),
        LoadOutcome::Applied
    );
    assert!(controller.handle_delete(TokenId(11)).await.expect("delete"));

    let last = harness.transport.requests().pop().expect("reload");
    assert_eq!(last.method, Method::Get);
    assert_eq!(query_param(&last, "page"), Some("1"));
    assert_eq!(controller.view().await.pagination.current, 1);
}

#[tokio::test]
async fn request_log_filter_is_sent_as_flat_query() {
    let harness = Harness::new(FakeTransport::replying(
        200,
        json!({ "code": 0, "data": { "total": 1, "list": [log_row(7, 429)] } }),
    ));
    let logs = RequestLogs::new(harness.pipeline.clone());
    let filter = RequestLogFilter {
        method: Some("POST".to_string()),
        start_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()),
        ..RequestLogFilter::default()
    }
    .with_status(StatusFilter::Other);

    let result = logs.list(1, 50, &filter).await.expect("list");
    let page = result.data.expect("page");
    assert_eq!(page.list[0].status, 429);
    assert_eq!(page.list[0].request_id, "req-7");

    let requests = harness.transport.requests();
    let request = &requests[0];
    assert_eq!(request.url.path(), "/api-logs/request-logs");
    assert_eq!(query_param(request, "page"), Some("1"));
    assert_eq!(query_param(request, "page_size"), Some("50"));
    assert_eq!(query_param(request, "method"), Some("POST"));
    assert_eq!(query_param(request, "status"), Some("201,204,400,403,502,503"));
    assert_eq!(query_param(request, "exclude_status"), None);
    assert_eq!(query_param(request, "request_id"), None);
    assert_eq!(query_param(request, "start_time"), Some("2024-05-01 00:00:00"));
    assert_eq!(query_param(request, "end_time"), None);
}

#[tokio::test]
async fn request_log_detail_uses_item_path() {
    let harness = Harness::new(FakeTransport::replying(
        200,
        json!({ "code": 0, "data": log_row(42, 200) }),
    ));
    let logs = RequestLogs::new(harness.pipeline.clone());

    let result = logs.detail(RequestLogId(42)).await.expect("detail");

    assert_eq!(result.data.expect("log").id, RequestLogId(42));
    assert_eq!(
        harness.transport.requests()[0].url.path(),
        "/api-logs/request-logs/42"
    );
}

fn system_log_row(id: i64) -> Value {
    json!({
        "id": id,
        "request_id": "req-9",
        "time": "2024-05-02T08:30:00Z",
        "level": "ERROR",
        "msg": "upstream timed out",
        "created_at": "2024-05-02T08:30:01Z",
        "updated_at": "2024-05-02T08:30:01Z"
    })
}

#[tokio::test]
async fn system_log_filter_uses_wall_clock_times() {
    let harness = Harness::new(FakeTransport::replying(
        200,
        json!({ "code": 0, "data": { "total": 1, "list": [system_log_row(5)] } }),
    ));
    let logs = SystemLogs::new(harness.pipeline.clone());
    let filter = SystemLogFilter {
        level: Some("ERROR".to_string()),
        start_time: Some(Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap()),
        end_time: Some(Utc.with_ymd_and_hms(2024, 5, 2, 23, 59, 59).unwrap()),
    };

    let result = logs.list(2, 20, &filter).await.expect("list");
    let page = result.data.expect("page");
    assert_eq!(page.list[0].id, SystemLogId(5));
    assert_eq!(page.list[0].msg, "upstream timed out");

    let requests = harness.transport.requests();
    let request = &requests[0];
    assert_eq!(request.method, Method::Get);
    assert_eq!(request.url.path(), "/api-logs/api/system-logs");
    assert_eq!(query_param(request, "page"), Some("2"));
    assert_eq!(query_param(request, "page_size"), Some("20"));
    assert_eq!(query_param(request, "level"), Some("ERROR"));
    assert_eq!(query_param(request, "start_time"), Some("2024-05-02 00:00:00"));
    assert_eq!(query_param(request, "end_time"), Some("2024-05-02 23:59:59"));
}

#[tokio::test]
async fn system_log_detail_uses_item_path() {
    let harness = Harness::new(FakeTransport::replying(
        200,
        json!({ "code": 0, "data": system_log_row(12) }),
    ));

    let result = SystemLogs::new(harness.pipeline.clone())
        .detail(SystemLogId(12))
        .await
        .expect("detail");

    assert_eq!(result.data.expect("log").level, "ERROR");
    assert_eq!(
        harness.transport.requests()[0].url.path(),
        "/api-logs/api/system-logs/12"
    );
}

#[tokio::test]
async fn token_usage_pages_through_one_token() {
    let harness = Harness::new(FakeTransport::replying(
        200,
        json!({ "code": 0, "data": { "total": 3, "list": [log_row(1, 200), log_row(2, 500)] } }),
    ));
    let controller =
        ListController::with_page_size(TokenUsageLogs::new(harness.pipeline.clone(), "sk-abc"), 2);

    assert_eq!(
        controller.load_data(1, 2, None).await.expect("load"),
        LoadOutcome::Applied
    );
    let view = controller.view().await;
    assert_eq!(view.total, 3);
    assert_eq!(view.data_source[1].status, 500);

    let requests = harness.transport.requests();
    let request = &requests[0];
    assert_eq!(request.url.path(), "/api/token-usage-logs");
    assert_eq!(query_param(request, "token"), Some("sk-abc"));
    assert_eq!(query_param(request, "page"), Some("1"));
    assert_eq!(query_param(request, "page_size"), Some("2"));
}

#[tokio::test]
async fn purge_posts_time_range_and_reports_count() {
    let harness = Harness::new(FakeTransport::replying(
        200,
        json!({ "code": 0, "message": "deleted", "data": { "deleted_count": 37 } }),
    ));
    let request = LogPurgeRequest {
        start_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        end_time: Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap(),
        system_auth_token: "sys-secret".to_string(),
    };

    let request_logs = purge_logs(&harness.pipeline, LogKind::Request, &request)
        .await
        .expect("purge");
    assert_eq!(request_logs.data, Some(LogPurgeResponse { deleted_count: 37 }));
    purge_logs(&harness.pipeline, LogKind::System, &request)
        .await
        .expect("purge");

    let requests = harness.transport.requests();
    assert_eq!(requests[0].method, Method::Post);
    assert_eq!(requests[0].url.path(), "/api-logs/api/request-logs/delete");
    assert_eq!(requests[1].url.path(), "/api-logs/api/system-logs/delete");
    let body = requests[0].body.as_ref().expect("purge body");
    assert_eq!(body["start_time"], json!("2024-01-01 00:00:00"));
    assert_eq!(body["end_time"], json!("2024-01-31 23:59:59"));
    assert_eq!(body["system_auth_token"], json!("sys-secret"));
}

#[tokio::test]
async fn purge_rejected_by_log_service_is_a_failed_result() {
    let harness = Harness::new(FakeTransport::replying(
        403,
        json!({ "code": 403, "message": "invalid system auth token" }),
    ));
    let request = LogPurgeRequest {
        start_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        end_time: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        system_auth_token: "wrong".to_string(),
    };

    let result = purge_logs(&harness.pipeline, LogKind::System, &request)
        .await
        .expect("purge");

    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::Forbidden));
    assert_eq!(result.message, "invalid system auth token");
}
