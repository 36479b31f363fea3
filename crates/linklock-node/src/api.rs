use crate::node::{LockerNode, NodeStats, UnlockResponse, VisitOverview};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use linklock_gate::ClickOutcome;
use linklock_storage::TaskDraft;
use linklock_types::{AccountId, AdTask, LinklockError, Locker, LockerId, TaskId, VisitId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Clone)]
struct AppState {
    node: LockerNode,
}

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(e: LinklockError) -> ApiError {
    let status = match &e {
        LinklockError::LockerNotFound(_)
        | LinklockError::TaskNotFound(_)
        | LinklockError::VisitNotFound(_) => StatusCode::NOT_FOUND,
        LinklockError::MissingAdUrl(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LinklockError::InvalidTransition(_) | LinklockError::Configuration(_) => {
            StatusCode::CONFLICT
        }
        LinklockError::InvalidParameter(_) | LinklockError::Serialization(_) => {
            StatusCode::BAD_REQUEST
        }
        LinklockError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

pub fn router(node: LockerNode) -> Router {
    let state = AppState { node };
    Router::new()
        .route("/health", get(health))
        .route("/lockers", post(create_locker))
        .route("/locker/:id", get(get_locker))
        .route("/lockers/owner/:owner", get(list_lockers_for_owner))
        .route("/account/:id/balance", get(get_balance))
        .route("/account/:id/revenue", get(get_revenue_history))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/visit", post(open_visit))
        .route("/visit/:id/task/:task_id/click", post(click_task))
        .route("/visit/:id/unlock", post(unlock))
        .route("/visit/:id/dropoff", post(dropoff))
        .route("/stats", get(get_stats))
        .route("/metrics", get(get_metrics))
        .with_state(Arc::new(state))
}

pub fn start_api_server(node: LockerNode, host: String, port: u16) -> JoinHandle<()> {
    let app = router(node);
    let addr = format!("{}:{}", host, port);
    info!("📡 Starting API server on {}", addr);

    tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind API server");

        axum::serve(listener, app).await.expect("API server failed");
    })
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Deserialize)]
struct CreateLockerRequest {
    owner: String,
    title: String,
    destination_url: String,
}

async fn create_locker(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateLockerRequest>,
) -> Result<Json<Locker>, ApiError> {
    state
        .node
        .create_locker(AccountId::new(req.owner), req.title, req.destination_url)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn get_locker(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Locker>, ApiError> {
    state
        .node
        .get_locker(&LockerId::new(id))
        .await
        .map(Json)
        .map_err(error_response)
}

async fn list_lockers_for_owner(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
) -> Result<Json<Vec<Locker>>, ApiError> {
    state
        .node
        .lockers_for_owner(&AccountId::new(owner))
        .await
        .map(Json)
        .map_err(error_response)
}

#[derive(Serialize)]
struct BalanceResponse {
    account: String,
    balance_usd: f64,
    balance_micros: u64,
}

async fn get_balance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let account = AccountId::new(id);
    let balance = state
        .node
        .balance(&account)
        .await
        .map_err(error_response)?;
    Ok(Json(BalanceResponse {
        account: account.to_string(),
        balance_usd: balance.to_usd(),
        balance_micros: balance.to_micros(),
    }))
}

async fn get_revenue_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<linklock_economics::RevenueEvent>>, ApiError> {
    state
        .node
        .revenue_history(&AccountId::new(id))
        .await
        .map(Json)
        .map_err(error_response)
}

async fn list_tasks(State(state): State<Arc<AppState>>) -> Result<Json<Vec<AdTask>>, ApiError> {
    state
        .node
        .list_tasks()
        .await
        .map(Json)
        .map_err(error_response)
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<TaskDraft>,
) -> Result<Json<AdTask>, ApiError> {
    state
        .node
        .insert_task(draft)
        .await
        .map(Json)
        .map_err(error_response)
}

#[derive(Deserialize)]
struct OpenVisitRequest {
    locker_id: String,
    user_agent: Option<String>,
    ip: Option<String>,
}

async fn open_visit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<OpenVisitRequest>,
) -> Result<Json<VisitOverview>, ApiError> {
    let user_agent = req
        .user_agent
        .or_else(|| {
            headers
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_default();
    let ip = req.ip.or_else(|| {
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    });

    state
        .node
        .open_visit(&LockerId::new(req.locker_id), &user_agent, ip.as_deref())
        .await
        .map(Json)
        .map_err(error_response)
}

#[derive(Serialize)]
struct ClickResponse {
    status: &'static str,
    ad_url: Option<String>,
}

async fn click_task(
    State(state): State<Arc<AppState>>,
    Path((id, task_id)): Path<(String, String)>,
) -> Result<Json<ClickResponse>, ApiError> {
    let outcome = state
        .node
        .click_task(&VisitId::new(id), &TaskId::new(task_id))
        .await
        .map_err(error_response)?;

    let response = match outcome {
        ClickOutcome::Started { ad_url } => ClickResponse {
            status: "started",
            ad_url: Some(ad_url),
        },
        ClickOutcome::AlreadyStarted => ClickResponse {
            status: "already_started",
            ad_url: None,
        },
        ClickOutcome::AlreadyCompleted => ClickResponse {
            status: "already_completed",
            ad_url: None,
        },
    };
    Ok(Json(response))
}

async fn unlock(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UnlockResponse>, ApiError> {
    state
        .node
        .unlock(&VisitId::new(id))
        .await
        .map(Json)
        .map_err(error_response)
}

#[derive(Serialize)]
struct DropoffResponse {
    success: bool,
}

async fn dropoff(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DropoffResponse>, ApiError> {
    state
        .node
        .dropoff(&VisitId::new(id))
        .await
        .map_err(error_response)?;
    Ok(Json(DropoffResponse { success: true }))
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Json<NodeStats> {
    Json(state.node.stats().await)
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> String {
    state.node.metrics.gather()
}
