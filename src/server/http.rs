//! HTTP emulator of the warehouse REST surface, backed by any [`Warehouse`].

use crate::app::dto::{ErrorEnvelope, GetIamPolicyRequest, PolicyDto, SetIamPolicyRequest};
use crate::domain::dataset::DatasetInfo;
use crate::domain::error::{Result as WarehouseResult, WarehouseError};
use crate::domain::ids::{DatasetId, TableId};
use crate::domain::policy::Policy;
use crate::domain::ports::{DeleteOutcome, Warehouse};
use crate::domain::table::TableInfo;
use anyhow::Result;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::spawn_blocking;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct HttpState {
    pub warehouse: Arc<dyn Warehouse>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteDatasetQuery {
    #[serde(default)]
    delete_contents: bool,
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
}

fn api_error(e: &WarehouseError) -> Response {
    let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorEnvelope::from(e))).into_response()
}

fn respond<T: Serialize>(result: WarehouseResult<T>) -> Response {
    match result {
        Ok(value) => Json(value).into_response(),
        Err(e) => api_error(&e),
    }
}

fn respond_deleted(result: WarehouseResult<DeleteOutcome>, resource: String) -> Response {
    match result {
        Ok(DeleteOutcome::Deleted) => StatusCode::NO_CONTENT.into_response(),
        Ok(DeleteOutcome::NotFound) => api_error(&WarehouseError::not_found(resource)),
        Err(e) => api_error(&e),
    }
}

/// Runs a warehouse call off the async workers.
async fn run_blocking<T, F>(state: &HttpState, f: F) -> WarehouseResult<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn Warehouse) -> WarehouseResult<T> + Send + 'static,
{
    let warehouse = state.warehouse.clone();
    spawn_blocking(move || f(warehouse.as_ref()))
        .await
        .map_err(|e| WarehouseError::Service {
            code: 500,
            message: format!("task join error: {e}"),
        })?
}

fn check_path<T: PartialEq + std::fmt::Display>(in_path: &T, in_body: &T) -> WarehouseResult<()> {
    if in_path != in_body {
        return Err(WarehouseError::invalid(format!(
            "Resource reference {in_body} does not match request path {in_path}"
        )));
    }
    Ok(())
}

pub fn build_router(warehouse: Arc<dyn Warehouse>) -> Router {
    let state = Arc::new(HttpState { warehouse });

    Router::new()
        .route("/health", get(health))
        .route("/bigquery/v2/projects/{project}/datasets", post(insert_dataset))
        .route(
            "/bigquery/v2/projects/{project}/datasets/{dataset}",
            get(get_dataset)
                .put(update_dataset)
                .delete(delete_dataset),
        )
        .route(
            "/bigquery/v2/projects/{project}/datasets/{dataset}/tables",
            post(insert_table),
        )
        .route(
            "/bigquery/v2/projects/{project}/datasets/{dataset}/tables/{table}",
            get(get_table).delete(delete_table).post(table_method),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve(warehouse: Arc<dyn Warehouse>, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Serving BigQuery emulator");
    serve_on(listener, warehouse).await
}

/// Serves on an already-bound listener, e.g. one bound to port 0.
pub async fn serve_on(listener: TcpListener, warehouse: Arc<dyn Warehouse>) -> Result<()> {
    let app = build_router(warehouse);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

async fn insert_dataset(
    State(state): State<Arc<HttpState>>,
    Path(project): Path<String>,
    Json(info): Json<DatasetInfo>,
) -> Response {
    respond(
        run_blocking(&state, move |wh| {
            check_path(&project, &info.dataset_id.project_id)?;
            wh.create_dataset(&info)
        })
        .await,
    )
}

async fn get_dataset(
    State(state): State<Arc<HttpState>>,
    Path((project, dataset)): Path<(String, String)>,
) -> Response {
    let id = DatasetId::of(project, dataset);
    respond(
        run_blocking(&state, move |wh| {
            wh.get_dataset(&id)?
                .ok_or_else(|| WarehouseError::not_found(format!("Dataset {id}")))
        })
        .await,
    )
}

async fn update_dataset(
    State(state): State<Arc<HttpState>>,
    Path((project, dataset)): Path<(String, String)>,
    Json(info): Json<DatasetInfo>,
) -> Response {
    let id = DatasetId::of(project, dataset);
    respond(
        run_blocking(&state, move |wh| {
            check_path(&id, &info.dataset_id)?;
            wh.update_dataset(&info)
        })
        .await,
    )
}

async fn delete_dataset(
    State(state): State<Arc<HttpState>>,
    Path((project, dataset)): Path<(String, String)>,
    Query(q): Query<DeleteDatasetQuery>,
) -> Response {
    let id = DatasetId::of(project, dataset);
    let resource = format!("Dataset {id}");
    let result = run_blocking(&state, move |wh| wh.delete_dataset(&id, q.delete_contents)).await;
    respond_deleted(result, resource)
}

async fn insert_table(
    State(state): State<Arc<HttpState>>,
    Path((project, dataset)): Path<(String, String)>,
    Json(info): Json<TableInfo>,
) -> Response {
    let id = DatasetId::of(project, dataset);
    respond(
        run_blocking(&state, move |wh| {
            check_path(&id, &info.table_id.dataset())?;
            wh.create_table(&info)
        })
        .await,
    )
}

async fn get_table(
    State(state): State<Arc<HttpState>>,
    Path((project, dataset, table)): Path<(String, String, String)>,
) -> Response {
    let id = TableId::of(project, dataset, table);
    respond(
        run_blocking(&state, move |wh| {
            wh.get_table(&id)?
                .ok_or_else(|| WarehouseError::not_found(format!("Table {id}")))
        })
        .await,
    )
}

async fn delete_table(
    State(state): State<Arc<HttpState>>,
    Path((project, dataset, table)): Path<(String, String, String)>,
) -> Response {
    let id = TableId::of(project, dataset, table);
    let resource = format!("Table {id}");
    let result = run_blocking(&state, move |wh| wh.delete_table(&id)).await;
    respond_deleted(result, resource)
}

/// `POST .../tables/{table}:getIamPolicy` and `:setIamPolicy`. The custom
/// method arrives as a suffix of the last path segment.
async fn table_method(
    State(state): State<Arc<HttpState>>,
    Path((project, dataset, segment)): Path<(String, String, String)>,
    body: Bytes,
) -> Response {
    let Some((table, method)) = segment.split_once(':') else {
        return api_error(&WarehouseError::invalid(format!(
            "Unsupported POST on table {segment}"
        )));
    };
    let id = TableId::of(project, dataset, table);

    match method {
        "getIamPolicy" => {
            // Options only select the policy version; v1 is all there is here.
            if !body.is_empty()
                && let Err(e) = serde_json::from_slice::<GetIamPolicyRequest>(&body)
            {
                return api_error(&WarehouseError::invalid(e.to_string()));
            }
            respond(
                run_blocking(&state, move |wh| wh.get_iam_policy(&id).map(|p| PolicyDto::from(&p)))
                    .await,
            )
        }
        "setIamPolicy" => {
            let request: SetIamPolicyRequest = match serde_json::from_slice(&body) {
                Ok(request) => request,
                Err(e) => return api_error(&WarehouseError::invalid(e.to_string())),
            };
            let policy = Policy::from(request.policy);
            respond(
                run_blocking(&state, move |wh| {
                    wh.set_iam_policy(&id, &policy).map(|p| PolicyDto::from(&p))
                })
                .await,
            )
        }
        other => api_error(&WarehouseError::invalid(format!(
            "Unknown method: {other}"
        ))),
    }
}
