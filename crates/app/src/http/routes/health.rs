use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub modules: HealthModules,
}

#[derive(Debug, Serialize)]
pub struct HealthModules {
    pub database: DatabaseStatus,
    pub comments: ModuleStatus,
}

#[derive(Debug, Serialize)]
pub struct ModuleStatus {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStatus {
    pub configured: bool,
    pub open_connections: u32,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.db.as_ref() {
        Some(pool) => DatabaseStatus {
            configured: true,
            open_connections: pool.size(),
        },
        None => DatabaseStatus {
            configured: false,
            open_connections: 0,
        },
    };
    Json(HealthResponse {
        status: "ok",
        modules: HealthModules {
            database,
            comments: ModuleStatus { enabled: true },
        },
    })
}
