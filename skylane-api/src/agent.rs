use axum::{extract::State, routing::post, Json, Router};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use skylane_agent::{ToolCall, ToolResult};

use crate::{auth::authenticate, error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/agent/tool", post(dispatch_tool))
}

/// Execute one assistant tool call on behalf of the authenticated user.
/// Tool failures come back as structured results, not HTTP errors.
async fn dispatch_tool(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Json(call): Json<ToolCall>,
) -> Result<Json<ToolResult>, AppError> {
    let claims = authenticate(&state, &bearer)?;
    let result = state.agent.dispatch(&claims.sub, call).await;
    Ok(Json(result))
}
