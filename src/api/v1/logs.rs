//! Live execution log stream

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use futures::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::api::middleware::TenantContext;
use crate::api::state::AppState;
use crate::api::types::ApiError;

/// GET /v1/logs
///
/// Server-sent events feed of LogEntry records emitted during execution.
/// A tenant-scoped subscriber only receives entries for its own runs;
/// the admin scope receives everything. Entries missed while a consumer
/// lags are dropped, not replayed.
pub async fn stream_logs(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>>, ApiError> {
    let tenant = ctx.tenant().map(|t| t.to_string());
    let receiver = state.logs.subscribe();

    let stream = BroadcastStream::new(receiver).filter_map(move |entry| {
        let tenant = tenant.clone();
        async move {
            let entry = entry.ok()?;

            if let Some(tenant) = &tenant {
                if entry.tenant_id.as_deref() != Some(tenant.as_str()) {
                    return None;
                }
            }

            let event = Event::default().event("log").json_data(&entry).ok()?;
            Some(Ok(event))
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
