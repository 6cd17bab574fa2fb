//! Axum middleware applied to the router.
//!
//! Includes the per-request wipe scope and the request timeout. Tracing and
//! compression come straight from `tower-http`.

use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use seal_core::{WipeRegistry, WipeScope};
use tracing::warn;

use super::state::AppState;

/// Default per-request timeout applied to all routes.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Flushes a scope when dropped, so cancellation and panics unwinding
/// through the handler are covered as well as normal completion.
///
/// The drop path flushes inline on the current thread. Requests that run to
/// completion go through [`FlushOnDrop::finish`] instead, which keeps the
/// destruction off the async executor.
struct FlushOnDrop {
    registry: WipeRegistry,
    scope: Option<WipeScope>,
}

impl FlushOnDrop {
    /// Flush on the blocking pool and disarm the guard.
    async fn finish(mut self) {
        let Some(scope) = self.scope.take() else {
            return;
        };
        let registry = self.registry.clone();
        let flushed = tokio::task::spawn_blocking(move || {
            registry.flush(&scope);
        })
        .await;
        if let Err(e) = flushed {
            // The scope's own drop destroys anything left behind.
            warn!(error = %e, "wipe flush task failed");
        }
    }
}

impl Drop for FlushOnDrop {
    fn drop(&mut self) {
        if let Some(scope) = self.scope.take() {
            self.registry.flush(&scope);
        }
    }
}

/// Open a [`WipeScope`] for the request and flush it once the response is
/// produced or the request is abandoned.
///
/// Handlers receive the scope as `Extension<WipeScope>`.
pub async fn wipe_scope(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let scope = state.wipe.begin();
    let flush = FlushOnDrop {
        registry: state.wipe.clone(),
        scope: Some(scope.clone()),
    };
    req.extensions_mut().insert(scope);
    let response = next.run(req).await;
    flush.finish().await;
    response
}
