//! Request-time decision entry point.
//!
//! The coordinator owns the published snapshot. A decision consults the
//! per-host override table first; only when no override exists does the
//! router run. Reloads swap the snapshot atomically; nothing here is ever
//! mutated in place.

use arc_swap::ArcSwap;
use axum::http::{HeaderMap, Method, StatusCode};

use crate::observability::metrics;
use crate::routing::{Action, Decision};
use crate::rules::snapshot::EngineSnapshot;

pub struct DecisionCoordinator {
    snapshot: ArcSwap<EngineSnapshot>,
}

impl DecisionCoordinator {
    pub fn new(snapshot: EngineSnapshot) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(snapshot),
        }
    }

    /// Publish a freshly built snapshot. In-flight decisions keep the one
    /// they already loaded.
    pub fn install(&self, snapshot: EngineSnapshot) {
        self.snapshot.store(std::sync::Arc::new(snapshot));
        tracing::info!("configuration snapshot installed");
    }

    /// Decide one request. `raw_uri` may carry a query string; routing
    /// only sees the path.
    pub fn decide(
        &self,
        host: &str,
        method: &Method,
        raw_uri: &str,
        headers: &HeaderMap,
    ) -> Decision {
        let snapshot = self.snapshot.load();
        let path = raw_uri.split('?').next().unwrap_or(raw_uri);

        let decision = match snapshot.overrides.get(&host.to_lowercase()) {
            Some(Action::Allow) => Decision::allow(None),
            Some(Action::Deny) => Decision::deny(
                StatusCode::FORBIDDEN,
                format!("host `{host}` is denied by override"),
            ),
            None => snapshot.router.check(host, method, path, headers),
        };

        if decision.is_allowed() {
            tracing::debug!(host, method = %method, path, "request allowed");
        } else {
            tracing::info!(
                host,
                method = %method,
                path,
                status = decision.status.as_u16(),
                message = %decision.message,
                "request denied"
            );
        }
        metrics::record_decision(decision.status);

        decision
    }
}
