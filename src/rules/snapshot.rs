//! Compiled configuration snapshots.
//!
//! A snapshot is everything one decision needs: the bound routing table
//! and the per-host override map. It is built completely off to the side
//! and only then published, so in-flight decisions always observe either
//! the fully-old or the fully-new configuration.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::document::AccessSystem;
use crate::config::loader::ConfigError;
use crate::expr::Registry;
use crate::identity::IdentityResolver;
use crate::routing::{Action, PatternRouter};
use crate::rules::binder;

pub struct EngineSnapshot {
    pub router: PatternRouter,
    /// Host (lowercased) → forced decision, bypassing the router.
    pub overrides: HashMap<String, Action>,
    /// Informational owner tag from the document.
    pub owner: String,
}

impl EngineSnapshot {
    /// Compile a rule document into a snapshot. Any compile or validation
    /// failure aborts the whole snapshot.
    pub fn build(
        doc: &AccessSystem,
        resolver: Option<Arc<IdentityResolver>>,
        registry: Arc<Registry>,
    ) -> Result<Self, ConfigError> {
        let router = binder::bind(doc, resolver, registry)?;
        let overrides = doc
            .overrides
            .iter()
            .map(|(host, action)| (host.to_lowercase(), *action))
            .collect();
        Ok(Self {
            router,
            overrides,
            owner: doc.owner.clone(),
        })
    }
}
