//! Process wiring: config + store + clock -> running services.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use warden_auth::{AuthConfig, AuthServices, Deadline};
use warden_core::{Clock, SystemClock};

use crate::memory_store::InMemoryUserStore;

/// Start-up budget for seeding the bootstrap admin.
const BOOTSTRAP_DEADLINE: Duration = Duration::from_secs(10);

/// Services backed by the in-memory store, with the store handle kept for
/// seeding memberships and injecting faults.
#[derive(Debug, Clone)]
pub struct InMemoryStack {
    pub services: AuthServices,
    pub store: Arc<InMemoryUserStore>,
}

/// Build from the process environment with the wall clock.
pub async fn from_env() -> anyhow::Result<InMemoryStack> {
    let config = AuthConfig::from_env().context("loading auth config from environment")?;
    in_memory(config, Arc::new(SystemClock)).await
}

/// Build services over a fresh in-memory store and seed the bootstrap admin.
pub async fn in_memory(config: AuthConfig, clock: Arc<dyn Clock>) -> anyhow::Result<InMemoryStack> {
    let store = Arc::new(InMemoryUserStore::new());
    let services = AuthServices::new(config, store.clone(), clock).context("building auth services")?;

    if let Some(admin) = services
        .bootstrap(Deadline::within(BOOTSTRAP_DEADLINE))
        .await
        .context("seeding bootstrap admin")?
    {
        tracing::info!(user_id = %admin.id, username = %admin.username, "bootstrap admin seeded");
    }

    Ok(InMemoryStack { services, store })
}
