//! MCP server initialization for the stdio transport.
//!
//! [`build_service`] wires the database, session store, clock and feedback
//! provider into a [`CheckInService`]; [`serve_stdio`] exposes it as MCP tools.

use anyhow::Result;
use rmcp::ServiceExt;
use std::sync::{Arc, Mutex};

use crate::tools::VigilTools;
use vigil::checkin::SystemClock;
use vigil::config::VigilConfig;
use vigil::db;
use vigil::feedback::TemplateFeedback;
use vigil::repository::{SqliteRepository, SqliteSessionStore};
use vigil::session::{CheckInService, ServiceSettings};

/// Open the configured database and build the check-in service on top of it.
pub fn build_service(config: &VigilConfig) -> Result<Arc<CheckInService>> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    let db = Arc::new(Mutex::new(conn));
    let service = CheckInService::new(
        Arc::new(SqliteRepository::new(Arc::clone(&db))),
        Arc::new(SqliteSessionStore::new(db)),
        Arc::new(SystemClock),
        Arc::new(TemplateFeedback),
        ServiceSettings::from_config(config),
    );
    Ok(Arc::new(service))
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: VigilConfig) -> Result<()> {
    tracing::info!("starting Vigil MCP server on stdio");

    let service = build_service(&config)?;

    // Sessions left over from a previous run.
    match service.expire_idle() {
        Ok(expired) if !expired.is_empty() => {
            tracing::info!(count = expired.len(), "cleared stale sessions at startup")
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "startup session sweep failed"),
    }

    let tools = VigilTools::new(service);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}
