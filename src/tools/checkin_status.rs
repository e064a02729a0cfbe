//! MCP `checkin_status` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `checkin_status` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CheckinStatusParams {
    #[schemars(description = "Chat user id")]
    pub user_id: String,

    #[schemars(description = "Number of recent check-ins to include (default 0)")]
    pub history: Option<usize>,
}
