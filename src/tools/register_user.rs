//! MCP `register_user` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `register_user` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RegisterUserParams {
    #[schemars(description = "Stable chat user id")]
    pub user_id: String,

    #[schemars(description = "IANA time zone, e.g. 'Europe/Berlin'. Defaults to the server's default zone.")]
    pub timezone: Option<String>,

    #[schemars(description = "Optional display name")]
    pub display_name: Option<String>,
}
