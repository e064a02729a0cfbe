//! MCP `checkin_reply` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `checkin_reply` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CheckinReplyParams {
    #[schemars(description = "Chat user id")]
    pub user_id: String,

    #[schemars(
        description = "The user's reply: a button payload like 'sleep_yes' or 'training_no:rest day', 'undo', 'cancel', or free text"
    )]
    pub payload: String,

    #[schemars(description = "Retry saving a finished check-in whose previous save failed. Ignores payload.")]
    pub retry: Option<bool>,
}
