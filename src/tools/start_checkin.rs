use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StartCheckinParams {
    #[schemars(description = "Chat user id")]
    pub user_id: String,

    #[schemars(
        description = "Either a command ('/checkin', '/quickcheckin') or a flow name ('full', 'abbreviated'). Defaults to 'full'."
    )]
    pub command: Option<String>,
}
