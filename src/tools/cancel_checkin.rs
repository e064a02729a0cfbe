use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CancelCheckinParams {
    #[schemars(description = "Chat user id")]
    pub user_id: String,
}
