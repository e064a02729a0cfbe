use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UseStreakShieldParams {
    #[schemars(description = "Chat user id")]
    pub user_id: String,
}
