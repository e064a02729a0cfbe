pub mod cancel_checkin;
pub mod checkin_reply;
pub mod checkin_status;
pub mod register_user;
pub mod start_checkin;
pub mod use_streak_shield;

use cancel_checkin::CancelCheckinParams;
use checkin_reply::CheckinReplyParams;
use checkin_status::CheckinStatusParams;
use register_user::RegisterUserParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use start_checkin::StartCheckinParams;
use std::sync::Arc;
use use_streak_shield::UseStreakShieldParams;

use vigil::checkin::{scoring::display_score, CheckInKind};
use vigil::session::{CheckInService, Command, Turn};

/// The Vigil MCP tool handler. Holds the shared [`CheckInService`] and
/// exposes the check-in tools via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct VigilTools {
    tool_router: ToolRouter<Self>,
    service: Arc<CheckInService>,
}

/// Run a synchronous service call on the blocking pool.
async fn blocking<T, F>(service: &Arc<CheckInService>, f: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce(&CheckInService) -> Result<T, String> + Send + 'static,
{
    let service = Arc::clone(service);
    tokio::task::spawn_blocking(move || f(&service))
        .await
        .map_err(|e| format!("service task failed: {e}"))?
}

fn to_json(value: serde_json::Value) -> Result<String, String> {
    serde_json::to_string(&value).map_err(|e| format!("serialization failed: {e}"))
}

fn parse_kind(command: Option<&str>) -> Result<CheckInKind, String> {
    let Some(raw) = command.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(CheckInKind::Full);
    };
    if let Some(Command::Start(kind)) = Command::parse(raw) {
        return Ok(kind);
    }
    raw.to_ascii_lowercase().parse::<CheckInKind>()
}

#[tool_router]
impl VigilTools {
    pub fn new(service: Arc<CheckInService>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            service,
        }
    }

    /// Register a user so they can check in.
    #[tool(description = "Register a user with their IANA time zone. Required before the first check-in.")]
    async fn register_user(
        &self,
        Parameters(params): Parameters<RegisterUserParams>,
    ) -> Result<String, String> {
        tracing::info!(user_id = %params.user_id, "register_user called");
        let profile = blocking(&self.service, move |svc| {
            svc.register(
                &params.user_id,
                params.timezone.as_deref(),
                params.display_name.as_deref(),
            )
            .map_err(|e| e.to_string())
        })
        .await?;

        to_json(serde_json::json!({
            "user_id": profile.user_id,
            "timezone": profile.timezone,
            "text": format!("Registered {} ({}).", profile.user_id, profile.timezone),
        }))
    }

    /// Open a check-in session.
    #[tool(description = "Start today's check-in. command: '/checkin' (full) or '/quickcheckin' (checklist only, 2 per week). Returns the first question.")]
    async fn start_checkin(
        &self,
        Parameters(params): Parameters<StartCheckinParams>,
    ) -> Result<String, String> {
        let kind = parse_kind(params.command.as_deref())?;
        tracing::info!(user_id = %params.user_id, kind = %kind, "start_checkin called");

        let started = blocking(&self.service, move |svc| {
            svc.start(&params.user_id, kind).map_err(|e| e.to_string())
        })
        .await?;

        to_json(serde_json::json!({
            "date": started.date,
            "kind": started.kind,
            "prompt": started.prompt,
            "text": started.prompt.text(),
        }))
    }

    /// Feed one user reply into the open session.
    #[tool(description = "Send the user's reply to the open check-in: a checklist payload ('sleep_yes', 'deep_work_no:meetings'), 'undo', 'cancel', or free text. Set retry=true to retry a failed save.")]
    async fn checkin_reply(
        &self,
        Parameters(params): Parameters<CheckinReplyParams>,
    ) -> Result<String, String> {
        tracing::debug!(user_id = %params.user_id, retry = ?params.retry, "checkin_reply called");

        let turn = blocking(&self.service, move |svc| {
            let result = if params.retry.unwrap_or(false) {
                svc.retry_commit(&params.user_id).map(Turn::Completed)
            } else {
                svc.reply(&params.user_id, &params.payload)
            };
            result.map_err(|e| e.to_string())
        })
        .await?;

        if let Turn::Completed(report) = &turn {
            tracing::info!(
                user_id = %report.checkin.user_id,
                score = %display_score(report.checkin.compliance_score),
                streak = report.outcome.state.current_streak,
                "check-in completed"
            );
        }

        let text = turn.message();
        let mut value =
            serde_json::to_value(&turn).map_err(|e| format!("serialization failed: {e}"))?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert("text".into(), text.into());
        }
        to_json(value)
    }

    /// Abandon the open session.
    #[tool(description = "Cancel the user's open check-in, including a finished one that failed to save. Nothing is written.")]
    async fn cancel_checkin(
        &self,
        Parameters(params): Parameters<CancelCheckinParams>,
    ) -> Result<String, String> {
        tracing::info!(user_id = %params.user_id, "cancel_checkin called");
        let cancelled = blocking(&self.service, move |svc| {
            svc.cancel(&params.user_id).map_err(|e| e.to_string())
        })
        .await?;

        to_json(serde_json::json!({
            "cancelled": cancelled,
            "text": if cancelled { "Check-in cancelled." } else { "No check-in in progress." },
        }))
    }

    /// Streak, today's state and the open session, if any.
    #[tool(description = "Get a user's streak, whether today's check-in is done, quick check-ins used this week, and any open session. Optionally include recent check-ins.")]
    async fn checkin_status(
        &self,
        Parameters(params): Parameters<CheckinStatusParams>,
    ) -> Result<String, String> {
        tracing::debug!(user_id = %params.user_id, "checkin_status called");
        let history = params.history.unwrap_or(0);

        let (status, recent) = blocking(&self.service, move |svc| {
            let status = svc.status(&params.user_id).map_err(|e| e.to_string())?;
            let recent = if history > 0 {
                svc.history(&params.user_id, history).map_err(|e| e.to_string())?
            } else {
                Vec::new()
            };
            Ok((status, recent))
        })
        .await?;

        let recent: Vec<_> = recent
            .iter()
            .map(|c| {
                serde_json::json!({
                    "date": c.date,
                    "kind": c.kind,
                    "score": c.compliance_score,
                    "corrected": c.corrected_at.is_some(),
                })
            })
            .collect();

        to_json(serde_json::json!({
            "status": status,
            "recent": recent,
        }))
    }

    /// Spend a shield to cover yesterday.
    #[tool(description = "Use a streak shield to cover exactly one missed day (yesterday) so the streak survives. Shields are earned every 7 streak days, max 3.")]
    async fn use_streak_shield(
        &self,
        Parameters(params): Parameters<UseStreakShieldParams>,
    ) -> Result<String, String> {
        tracing::info!(user_id = %params.user_id, "use_streak_shield called");
        let outcome = blocking(&self.service, move |svc| {
            svc.use_shield(&params.user_id).map_err(|e| e.to_string())
        })
        .await?;

        to_json(serde_json::json!({
            "covered_date": outcome.covered_date,
            "shields_remaining": outcome.shields_remaining,
            "current_streak": outcome.state.current_streak,
            "text": format!(
                "Shield used for {}. Your {}-day streak is safe, check in today to extend it.",
                outcome.covered_date, outcome.state.current_streak
            ),
        }))
    }
}

#[tool_handler]
impl ServerHandler for VigilTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Vigil runs daily accountability check-ins. Use start_checkin to begin, \
                 checkin_reply for every user answer, and checkin_status to show streaks."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
