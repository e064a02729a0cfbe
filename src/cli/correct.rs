//! CLI `correct` command: change one checklist answer of a past check-in.

use anyhow::{Context, Result};
use chrono::NaiveDate;

use vigil::checkin::scoring::display_score;
use vigil::checkin::{ChecklistAnswer, ChecklistItem};
use vigil::config::VigilConfig;

pub fn correct(
    config: &VigilConfig,
    user_id: &str,
    date: &str,
    item: &str,
    done: bool,
    detail: Option<&str>,
) -> Result<()> {
    let date: NaiveDate = date
        .parse()
        .with_context(|| format!("invalid date '{date}', expected YYYY-MM-DD"))?;
    let item: ChecklistItem = item.parse().map_err(anyhow::Error::msg)?;
    let mut answer = if done { ChecklistAnswer::yes() } else { ChecklistAnswer::no() };
    if let Some(detail) = detail {
        answer = answer.with_detail(detail);
    }

    let service = crate::server::build_service(config)?;
    let checkin = service.correct_checklist(user_id, date, item, answer)?;

    println!("Corrected {item} for {user_id} on {date}");
    println!("  New score:           {}", display_score(checkin.compliance_score));
    println!("  Streak is unchanged.");
    Ok(())
}
