//! CLI `history` command: list recent check-ins.

use anyhow::Result;

use vigil::checkin::scoring::display_score;
use vigil::checkin::ChecklistItem;
use vigil::config::VigilConfig;

pub fn history(config: &VigilConfig, user_id: &str, limit: usize, json: bool) -> Result<()> {
    let service = crate::server::build_service(config)?;
    let checkins = service.history(user_id, limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&checkins)?);
        return Ok(());
    }

    if checkins.is_empty() {
        println!("No check-ins yet for {user_id}.");
        return Ok(());
    }

    println!("{:<12} {:<12} {:>7}  checklist", "date", "kind", "score");
    for c in &checkins {
        let marks: String = ChecklistItem::ALL
            .iter()
            .map(|item| if c.checklist.is_done(*item) { 'x' } else { '.' })
            .collect();
        let corrected = if c.corrected_at.is_some() { "  (corrected)" } else { "" };
        println!(
            "{:<12} {:<12} {:>7}  {marks}{corrected}",
            c.date.to_string(),
            c.kind.as_str(),
            display_score(c.compliance_score)
        );
    }
    Ok(())
}
