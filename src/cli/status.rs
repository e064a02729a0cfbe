use anyhow::Result;

use vigil::checkin::scoring::display_score;
use vigil::config::VigilConfig;

/// Print a user's streak and today's check-in state.
pub fn status(config: &VigilConfig, user_id: &str) -> Result<()> {
    let service = crate::server::build_service(config)?;
    let report = service.status(user_id)?;
    let streak = &report.streak;

    println!("Vigil status for {}", report.user_id);
    println!("{}", "=".repeat(40));
    println!("  Time zone:           {}", report.timezone);
    println!("  Check-in day:        {}", report.today);
    println!(
        "  Checked in today:    {}",
        if report.checked_in_today { "yes" } else { "no" }
    );
    println!();

    println!("Streak:");
    println!("  Current:             {}", streak.current_streak);
    println!("  Longest:             {}", streak.longest_streak);
    println!("  Total check-ins:     {}", streak.total_checkins);
    if let Some(last) = streak.last_checkin_date {
        println!("  Last check-in:       {last}");
    }
    if let Some(reset) = streak.last_reset_date {
        println!("  Last reset:          {reset} (lost {} days)", streak.streak_before_reset);
    }
    println!("  Shields:             {}", report.streak_shields);
    println!(
        "  Quick check-ins:     {} of {} this week",
        report.abbreviated_used, report.abbreviated_limit
    );

    if let Some(ref session) = report.session {
        println!();
        println!("Open session:");
        println!("  Flow:                {}", session.kind);
        println!("  Step:                {}", session.step);
        println!("  Checklist answered:  {}", session.answered);
        if session.commit_pending {
            println!("  Finished but NOT saved, retry with the checkin_reply tool (retry=true).");
        } else if session.expired {
            println!("  Expired, will be cleared by `vigil sweep`.");
        }
    }

    if let Some(latest) = service.history(user_id, 1)?.first() {
        println!();
        println!(
            "Latest check-in:       {} ({}, {})",
            latest.date,
            latest.kind,
            display_score(latest.compliance_score)
        );
    }

    Ok(())
}
