use anyhow::Result;

use vigil::config::VigilConfig;

/// Spend a streak shield for a user.
pub fn shield(config: &VigilConfig, user_id: &str) -> Result<()> {
    let service = crate::server::build_service(config)?;
    let outcome = service.use_shield(user_id)?;

    println!("Shield used for {}", outcome.covered_date);
    println!("  Current streak:      {}", outcome.state.current_streak);
    println!("  Shields remaining:   {}", outcome.shields_remaining);
    Ok(())
}
