//! CLI `sweep` command: clear idle and closed check-in sessions.

use anyhow::Result;

use vigil::config::VigilConfig;

pub fn sweep(config: &VigilConfig) -> Result<()> {
    let service = crate::server::build_service(config)?;
    let expired = service.expire_idle()?;

    if expired.is_empty() {
        println!("No idle sessions.");
    } else {
        println!("Cleared {} session(s):", expired.len());
        for user_id in &expired {
            println!("  {user_id}");
        }
    }
    Ok(())
}
