//! CLI `user add` command.

use anyhow::Result;

use vigil::config::VigilConfig;

pub fn add(
    config: &VigilConfig,
    user_id: &str,
    timezone: Option<&str>,
    display_name: Option<&str>,
) -> Result<()> {
    let service = crate::server::build_service(config)?;
    let profile = service.register(user_id, timezone, display_name)?;

    println!("Registered {}", profile.user_id);
    println!("  Time zone:       {}", profile.timezone);
    if let Some(ref name) = profile.display_name {
        println!("  Display name:    {name}");
    }
    Ok(())
}
