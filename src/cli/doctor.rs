//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};

use vigil::config::VigilConfig;
use vigil::db;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &VigilConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `vigil serve` or `vigil user add` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path)
        .map(|m| m.len())
        .unwrap_or(0);

    let conn = db::open_database(&db_path)
        .context("failed to open database (may be corrupt)")?;

    let report = db::check_database_health(&conn)
        .context("failed to run health check")?;

    println!("Vigil Health Report");
    println!("===================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("Default zone:      {}", config.checkin.default_timezone);
    if config.checkin.default_timezone.parse::<chrono_tz::Tz>().is_err() {
        println!("  WARNING: not an IANA zone name, UTC is used instead.");
    }
    println!();
    println!("Row counts:");
    println!("  Users:           {}", report.user_count);
    println!("  Check-ins:       {}", report.checkin_count);
    println!("  Open sessions:   {}", report.session_count);
    println!("  Audit log:       {}", report.log_count);
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery steps:");
        println!("  1. Stop the server.");
        println!("  2. Restore from a backup: cp backup.db ~/.vigil/vigil.db");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
