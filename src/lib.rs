//! Daily accountability check-ins over MCP.
//!
//! Vigil walks a user through a short daily check-in: a fixed six-item
//! checklist, then three reflection questions. The completed check-in is
//! scored, folded into the user's consecutive-day streak and persisted in one
//! transaction.
//!
//! | Flow | Steps | Weekly limit |
//! |------|-------|--------------|
//! | **Full** (`/checkin`) | checklist, challenges, rating, plan | none |
//! | **Abbreviated** (`/quickcheckin`) | checklist only | 2 (Monday reset) |
//!
//! # Architecture
//!
//! - **Storage**: SQLite (WAL) with one row per user and one row per check-in day
//! - **Days**: the user's IANA zone with a 03:00 grace window
//! - **Transport**: MCP over stdio, plus a CLI for inspection and maintenance
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema, migrations, and health checks
//! - [`checkin`]: Check-in records, compliance scoring, and calendar math
//! - [`streak`]: Streak transitions, milestones, recovery, and shields
//! - [`session`]: The conversation state machine and the service driving it
//! - [`repository`]: Atomic persistence of check-ins with their streak update
//! - [`feedback`]: Post-commit messages with a fallback

pub mod checkin;
pub mod config;
pub mod db;
pub mod feedback;
pub mod repository;
pub mod session;
pub mod streak;
