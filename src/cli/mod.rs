pub mod correct;
pub mod doctor;
pub mod history;
pub mod shield;
pub mod status;
pub mod sweep;
pub mod user;
