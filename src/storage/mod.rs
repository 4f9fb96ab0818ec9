pub mod history;
pub mod holdings;
pub mod session;
