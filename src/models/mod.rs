pub mod identity;
pub mod job;
pub mod platform;
pub mod provision;
