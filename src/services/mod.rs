pub mod browser;
pub mod device;
pub mod executor;
pub mod facebook;
pub mod instagram;
pub mod orchestrator;
pub mod otp;
pub mod queue;
pub mod youtube;
