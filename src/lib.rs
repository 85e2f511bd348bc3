//! Social profile provisioning for media titles.
//!
//! This library derives deterministic brand handles for a title (Facebook
//! page, YouTube channel, Instagram account), then drives the per-platform
//! creation flows through pre-authenticated browser sessions and cloud
//! phone devices, recording progress in a durable per-step state machine.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod naming;
pub mod routes;
pub mod services;
