pub mod api;
pub mod bot;
pub mod catalog;
pub mod config;
pub mod custom_id;
pub mod discord;
pub mod error;
pub mod metrics;
pub mod roster;
pub mod session;
pub mod store;
pub mod sweeper;
pub mod ui;
