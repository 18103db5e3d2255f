//! Free to Play Hearthstone Tracker backend.
//!
//! Tracks a ranked list of users. Each user may move their own rank up or
//! down, one step at a time, between 1 and 25.

pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod rank;
pub mod routes;
pub mod session;
pub mod user;
pub mod view;
