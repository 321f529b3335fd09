//! `SyncDemo`: group chat over a digest-based sync layer.

pub mod app;
pub mod config;
pub mod controller;
pub mod net;
pub mod peers;
pub mod sync;
pub mod ui;
