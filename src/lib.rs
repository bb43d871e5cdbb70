pub mod catalog;
pub mod commands;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod pricing;
pub mod qr;
pub mod wal;
pub mod watcher;
