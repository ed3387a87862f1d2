pub mod acquire;
pub mod app;
pub mod config;
pub mod database;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod output;
pub mod source;
pub mod store;
pub mod table;
