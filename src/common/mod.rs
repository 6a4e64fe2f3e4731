pub mod config;
pub mod drive_client;
pub mod jwt;
pub mod notion_client;
pub mod types;
