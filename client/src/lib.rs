pub mod chunk_service;
pub mod command_runner;
pub mod config;
pub mod gfs_client;
pub mod master_service;
