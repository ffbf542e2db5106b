pub mod client_handler;
pub mod config;
pub mod health_monitor;
pub mod master_state;
pub mod selection_policy;
pub mod tcp;
