pub mod error;
pub mod logger;
pub mod message;
pub mod replica_directory;
pub mod result;
pub mod retry_policy;
pub mod tcp_connector;
