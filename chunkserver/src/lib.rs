pub mod chunkserver_state;
pub mod client;
pub mod config;
pub mod peer;
pub mod tcp;
