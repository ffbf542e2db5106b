pub mod file_lock;
pub mod file_storage;
pub mod storage;
