pub mod least_loaded_policy;
pub mod selection_policy;
