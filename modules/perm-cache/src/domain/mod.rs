pub mod data;
pub mod dispatch;
pub mod error;
pub mod evaluator;
pub mod grants;
pub mod permission_map;
pub mod scope;
pub mod tables;
