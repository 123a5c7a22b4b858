pub mod analytics;
pub mod cache;
pub mod classifier;
pub mod coordinator;
pub mod error;
pub mod hazard;
pub mod metadata;
pub mod trace;
pub mod tree_booster;
pub mod window;
