pub mod fixtures;
pub mod odds;
pub mod simulator;
