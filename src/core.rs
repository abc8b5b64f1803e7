pub mod identity;
pub mod insights;
pub mod ranking;
pub mod single_flight;
