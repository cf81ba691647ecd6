pub mod attendance;
pub mod backup;
pub mod bimesters;
pub mod classes;
pub mod core;
pub mod lessons;
pub mod reports;
pub mod students;
