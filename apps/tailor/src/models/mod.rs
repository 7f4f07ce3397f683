pub mod intelligence;
pub mod job;
pub mod profile;
pub mod resume;
