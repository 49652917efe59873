pub mod exercise;
pub mod job;
pub mod routine;
pub mod transaction;
