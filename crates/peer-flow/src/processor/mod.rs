pub mod aggregate;
pub mod classify;
pub mod fees;
pub mod jobs;
