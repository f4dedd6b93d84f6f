pub mod common;
pub mod lookup;
pub mod report;
pub mod watch;
