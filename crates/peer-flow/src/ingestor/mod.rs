pub mod history;
pub mod logs;
pub mod process_table;
pub mod source;
