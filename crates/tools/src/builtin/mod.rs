pub mod adapters;
pub mod calculate;
pub mod code_exec;
pub mod file_io;
pub mod time;
