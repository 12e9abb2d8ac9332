pub mod media_server;
pub mod process;
