// apkd-aio/src/lib.rs
//! Asynchronous IO primitives for apkd (filesystem, json, checksums, process)

pub mod checksum;
pub mod fs;
pub mod json_io;
pub mod process;

pub use checksum::sha256_file_async;
pub use fs::{
    atomic_write_file, atomic_write_file_async, install_file_atomically,
    install_file_atomically_async, WORLD_READABLE,
};
pub use json_io::{read_json_async, write_json_async};
pub use process::{run_command_async, run_shell_async, CommandOutput};
