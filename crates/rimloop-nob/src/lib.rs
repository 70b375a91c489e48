//! An imperative build-script runtime.
//!
//! Build scripts are plain Rust binaries: they assemble commands, run them,
//! compare timestamps to skip work that is already done, and rebuild
//! themselves when their own source changes.
//!
//! ```no_run
//! use rimloop_nob::{ cmd, needs_rebuild1 };
//!
//! rimloop_nob::go_rebuild_urself!();
//!
//! if needs_rebuild1( "main", "main.rs" )?.is_stale() {
//!     cmd![ "rustc", "-o", "main", "main.rs" ].run_sync()?;
//! }
//! # Ok::<(), rimloop_nob::NobError>(())
//! ```

pub mod bootstrap;
pub mod cmd;
pub mod config;
pub mod da;
pub mod error;
pub mod fs;
pub mod logging;
pub mod proc;
pub mod rebuild;
pub mod sv;
pub mod temp;

pub use bootstrap::{ Bootstrap, Outcome };
pub use cmd::Cmd;
pub use config::Config;
pub use da::{ Da, StringBuilder, DA_INIT_CAP };
pub use error::NobError;
pub use fs::{
    copy_directory_recursively, copy_file, file_exists, get_file_type, mkdir_if_not_exists, read_entire_dir,
    read_entire_file, rename, write_entire_file, FilePaths, FileType,
};
pub use proc::{ Proc, Procs };
pub use rebuild::{ needs_rebuild, needs_rebuild1, Staleness };
pub use sv::Sv;
pub use temp::{ TempArena, TempSlice, DEFAULT_TEMP_CAPACITY };
