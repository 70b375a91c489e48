//! Error type shared by every fallible runtime operation.
//!
//! Each failure is logged exactly once, at the point where it happens,
//! and then handed back to the caller as a `NobError`.

use std::io;
use std::path::{ Path, PathBuf };

use thiserror::Error;


/// Errors that can occur while orchestrating a build.
#[derive( Debug, Error )]
pub enum NobError {
    #[error( "Could not run empty command" )]
    EmptyCommand,

    #[error( "Could not spawn child process `{program}`: {source}" )]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error( "No process was started" )]
    InvalidProc,

    #[error( "Could not wait on command (pid {pid}): {source}" )]
    Wait {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error( "Command exited with exit code {0}" )]
    ExitCode( i32 ),

    #[error( "Command process was terminated by {0}" )]
    Signaled( String ),

    #[error( "{action} `{}`: {source}", path.display() )]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error( "Could not rename `{}` to `{}`: {source}", from.display(), to.display() )]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error( "Compiler did not produce `{}`", .0.display() )]
    MissingOutput( PathBuf ),

    #[error( "Unsupported type of file `{}`", .0.display() )]
    UnsupportedFileType( PathBuf ),

    #[error( "File name is not valid UTF-8: `{}`", .0.display() )]
    NonUtf8Name( PathBuf ),
}


impl NobError {
    /// Logs a filesystem failure and wraps it.
    pub(crate) fn io( action: &'static str, path: &Path, source: io::Error ) -> Self {
        tracing::error!( "{} `{}`: {}", action, path.display(), source );
        NobError::Io { action, path: path.to_path_buf(), source }
    }


    /// Exit code a process should terminate with when this error ends it.
    pub fn exit_code( &self ) -> i32 {
        match self {
            NobError::ExitCode( code ) if *code != 0 => *code,
            _ => 1,
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_io_error_message() {
        let err = NobError::io(
            "Could not stat",
            Path::new( "missing.rs" ),
            io::Error::from( io::ErrorKind::NotFound ),
        );
        assert!( err.to_string().starts_with( "Could not stat `missing.rs`:" ) );
    }


    #[test]
    fn test_exit_code_forwards_child_status() {
        assert_eq!( NobError::ExitCode( 3 ).exit_code(), 3 );
        assert_eq!( NobError::Signaled( "SIGKILL".into() ).exit_code(), 1 );
        assert_eq!( NobError::EmptyCommand.exit_code(), 1 );
    }
}
