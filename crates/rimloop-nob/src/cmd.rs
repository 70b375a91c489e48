//! Commands: the main workhorse of a build script.
//!
//! A `Cmd` is an ordered list of arguments, the first being the program.
//! It is built up with `arg`/`args`, logged when run, and can be reset and
//! refilled for the next invocation without reallocating.

use std::ffi::{ OsStr, OsString };
use std::fmt;
use std::process::{ Command, Stdio };

use crate::da::{ Da, StringBuilder };
use crate::error::NobError;
use crate::proc::Proc;


/// An external process invocation.
#[derive( Debug, Clone, Default, PartialEq, Eq )]
pub struct Cmd {
    items: Da<OsString>,
}


impl Cmd {
    pub fn new() -> Self {
        Self::default()
    }


    /// Appends one argument.
    pub fn arg<S: AsRef<OsStr>>( &mut self, arg: S ) -> &mut Self {
        self.items.append( arg.as_ref().to_os_string() );
        self
    }


    /// Appends several arguments in order.
    pub fn args<I, S>( &mut self, args: I ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg( arg );
        }
        self
    }


    pub fn items( &self ) -> &[OsString] {
        &self.items
    }


    pub fn len( &self ) -> usize {
        self.items.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.items.is_empty()
    }


    /// Forgets every argument, keeping the allocation for reuse.
    pub fn reset( &mut self ) {
        self.items.clear();
    }


    /// Releases the argument storage.
    pub fn free( &mut self ) {
        self.items.free();
    }


    /// Renders the command for humans into `render`.
    ///
    /// Arguments containing a space are wrapped in single quotes. Quotes
    /// inside arguments are not escaped. No terminator is appended.
    pub fn render( &self, render: &mut StringBuilder ) {
        for ( i, arg ) in self.items.iter().enumerate() {
            let arg = arg.to_string_lossy();
            if i > 0 {
                render.append_str( " " );
            }
            if arg.contains( ' ' ) {
                render.append( b'\'' );
                render.append_str( &arg );
                render.append( b'\'' );
            } else {
                render.append_str( &arg );
            }
        }
    }


    /// Starts the command without waiting for it.
    ///
    /// The child inherits stdin, stdout and stderr. Returns `Proc::INVALID`
    /// if the command is empty or the process could not be started.
    pub fn run_async( &self ) -> Proc {
        let Some(( program, args )) = self.items.split_first() else {
            tracing::error!( "Could not run empty command" );
            return Proc::INVALID;
        };

        tracing::info!( "CMD: {}", self );

        let spawned = Command::new( program )
            .args( args )
            .stdin( Stdio::inherit() )
            .stdout( Stdio::inherit() )
            .stderr( Stdio::inherit() )
            .spawn();

        match spawned {
            Ok( child ) => Proc::from_child( child ),
            Err( e ) => {
                tracing::error!( "Could not spawn child process `{}`: {}", program.to_string_lossy(), e );
                Proc::INVALID
            }
        }
    }


    /// Starts the command and clears it for the next one.
    pub fn run_async_and_reset( &mut self ) -> Proc {
        let proc = self.run_async();
        self.reset();
        proc
    }


    /// Runs the command to completion.
    pub fn run_sync( &self ) -> Result<(), NobError> {
        let proc = self.run_async();
        if !proc.is_valid() {
            return Err( match self.items.first() {
                None => NobError::EmptyCommand,
                Some( _ ) => NobError::InvalidProc,
            } );
        }
        proc.wait()
    }


    /// Runs the command to completion, then clears it for reuse.
    pub fn run_sync_and_reset( &mut self ) -> Result<(), NobError> {
        let result = self.run_sync();
        self.reset();
        result
    }
}


impl fmt::Display for Cmd {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        let mut render = StringBuilder::new();
        self.render( &mut render );
        f.write_str( &String::from_utf8_lossy( &render ) )
    }
}


impl<S: AsRef<OsStr>> Extend<S> for Cmd {
    fn extend<I: IntoIterator<Item = S>>( &mut self, iter: I ) {
        self.args( iter );
    }
}


impl<S: AsRef<OsStr>> FromIterator<S> for Cmd {
    fn from_iter<I: IntoIterator<Item = S>>( iter: I ) -> Self {
        let mut cmd = Cmd::new();
        cmd.args( iter );
        cmd
    }
}


/// Builds a `Cmd` from a list of arguments.
///
/// `cmd!["cargo", "build", "--release"]`
#[macro_export]
macro_rules! cmd {
    ( $( $arg:expr ),* $(,)? ) => {{
        let mut cmd = $crate::cmd::Cmd::new();
        $( cmd.arg( $arg ); )*
        cmd
    }};
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::DA_INIT_CAP;


    #[test]
    fn test_render_quotes_arguments_with_spaces() {
        let cmd = cmd![ "cp", "RimWorld OST.mp3", "dist/" ];
        assert_eq!( cmd.to_string(), "cp 'RimWorld OST.mp3' dist/" );
    }


    #[test]
    fn test_render_does_not_escape_quotes() {
        let cmd = cmd![ "echo", "it's here" ];
        assert_eq!( cmd.to_string(), "echo 'it's here'" );
    }


    #[test]
    fn test_render_is_not_null_terminated() {
        let mut sb = StringBuilder::new();
        cmd![ "rustc", "-o", "nob", "nob.rs" ].render( &mut sb );
        assert_eq!( sb.last(), Some( &b's' ) );
    }


    #[test]
    fn test_fluent_append() {
        let mut cmd = Cmd::new();
        cmd.arg( "cargo" ).args( [ "build", "--release" ] ).arg( "--quiet" );
        assert_eq!( cmd.len(), 4 );
        assert_eq!( cmd.items()[ 0 ], OsString::from( "cargo" ) );
    }


    #[test]
    fn test_empty_command_yields_invalid_handle() {
        let cmd = Cmd::new();
        let proc = cmd.run_async();
        assert!( !proc.is_valid() );
        assert_eq!( proc.id(), None );
        assert!( matches!( cmd.run_sync(), Err( NobError::EmptyCommand ) ) );
    }


    #[test]
    fn test_missing_program_yields_invalid_handle() {
        let cmd = cmd![ "rimloop-definitely-not-a-real-program" ];
        assert!( !cmd.run_async().is_valid() );
        assert!( matches!( cmd.run_sync(), Err( NobError::InvalidProc ) ) );
    }


    #[cfg( unix )]
    #[test]
    fn test_run_sync_reports_exit_status() {
        assert!( cmd![ "true" ].run_sync().is_ok() );
        assert!( matches!( cmd![ "false" ].run_sync(), Err( NobError::ExitCode( 1 ) ) ) );
    }


    #[cfg( unix )]
    #[test]
    fn test_run_sync_and_reset_allows_reuse() {
        let mut cmd = cmd![ "false" ];
        assert!( cmd.run_sync_and_reset().is_err() );
        assert!( cmd.is_empty() );

        cmd.arg( "true" );
        assert!( cmd.run_sync_and_reset().is_ok() );
        assert!( cmd.is_empty() );
        assert_eq!( cmd.items.capacity(), DA_INIT_CAP );
    }


    #[cfg( unix )]
    #[test]
    fn test_run_async_does_not_wait() {
        let started = std::time::Instant::now();
        let proc = cmd![ "sleep", "0.3" ].run_async();
        assert!( started.elapsed() < std::time::Duration::from_millis( 300 ) );
        assert!( proc.wait().is_ok() );
    }
}
