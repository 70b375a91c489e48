//! Handles to spawned child processes.

use std::process::{ Child, ExitStatus };

use crate::da::Da;
use crate::error::NobError;


/// A spawned process, or the invalid handle when nothing was started.
#[derive( Debug )]
pub struct Proc {
    child: Option<Child>,
}


impl Proc {
    /// Handle meaning "no process was started".
    pub const INVALID: Proc = Proc { child: None };


    pub(crate) fn from_child( child: Child ) -> Self {
        Self { child: Some( child ) }
    }


    pub fn is_valid( &self ) -> bool {
        self.child.is_some()
    }


    /// OS process id, if a process was started.
    pub fn id( &self ) -> Option<u32> {
        self.child.as_ref().map( Child::id )
    }


    /// Blocks until the child terminates.
    ///
    /// Succeeds only if the child exited normally with status 0. Waiting
    /// reaps the child, so the handle is consumed.
    pub fn wait( self ) -> Result<(), NobError> {
        let Some( mut child ) = self.child else {
            // The failed spawn was already reported by `run_async`.
            tracing::debug!( "Skipping wait on an invalid process handle" );
            return Err( NobError::InvalidProc );
        };

        let pid = child.id();
        let status = child.wait().map_err( |source| {
            tracing::error!( "Could not wait on command (pid {}): {}", pid, source );
            NobError::Wait { pid, source }
        } )?;

        check_status( status )
    }
}


/// Maps an exit status onto success, logging the reason for failure.
pub(crate) fn check_status( status: ExitStatus ) -> Result<(), NobError> {
    if status.success() {
        return Ok(());
    }

    if let Some( code ) = status.code() {
        tracing::error!( "Command exited with exit code {}", code );
        return Err( NobError::ExitCode( code ) );
    }

    let signal = termination_signal( status );
    tracing::error!( "Command process was terminated by {}", signal );
    Err( NobError::Signaled( signal ) )
}


#[cfg( unix )]
fn termination_signal( status: ExitStatus ) -> String {
    use std::os::unix::process::ExitStatusExt;

    use nix::sys::signal::Signal;

    match status.signal() {
        Some( raw ) => Signal::try_from( raw )
            .map( |signal| signal.as_str().to_string() )
            .unwrap_or_else( |_| format!( "signal {}", raw ) ),
        None => "an unknown cause".to_string(),
    }
}


#[cfg( not( unix ) )]
fn termination_signal( _status: ExitStatus ) -> String {
    "an unknown cause".to_string()
}


/// A batch of processes started with `run_async`, waited on together.
#[derive( Debug, Default )]
pub struct Procs {
    items: Da<Proc>,
}


impl Procs {
    pub fn new() -> Self {
        Self::default()
    }


    pub fn push( &mut self, proc: Proc ) {
        self.items.append( proc );
    }


    pub fn len( &self ) -> usize {
        self.items.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.items.is_empty()
    }


    /// Waits on every process, even after one has failed.
    ///
    /// The result is the logical AND of all the waits; the first failure is
    /// the one returned.
    pub fn wait( self ) -> Result<(), NobError> {
        let mut result = Ok(());

        for proc in self.items {
            let waited = proc.wait();
            if result.is_ok() {
                result = waited;
            }
        }

        result
    }
}


impl Extend<Proc> for Procs {
    fn extend<I: IntoIterator<Item = Proc>>( &mut self, iter: I ) {
        self.items.extend( iter );
    }
}


impl FromIterator<Proc> for Procs {
    fn from_iter<I: IntoIterator<Item = Proc>>( iter: I ) -> Self {
        Self { items: iter.into_iter().collect() }
    }
}


#[cfg( all( test, unix ) )]
mod tests {
    use super::*;
    use crate::cmd::Cmd;


    fn sh( script: &str ) -> Cmd {
        let mut cmd = Cmd::new();
        cmd.arg( "sh" ).arg( "-c" ).arg( script );
        cmd
    }


    #[test]
    fn test_wait_success_on_zero_exit() {
        let proc = sh( "exit 0" ).run_async();
        assert!( proc.is_valid() );
        assert!( proc.wait().is_ok() );
    }


    #[test]
    fn test_wait_fails_on_nonzero_exit() {
        let result = sh( "exit 7" ).run_async().wait();
        assert!( matches!( result, Err( NobError::ExitCode( 7 ) ) ) );
    }


    #[test]
    fn test_wait_fails_on_signal() {
        let result = sh( "kill -9 $$" ).run_async().wait();
        match result {
            Err( NobError::Signaled( name ) ) => assert_eq!( name, "SIGKILL" ),
            other => panic!( "expected signal termination, got {:?}", other ),
        }
    }


    #[test]
    fn test_wait_on_invalid_handle_fails() {
        assert!( matches!( Proc::INVALID.wait(), Err( NobError::InvalidProc ) ) );
    }


    #[test]
    fn test_batch_wait_reaps_all_and_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join( "second-finished" );

        let mut procs = Procs::new();
        procs.push( sh( "exit 1" ).run_async() );
        procs.push( sh( &format!( "sleep 0.2; touch '{}'", marker.display() ) ).run_async() );
        assert_eq!( procs.len(), 2 );

        assert!( matches!( procs.wait(), Err( NobError::ExitCode( 1 ) ) ) );
        // The second child was waited on despite the first failing.
        assert!( marker.exists() );
    }


    #[test]
    fn test_batch_wait_continues_past_invalid_handle() {
        let procs: Procs = vec![ Proc::INVALID, sh( "exit 0" ).run_async() ].into_iter().collect();
        assert!( matches!( procs.wait(), Err( NobError::InvalidProc ) ) );
    }


    #[test]
    fn test_batch_wait_all_success() {
        let procs: Procs = ( 0..3 ).map( |_| sh( "exit 0" ).run_async() ).collect();
        assert!( procs.wait().is_ok() );
    }
}
