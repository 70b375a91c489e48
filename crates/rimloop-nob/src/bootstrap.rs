//! Self-rebuild of build scripts.
//!
//! A build script calls `go_rebuild_urself!()` first thing in `main`. If
//! its source is newer than the running binary, the binary is moved aside
//! to `<binary>.old`, recompiled in place and re-executed with the same
//! arguments; the parent then exits with the child's exit code.

use std::ffi::OsString;
use std::path::{ Path, PathBuf };
use std::process;

use crate::cmd::Cmd;
use crate::config::Config;
use crate::error::NobError;
use crate::fs::{ file_exists, rename };
use crate::rebuild::needs_rebuild1;


/// Replaced by the binary path in a compiler template.
pub const BINARY_TOKEN: &str = "{binary}";

/// Replaced by the source path in a compiler template.
pub const SOURCE_TOKEN: &str = "{source}";


/// What happened during a bootstrap run.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Outcome {
    /// The binary was newer than its source; nothing was done.
    UpToDate,

    /// The binary was rebuilt and re-run; holds the child's exit code.
    Reexecuted( i32 ),
}


/// The rebuild-and-re-exec state machine for one binary.
#[derive( Debug, Clone )]
pub struct Bootstrap {
    binary: PathBuf,
    source: PathBuf,
    args: Vec<OsString>,
    compiler: Vec<String>,
}


impl Bootstrap {
    /// Bootstrap for `binary` built from `source`, re-run with `args`.
    pub fn new<B, S>( binary: B, source: S, args: Vec<OsString> ) -> Self
    where
        B: Into<PathBuf>,
        S: Into<PathBuf>,
    {
        Self {
            binary: binary.into(),
            source: source.into(),
            args,
            compiler: vec![ "rustc".into(), "-o".into(), BINARY_TOKEN.into(), SOURCE_TOKEN.into() ],
        }
    }


    /// Takes the binary path from `argv[0]`; the rest is kept for re-exec.
    ///
    /// # Panics
    ///
    /// Panics if `argv` is empty.
    pub fn from_args<S, I>( source: S, argv: I ) -> Self
    where
        S: Into<PathBuf>,
        I: IntoIterator<Item = OsString>,
    {
        let mut argv = argv.into_iter();
        let Some( binary ) = argv.next() else {
            panic!( "cannot rebuild without the program path in argv[0]" );
        };

        Self::new( binary, source, argv.collect() )
    }


    /// Sets the compiler command line.
    ///
    /// Words equal to `{binary}` or `{source}` are replaced by the paths.
    pub fn compiler<I, S>( &mut self, template: I ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compiler = template.into_iter().map( Into::into ).collect();
        self
    }


    /// Applies `NOB_REBUILD_CC`, if set.
    pub fn configure( &mut self, config: &Config ) -> &mut Self {
        if let Some( cc ) = &config.rebuild_cc {
            self.compiler( cc.split_whitespace() );
        }
        self
    }


    pub fn binary( &self ) -> &Path {
        &self.binary
    }


    pub fn source( &self ) -> &Path {
        &self.source
    }


    /// Where the previous binary is kept during a rebuild.
    pub fn backup_path( &self ) -> PathBuf {
        let mut backup = self.binary.clone().into_os_string();
        backup.push( ".old" );
        PathBuf::from( backup )
    }


    /// The compiler invocation with paths filled in.
    pub fn compile_cmd( &self ) -> Cmd {
        let mut cmd = Cmd::new();
        for word in &self.compiler {
            match word.as_str() {
                BINARY_TOKEN => cmd.arg( &self.binary ),
                SOURCE_TOKEN => cmd.arg( &self.source ),
                _ => cmd.arg( word ),
            };
        }
        cmd
    }


    pub fn check( &self ) -> Result<bool, NobError> {
        needs_rebuild1( &self.binary, &self.source ).map( |staleness| staleness.is_stale() )
    }


    pub fn backup( &self ) -> Result<(), NobError> {
        rename( &self.binary, &self.backup_path() )
    }


    /// Runs the compiler and checks that it wrote the binary back in place.
    pub fn recompile( &self ) -> Result<(), NobError> {
        self.compile_cmd().run_sync()?;

        if !file_exists( &self.binary )? {
            tracing::error!( "Compiler did not produce `{}`", self.binary.display() );
            return Err( NobError::MissingOutput( self.binary.clone() ) );
        }

        Ok(())
    }


    /// Puts the previous binary back after a failed recompile.
    pub fn rollback( &self ) -> Result<(), NobError> {
        rename( &self.backup_path(), &self.binary )
    }


    /// Runs the rebuilt binary to completion and returns its exit code.
    pub fn reexec( &self ) -> i32 {
        let mut cmd = Cmd::new();
        cmd.arg( &self.binary ).args( &self.args );

        match cmd.run_sync() {
            Ok(()) => 0,
            Err( e ) => e.exit_code(),
        }
    }


    /// Drives the state machine without exiting the process.
    pub fn run( &self ) -> Result<Outcome, NobError> {
        if !self.check()? {
            return Ok( Outcome::UpToDate );
        }

        self.backup()?;

        if let Err( e ) = self.recompile() {
            // Already logged by `rename` if it fails; the compile error wins.
            let _ = self.rollback();
            return Err( e );
        }

        Ok( Outcome::Reexecuted( self.reexec() ) )
    }


    /// Runs the bootstrap and exits unless the binary was up to date.
    pub fn go( &self ) {
        match self.run() {
            Ok( Outcome::UpToDate ) => {}
            Ok( Outcome::Reexecuted( code ) ) => process::exit( code ),
            Err( _ ) => process::exit( 1 ),
        }
    }
}


/// Rebuilds the calling binary from its own source file when it changed.
///
/// With arguments, they form the compiler template (see
/// `Bootstrap::compiler`). `NOB_REBUILD_CC` takes precedence over both.
#[macro_export]
macro_rules! go_rebuild_urself {
    () => {{
        $crate::bootstrap::Bootstrap::from_args( file!(), ::std::env::args_os() )
            .configure( &$crate::config::Config::from_env() )
            .go();
    }};
    ( $( $word:expr ),+ $(,)? ) => {{
        $crate::bootstrap::Bootstrap::from_args( file!(), ::std::env::args_os() )
            .compiler( [ $( $word ),+ ] )
            .configure( &$crate::config::Config::from_env() )
            .go();
    }};
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_default_compile_cmd() {
        let bootstrap = Bootstrap::new( "./nob", "nob.rs", vec![] );
        assert_eq!( bootstrap.compile_cmd().to_string(), "rustc -o ./nob nob.rs" );
        assert_eq!( bootstrap.backup_path(), PathBuf::from( "./nob.old" ) );
    }


    #[test]
    fn test_config_overrides_compiler() {
        let config = Config { rebuild_cc: Some( "cargo build --bin nob".into() ), ..Config::default() };
        let mut bootstrap = Bootstrap::new( "nob", "nob.rs", vec![] );
        bootstrap.compiler( [ "clang", "-o", BINARY_TOKEN, SOURCE_TOKEN ] ).configure( &config );
        assert_eq!( bootstrap.compile_cmd().to_string(), "cargo build --bin nob" );
    }


    #[test]
    fn test_from_args_splits_program_path() {
        let argv = [ "target/debug/nob", "--dist", "out" ].map( OsString::from );
        let bootstrap = Bootstrap::from_args( "nob.rs", argv );
        assert_eq!( bootstrap.binary(), Path::new( "target/debug/nob" ) );
        assert_eq!( bootstrap.args, [ OsString::from( "--dist" ), OsString::from( "out" ) ] );
    }


    #[test]
    #[should_panic( expected = "argv[0]" )]
    fn test_from_args_requires_program_path() {
        Bootstrap::from_args( "nob.rs", Vec::<OsString>::new() );
    }


    #[test]
    fn test_missing_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join( "nob" );
        std::fs::write( &binary, b"" ).unwrap();

        let bootstrap = Bootstrap::new( &binary, dir.path().join( "nob.rs" ), vec![] );
        assert!( matches!( bootstrap.run(), Err( NobError::Io { .. } ) ) );
        assert!( binary.exists() );
    }


    #[cfg( unix )]
    mod unix {
        use std::fs::{ self, File };
        use std::time::{ Duration, UNIX_EPOCH };

        use super::*;


        /// A "compiler" that writes a shell script exiting with `code`.
        fn script_compiler( code: i32 ) -> Vec<String> {
            let script = format!( "printf '#!/bin/sh\\nexit {}\\n' > \"$0\" && chmod +x \"$0\"", code );
            vec![ "sh".into(), "-c".into(), script, BINARY_TOKEN.into() ]
        }


        fn set_mtime( path: &Path, secs: u64 ) {
            let file = File::options().write( true ).open( path ).unwrap();
            file.set_modified( UNIX_EPOCH + Duration::from_secs( secs ) ).unwrap();
        }


        fn stale_setup( dir: &Path ) -> ( PathBuf, PathBuf ) {
            let ( binary, source ) = ( dir.join( "nob" ), dir.join( "nob.rs" ) );
            fs::write( &binary, b"old binary" ).unwrap();
            fs::write( &source, b"fn main() {}" ).unwrap();
            set_mtime( &binary, 1_000 );
            set_mtime( &source, 2_000 );
            ( binary, source )
        }


        #[test]
        fn test_rebuild_then_up_to_date() {
            let dir = tempfile::tempdir().unwrap();
            let ( binary, source ) = stale_setup( dir.path() );

            let mut bootstrap = Bootstrap::new( &binary, &source, vec![ "--flag".into() ] );
            bootstrap.compiler( script_compiler( 0 ) );

            assert_eq!( bootstrap.run().unwrap(), Outcome::Reexecuted( 0 ) );
            assert_eq!( fs::read( bootstrap.backup_path() ).unwrap(), b"old binary" );

            let rebuilt = fs::read( &binary ).unwrap();
            assert_eq!( bootstrap.run().unwrap(), Outcome::UpToDate );
            assert_eq!( fs::read( &binary ).unwrap(), rebuilt );
        }


        #[test]
        fn test_child_exit_code_is_forwarded() {
            let dir = tempfile::tempdir().unwrap();
            let ( binary, source ) = stale_setup( dir.path() );

            let mut bootstrap = Bootstrap::new( &binary, &source, vec![] );
            bootstrap.compiler( script_compiler( 3 ) );
            assert_eq!( bootstrap.run().unwrap(), Outcome::Reexecuted( 3 ) );
        }


        #[test]
        fn test_failed_recompile_rolls_back() {
            let dir = tempfile::tempdir().unwrap();
            let ( binary, source ) = stale_setup( dir.path() );

            let mut bootstrap = Bootstrap::new( &binary, &source, vec![] );
            bootstrap.compiler( [ "false" ] );

            assert!( matches!( bootstrap.run(), Err( NobError::ExitCode( 1 ) ) ) );
            assert_eq!( fs::read( &binary ).unwrap(), b"old binary" );
            assert!( !bootstrap.backup_path().exists() );
        }


        #[test]
        fn test_compiler_without_output_rolls_back() {
            let dir = tempfile::tempdir().unwrap();
            let ( binary, source ) = stale_setup( dir.path() );

            let mut bootstrap = Bootstrap::new( &binary, &source, vec![] );
            bootstrap.compiler( [ "true" ] );

            assert!( matches!( bootstrap.run(), Err( NobError::MissingOutput( _ ) ) ) );
            assert_eq!( fs::read( &binary ).unwrap(), b"old binary" );
            assert!( !bootstrap.backup_path().exists() );
        }


        #[test]
        fn test_fresh_binary_is_untouched() {
            let dir = tempfile::tempdir().unwrap();
            let ( binary, source ) = stale_setup( dir.path() );
            set_mtime( &binary, 3_000 );

            let mut bootstrap = Bootstrap::new( &binary, &source, vec![] );
            bootstrap.compiler( [ "false" ] );

            assert_eq!( bootstrap.run().unwrap(), Outcome::UpToDate );
            assert!( !bootstrap.backup_path().exists() );
        }
    }
}
