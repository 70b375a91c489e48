//! Build script for Rimloop.
//!
//! Run from the workspace root:
//!
//! ```text
//! ./target/debug/nob                 build the player if any source changed
//! ./target/debug/nob --clean         remove the built player
//! ./target/debug/nob --dist <dir>    build, then bundle the player with its music
//! ```
//!
//! Editing this file is enough to change the build: the next run rebuilds
//! `nob` itself first.

use std::ffi::OsStr;
use std::io;
use std::path::{ Path, PathBuf };
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use rimloop_core::catalog::{ MUSIC_FOLDER, TIMESTAMPS_FOLDER };
use rimloop_nob::{
    cmd, copy_directory_recursively, copy_file, file_exists, get_file_type, logging, mkdir_if_not_exists,
    needs_rebuild, read_entire_dir, Config, FilePaths, FileType, NobError, TempArena,
};


/// Binary target of the player.
const PLAYER: &str = "rimloop";

/// Directories whose sources the player is built from.
const SOURCE_DIRS: &[&str] = &[
    "crates/rimloop-nob/src",
    "crates/rimloop-core/src",
    "crates/rimloop-cli/src",
];

/// Manifests the player build depends on.
const MANIFESTS: &[&str] = &[
    "Cargo.toml",
    "crates/rimloop-nob/Cargo.toml",
    "crates/rimloop-core/Cargo.toml",
    "crates/rimloop-cli/Cargo.toml",
];


/// nob - builds the Rimloop player.
#[derive( Parser, Debug )]
#[command( name = "nob" )]
#[command( about, long_about = None )]
struct Args {
    /// Remove the built player and exit.
    #[arg( long )]
    clean: bool,

    /// Copy the player, music and timestamps into this directory.
    #[arg( long, value_name = "DIR" )]
    dist: Option<PathBuf>,
}


fn main() -> ExitCode {
    let config = Config::from_env();
    logging::init( &config );

    rimloop_nob::go_rebuild_urself!( "cargo", "build", "--quiet", "--bin", "nob" );

    let args = Args::parse();
    let mut temp = TempArena::new( config.temp_capacity );

    match run( &args, &mut temp, Path::new( "." ) ) {
        Ok(()) => ExitCode::SUCCESS,
        Err( e ) => match e.downcast_ref::<NobError>() {
            // Already logged where it happened.
            Some( nob ) => ExitCode::from( u8::try_from( nob.exit_code() ).unwrap_or( 1 ) ),
            None => {
                tracing::error!( "{:#}", e );
                ExitCode::FAILURE
            }
        },
    }
}


/// Runs the requested steps against the workspace at `root`.
fn run( args: &Args, temp: &mut TempArena, root: &Path ) -> Result<()> {
    if args.clean {
        return clean( root );
    }

    build_player( temp, root )?;

    if let Some( dir ) = &args.dist {
        dist( temp, root, dir )?;
    }

    Ok(())
}


fn player_binary( root: &Path ) -> PathBuf {
    root.join( "target" )
        .join( "release" )
        .join( format!( "{}{}", PLAYER, std::env::consts::EXE_SUFFIX ) )
}


fn clean( root: &Path ) -> Result<()> {
    let binary = player_binary( root );

    match std::fs::remove_file( &binary ) {
        Ok(()) => tracing::info!( "Removed `{}`", binary.display() ),
        Err( e ) if e.kind() == io::ErrorKind::NotFound => {
            tracing::info!( "Nothing to clean, `{}` does not exist", binary.display() );
        }
        Err( e ) => {
            tracing::error!( "Could not remove `{}`: {}", binary.display(), e );
            return Err( e.into() );
        }
    }

    Ok(())
}


/// Builds the player in release mode unless it is newer than every input.
fn build_player( temp: &mut TempArena, root: &Path ) -> Result<()> {
    let mut inputs: Vec<PathBuf> = MANIFESTS.iter().map( |manifest| root.join( manifest ) ).collect();
    for dir in SOURCE_DIRS {
        collect_sources( temp, &root.join( dir ), &mut inputs )?;
    }
    tracing::debug!( "{} inputs for `{}`", inputs.len(), PLAYER );

    let binary = player_binary( root );
    if !needs_rebuild( &binary, &inputs )?.is_stale() {
        tracing::info!( "`{}` is up to date", binary.display() );
        return Ok(());
    }

    let mut cmd = cmd![ "cargo", "build", "--release", "--bin", PLAYER ];
    cmd.run_sync_and_reset()?;
    Ok(())
}


/// Appends every `.rs` file under `dir` to `sources`.
fn collect_sources( temp: &mut TempArena, dir: &Path, sources: &mut Vec<PathBuf> ) -> Result<(), NobError> {
    let checkpoint = temp.save();
    let result = walk_sources( temp, dir, sources );
    temp.rewind( checkpoint );
    result
}


fn walk_sources( temp: &mut TempArena, dir: &Path, sources: &mut Vec<PathBuf> ) -> Result<(), NobError> {
    let mut children = FilePaths::new();
    read_entire_dir( temp, dir, &mut children )?;

    for &child in children.iter() {
        let path = dir.join( temp.str( child ) );

        match get_file_type( &path )? {
            FileType::Directory => collect_sources( temp, &path, sources )?,
            FileType::Regular if path.extension() == Some( OsStr::new( "rs" ) ) => sources.push( path ),
            _ => {}
        }
    }

    Ok(())
}


/// Bundles the player with the music and timestamp folders.
fn dist( temp: &mut TempArena, root: &Path, dir: &Path ) -> Result<()> {
    mkdir_if_not_exists( dir )?;

    let binary = player_binary( root );
    let file_name = binary.file_name().unwrap_or( OsStr::new( PLAYER ) );
    copy_file( &binary, &dir.join( file_name ) )?;

    for folder in [ MUSIC_FOLDER, TIMESTAMPS_FOLDER ] {
        let src = root.join( folder );
        if !file_exists( &src )? {
            tracing::warn!( "No `{}` folder, skipping it", folder );
            continue;
        }
        copy_directory_recursively( temp, &src, &dir.join( folder ) )?;
    }

    tracing::info!( "Bundled `{}` into `{}`", PLAYER, dir.display() );
    Ok(())
}


#[cfg( test )]
mod tests {
    use std::fs;

    use super::*;


    fn touch( path: &Path ) {
        fs::create_dir_all( path.parent().unwrap() ).unwrap();
        fs::write( path, b"" ).unwrap();
    }


    #[test]
    fn test_collect_sources_finds_nested_rust_files() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join( "src" );
        touch( &src.join( "main.rs" ) );
        touch( &src.join( "notes.txt" ) );
        touch( &src.join( "bin" ).join( "nob.rs" ) );
        touch( &src.join( "bin" ).join( "deep" ).join( "util.rs" ) );

        let mut temp = TempArena::new( 4096 );
        let before = temp.save();
        let mut sources = Vec::new();
        collect_sources( &mut temp, &src, &mut sources ).unwrap();
        sources.sort();

        assert_eq!( sources, vec![
            src.join( "bin" ).join( "deep" ).join( "util.rs" ),
            src.join( "bin" ).join( "nob.rs" ),
            src.join( "main.rs" ),
        ] );
        assert_eq!( temp.save(), before );
    }


    #[test]
    fn test_collect_sources_missing_dir_fails_and_rewinds() {
        let root = tempfile::tempdir().unwrap();
        let mut temp = TempArena::new( 4096 );
        let mut sources = Vec::new();

        assert!( collect_sources( &mut temp, &root.path().join( "gone" ), &mut sources ).is_err() );
        assert!( sources.is_empty() );
        assert_eq!( temp.used(), 0 );
    }


    #[test]
    fn test_clean_without_binary_succeeds() {
        let root = tempfile::tempdir().unwrap();
        clean( root.path() ).unwrap();
    }


    #[test]
    fn test_clean_removes_binary() {
        let root = tempfile::tempdir().unwrap();
        let binary = player_binary( root.path() );
        touch( &binary );

        clean( root.path() ).unwrap();
        assert!( !binary.exists() );
    }


    #[test]
    fn test_dist_skips_missing_folders() {
        let root = tempfile::tempdir().unwrap();
        touch( &player_binary( root.path() ) );
        fs::create_dir_all( root.path().join( MUSIC_FOLDER ) ).unwrap();
        fs::write( root.path().join( MUSIC_FOLDER ).join( "RimWorld OST.mp3" ), b"mp3" ).unwrap();

        let out = root.path().join( "dist" );
        let mut temp = TempArena::new( 4096 );
        dist( &mut temp, root.path(), &out ).unwrap();

        let binary_name = player_binary( root.path() ).file_name().unwrap().to_owned();
        assert!( out.join( binary_name ).is_file() );
        assert_eq!( fs::read( out.join( MUSIC_FOLDER ).join( "RimWorld OST.mp3" ) ).unwrap(), b"mp3" );
        assert!( !out.join( TIMESTAMPS_FOLDER ).exists() );
    }


    #[test]
    fn test_dist_requires_built_player() {
        let root = tempfile::tempdir().unwrap();
        let mut temp = TempArena::new( 4096 );
        assert!( dist( &mut temp, root.path(), &root.path().join( "dist" ) ).is_err() );
    }
}
