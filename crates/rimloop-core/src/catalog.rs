//! Album catalog
//!
//! Maps album audio files to their timestamp files. Albums live in a
//! `music/` folder and timestamps in a sibling `timestamps/` folder.

use std::path::{ Path, PathBuf };

use rimloop_nob::Sv;


/// Folder holding the timestamp files, next to the music folder.
pub const TIMESTAMPS_FOLDER: &str = "timestamps";

/// Folder holding the album audio files.
pub const MUSIC_FOLDER: &str = "music";

/// Extension used by timestamp files.
pub const TIMESTAMP_EXTENSION: &str = "time";


/// Known albums and their timestamp files.
const KNOWN_ALBUMS: &[( &str, &str )] = &[
    ( "RimWorld OST.mp3", "rimworld.time" ),
    ( "RimWorld Royalty OST.mp3", "rimworld_royalty.time" ),
    ( "RimWorld Anomaly OST.mp3", "rimworld_anomaly.time" ),
];


/// Supported audio file extensions.
const SUPPORTED_EXTENSIONS: &[&str] = &[ "mp3", "flac", "ogg", "wav", "m4a", "aac" ];


/// File name of the timestamps for `music_file`.
///
/// Unknown albums use their own stem, e.g. `Soundtrack.mp3` maps to
/// `Soundtrack.time`.
pub fn timestamp_name( music_file: &Path ) -> String {
    let name = music_file.file_name().and_then( |n| n.to_str() ).unwrap_or_default();

    if let Some(( _, timestamps )) = KNOWN_ALBUMS.iter().find( |( album, _ )| *album == name ) {
        return timestamps.to_string();
    }

    let stem = music_file.file_stem().and_then( |s| s.to_str() ).unwrap_or( name );
    format!( "{}.{}", stem, TIMESTAMP_EXTENSION )
}


/// Directory that holds both the music and timestamps folders.
///
/// `a/music/x.mp3` gives `a`, `music/x.mp3` gives the current directory and
/// a bare `x.mp3` gives `..`.
pub fn collection_root( music_file: &Path ) -> PathBuf {
    match music_file.parent() {
        Some( dir ) if !dir.as_os_str().is_empty() => {
            dir.parent().map( Path::to_path_buf ).unwrap_or_default()
        }
        _ => PathBuf::from( ".." ),
    }
}


/// Full path of the timestamps for `music_file`.
pub fn timestamps_for( music_file: &Path ) -> PathBuf {
    collection_root( music_file ).join( TIMESTAMPS_FOLDER ).join( timestamp_name( music_file ) )
}


/// Checks if a file has a supported audio extension.
pub fn is_audio_file( path: &Path ) -> bool {
    path.extension()
        .and_then( |e| e.to_str() )
        .map( |e| SUPPORTED_EXTENSIONS.contains( &e.to_lowercase().as_str() ) )
        .unwrap_or( false )
}


/// Last component of a program path, for usage lines.
pub fn program_name( argv0: &str ) -> String {
    let mut path = Sv::from( argv0 );
    path.rchop_by_delim( b'/' ).to_string()
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_known_album() {
        assert_eq!( timestamp_name( Path::new( "music/RimWorld Royalty OST.mp3" ) ), "rimworld_royalty.time" );
    }


    #[test]
    fn test_unknown_album_uses_stem() {
        assert_eq!( timestamp_name( Path::new( "music/Soundtrack.flac" ) ), "Soundtrack.time" );
    }


    #[test]
    fn test_timestamps_for() {
        assert_eq!(
            timestamps_for( Path::new( "game/music/RimWorld OST.mp3" ) ),
            PathBuf::from( "game/timestamps/rimworld.time" )
        );
        assert_eq!(
            timestamps_for( Path::new( "music/RimWorld OST.mp3" ) ),
            PathBuf::from( "timestamps/rimworld.time" )
        );
        assert_eq!(
            timestamps_for( Path::new( "RimWorld OST.mp3" ) ),
            PathBuf::from( "../timestamps/rimworld.time" )
        );
    }


    #[test]
    fn test_is_audio_file() {
        assert!( is_audio_file( Path::new( "RimWorld OST.MP3" ) ) );
        assert!( !is_audio_file( Path::new( "rimworld.time" ) ) );
    }


    #[test]
    fn test_program_name() {
        assert_eq!( program_name( "./target/release/rimloop" ), "rimloop" );
        assert_eq!( program_name( "rimloop" ), "rimloop" );
    }
}
