//! Application settings management
//!
//! Remembers the volume and the last looped track of every album.

use std::collections::HashMap;
use std::fs;
use std::path::{ Path, PathBuf };

use serde::{ Deserialize, Serialize };


/// Highest volume the looper accepts.
pub const MAX_VOLUME: f32 = 1.5;


/// Application settings.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
#[serde( default )]
pub struct Settings {
    /// Playback volume (0.0 to 1.5)
    pub volume: f32,

    /// Last looped track per album file name
    pub last_tracks: HashMap<String, usize>,
}


impl Default for Settings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            last_tracks: HashMap::new(),
        }
    }
}


impl Settings {
    /// Returns the path to the settings file.
    fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map( |p| p.join( "rimloop" ).join( "settings.json" ) )
    }


    /// Loads settings from disk, or returns defaults if not found.
    pub fn load() -> Self {
        match Self::settings_path() {
            Some( path ) => Self::load_from( &path ),
            None => Self::default(),
        }
    }


    fn load_from( path: &Path ) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string( path ) {
            Ok( contents ) => {
                serde_json::from_str( &contents ).unwrap_or_default()
            }
            Err( e ) => {
                tracing::warn!( "Failed to read settings: {}", e );
                Self::default()
            }
        }
    }


    /// Saves settings to disk.
    pub fn save( &self ) {
        if let Some( path ) = Self::settings_path() {
            self.save_to( &path );
        }
    }


    fn save_to( &self, path: &Path ) {
        // Create parent directory if needed
        if let Some( parent ) = path.parent() {
            if !parent.exists() {
                if let Err( e ) = fs::create_dir_all( parent ) {
                    tracing::warn!( "Failed to create settings directory: {}", e );
                    return;
                }
            }
        }

        match serde_json::to_string_pretty( self ) {
            Ok( json ) => {
                if let Err( e ) = fs::write( path, json ) {
                    tracing::warn!( "Failed to save settings: {}", e );
                }
            }
            Err( e ) => {
                tracing::warn!( "Failed to serialize settings: {}", e );
            }
        }
    }


    /// Last track looped from `music_file`, if any.
    pub fn last_track( &self, music_file: &Path ) -> Option<usize> {
        self.last_tracks.get( &album_key( music_file ) ).copied()
    }


    pub fn set_last_track( &mut self, music_file: &Path, index: usize ) {
        self.last_tracks.insert( album_key( music_file ), index );
    }


    /// Sets the volume, clamped to the supported range.
    pub fn set_volume( &mut self, volume: f32 ) {
        self.volume = volume.clamp( 0.0, MAX_VOLUME );
    }
}


/// Albums are remembered by file name, so moving the music folder keeps them.
fn album_key( music_file: &Path ) -> String {
    music_file
        .file_name()
        .map( |name| name.to_string_lossy().into_owned() )
        .unwrap_or_default()
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: Settings = serde_json::from_str( r#"{ "volume": 0.5 }"# ).unwrap();
        assert_eq!( settings.volume, 0.5 );
        assert!( settings.last_tracks.is_empty() );
    }


    #[test]
    fn test_last_track_is_keyed_by_file_name() {
        let mut settings = Settings::default();
        settings.set_last_track( Path::new( "music/RimWorld OST.mp3" ), 4 );
        assert_eq!( settings.last_track( Path::new( "/games/rimworld/music/RimWorld OST.mp3" ) ), Some( 4 ) );
        assert_eq!( settings.last_track( Path::new( "music/RimWorld Anomaly OST.mp3" ) ), None );
    }


    #[test]
    fn test_volume_is_clamped() {
        let mut settings = Settings::default();
        settings.set_volume( 3.0 );
        assert_eq!( settings.volume, MAX_VOLUME );
        settings.set_volume( -1.0 );
        assert_eq!( settings.volume, 0.0 );
    }


    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "rimloop" ).join( "settings.json" );

        let mut settings = Settings::default();
        settings.set_volume( 0.8 );
        settings.set_last_track( Path::new( "RimWorld OST.mp3" ), 2 );
        settings.save_to( &path );

        assert_eq!( Settings::load_from( &path ), settings );
    }


    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "settings.json" );
        fs::write( &path, "not json" ).unwrap();
        assert_eq!( Settings::load_from( &path ), Settings::default() );
    }
}
