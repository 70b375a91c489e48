//! Command-line argument parsing for Rimloop.

use std::path::PathBuf;

use clap::Parser;
use rimloop_nob::Sv;


/// Rimloop - Loops one track of an album-length soundtrack file.
#[derive( Parser, Debug )]
#[command( name = "rimloop" )]
#[command( version, about, long_about = None )]
pub struct Args {
    /// Album audio file, e.g. `music/RimWorld OST.mp3`.
    pub music: Option<PathBuf>,

    /// Track to loop, counted from 0. Non-numeric values select track 0.
    pub track_index: Option<String>,

    /// Timestamp file to use instead of the one matching the album.
    #[arg( short, long )]
    pub timestamps: Option<PathBuf>,

    /// Playback volume (0.0 to 1.5).
    #[arg( short, long )]
    pub volume: Option<f32>,

    /// Print the track list before playing.
    #[arg( short, long )]
    pub list: bool,
}


impl Args {
    /// The requested track, read like `atoi`; negative values become 0.
    pub fn track_index( &self ) -> Option<usize> {
        self.track_index
            .as_deref()
            .map( |index| usize::try_from( Sv::from( index ).atoi() ).unwrap_or( 0 ) )
    }
}


/// Usage line printed when no input file is given.
pub fn usage( program: &str ) -> String {
    format!( "Usage: {} <input.mp3> [track_index=0]", program )
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_positionals() {
        let args = Args::parse_from( [ "rimloop", "music/RimWorld OST.mp3", "3" ] );
        assert_eq!( args.music, Some( PathBuf::from( "music/RimWorld OST.mp3" ) ) );
        assert_eq!( args.track_index(), Some( 3 ) );
    }


    #[test]
    fn test_missing_input_is_not_a_parse_error() {
        let args = Args::try_parse_from( [ "rimloop" ] ).unwrap();
        assert!( args.music.is_none() );
        assert_eq!( args.track_index(), None );
    }


    #[test]
    fn test_track_index_is_lenient() {
        let args = Args::parse_from( [ "rimloop", "a.mp3", "two" ] );
        assert_eq!( args.track_index(), Some( 0 ) );

        let args = Args::parse_from( [ "rimloop", "a.mp3", "--", "-4" ] );
        assert_eq!( args.track_index(), Some( 0 ) );
    }


    #[test]
    fn test_usage() {
        assert_eq!( usage( "rimloop" ), "Usage: rimloop <input.mp3> [track_index=0]" );
    }
}
