//! Track timestamps
//!
//! An album is a single long audio file. A timestamp file splits it into
//! tracks, one per line:
//!
//! ```text
//! 0:00	Ceta
//! 2:47	Tribal Assault
//! 1:02:03	Hope in the Dark
//! ```
//!
//! Each line is a time, a tab and a title. A track stops where the next one
//! starts; the last one stops at the end of the audio.

use std::fmt;
use std::path::{ Path, PathBuf };

use rimloop_nob::{ read_entire_file, Da, NobError, StringBuilder, Sv };
use thiserror::Error;


const SECS_PER_MINUTE: u32 = 60;


/// Errors that can occur while loading timestamps.
#[derive( Debug, Error )]
pub enum TrackError {
    #[error( "Could not read timestamps: {0}" )]
    Read( #[from] NobError ),

    #[error( "No tracks in `{}`", .0.display() )]
    Empty( PathBuf ),
}


/// One track of an album, in whole seconds from the start of the file.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct Track {
    pub title: String,
    pub start: u32,
    pub stop: u32,
}


impl Track {
    pub fn length( &self ) -> u32 {
        self.stop.saturating_sub( self.start )
    }
}


impl fmt::Display for Track {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        write!(
            f,
            "`{}` {}-{}",
            self.title,
            time_from_seconds( self.start ),
            time_from_seconds( self.stop )
        )
    }
}


/// Tracks of one album, in file order.
#[derive( Debug, Clone, Default, PartialEq, Eq )]
pub struct Tracks {
    items: Da<Track>,
}


impl Tracks {
    pub fn new() -> Self {
        Self::default()
    }


    /// Parses timestamp lines, stopping at the first empty line.
    ///
    /// Only the stop times between tracks are known here; the last track
    /// keeps a stop of 0 until `set_end_time` is called.
    pub fn parse( mut sv: Sv<'_> ) -> Self {
        let mut tracks = Self::new();

        loop {
            let mut line = sv.chop_by_delim( b'\n' );
            if line.is_empty() {
                break;
            }

            let time = line.chop_by_delim( b'\t' );
            tracks.items.append( Track {
                title: line.trim_right().to_string(),
                start: seconds_from_time( time ),
                stop: 0,
            } );
        }

        for i in 1..tracks.items.len() {
            tracks.items[ i - 1 ].stop = tracks.items[ i ].start;
        }

        tracks
    }


    /// Loads and parses a timestamp file.
    pub fn read_from_file( path: &Path ) -> Result<Self, TrackError> {
        let mut sb = StringBuilder::new();
        read_entire_file( path, &mut sb )?;

        let tracks = Self::parse( sb.as_sv() );
        if tracks.is_empty() {
            tracing::error!( "No tracks in `{}`", path.display() );
            return Err( TrackError::Empty( path.to_path_buf() ) );
        }

        tracing::info!( "Opened `{}`", path.display() );
        Ok( tracks )
    }


    /// Sets the stop time of the last track. Returns false if there is none.
    pub fn set_end_time( &mut self, seconds: u32 ) -> bool {
        match self.items.last_mut() {
            Some( last ) => {
                last.stop = seconds;
                true
            }
            None => false,
        }
    }


    pub fn get( &self, index: usize ) -> Option<&Track> {
        self.items.get( index )
    }


    pub fn first( &self ) -> Option<&Track> {
        self.items.first()
    }


    pub fn last( &self ) -> Option<&Track> {
        self.items.last()
    }


    pub fn len( &self ) -> usize {
        self.items.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.items.is_empty()
    }


    pub fn iter( &self ) -> std::slice::Iter<'_, Track> {
        self.items.iter()
    }
}


impl<'a> IntoIterator for &'a Tracks {
    type Item = &'a Track;
    type IntoIter = std::slice::Iter<'a, Track>;

    fn into_iter( self ) -> Self::IntoIter {
        self.iter()
    }
}


/// Parses `S`, `M:SS` or `H:MM:SS` into seconds.
///
/// Each field is read like `atoi`: leading digits, anything else counts as
/// 0. Fields past the third are ignored.
pub fn seconds_from_time( mut time: Sv<'_> ) -> u32 {
    let mut fields = [ 0u32; 3 ];
    let mut count = 0;

    while count < fields.len() && !time.is_empty() {
        let field = time.chop_by_delim( b':' );
        fields[ count ] = u32::try_from( field.atoi() ).unwrap_or( 0 );
        count += 1;
    }

    fields[ ..count ]
        .iter()
        .fold( 0u32, |acc, &field| acc.saturating_mul( SECS_PER_MINUTE ).saturating_add( field ) )
}


/// Formats seconds as `M:SS`, or `H:MM:SS` from one hour on.
pub fn time_from_seconds( seconds: u32 ) -> String {
    let ( minutes, secs ) = ( seconds / SECS_PER_MINUTE, seconds % SECS_PER_MINUTE );

    if minutes >= SECS_PER_MINUTE {
        let ( hours, minutes ) = ( minutes / SECS_PER_MINUTE, minutes % SECS_PER_MINUTE );
        format!( "{}:{:02}:{:02}", hours, minutes, secs )
    } else {
        format!( "{}:{:02}", minutes, secs )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_seconds_from_time() {
        assert_eq!( seconds_from_time( Sv::from( "1:02:03" ) ), 3723 );
        assert_eq!( seconds_from_time( Sv::from( "2:47" ) ), 167 );
        assert_eq!( seconds_from_time( Sv::from( "90" ) ), 90 );
        assert_eq!( seconds_from_time( Sv::from( "" ) ), 0 );
    }


    #[test]
    fn test_seconds_from_time_is_lenient() {
        assert_eq!( seconds_from_time( Sv::from( "1:xx" ) ), 60 );
        assert_eq!( seconds_from_time( Sv::from( "1:00:00:59" ) ), 3600 );
        assert_eq!( seconds_from_time( Sv::from( "-5" ) ), 0 );
    }


    #[test]
    fn test_time_from_seconds() {
        assert_eq!( time_from_seconds( 3723 ), "1:02:03" );
        assert_eq!( time_from_seconds( 75 ), "1:15" );
        assert_eq!( time_from_seconds( 5 ), "0:05" );
        assert_eq!( time_from_seconds( 3600 ), "1:00:00" );
    }


    #[test]
    fn test_parse_chains_stop_times() {
        let tracks = Tracks::parse( Sv::from( "0:00\tCeta\n2:47\tTribal Assault\n1:02:03\tHope\n" ) );

        assert_eq!( tracks.len(), 3 );
        assert_eq!( tracks.get( 0 ), Some( &Track { title: "Ceta".into(), start: 0, stop: 167 } ) );
        assert_eq!( tracks.get( 1 ).map( |t| t.stop ), Some( 3723 ) );
        assert_eq!( tracks.last().map( |t| t.stop ), Some( 0 ) );
    }


    #[test]
    fn test_parse_stops_at_empty_line() {
        let tracks = Tracks::parse( Sv::from( "0:00\tA\r\n\n1:00\tB\n" ) );
        assert_eq!( tracks.len(), 1 );
        assert_eq!( tracks.first().map( |t| t.title.as_str() ), Some( "A" ) );
    }


    #[test]
    fn test_set_end_time() {
        let mut tracks = Tracks::parse( Sv::from( "0:00\tA\n1:00\tB" ) );
        assert!( tracks.set_end_time( 200 ) );
        assert_eq!( tracks.last().map( |t| t.length() ), Some( 140 ) );

        assert!( !Tracks::new().set_end_time( 200 ) );
    }


    #[test]
    fn test_display() {
        let track = Track { title: "Ceta".into(), start: 0, stop: 167 };
        assert_eq!( track.to_string(), "`Ceta` 0:00-2:47" );
    }


    #[test]
    fn test_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "rimworld.time" );
        std::fs::write( &path, "0:00\tCeta\n2:47\tTribal Assault\n" ).unwrap();

        let tracks = Tracks::read_from_file( &path ).unwrap();
        assert_eq!( tracks.len(), 2 );

        std::fs::write( &path, "" ).unwrap();
        assert!( matches!( Tracks::read_from_file( &path ), Err( TrackError::Empty( _ ) ) ) );
        assert!( matches!(
            Tracks::read_from_file( &dir.path().join( "missing.time" ) ),
            Err( TrackError::Read( _ ) )
        ) );
    }
}
