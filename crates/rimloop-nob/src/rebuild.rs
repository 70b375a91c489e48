//! Staleness detection.
//!
//! An output needs rebuilding when any of its inputs was modified after it.
//! Modification times are compared at whole-second resolution, the same
//! way `make` does on most filesystems; there is no content hashing.

use std::fs::{ self, Metadata };
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::error::NobError;


/// Result of comparing an output against its inputs.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Staleness {
    /// The output is missing or older than an input.
    Stale,

    /// The output is at least as new as every input.
    Fresh,
}


impl Staleness {
    pub fn is_stale( self ) -> bool {
        self == Staleness::Stale
    }
}


/// Checks whether `output` must be regenerated from `inputs`.
///
/// A missing output is always stale. A missing input is an error, not a
/// reason to rebuild. An input is newer only if its timestamp is strictly
/// greater; equal timestamps count as fresh.
pub fn needs_rebuild<O, I>( output: O, inputs: &[I] ) -> Result<Staleness, NobError>
where
    O: AsRef<Path>,
    I: AsRef<Path>,
{
    let output = output.as_ref();

    let output_time = match fs::metadata( output ) {
        Ok( meta ) => mtime_secs( output, &meta )?,
        Err( e ) if e.kind() == io::ErrorKind::NotFound => return Ok( Staleness::Stale ),
        Err( e ) => return Err( NobError::io( "Could not stat", output, e ) ),
    };

    for input in inputs {
        let input = input.as_ref();
        let meta = fs::metadata( input ).map_err( |e| NobError::io( "Could not stat", input, e ) )?;

        if mtime_secs( input, &meta )? > output_time {
            tracing::debug!( "`{}` is newer than `{}`", input.display(), output.display() );
            return Ok( Staleness::Stale );
        }
    }

    Ok( Staleness::Fresh )
}


/// Single-input form of `needs_rebuild`.
pub fn needs_rebuild1<O, I>( output: O, input: I ) -> Result<Staleness, NobError>
where
    O: AsRef<Path>,
    I: AsRef<Path>,
{
    needs_rebuild( output, &[ input ] )
}


/// Modification time in whole seconds since the epoch, rounded down.
fn mtime_secs( path: &Path, meta: &Metadata ) -> Result<i64, NobError> {
    let modified = meta
        .modified()
        .map_err( |e| NobError::io( "Could not get modification time of", path, e ) )?;

    Ok( match modified.duration_since( UNIX_EPOCH ) {
        Ok( after ) => after.as_secs() as i64,
        Err( e ) => {
            let before = e.duration();
            let whole = before.as_secs() as i64;
            if before.subsec_nanos() > 0 { -whole - 1 } else { -whole }
        }
    } )
}


#[cfg( test )]
mod tests {
    use std::fs::File;
    use std::time::{ Duration, SystemTime };

    use super::*;


    fn touch( path: &Path, secs: u64 ) {
        let file = File::create( path ).unwrap();
        file.set_modified( UNIX_EPOCH + Duration::from_secs( secs ) ).unwrap();
    }


    fn touch_at( path: &Path, time: SystemTime ) {
        let file = File::options().write( true ).create( true ).truncate( false ).open( path ).unwrap();
        file.set_modified( time ).unwrap();
    }


    #[test]
    fn test_missing_output_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join( "main.rs" );
        touch( &input, 1_000 );

        let result = needs_rebuild1( dir.path().join( "main" ), &input ).unwrap();
        assert_eq!( result, Staleness::Stale );
    }


    #[test]
    fn test_missing_output_is_stale_even_with_missing_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let result = needs_rebuild( dir.path().join( "main" ), &[ dir.path().join( "nope.rs" ) ] ).unwrap();
        assert!( result.is_stale() );
    }


    #[test]
    fn test_newer_input_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let ( output, a, b ) = ( dir.path().join( "main" ), dir.path().join( "a.rs" ), dir.path().join( "b.rs" ) );
        touch( &output, 2_000 );
        touch( &a, 1_000 );
        touch( &b, 2_001 );

        assert_eq!( needs_rebuild( &output, &[ &a, &b ] ).unwrap(), Staleness::Stale );
    }


    #[test]
    fn test_older_or_equal_inputs_are_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let ( output, a, b ) = ( dir.path().join( "main" ), dir.path().join( "a.rs" ), dir.path().join( "b.rs" ) );
        touch( &output, 2_000 );
        touch( &a, 1_000 );
        touch( &b, 2_000 );

        assert_eq!( needs_rebuild( &output, &[ &a, &b ] ).unwrap(), Staleness::Fresh );
    }


    #[test]
    fn test_sub_second_difference_is_a_tie() {
        let dir = tempfile::tempdir().unwrap();
        let ( output, input ) = ( dir.path().join( "main" ), dir.path().join( "main.rs" ) );
        touch_at( &output, UNIX_EPOCH + Duration::from_millis( 5_000_100 ) );
        touch_at( &input, UNIX_EPOCH + Duration::from_millis( 5_000_900 ) );

        assert_eq!( needs_rebuild1( &output, &input ).unwrap(), Staleness::Fresh );
    }


    #[test]
    fn test_missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join( "main" );
        let present = dir.path().join( "a.rs" );
        touch( &output, 2_000 );
        touch( &present, 1_000 );

        let result = needs_rebuild( &output, &[ present, dir.path().join( "gone.rs" ) ] );
        assert!( matches!( result, Err( NobError::Io { .. } ) ) );
    }


    #[test]
    fn test_no_inputs_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join( "main" );
        touch( &output, 2_000 );

        let inputs: [&Path; 0] = [];
        assert_eq!( needs_rebuild( &output, &inputs ).unwrap(), Staleness::Fresh );
    }
}
