//! Rimloop CLI - loops one track of a soundtrack album

mod cli;
mod input;
mod settings;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{ Context, Result };
use clap::Parser;

use cli::Args;
use input::KeyAction;
use settings::Settings;

use rimloop_core::{
    catalog,
    looper::{ next_index, previous_index },
    tracks::time_from_seconds,
    Looper, MusicCollection, PlaybackState, PlayerError, TrackError,
};
use rimloop_nob::{ logging, Config, NobError };


/// Exit code when the audio device cannot be used.
const EXIT_AUDIO: u8 = 2;

/// Volume change per key press.
const VOLUME_STEP: f32 = 0.1;


fn main() -> ExitCode {
    logging::init( &Config::from_env() );

    let args = Args::parse();
    let program = catalog::program_name( &std::env::args().next().unwrap_or_default() );

    let Some( music ) = args.music.as_deref() else {
        tracing::error!( "Missing input file" );
        eprintln!( "{}", cli::usage( &program ) );
        return ExitCode::FAILURE;
    };

    match run( &args, music ) {
        Ok(()) => ExitCode::SUCCESS,
        Err( e ) => {
            if !already_logged( &e ) {
                tracing::error!( "{:#}", e );
            }
            match e.downcast_ref::<PlayerError>() {
                Some( PlayerError::Output( _ ) ) => ExitCode::from( EXIT_AUDIO ),
                _ => ExitCode::FAILURE,
            }
        }
    }
}


fn run( args: &Args, music: &Path ) -> Result<()> {
    if !catalog::is_audio_file( music ) {
        tracing::warn!( "`{}` does not look like an audio file", music.display() );
    }

    let timestamps = args.timestamps.clone().unwrap_or_else( || catalog::timestamps_for( music ) );
    let collection = MusicCollection::load( music, &timestamps )
        .with_context( || format!( "Could not load `{}`", music.display() ) )?;

    let mut settings = Settings::load();
    if let Some( volume ) = args.volume {
        settings.set_volume( volume );
    }

    let mut looper = Looper::new( collection );
    looper.set_volume( settings.volume );

    if args.list {
        print_tracks( &looper );
    }

    let index = start_index( args.track_index(), settings.last_track( music ), looper.collection().tracks().len() );
    looper.select( index )?;
    looper.resume();
    println!( "{}", input::help_text() );

    loop {
        let action = input::read_action()?;
        match action {
            KeyAction::TogglePause => {
                looper.toggle_pause();
            }
            KeyAction::Restart => looper.restart(),
            KeyAction::Next | KeyAction::Previous => {
                let count = looper.collection().tracks().len();
                let current = looper.current().unwrap_or( 0 );
                let target = if action == KeyAction::Next {
                    next_index( current, count )
                } else {
                    previous_index( current, count )
                };
                switch_track( &mut looper, target )?;
            }
            KeyAction::List => print_tracks( &looper ),
            KeyAction::VolumeUp | KeyAction::VolumeDown => {
                let step = if action == KeyAction::VolumeUp { VOLUME_STEP } else { -VOLUME_STEP };
                settings.set_volume( looper.volume() + step );
                looper.set_volume( settings.volume );
                tracing::info!( "Volume: {:.0}%", settings.volume * 100.0 );
            }
            KeyAction::Help => println!( "{}", input::help_text() ),
            KeyAction::Quit => break,
        }
    }

    if let Some( current ) = looper.current() {
        settings.set_last_track( music, current );
    }
    settings.save();

    Ok(())
}


/// Failures from reading files are logged where they happen.
fn already_logged( e: &anyhow::Error ) -> bool {
    e.chain().any( |cause| {
        cause.is::<NobError>()
            || cause.is::<TrackError>()
            || matches!( cause.downcast_ref::<PlayerError>(), Some( PlayerError::Tracks( _ ) ) )
    })
}


/// The track to start on. A remembered track that no longer exists is ignored.
fn start_index( requested: Option<usize>, remembered: Option<usize>, count: usize ) -> usize {
    requested
        .or_else( || remembered.filter( |&index| index < count ) )
        .unwrap_or( 0 )
}


/// Selects another track, keeping the paused state.
fn switch_track( looper: &mut Looper, index: usize ) -> Result<()> {
    let was_playing = looper.state() == PlaybackState::Playing;

    looper.select( index )?;
    if was_playing {
        looper.resume();
    }

    Ok(())
}


fn print_tracks( looper: &Looper ) {
    let current = looper.current();

    for ( i, track ) in looper.collection().tracks().iter().enumerate() {
        let marker = if Some( i ) == current { '>' } else { ' ' };
        println!( "{} {:>3} : {}", marker, i, track );
    }

    if let Some( track ) = looper.current_track() {
        println!(
            "Looping `{}` at {} of {}",
            track.title,
            time_from_seconds( looper.position().as_secs() as u32 ),
            time_from_seconds( track.length() )
        );
    }
}


#[cfg( test )]
mod tests {
    use std::path::PathBuf;

    use super::*;


    #[test]
    fn test_start_index_prefers_request() {
        assert_eq!( start_index( Some( 7 ), Some( 2 ), 5 ), 7 );
        assert_eq!( start_index( None, Some( 2 ), 5 ), 2 );
        assert_eq!( start_index( None, None, 5 ), 0 );
    }


    #[test]
    fn test_start_index_drops_stale_memory() {
        assert_eq!( start_index( None, Some( 5 ), 5 ), 0 );
        assert_eq!( start_index( None, Some( 40 ), 3 ), 0 );
    }


    #[test]
    fn test_track_errors_are_not_logged_twice() {
        let empty = anyhow::Error::from( PlayerError::Tracks( TrackError::Empty( PathBuf::from( "a.time" ) ) ) )
            .context( "Could not load `a.mp3`" );
        assert!( already_logged( &empty ) );

        let missing = anyhow::Error::from( NobError::InvalidProc ).context( "Could not load `a.mp3`" );
        assert!( already_logged( &missing ) );
    }


    #[test]
    fn test_other_errors_are_logged() {
        assert!( !already_logged( &anyhow::Error::from( PlayerError::NoTrack( 3 ) ) ) );
        assert!( !already_logged( &anyhow::anyhow!( "terminal went away" ) ) );
    }
}
