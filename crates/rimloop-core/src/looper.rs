//! Looping playback of one track of an album
//!
//! The Looper owns the audio output and a decode thread. The thread seeks to
//! the selected track's start, feeds samples until the track's stop time or
//! the end of the file, then seeks back to the start, forever.

use std::path::{ Path, PathBuf };
use std::sync::Arc;
use std::sync::atomic::{ AtomicBool, AtomicU64, Ordering };
use std::thread;
use std::time::Duration;

use rubato::{ FastFixedOut, PolynomialDegree, Resampler };
use thiserror::Error;

use crate::decoder::{ self, AudioInfo, Decoder, DecoderError };
use crate::output::{ AudioOutput, OutputError, SampleBuffer };
use crate::tracks::{ Track, TrackError, Tracks };


/// Converts planar samples back to interleaved format.
/// [[L0, L1, ...], [R0, R1, ...]] → [L0, R0, L1, R1, ...]
fn interleave( channels: &[Vec<f32>] ) -> Vec<f32> {
    if channels.is_empty() || channels[ 0 ].is_empty() {
        return Vec::new();
    }
    let frames = channels[ 0 ].len();
    let num_ch = channels.len();
    let mut out = Vec::with_capacity( frames * num_ch );
    for f in 0..frames {
        for ch in channels {
            out.push( ch[ f ] );
        }
    }
    out
}


/// Errors that can occur during playback.
#[derive( Debug, Error )]
pub enum PlayerError {
    #[error( transparent )]
    Tracks( #[from] TrackError ),

    #[error( transparent )]
    Decode( #[from] DecoderError ),

    #[error( "Audio output error: {0}" )]
    Output( #[from] OutputError ),

    #[error( "Failed to create resampler: {0}" )]
    Resampler( String ),

    #[error( "No track with index {0}" )]
    NoTrack( usize ),
}


/// Current playback state.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}


/// An album file with its track list.
#[derive( Debug, Clone )]
pub struct MusicCollection {
    path: PathBuf,
    tracks: Tracks,
}


impl MusicCollection {
    /// Loads the track list and closes it off with the audio length.
    pub fn load( music_path: &Path, timestamp_path: &Path ) -> Result<Self, PlayerError> {
        let mut tracks = Tracks::read_from_file( timestamp_path )?;
        let info = decoder::probe( music_path )?;

        match info.duration_secs() {
            Some( secs ) => {
                tracks.set_end_time( secs );
            }
            None => {
                tracing::warn!( "Length of `{}` is unknown, the last track plays to the end", music_path.display() );
                tracks.set_end_time( u32::MAX );
            }
        }

        Ok( Self::new( music_path.to_path_buf(), tracks ) )
    }


    pub fn new( path: PathBuf, tracks: Tracks ) -> Self {
        Self { path, tracks }
    }


    pub fn path( &self ) -> &Path {
        &self.path
    }


    pub fn tracks( &self ) -> &Tracks {
        &self.tracks
    }
}


/// Part of the file a decode thread keeps repeating.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
struct LoopRange {
    start_secs: u32,
    /// Frames per pass, or `None` to play until the end of the file.
    frames: Option<u64>,
}


impl LoopRange {
    fn new( track: &Track, info: &AudioInfo ) -> Self {
        let frames = ( track.stop > track.start ).then( || info.frame_at( track.stop ) - info.frame_at( track.start ) );
        Self { start_secs: track.start, frames }
    }


    /// How many of `available` frames fit before the loop point.
    fn clamp( &self, played: u64, available: usize ) -> ( usize, bool ) {
        match self.frames {
            Some( limit ) => {
                let remaining = limit.saturating_sub( played );
                if available as u64 >= remaining {
                    ( remaining as usize, true )
                } else {
                    ( available, false )
                }
            }
            None => ( available, false ),
        }
    }
}


/// Flags shared with the decode thread.
#[derive( Default )]
struct LoopControl {
    stop: AtomicBool,
    restart: AtomicBool,
    /// Frames decoded since the track's start
    frames_played: AtomicU64,
}


/// Running playback of one track.
struct PlaybackHandle {
    control: Arc<LoopControl>,
    sample_buffer: Arc<SampleBuffer>,
    #[allow( dead_code )] // Kept alive for its Drop impl which stops the audio stream
    output: AudioOutput,
    thread: Option<thread::JoinHandle<()>>,
    sample_rate: u32,
}


/// Plays one track of a `MusicCollection` on repeat.
pub struct Looper {
    collection: MusicCollection,
    playback: Option<PlaybackHandle>,
    current: Option<usize>,
    state: PlaybackState,
    /// Volume level (0.0 to 1.5), persisted across track changes
    volume: f32,
}


impl Looper {
    pub fn new( collection: MusicCollection ) -> Self {
        Self {
            collection,
            playback: None,
            current: None,
            state: PlaybackState::Stopped,
            volume: 1.0,
        }
    }


    pub fn collection( &self ) -> &MusicCollection {
        &self.collection
    }


    /// Selects track `index` and starts looping it, paused.
    ///
    /// Call `resume` to start hearing it.
    pub fn select( &mut self, index: usize ) -> Result<(), PlayerError> {
        let track = self.collection.tracks().get( index ).cloned().ok_or( PlayerError::NoTrack( index ) )?;

        self.stop();

        let mut decoder = Decoder::open( self.collection.path() )?;
        decoder.seek_to_secs( track.start )?;

        let info = decoder.info();
        let source_sample_rate = info.sample_rate;
        let channels = info.channels as u16;

        // Create audio output - this also creates the sample buffer with proper channel config
        let ( output, sample_buffer ) = AudioOutput::new( source_sample_rate, channels )?;
        sample_buffer.set_volume( self.volume );
        sample_buffer.set_paused( true );

        let target_sample_rate = output.sample_rate();
        output.play()?;

        // Create resampler if sample rates don't match
        let resampler = if source_sample_rate != target_sample_rate {
            tracing::info!( "Resampling: {} Hz → {} Hz", source_sample_rate, target_sample_rate );

            // Use FastFixedOut which handles variable input sizes
            let resampler = FastFixedOut::<f32>::new(
                target_sample_rate as f64 / source_sample_rate as f64,
                2.0,  // max relative input/output size ratio
                PolynomialDegree::Cubic,
                1024, // output chunk size
                channels as usize,
            ).map_err( |e| PlayerError::Resampler( e.to_string() ) )?;

            Some( resampler )
        } else {
            None
        };

        let range = LoopRange::new( &track, &info );
        let control = Arc::new( LoopControl::default() );

        let control_clone = Arc::clone( &control );
        let sample_buffer_clone = Arc::clone( &sample_buffer );
        let thread = thread::spawn( move || {
            decode_loop( decoder, sample_buffer_clone, control_clone, resampler, range );
        });

        self.playback = Some( PlaybackHandle {
            control,
            sample_buffer,
            output,
            thread: Some( thread ),
            sample_rate: source_sample_rate,
        });
        self.current = Some( index );
        self.state = PlaybackState::Paused;

        tracing::info!( "Selected song {}: `{}`", index, track.title );
        Ok(())
    }


    /// Pauses playback. Returns false if no track is selected.
    pub fn pause( &mut self ) -> bool {
        let Some( handle ) = &self.playback else {
            return false;
        };

        handle.sample_buffer.set_paused( true );
        self.state = PlaybackState::Paused;
        tracing::info!( "Paused" );
        true
    }


    /// Resumes playback. Returns false if no track is selected.
    pub fn resume( &mut self ) -> bool {
        let Some( handle ) = &self.playback else {
            return false;
        };

        handle.sample_buffer.set_paused( false );
        self.state = PlaybackState::Playing;
        tracing::info!( "Resumed" );
        true
    }


    /// Toggles between playing and paused.
    pub fn toggle_pause( &mut self ) -> bool {
        match self.state {
            PlaybackState::Playing => self.pause(),
            _ => self.resume(),
        }
    }


    /// Jumps back to the start of the current track.
    pub fn restart( &self ) {
        if let Some( handle ) = &self.playback {
            handle.control.restart.store( true, Ordering::Relaxed );
            tracing::info!( "Restarted" );
        }
    }


    /// Stops playback and the decode thread.
    pub fn stop( &mut self ) {
        if let Some( mut handle ) = self.playback.take() {
            // Signal stop
            handle.control.stop.store( true, Ordering::Relaxed );
            handle.sample_buffer.clear();

            // Wait for thread to finish
            if let Some( thread ) = handle.thread.take() {
                let _ = thread.join();
            }

            // AudioOutput is dropped here, which stops the cpal stream
            tracing::debug!( "Stopped" );
        }

        self.state = PlaybackState::Stopped;
        self.current = None;
    }


    pub fn state( &self ) -> PlaybackState {
        self.state
    }


    /// Index of the selected track.
    pub fn current( &self ) -> Option<usize> {
        self.current
    }


    pub fn current_track( &self ) -> Option<&Track> {
        self.current.and_then( |i| self.collection.tracks().get( i ) )
    }


    /// Position inside the current track.
    pub fn position( &self ) -> Duration {
        match &self.playback {
            Some( handle ) => {
                let frames = handle.control.frames_played.load( Ordering::Relaxed );
                Duration::from_secs_f64( frames as f64 / handle.sample_rate as f64 )
            }
            None => Duration::ZERO,
        }
    }


    /// Sets the volume level (0.0 = mute, 1.0 = normal, >1.0 = boost).
    pub fn set_volume( &mut self, volume: f32 ) {
        self.volume = volume;
        if let Some( handle ) = &self.playback {
            handle.sample_buffer.set_volume( volume );
        }
    }


    pub fn volume( &self ) -> f32 {
        self.volume
    }
}


impl Drop for Looper {
    fn drop( &mut self ) {
        self.stop();
    }
}


/// Index of the track after `current`, wrapping around.
pub fn next_index( current: usize, count: usize ) -> usize {
    if count == 0 { 0 } else { ( current + 1 ) % count }
}


/// Index of the track before `current`, wrapping around.
pub fn previous_index( current: usize, count: usize ) -> usize {
    if count == 0 { 0 } else { ( current + count - 1 ) % count }
}


/// The decode loop that runs in a separate thread.
fn decode_loop(
    mut decoder: Decoder,
    sample_buffer: Arc<SampleBuffer>,
    control: Arc<LoopControl>,
    mut resampler: Option<FastFixedOut<f32>>,
    range: LoopRange,
) {
    let info = decoder.info();
    let channels = info.channels.max( 1 );

    // Input buffer for resampler (stores planar samples per channel)
    let mut resample_input: Vec<Vec<f32>> = ( 0..channels ).map( |_| Vec::new() ).collect();
    let mut block = Vec::new();

    loop {
        if control.stop.load( Ordering::Relaxed ) {
            tracing::debug!( "Decode loop: stop signal received" );
            break;
        }

        if control.restart.swap( false, Ordering::Relaxed ) {
            sample_buffer.clear();
            resample_input.iter_mut().for_each( Vec::clear );
            if !rewind( &mut decoder, &control, range ) {
                break;
            }
            continue;
        }

        // Check for pause signal - if paused, just sleep
        if sample_buffer.is_paused() {
            thread::sleep( Duration::from_millis( 10 ) );
            continue;
        }

        // Don't decode too far ahead - keep about 50ms buffered
        let target_buffer = ( info.sample_rate as usize * channels ) / 20;
        if sample_buffer.len() > target_buffer {
            thread::sleep( Duration::from_millis( 5 ) );
            continue;
        }

        match decoder.read_frames( &mut block ) {
            Ok( read ) if read > 0 => {
                let played = control.frames_played.load( Ordering::Relaxed );
                let ( frames, reached_stop ) = range.clamp( played, read );
                block.truncate( frames * channels );
                control.frames_played.fetch_add( frames as u64, Ordering::Relaxed );

                match resampler.as_mut() {
                    Some( resampler ) => {
                        let resampled = resample( resampler, &mut resample_input, &block );
                        push_all( &sample_buffer, &resampled, &control.stop );
                    }
                    None => push_all( &sample_buffer, &block, &control.stop ),
                }

                if reached_stop && !rewind( &mut decoder, &control, range ) {
                    break;
                }
            }
            Ok( _ ) => {
                if control.frames_played.load( Ordering::Relaxed ) == 0 {
                    tracing::error!( "Track has no audio to loop" );
                    break;
                }
                if !rewind( &mut decoder, &control, range ) {
                    break;
                }
            }
            Err( e ) => {
                tracing::error!( "Decode error: {}", e );
                break;
            }
        }
    }

    tracing::debug!( "Decode loop: exiting" );
}


/// Seeks back to the start of the loop. Returns false if seeking failed.
fn rewind( decoder: &mut Decoder, control: &LoopControl, range: LoopRange ) -> bool {
    match decoder.seek_to_secs( range.start_secs ) {
        Ok(()) => {
            control.frames_played.store( 0, Ordering::Relaxed );
            tracing::debug!( "Looping back to {}s", range.start_secs );
            true
        }
        Err( e ) => {
            tracing::error!( "Could not loop back: {}", e );
            false
        }
    }
}


/// Feeds interleaved samples through the resampler, keeping leftovers.
fn resample(
    resampler: &mut FastFixedOut<f32>,
    resample_input: &mut [Vec<f32>],
    samples: &[f32],
) -> Vec<f32> {
    let channels = resample_input.len();

    // Add new samples to input buffer (convert interleaved to planar)
    for chunk in samples.chunks( channels ) {
        for ( ch_idx, sample ) in chunk.iter().enumerate() {
            resample_input[ ch_idx ].push( *sample );
        }
    }

    // Process when we have enough input frames
    let mut output_interleaved = Vec::new();
    while resample_input[ 0 ].len() >= resampler.input_frames_next() {
        let needed = resampler.input_frames_next();

        let input_chunk: Vec<Vec<f32>> = resample_input
            .iter_mut()
            .map( |ch| ch.drain( ..needed ).collect() )
            .collect();

        match resampler.process( &input_chunk, None ) {
            Ok( resampled ) => output_interleaved.extend( interleave( &resampled ) ),
            Err( e ) => {
                tracing::error!( "Resample error: {}", e );
                break;
            }
        }
    }

    output_interleaved
}


/// Pushes every sample, waiting for room, unless stopped.
fn push_all( sample_buffer: &SampleBuffer, samples: &[f32], stop: &AtomicBool ) {
    let mut offset = 0;
    while offset < samples.len() && !stop.load( Ordering::Relaxed ) {
        let pushed = sample_buffer.push( &samples[ offset.. ] );
        offset += pushed;
        if pushed == 0 {
            // Buffer full, wait a bit
            thread::sleep( Duration::from_millis( 5 ) );
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn track( start: u32, stop: u32 ) -> Track {
        Track { title: "Ceta".into(), start, stop }
    }


    #[test]
    fn test_interleave() {
        assert_eq!( interleave( &[ vec![ 1.0, 2.0 ], vec![ 3.0, 4.0 ] ] ), vec![ 1.0, 3.0, 2.0, 4.0 ] );
        assert!( interleave( &[] ).is_empty() );
    }


    const INFO: AudioInfo = AudioInfo { sample_rate: 100, channels: 1, frames: None };


    #[test]
    fn test_loop_range_stops_at_track_end() {
        let range = LoopRange::new( &track( 10, 12 ), &INFO );
        assert_eq!( range.frames, Some( 200 ) );
        assert_eq!( range.clamp( 0, 150 ), ( 150, false ) );
        assert_eq!( range.clamp( 150, 150 ), ( 50, true ) );
        assert_eq!( range.clamp( 150, 50 ), ( 50, true ) );
    }


    #[test]
    fn test_loop_range_without_stop_plays_to_eof() {
        let range = LoopRange::new( &track( 10, 0 ), &INFO );
        assert_eq!( range.frames, None );
        assert_eq!( range.clamp( 1_000_000, 64 ), ( 64, false ) );
    }


    #[test]
    fn test_track_navigation_wraps() {
        assert_eq!( next_index( 2, 3 ), 0 );
        assert_eq!( previous_index( 0, 3 ), 2 );
        assert_eq!( next_index( 0, 0 ), 0 );
    }


    #[test]
    fn test_push_all_fills_buffer() {
        let buffer = SampleBuffer::new( 8, 1, 1 );
        push_all( &buffer, &[ 0.1; 8 ], &AtomicBool::new( false ) );
        assert_eq!( buffer.len(), 8 );

        // A stopped loop gives up instead of waiting for room.
        push_all( &buffer, &[ 0.1; 4 ], &AtomicBool::new( true ) );
        assert_eq!( buffer.len(), 8 );
    }


    #[test]
    fn test_load_missing_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let result = MusicCollection::load( &dir.path().join( "x.mp3" ), &dir.path().join( "x.time" ) );
        assert!( matches!( result, Err( PlayerError::Tracks( TrackError::Read( _ ) ) ) ) );
    }


    #[test]
    fn test_select_out_of_range() {
        let tracks = Tracks::parse( "0:00\tCeta\n".into() );
        let mut looper = Looper::new( MusicCollection::new( PathBuf::from( "x.mp3" ), tracks ) );

        assert!( matches!( looper.select( 5 ), Err( PlayerError::NoTrack( 5 ) ) ) );
        assert_eq!( looper.state(), PlaybackState::Stopped );
        assert!( !looper.pause() );
    }
}
