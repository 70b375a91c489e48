//! Audio output via cpal
//!
//! Handles sending decoded PCM samples to the system audio device.

use std::sync::{ Arc, Mutex, MutexGuard, PoisonError };
use std::sync::atomic::{ AtomicBool, AtomicU32, Ordering };
use std::collections::VecDeque;

use cpal::traits::{ DeviceTrait, HostTrait, StreamTrait };
use thiserror::Error;


/// Errors that can occur with audio output.
#[derive( Debug, Error )]
pub enum OutputError {
    #[error( "No output device available" )]
    NoDevice,

    #[error( "Failed to get default stream config: {0}" )]
    StreamConfig( String ),

    #[error( "Failed to build output stream: {0}" )]
    BuildStream( String ),

    #[error( "Failed to play stream: {0}" )]
    PlayStream( String ),
}


/// Shared sample buffer between producer (decoder) and consumer (audio callback).
/// This is Send + Sync and can be shared across threads.
/// Handles channel conversion between source and output.
pub struct SampleBuffer {
    buffer: Mutex<VecDeque<f32>>,
    capacity: usize,
    paused: AtomicBool,
    /// Volume level stored as f32 bits (0.0 to 1.0+)
    volume: AtomicU32,
    source_channels: u16,
    output_channels: u16,
}


impl SampleBuffer {
    /// Creates a new sample buffer with the given capacity and channel configuration.
    ///
    /// - `capacity`: Maximum number of samples to buffer
    /// - `source_channels`: Number of channels in the source audio (from decoder)
    /// - `output_channels`: Number of channels expected by the output device
    pub fn new( capacity: usize, source_channels: u16, output_channels: u16 ) -> Self {
        Self {
            buffer: Mutex::new( VecDeque::with_capacity( capacity ) ),
            capacity,
            paused: AtomicBool::new( false ),
            volume: AtomicU32::new( 1.0_f32.to_bits() ),
            source_channels,
            output_channels,
        }
    }


    /// The queue survives a panicking holder; samples are plain floats.
    fn queue( &self ) -> MutexGuard<'_, VecDeque<f32>> {
        self.buffer.lock().unwrap_or_else( PoisonError::into_inner )
    }


    /// Pushes samples to the buffer. Returns number of samples actually pushed.
    pub fn push( &self, samples: &[f32] ) -> usize {
        let mut buf = self.queue();
        let available = self.capacity.saturating_sub( buf.len() );
        let to_push = samples.len().min( available );
        buf.extend( samples[ ..to_push ].iter().copied() );
        to_push
    }


    /// Pops samples from the buffer into the output slice, handling channel conversion.
    /// Returns the number of output samples actually written; the rest is silence.
    pub fn pop( &self, output: &mut [f32] ) -> usize {
        // If paused, output silence
        if self.paused.load( Ordering::Relaxed ) {
            output.fill( 0.0 );
            return 0;
        }

        let volume = self.volume();
        let mut buf = self.queue();
        let src_ch = self.source_channels.max( 1 ) as usize;
        let out_ch = self.output_channels.max( 1 ) as usize;

        let frames = ( output.len() / out_ch ).min( buf.len() / src_ch );
        let mut frame = Vec::with_capacity( src_ch );

        for out_frame in output.chunks_exact_mut( out_ch ).take( frames ) {
            frame.clear();
            frame.extend( buf.drain( ..src_ch ) );

            if src_ch == 2 && out_ch == 1 {
                // Stereo to mono: mix down
                out_frame[ 0 ] = ( frame[ 0 ] + frame[ 1 ] ) * 0.5;
            } else {
                // Copy shared channels, duplicate the last source channel into the rest
                for ( ch, sample ) in out_frame.iter_mut().enumerate() {
                    *sample = frame[ ch.min( src_ch - 1 ) ];
                }
            }
        }

        let written = frames * out_ch;
        output[ written.. ].fill( 0.0 );

        // Apply volume to all output samples
        if volume != 1.0 {
            for sample in output[ ..written ].iter_mut() {
                *sample *= volume;
            }
        }

        written
    }


    /// Returns the number of samples currently in the buffer.
    pub fn len( &self ) -> usize {
        self.queue().len()
    }


    /// Returns true if the buffer is empty.
    pub fn is_empty( &self ) -> bool {
        self.queue().is_empty()
    }


    /// Clears the buffer.
    pub fn clear( &self ) {
        self.queue().clear();
    }


    /// Sets paused state.
    pub fn set_paused( &self, paused: bool ) {
        self.paused.store( paused, Ordering::Relaxed );
    }


    /// Gets paused state.
    pub fn is_paused( &self ) -> bool {
        self.paused.load( Ordering::Relaxed )
    }


    /// Sets the volume level (0.0 = mute, 1.0 = normal, >1.0 = boost).
    pub fn set_volume( &self, volume: f32 ) {
        self.volume.store( volume.to_bits(), Ordering::Relaxed );
    }


    /// Gets the current volume level.
    pub fn volume( &self ) -> f32 {
        f32::from_bits( self.volume.load( Ordering::Relaxed ) )
    }
}


/// Audio output handler.
/// Note: This struct is NOT Send/Sync due to cpal::Stream.
/// Keep it on the thread where it was created.
pub struct AudioOutput {
    stream: cpal::Stream,
    sample_rate: u32,
    channels: u16,
}


impl AudioOutput {
    /// Creates a new audio output with the specified source sample rate and channels.
    ///
    /// Returns both the AudioOutput and a shared SampleBuffer that the caller should
    /// use to push decoded samples. The buffer handles channel conversion if needed.
    pub fn new(
        source_sample_rate: u32,
        source_channels: u16,
    ) -> Result<( Self, Arc<SampleBuffer> ), OutputError> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or( OutputError::NoDevice )?;

        tracing::info!( "Using output device: {:?}", device.name() );

        // Try to get a config matching our requirements
        // Priority: 1) exact match, 2) same sample rate any channels, 3) default with warning
        let supported_configs: Vec<_> = device
            .supported_output_configs()
            .map_err( |e| OutputError::StreamConfig( e.to_string() ) )?
            .collect();

        // First try: exact match (channels + sample rate)
        let config = if let Some( supported_config ) = supported_configs.iter().find( |c| {
            c.channels() == source_channels
                && c.min_sample_rate().0 <= source_sample_rate
                && c.max_sample_rate().0 >= source_sample_rate
        }) {
            supported_config.clone()
                .with_sample_rate( cpal::SampleRate( source_sample_rate ) )
                .config()
        }
        // Second try: any config that supports our sample rate (we'll handle channel conversion)
        else if let Some( supported_config ) = supported_configs.iter().find( |c| {
            c.min_sample_rate().0 <= source_sample_rate
                && c.max_sample_rate().0 >= source_sample_rate
        }) {
            tracing::info!(
                "Channel conversion: file has {} channels, device using {} channels",
                source_channels,
                supported_config.channels()
            );
            supported_config.clone()
                .with_sample_rate( cpal::SampleRate( source_sample_rate ) )
                .config()
        }
        // Last resort: default config (may have wrong sample rate!)
        else {
            let default_config = device
                .default_output_config()
                .map_err( |e| OutputError::StreamConfig( e.to_string() ) )?;
            tracing::warn!(
                "Sample rate mismatch: file is {} Hz, device defaulting to {} Hz - playback speed may be incorrect!",
                source_sample_rate,
                default_config.sample_rate().0
            );
            default_config.config()
        };

        tracing::info!(
            "Audio output config: {} Hz, {} channels",
            config.sample_rate.0,
            config.channels
        );

        // Create shared sample buffer with channel conversion info
        // Buffer size: ~500ms of audio
        let buffer_capacity = ( source_sample_rate as usize ) * ( source_channels as usize ) / 2;
        let sample_buffer = Arc::new( SampleBuffer::new(
            buffer_capacity,
            source_channels,
            config.channels,
        ));
        let sample_buffer_clone = Arc::clone( &sample_buffer );

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    sample_buffer_clone.pop( data );
                },
                |err| {
                    tracing::error!( "Audio output error: {}", err );
                },
                None,
            )
            .map_err( |e| OutputError::BuildStream( e.to_string() ) )?;

        Ok((
            Self {
                stream,
                sample_rate: config.sample_rate.0,
                channels: config.channels,
            },
            sample_buffer,
        ))
    }


    /// Starts audio output.
    pub fn play( &self ) -> Result<(), OutputError> {
        self.stream
            .play()
            .map_err( |e| OutputError::PlayStream( e.to_string() ) )
    }


    /// Pauses the audio stream.
    pub fn pause( &self ) -> Result<(), OutputError> {
        self.stream
            .pause()
            .map_err( |e| OutputError::PlayStream( e.to_string() ) )
    }


    /// Gets the actual sample rate.
    pub fn sample_rate( &self ) -> u32 {
        self.sample_rate
    }


    /// Gets the actual number of channels.
    pub fn channels( &self ) -> u16 {
        self.channels
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_push_respects_capacity() {
        let buffer = SampleBuffer::new( 4, 2, 2 );
        assert_eq!( buffer.push( &[ 0.1; 6 ] ), 4 );
        assert_eq!( buffer.len(), 4 );
        assert_eq!( buffer.push( &[ 0.1 ] ), 0 );
    }


    #[test]
    fn test_pop_pads_with_silence() {
        let buffer = SampleBuffer::new( 16, 2, 2 );
        buffer.push( &[ 0.5, -0.5 ] );

        let mut out = [ 1.0; 4 ];
        assert_eq!( buffer.pop( &mut out ), 2 );
        assert_eq!( out, [ 0.5, -0.5, 0.0, 0.0 ] );
        assert!( buffer.is_empty() );
    }


    #[test]
    fn test_pop_converts_channels() {
        let mono = SampleBuffer::new( 16, 1, 2 );
        mono.push( &[ 0.25, 0.75 ] );
        let mut out = [ 0.0; 4 ];
        assert_eq!( mono.pop( &mut out ), 4 );
        assert_eq!( out, [ 0.25, 0.25, 0.75, 0.75 ] );

        let stereo = SampleBuffer::new( 16, 2, 1 );
        stereo.push( &[ 0.2, 0.4 ] );
        let mut out = [ 0.0; 1 ];
        assert_eq!( stereo.pop( &mut out ), 1 );
        assert!( ( out[ 0 ] - 0.3 ).abs() < 1e-6 );
    }


    #[test]
    fn test_paused_outputs_silence_and_keeps_samples() {
        let buffer = SampleBuffer::new( 16, 1, 1 );
        buffer.push( &[ 0.5 ] );
        buffer.set_paused( true );

        let mut out = [ 1.0; 2 ];
        assert_eq!( buffer.pop( &mut out ), 0 );
        assert_eq!( out, [ 0.0, 0.0 ] );
        assert_eq!( buffer.len(), 1 );
    }


    #[test]
    fn test_volume_scales_output() {
        let buffer = SampleBuffer::new( 16, 1, 1 );
        buffer.set_volume( 0.5 );
        buffer.push( &[ 0.8 ] );

        let mut out = [ 0.0; 1 ];
        buffer.pop( &mut out );
        assert!( ( out[ 0 ] - 0.4 ).abs() < 1e-6 );
        assert_eq!( buffer.volume(), 0.5 );
    }
}
