//! Album decoding via Symphonia
//!
//! Positions are counted in frames of the album's sample rate. A seek lands
//! on the exact frame of a track start: Symphonia seeks to the packet
//! before it, and the decoder drops the frames in between.

use std::fs::File;
use std::io;
use std::path::{ Path, PathBuf };

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{ CodecParameters, Decoder as Codec, DecoderOptions, CODEC_TYPE_NULL };
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{ FormatOptions, FormatReader, SeekMode, SeekTo };
use symphonia::core::io::{ MediaSourceStream, MediaSourceStreamOptions };
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{ Time, TimeBase, TimeStamp };
use thiserror::Error;


/// Read-ahead of the media source. Album files are read front to back.
const READ_AHEAD: usize = 64 * 1024;


#[derive( Debug, Error )]
pub enum DecoderError {
    #[error( "Could not open `{}`: {source}", path.display() )]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error( "Unsupported audio format in `{}`: {source}", path.display() )]
    Format {
        path: PathBuf,
        #[source]
        source: SymphoniaError,
    },

    #[error( "No audio track in `{}`", .0.display() )]
    NoAudioTrack( PathBuf ),

    #[error( "Unsupported codec: {0}" )]
    Codec( #[source] SymphoniaError ),

    #[error( "Decode error: {0}" )]
    Decode( #[source] SymphoniaError ),

    #[error( "Could not seek to {secs}s: {source}" )]
    Seek {
        secs: u32,
        #[source]
        source: SymphoniaError,
    },
}


/// Layout of an album's audio track.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: usize,
    /// Total frames, when the container records it.
    pub frames: Option<u64>,
}


impl AudioInfo {
    /// Whole seconds of audio, saturating at `u32::MAX`.
    pub fn duration_secs( &self ) -> Option<u32> {
        self.frames
            .map( |frames| frames / self.sample_rate.max( 1 ) as u64 )
            .map( |secs| u32::try_from( secs ).unwrap_or( u32::MAX ) )
    }


    /// First frame of second `secs`.
    pub fn frame_at( &self, secs: u32 ) -> u64 {
        secs as u64 * self.sample_rate as u64
    }
}


/// A probed file, positioned at its first packet.
struct Opened {
    reader: Box<dyn FormatReader>,
    track_id: u32,
    params: CodecParameters,
    info: AudioInfo,
}


fn open_format( path: &Path ) -> Result<Opened, DecoderError> {
    let file = File::open( path ).map_err( |source| DecoderError::Open { path: path.to_path_buf(), source } )?;
    let stream = MediaSourceStream::new( Box::new( file ), MediaSourceStreamOptions { buffer_len: READ_AHEAD } );

    let mut hint = Hint::new();
    if let Some( ext ) = path.extension().and_then( |e| e.to_str() ) {
        hint.with_extension( ext );
    }

    let probed = symphonia::default::get_probe()
        .format( &hint, stream, &FormatOptions::default(), &MetadataOptions::default() )
        .map_err( |source| DecoderError::Format { path: path.to_path_buf(), source } )?;
    let reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find( |t| t.codec_params.codec != CODEC_TYPE_NULL )
        .ok_or_else( || DecoderError::NoAudioTrack( path.to_path_buf() ) )?;

    let params = track.codec_params.clone();
    let info = AudioInfo {
        sample_rate: params.sample_rate.unwrap_or( 44100 ),
        channels: params.channels.map( |c| c.count() ).unwrap_or( 2 ),
        frames: params.n_frames,
    };
    let track_id = track.id;

    tracing::debug!(
        "`{}`: {} Hz, {} channels, {:?} frames",
        path.display(), info.sample_rate, info.channels, info.frames
    );

    Ok( Opened { reader, track_id, params, info } )
}


/// Reads the layout of `path` without setting up a codec.
pub fn probe( path: &Path ) -> Result<AudioInfo, DecoderError> {
    open_format( path ).map( |opened| opened.info )
}


/// Converts a timestamp delta to frames.
fn ts_to_frames( ts: TimeStamp, time_base: Option<TimeBase>, sample_rate: u32 ) -> u64 {
    match time_base {
        Some( tb ) if tb.denom != 0 => ts * tb.numer as u64 * sample_rate as u64 / tb.denom as u64,
        _ => ts,
    }
}


/// Sequential decoder over one album file.
pub struct Decoder {
    reader: Box<dyn FormatReader>,
    codec: Box<dyn Codec>,
    track_id: u32,
    time_base: Option<TimeBase>,
    info: AudioInfo,
    /// Frames still to drop after a seek
    skip: u64,
    scratch: Option<SampleBuffer<f32>>,
}


impl Decoder {
    pub fn open( path: &Path ) -> Result<Self, DecoderError> {
        let Opened { reader, track_id, params, info } = open_format( path )?;

        let codec = symphonia::default::get_codecs()
            .make( &params, &DecoderOptions::default() )
            .map_err( DecoderError::Codec )?;

        tracing::info!( "Opened `{}`", path.display() );

        Ok( Self {
            reader,
            codec,
            track_id,
            time_base: params.time_base,
            info,
            skip: 0,
            scratch: None,
        })
    }


    pub fn info( &self ) -> AudioInfo {
        self.info
    }


    /// Positions the decoder on the first frame of second `secs`.
    pub fn seek_to_secs( &mut self, secs: u32 ) -> Result<(), DecoderError> {
        let seek_to = SeekTo::Time { time: Time::from( secs ), track_id: Some( self.track_id ) };
        let seeked = self.reader
            .seek( SeekMode::Accurate, seek_to )
            .map_err( |source| DecoderError::Seek { secs, source } )?;

        self.codec.reset();
        self.skip = ts_to_frames(
            seeked.required_ts.saturating_sub( seeked.actual_ts ),
            self.time_base,
            self.info.sample_rate,
        );
        Ok(())
    }


    /// Replaces `out` with the next interleaved frames.
    ///
    /// Returns the number of frames read; 0 means the end of the file.
    pub fn read_frames( &mut self, out: &mut Vec<f32> ) -> Result<usize, DecoderError> {
        out.clear();

        loop {
            let packet = match self.reader.next_packet() {
                Ok( packet ) => packet,
                Err( SymphoniaError::IoError( e ) ) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok( 0 ),
                Err( e ) => return Err( DecoderError::Decode( e ) ),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.codec.decode( &packet ) {
                Ok( decoded ) => decoded,
                // A corrupt packet costs a few milliseconds of audio, not the loop.
                Err( SymphoniaError::DecodeError( e ) ) => {
                    tracing::debug!( "Skipping packet: {}", e );
                    continue;
                }
                Err( e ) => return Err( DecoderError::Decode( e ) ),
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count().max( 1 );
            let frames = decoded.frames();

            if self.scratch.as_ref().map_or( true, |buf| buf.capacity() < frames * channels ) {
                self.scratch = Some( SampleBuffer::new( frames as u64, spec ) );
            }
            let Some( scratch ) = self.scratch.as_mut() else {
                continue;
            };
            scratch.copy_interleaved_ref( decoded );

            let dropped = self.skip.min( frames as u64 ) as usize;
            self.skip -= dropped as u64;
            if dropped == frames {
                continue;
            }

            out.extend_from_slice( &scratch.samples()[ dropped * channels.. ] );
            return Ok( frames - dropped );
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    /// Writes a mono 16-bit PCM WAV of `secs` seconds.
    fn write_wav( path: &Path, sample_rate: u32, secs: u32 ) {
        let data_len = sample_rate * secs * 2;
        let mut wav = Vec::new();
        wav.extend_from_slice( b"RIFF" );
        wav.extend_from_slice( &( 36 + data_len ).to_le_bytes() );
        wav.extend_from_slice( b"WAVEfmt " );
        wav.extend_from_slice( &16u32.to_le_bytes() );
        wav.extend_from_slice( &1u16.to_le_bytes() );
        wav.extend_from_slice( &1u16.to_le_bytes() );
        wav.extend_from_slice( &sample_rate.to_le_bytes() );
        wav.extend_from_slice( &( sample_rate * 2 ).to_le_bytes() );
        wav.extend_from_slice( &2u16.to_le_bytes() );
        wav.extend_from_slice( &16u16.to_le_bytes() );
        wav.extend_from_slice( b"data" );
        wav.extend_from_slice( &data_len.to_le_bytes() );
        wav.resize( wav.len() + data_len as usize, 0 );
        std::fs::write( path, wav ).unwrap();
    }


    fn read_to_end( decoder: &mut Decoder ) -> usize {
        let mut block = Vec::new();
        let mut total = 0;
        loop {
            match decoder.read_frames( &mut block ).unwrap() {
                0 => return total,
                frames => {
                    assert_eq!( block.len(), frames );
                    total += frames;
                }
            }
        }
    }


    #[test]
    fn test_audio_info_positions() {
        let info = AudioInfo { sample_rate: 8000, channels: 2, frames: Some( 8000 * 90 + 10 ) };
        assert_eq!( info.duration_secs(), Some( 90 ) );
        assert_eq!( info.frame_at( 3 ), 24000 );

        let unknown = AudioInfo { frames: None, ..info };
        assert_eq!( unknown.duration_secs(), None );
    }


    #[test]
    fn test_ts_to_frames() {
        assert_eq!( ts_to_frames( 500, Some( TimeBase::new( 1, 8000 ) ), 8000 ), 500 );
        assert_eq!( ts_to_frames( 3, Some( TimeBase::new( 1, 1000 ) ), 8000 ), 24 );
        assert_eq!( ts_to_frames( 7, None, 8000 ), 7 );
    }


    #[test]
    fn test_probe_reads_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "album.wav" );
        write_wav( &path, 8000, 2 );

        let info = probe( &path ).unwrap();
        assert_eq!( info.sample_rate, 8000 );
        assert_eq!( info.channels, 1 );
        assert_eq!( info.duration_secs(), Some( 2 ) );
    }


    #[test]
    fn test_seek_then_read_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "album.wav" );
        write_wav( &path, 8000, 2 );

        let mut decoder = Decoder::open( &path ).unwrap();
        assert_eq!( read_to_end( &mut decoder ), 16000 );

        decoder.seek_to_secs( 1 ).unwrap();
        assert_eq!( read_to_end( &mut decoder ), 8000 );
    }


    #[test]
    fn test_open_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join( "missing.mp3" );
        assert!( matches!( probe( &missing ), Err( DecoderError::Open { .. } ) ) );

        let garbage = dir.path().join( "notes.mp3" );
        std::fs::write( &garbage, b"not audio at all" ).unwrap();
        let err = probe( &garbage ).err().unwrap();
        assert!( matches!( err, DecoderError::Format { .. } ) );
        assert!( err.to_string().contains( "notes.mp3" ) );
    }
}
