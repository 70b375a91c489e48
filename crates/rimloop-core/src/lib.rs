//! Rimloop Core - Track looping engine
//!
//! This crate splits album-length audio files into tracks using timestamp
//! files and loops a selected track through the system audio device.

pub mod catalog;
pub mod decoder;
pub mod looper;
pub mod output;
pub mod tracks;

pub use looper::{ Looper, MusicCollection, PlaybackState, PlayerError };
pub use tracks::{ Track, TrackError, Tracks };
