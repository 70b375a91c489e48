//! Temporary arena allocator.
//!
//! A fixed-capacity bump allocator for short-lived scratch data (directory
//! listings, formatted paths, C strings). Memory is reclaimed only in bulk
//! with `reset` or `rewind`. The arena is an explicit context passed by
//! `&mut`, so each thread that needs scratch memory owns its own.

use std::ffi::CStr;
use std::fmt::{ self, Write };

use crate::sv::Sv;


/// Default arena size in bytes.
pub const DEFAULT_TEMP_CAPACITY: usize = 8 * 1024;


/// Handle to a region allocated from a `TempArena`.
///
/// A handle only stays meaningful until the arena is rewound past its
/// offset; after that the bytes may be handed out again.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub struct TempSlice {
    offset: usize,
    len: usize,
}


impl TempSlice {
    pub fn offset( &self ) -> usize {
        self.offset
    }


    pub fn len( &self ) -> usize {
        self.len
    }


    pub fn is_empty( &self ) -> bool {
        self.len == 0
    }
}


/// Bump allocator over a fixed buffer.
pub struct TempArena {
    buf: Box<[u8]>,
    size: usize,
}


impl TempArena {
    /// Creates an arena that can hand out `capacity` bytes in total.
    pub fn new( capacity: usize ) -> Self {
        Self {
            buf: vec![ 0u8; capacity ].into_boxed_slice(),
            size: 0,
        }
    }


    pub fn capacity( &self ) -> usize {
        self.buf.len()
    }


    /// Bytes handed out since the last reset.
    pub fn used( &self ) -> usize {
        self.size
    }


    /// Allocates `size` bytes, or `None` if the arena would overflow.
    pub fn alloc( &mut self, size: usize ) -> Option<TempSlice> {
        let end = self.size.checked_add( size )?;
        if end > self.buf.len() {
            return None;
        }

        let slice = TempSlice { offset: self.size, len: size };
        self.size = end;
        Some( slice )
    }


    /// Current cursor, to be handed back to `rewind`.
    pub fn save( &self ) -> usize {
        self.size
    }


    /// Moves the cursor back to `checkpoint`.
    ///
    /// Everything allocated after the checkpoint is released. The bytes are
    /// not cleared, just free to be handed out again.
    pub fn rewind( &mut self, checkpoint: usize ) {
        assert!(
            checkpoint <= self.buf.len(),
            "temporary arena checkpoint {} is past its capacity {}",
            checkpoint,
            self.buf.len()
        );
        self.size = checkpoint;
    }


    /// Releases every allocation.
    pub fn reset( &mut self ) {
        self.rewind( 0 );
    }


    pub fn bytes( &self, slice: TempSlice ) -> &[u8] {
        self.check_live( slice, 0 );
        &self.buf[ slice.offset..slice.offset + slice.len ]
    }


    pub fn bytes_mut( &mut self, slice: TempSlice ) -> &mut [u8] {
        self.check_live( slice, 0 );
        &mut self.buf[ slice.offset..slice.offset + slice.len ]
    }


    /// Resolves a handle produced by `strdup`, `sprintf` or `sv_to_cstr`.
    pub fn str( &self, slice: TempSlice ) -> &str {
        match std::str::from_utf8( self.bytes( slice ) ) {
            Ok( s ) => s,
            Err( e ) => panic!( "temporary string at offset {} is not UTF-8: {}", slice.offset, e ),
        }
    }


    /// Resolves a null-terminated handle as a C string.
    pub fn cstr( &self, slice: TempSlice ) -> &CStr {
        self.check_live( slice, 1 );
        match CStr::from_bytes_until_nul( &self.buf[ slice.offset..=slice.offset + slice.len ] ) {
            Ok( s ) => s,
            Err( _ ) => panic!( "temporary allocation at offset {} is not null-terminated", slice.offset ),
        }
    }


    /// Copies `s` into the arena with a trailing `\0`.
    ///
    /// The returned handle covers the string only, not the terminator.
    pub fn strdup( &mut self, s: &str ) -> TempSlice {
        self.copy_with_nul( s.as_bytes() )
    }


    /// Copies the viewed bytes into the arena with a trailing `\0`.
    pub fn sv_to_cstr( &mut self, sv: Sv<'_> ) -> TempSlice {
        self.copy_with_nul( sv.as_bytes() )
    }


    /// Formats directly into the arena, null-terminated.
    ///
    /// Use through `temp_sprintf!`.
    pub fn sprintf( &mut self, args: fmt::Arguments<'_> ) -> TempSlice {
        let start = self.size;
        let mut writer = ArenaWriter { arena: self, written: 0 };
        let formatted = writer.write_fmt( args ).and_then( |_| writer.write_str( "\0" ) );
        let written = writer.written;

        if formatted.is_err() {
            self.size = start;
            exhausted( self.capacity(), written );
        }

        TempSlice { offset: start, len: written - 1 }
    }


    fn copy_with_nul( &mut self, bytes: &[u8] ) -> TempSlice {
        let capacity = self.capacity();
        let Some( slice ) = self.alloc( bytes.len() + 1 ) else {
            exhausted( capacity, bytes.len() + 1 );
        };

        let dst = &mut self.buf[ slice.offset..slice.offset + slice.len ];
        dst[ ..bytes.len() ].copy_from_slice( bytes );
        dst[ bytes.len() ] = 0;

        TempSlice { offset: slice.offset, len: bytes.len() }
    }


    fn check_live( &self, slice: TempSlice, extra: usize ) {
        assert!(
            slice.offset + slice.len + extra <= self.size,
            "stale temporary allocation {}..{} past cursor {}",
            slice.offset,
            slice.offset + slice.len,
            self.size
        );
    }
}


impl Default for TempArena {
    fn default() -> Self {
        Self::new( DEFAULT_TEMP_CAPACITY )
    }
}


/// Running out of scratch space means the embedding program sized the arena
/// wrong; there is no state worth continuing with.
fn exhausted( capacity: usize, requested: usize ) -> ! {
    tracing::error!(
        "Extend the size of the temporary allocator: {} bytes requested, capacity {}",
        requested,
        capacity
    );
    panic!( "temporary arena exhausted ({} bytes)", capacity );
}


/// Appends formatted output at the arena cursor.
struct ArenaWriter<'a> {
    arena: &'a mut TempArena,
    written: usize,
}


impl Write for ArenaWriter<'_> {
    fn write_str( &mut self, s: &str ) -> fmt::Result {
        let slice = self.arena.alloc( s.len() ).ok_or( fmt::Error )?;
        self.arena.buf[ slice.offset..slice.offset + slice.len ].copy_from_slice( s.as_bytes() );
        self.written += s.len();
        Ok(())
    }
}


/// Formats into a `TempArena`, returning a null-terminated `TempSlice`.
#[macro_export]
macro_rules! temp_sprintf {
    ( $temp:expr, $( $arg:tt )* ) => {
        $temp.sprintf( ::std::format_args!( $( $arg )* ) )
    };
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_alloc_fails_past_capacity() {
        let mut temp = TempArena::new( 16 );

        assert!( temp.alloc( 10 ).is_some() );
        assert!( temp.alloc( 7 ).is_none() );
        assert!( temp.alloc( 6 ).is_some() );
        assert!( temp.alloc( 1 ).is_none() );
    }


    #[test]
    fn test_rewind_reuses_the_same_bytes() {
        let mut temp = TempArena::new( 64 );

        let first = temp.alloc( 4 ).unwrap();
        temp.bytes_mut( first ).copy_from_slice( b"keep" );
        let checkpoint = temp.save();

        let before = temp.alloc( 8 ).unwrap();
        temp.bytes_mut( before ).copy_from_slice( b"AAAAAAAA" );

        temp.rewind( checkpoint );

        let after = temp.alloc( 8 ).unwrap();
        assert_eq!( after.offset(), before.offset() );
        // Rewind does not clear; the old bytes are still there until overwritten.
        assert_eq!( temp.bytes( after ), b"AAAAAAAA" );

        temp.bytes_mut( after ).copy_from_slice( b"BBBBBBBB" );
        assert_eq!( temp.bytes( after ), b"BBBBBBBB" );
        assert_eq!( temp.bytes( first ), b"keep" );
    }


    #[test]
    fn test_reset_releases_everything() {
        let mut temp = TempArena::new( 32 );
        temp.strdup( "scratch" );
        assert_eq!( temp.used(), 8 );

        temp.reset();
        assert_eq!( temp.used(), 0 );
        assert_eq!( temp.alloc( 0 ).unwrap().offset(), 0 );
    }


    #[test]
    fn test_strdup_is_null_terminated() {
        let mut temp = TempArena::default();
        let s = temp.strdup( "main.rs" );

        assert_eq!( temp.str( s ), "main.rs" );
        assert_eq!( temp.cstr( s ).to_bytes(), b"main.rs" );
        assert_eq!( temp.used(), "main.rs".len() + 1 );
    }


    #[test]
    fn test_sv_to_cstr_copies_view() {
        let mut temp = TempArena::default();
        let mut line = Sv::from( "1:30\tTitle" );
        let time = line.chop_by_delim( b'\t' );

        let s = temp.sv_to_cstr( time );
        assert_eq!( temp.cstr( s ).to_str().unwrap(), "1:30" );
    }


    #[test]
    fn test_sprintf_formats_into_arena() {
        let mut temp = TempArena::default();
        let s = temp_sprintf!( temp, "{}/{}", "timestamps", "rimworld.time" );

        assert_eq!( temp.str( s ), "timestamps/rimworld.time" );
        assert_eq!( temp.used(), s.len() + 1 );
    }


    #[test]
    #[should_panic( expected = "temporary arena exhausted" )]
    fn test_strdup_past_capacity_is_fatal() {
        let mut temp = TempArena::new( 4 );
        temp.strdup( "too long" );
    }


    #[test]
    #[should_panic( expected = "stale temporary allocation" )]
    fn test_stale_handle_is_rejected() {
        let mut temp = TempArena::new( 16 );
        let s = temp.strdup( "gone" );
        temp.reset();
        temp.str( s );
    }
}
