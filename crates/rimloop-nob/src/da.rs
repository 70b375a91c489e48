//! Dynamic arrays and the string builder.
//!
//! `Da` grows geometrically from a fixed floor and never shrinks until it
//! is explicitly freed. `StringBuilder` is the byte specialization used to
//! render commands and build paths.

use std::fmt;
use std::ops::{ Deref, DerefMut };

use crate::sv::Sv;


/// Capacity of a dynamic array after its first growth.
pub const DA_INIT_CAP: usize = 256;


/// Growable array with amortized O(1) append.
#[derive( Debug )]
pub struct Da<T> {
    items: Vec<T>,
    capacity: usize,
}


/// Growable byte buffer. Not null-terminated unless `append_null` is called.
pub type StringBuilder = Da<u8>;


impl<T> Da<T> {
    /// Creates an empty array without allocating.
    pub const fn new() -> Self {
        Self { items: Vec::new(), capacity: 0 }
    }


    /// Appends a single item, doubling the capacity when full.
    pub fn append( &mut self, item: T ) {
        self.reserve_for( 1 );
        self.items.push( item );
    }


    /// Number of items the array can hold before it grows again.
    pub fn capacity( &self ) -> usize {
        self.capacity
    }


    /// Drops every item but keeps the allocation.
    pub fn clear( &mut self ) {
        self.items.clear();
    }


    /// Releases the backing storage and resets to empty.
    pub fn free( &mut self ) {
        self.items = Vec::new();
        self.capacity = 0;
    }


    /// Grows to fit `additional` more items.
    ///
    /// The first growth jumps to `DA_INIT_CAP`; every later one doubles
    /// until the request fits. Existing items are moved, never overwritten.
    fn reserve_for( &mut self, additional: usize ) {
        let needed = self.items.len() + additional;
        if needed <= self.capacity {
            return;
        }

        let mut capacity = if self.capacity == 0 { DA_INIT_CAP } else { self.capacity * 2 };
        while capacity < needed {
            capacity *= 2;
        }

        self.items.reserve_exact( capacity - self.items.len() );
        self.capacity = capacity;
    }
}


impl<T: Clone> Da<T> {
    /// Appends a slice of items in one growth step.
    pub fn append_many( &mut self, items: &[T] ) {
        self.reserve_for( items.len() );
        self.items.extend_from_slice( items );
    }
}


impl Da<u8> {
    /// Appends the bytes of `s` without a terminator.
    pub fn append_str( &mut self, s: &str ) {
        self.append_many( s.as_bytes() );
    }


    /// Appends a sized buffer.
    pub fn append_buf( &mut self, buf: &[u8] ) {
        self.append_many( buf );
    }


    /// Appends a single `\0` so the contents can be handed out as a C string.
    pub fn append_null( &mut self ) {
        self.append( 0 );
    }


    /// Borrows the contents as a string view.
    pub fn as_sv( &self ) -> Sv<'_> {
        Sv::from_bytes( &self.items )
    }
}


impl<T> Default for Da<T> {
    fn default() -> Self {
        Self::new()
    }
}


impl<T: Clone> Clone for Da<T> {
    /// The clone owns as much storage as the original reports.
    fn clone( &self ) -> Self {
        let mut items = Vec::with_capacity( self.capacity );
        items.extend_from_slice( &self.items );
        Self { items, capacity: self.capacity }
    }
}


impl<T: PartialEq> PartialEq for Da<T> {
    fn eq( &self, other: &Self ) -> bool {
        self.items == other.items
    }
}


impl<T: Eq> Eq for Da<T> {}


impl<T> Deref for Da<T> {
    type Target = [T];


    fn deref( &self ) -> &[T] {
        &self.items
    }
}


impl<T> DerefMut for Da<T> {
    fn deref_mut( &mut self ) -> &mut [T] {
        &mut self.items
    }
}


impl<T> Extend<T> for Da<T> {
    fn extend<I: IntoIterator<Item = T>>( &mut self, iter: I ) {
        for item in iter {
            self.append( item );
        }
    }
}


impl<T> FromIterator<T> for Da<T> {
    fn from_iter<I: IntoIterator<Item = T>>( iter: I ) -> Self {
        let mut da = Self::new();
        da.extend( iter );
        da
    }
}


impl<T> IntoIterator for Da<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;


    fn into_iter( self ) -> Self::IntoIter {
        self.items.into_iter()
    }
}


impl<'a, T> IntoIterator for &'a Da<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;


    fn into_iter( self ) -> Self::IntoIter {
        self.items.iter()
    }
}


impl fmt::Write for Da<u8> {
    fn write_str( &mut self, s: &str ) -> fmt::Result {
        self.append_str( s );
        Ok(())
    }
}


#[cfg( test )]
mod tests {
    use std::fmt::Write;

    use super::*;


    #[test]
    fn test_first_append_uses_floor_capacity() {
        let mut da = Da::new();
        assert_eq!( da.capacity(), 0 );

        da.append( 1u32 );
        assert_eq!( da.capacity(), DA_INIT_CAP );
        assert_eq!( &da[ .. ], &[ 1 ] );
    }


    #[test]
    fn test_append_doubles_when_full() {
        let mut da: Da<usize> = ( 0..DA_INIT_CAP ).collect();
        assert_eq!( da.capacity(), DA_INIT_CAP );

        da.append( DA_INIT_CAP );
        assert_eq!( da.capacity(), DA_INIT_CAP * 2 );
        assert_eq!( da.len(), DA_INIT_CAP + 1 );
        assert!( da.iter().enumerate().all( |( i, v )| i == *v ) );
    }


    #[test]
    fn test_append_many_grows_to_fit() {
        let mut da = Da::new();
        da.append( 7u8 );
        da.append_many( &[ 1u8; 1000 ] );

        assert_eq!( da.capacity(), 1024 );
        assert_eq!( da.len(), 1001 );
        assert_eq!( da[ 0 ], 7 );
    }


    #[test]
    fn test_clear_keeps_capacity_free_releases() {
        let mut da: Da<u8> = Da::new();
        da.append_many( b"hello" );

        da.clear();
        assert!( da.is_empty() );
        assert_eq!( da.capacity(), DA_INIT_CAP );

        da.free();
        assert_eq!( da.capacity(), 0 );
    }


    #[test]
    fn test_clone_reserves_reported_capacity() {
        let mut da: Da<u8> = Da::new();
        da.append_many( b"abc" );

        let copy = da.clone();
        assert_eq!( copy, da );
        assert_eq!( copy.capacity(), DA_INIT_CAP );
        assert!( copy.items.capacity() >= copy.capacity() );
    }


    #[test]
    fn test_string_builder_null_is_explicit() {
        let mut sb = StringBuilder::new();
        sb.append_str( "abc" );
        assert_eq!( &sb[ .. ], b"abc" );

        sb.append_null();
        assert_eq!( &sb[ .. ], b"abc\0" );
    }


    #[test]
    fn test_string_builder_write_fmt() {
        let mut sb = StringBuilder::new();
        write!( sb, "{}-{}", 1, "two" ).unwrap();
        assert_eq!( sb.as_sv(), Sv::from( "1-two" ) );
    }
}
