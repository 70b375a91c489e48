//! String views.
//!
//! An `Sv` borrows bytes owned by someone else (a `StringBuilder`, a file
//! buffer, a literal). Chopping mutates the view, never the bytes.

use std::fmt;


/// Non-owning view over a run of bytes.
#[derive( Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord )]
pub struct Sv<'a> {
    items: &'a [u8],
}


/// Matches C `isspace` in the "C" locale.
fn is_space( b: u8 ) -> bool {
    matches!( b, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r' )
}


impl<'a> Sv<'a> {
    pub const fn from_bytes( items: &'a [u8] ) -> Self {
        Self { items }
    }


    pub fn as_bytes( &self ) -> &'a [u8] {
        self.items
    }


    pub fn len( &self ) -> usize {
        self.items.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.items.is_empty()
    }


    /// Returns the view as `&str` if it holds valid UTF-8.
    pub fn to_str( &self ) -> Option<&'a str> {
        std::str::from_utf8( self.items ).ok()
    }


    /// Splits off everything before the first `delim`.
    ///
    /// `self` is left pointing just past the delimiter. Without a delimiter
    /// the whole view is returned and `self` becomes empty.
    pub fn chop_by_delim( &mut self, delim: u8 ) -> Sv<'a> {
        match self.items.iter().position( |&b| b == delim ) {
            Some( i ) => {
                let head = &self.items[ ..i ];
                self.items = &self.items[ i + 1.. ];
                Sv::from_bytes( head )
            }
            None => {
                let head = self.items;
                self.items = &self.items[ self.items.len().. ];
                Sv::from_bytes( head )
            }
        }
    }


    /// Splits off everything after the last `delim`.
    ///
    /// `self` is truncated just before the delimiter. Without a delimiter
    /// the whole view is returned and `self` becomes empty.
    pub fn rchop_by_delim( &mut self, delim: u8 ) -> Sv<'a> {
        match self.items.iter().rposition( |&b| b == delim ) {
            Some( i ) => {
                let tail = &self.items[ i + 1.. ];
                self.items = &self.items[ ..i ];
                Sv::from_bytes( tail )
            }
            None => {
                let tail = self.items;
                self.items = &self.items[ ..0 ];
                Sv::from_bytes( tail )
            }
        }
    }


    pub fn trim_left( self ) -> Sv<'a> {
        let start = self.items.iter().position( |&b| !is_space( b ) ).unwrap_or( self.items.len() );
        Sv::from_bytes( &self.items[ start.. ] )
    }


    pub fn trim_right( self ) -> Sv<'a> {
        let end = self.items.iter().rposition( |&b| !is_space( b ) ).map_or( 0, |i| i + 1 );
        Sv::from_bytes( &self.items[ ..end ] )
    }


    pub fn trim( self ) -> Sv<'a> {
        self.trim_left().trim_right()
    }


    pub fn starts_with( &self, prefix: Sv<'_> ) -> bool {
        prefix.len() <= self.len() && &self.items[ ..prefix.len() ] == prefix.items
    }


    pub fn ends_with( &self, suffix: Sv<'_> ) -> bool {
        suffix.len() <= self.len() && &self.items[ self.len() - suffix.len().. ] == suffix.items
    }


    /// Byte offset of the last occurrence of `needle`.
    ///
    /// An empty needle matches at offset 0.
    pub fn find_back( &self, needle: Sv<'_> ) -> Option<usize> {
        if needle.is_empty() {
            return Some( 0 );
        }
        if needle.len() > self.len() {
            return None;
        }
        self.items.windows( needle.len() ).rposition( |w| w == needle.items )
    }


    /// Parses leading decimal digits the way C `atoi` does.
    ///
    /// Leading whitespace and one sign are accepted; parsing stops at the
    /// first non-digit. A view with no digits yields 0.
    pub fn atoi( &self ) -> i64 {
        let sv = self.trim_left();
        let ( negative, digits ) = match sv.items.first() {
            Some( b'-' ) => ( true, &sv.items[ 1.. ] ),
            Some( b'+' ) => ( false, &sv.items[ 1.. ] ),
            _ => ( false, sv.items ),
        };

        let value = digits
            .iter()
            .take_while( |b| b.is_ascii_digit() )
            .fold( 0i64, |acc, b| acc.saturating_mul( 10 ).saturating_add( ( b - b'0' ) as i64 ) );

        if negative { -value } else { value }
    }
}


impl<'a> From<&'a str> for Sv<'a> {
    fn from( s: &'a str ) -> Self {
        Sv::from_bytes( s.as_bytes() )
    }
}


impl<'a> From<&'a [u8]> for Sv<'a> {
    fn from( bytes: &'a [u8] ) -> Self {
        Sv::from_bytes( bytes )
    }
}


impl fmt::Display for Sv<'_> {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.write_str( &String::from_utf8_lossy( self.items ) )
    }
}


impl fmt::Debug for Sv<'_> {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        write!( f, "Sv({:?})", String::from_utf8_lossy( self.items ) )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_chop_by_delim_walks_fields() {
        let mut sv = Sv::from( "a:b:c" );

        assert_eq!( sv.chop_by_delim( b':' ), Sv::from( "a" ) );
        assert_eq!( sv.chop_by_delim( b':' ), Sv::from( "b" ) );
        assert_eq!( sv.chop_by_delim( b':' ), Sv::from( "c" ) );

        let rest = sv.chop_by_delim( b':' );
        assert_eq!( rest.len(), 0 );
        assert!( sv.is_empty() );
    }


    #[test]
    fn test_chop_missing_delim_consumes_everything() {
        let mut sv = Sv::from( "no delimiter" );
        assert_eq!( sv.chop_by_delim( b'\n' ), Sv::from( "no delimiter" ) );
        assert!( sv.is_empty() );
    }


    #[test]
    fn test_rchop_by_delim() {
        let mut path = Sv::from( "target/release/rimloop" );

        assert_eq!( path.rchop_by_delim( b'/' ), Sv::from( "rimloop" ) );
        assert_eq!( path, Sv::from( "target/release" ) );

        let mut bare = Sv::from( "rimloop" );
        assert_eq!( bare.rchop_by_delim( b'/' ), Sv::from( "rimloop" ) );
        assert!( bare.is_empty() );
    }


    #[test]
    fn test_trim() {
        assert_eq!( Sv::from( " x " ).trim(), Sv::from( "x" ) );
        assert_eq!( Sv::from( "\t\x0b x\r\n" ).trim_left(), Sv::from( "x\r\n" ) );
        assert_eq!( Sv::from( "x \x0c" ).trim_right(), Sv::from( "x" ) );
        assert!( Sv::from( "   " ).trim().is_empty() );
    }


    #[test]
    fn test_eq_requires_equal_length() {
        assert_ne!( Sv::from( "ab" ), Sv::from( "abc" ) );
        assert_eq!( Sv::from( "abc" ), Sv::from_bytes( b"abc" ) );
    }


    #[test]
    fn test_starts_and_ends_with() {
        let sv = Sv::from( "main.rs" );

        assert!( sv.starts_with( Sv::from( "main" ) ) );
        assert!( sv.ends_with( Sv::from( ".rs" ) ) );
        assert!( !sv.starts_with( Sv::from( "main.rs.old" ) ) );
        assert!( !sv.ends_with( Sv::from( "xmain.rs" ) ) );
        assert!( sv.starts_with( Sv::default() ) );
    }


    #[test]
    fn test_find_back() {
        let sv = Sv::from( "a/b/a/b" );
        assert_eq!( sv.find_back( Sv::from( "a/b" ) ), Some( 4 ) );
        assert_eq!( sv.find_back( Sv::from( "c" ) ), None );
        assert_eq!( sv.find_back( Sv::from( "" ) ), Some( 0 ) );
    }


    #[test]
    fn test_atoi() {
        assert_eq!( Sv::from( "42" ).atoi(), 42 );
        assert_eq!( Sv::from( " 07x" ).atoi(), 7 );
        assert_eq!( Sv::from( "-3" ).atoi(), -3 );
        assert_eq!( Sv::from( "abc" ).atoi(), 0 );
    }
}
