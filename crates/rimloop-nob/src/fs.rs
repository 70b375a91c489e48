//! Filesystem helpers for build scripts.
//!
//! Every helper logs its own failure and returns it; callers only decide
//! whether to continue.

use std::fs::{ self, File };
use std::io::{ self, Read, Write };
use std::path::Path;

use crate::da::{ Da, StringBuilder };
use crate::error::NobError;
use crate::temp::{ TempArena, TempSlice };


/// Size of the intermediate buffer used by `copy_file`.
pub const COPY_BUFFER_SIZE: usize = 32 * 1024;


/// Names of directory entries, allocated in a `TempArena`.
pub type FilePaths = Da<TempSlice>;


/// Kind of filesystem node, as seen without following symlinks.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum FileType {
    Regular,
    Directory,
    Symlink,
    Other,
}


/// Classifies `path` without following a final symlink.
pub fn get_file_type( path: &Path ) -> Result<FileType, NobError> {
    let meta = fs::symlink_metadata( path ).map_err( |e| NobError::io( "Could not get stat of", path, e ) )?;
    let file_type = meta.file_type();

    Ok( if file_type.is_dir() {
        FileType::Directory
    } else if file_type.is_file() {
        FileType::Regular
    } else if file_type.is_symlink() {
        FileType::Symlink
    } else {
        FileType::Other
    } )
}


/// Reports whether `path` exists. Errors other than "not found" are
/// failures, not a "no".
pub fn file_exists( path: &Path ) -> Result<bool, NobError> {
    match fs::metadata( path ) {
        Ok( _ ) => Ok( true ),
        Err( e ) if e.kind() == io::ErrorKind::NotFound => Ok( false ),
        Err( e ) => Err( NobError::io( "Could not check if file exists", path, e ) ),
    }
}


/// Creates a single directory; an existing one is fine.
pub fn mkdir_if_not_exists( path: &Path ) -> Result<(), NobError> {
    match fs::create_dir( path ) {
        Ok(()) => {
            tracing::info!( "Created directory `{}`", path.display() );
            Ok(())
        }
        Err( e ) if e.kind() == io::ErrorKind::AlreadyExists => {
            tracing::info!( "Directory `{}` already exists", path.display() );
            Ok(())
        }
        Err( e ) => Err( NobError::io( "Could not create directory", path, e ) ),
    }
}


/// Renames `from` to `to`, replacing `to` if it exists.
pub fn rename( from: &Path, to: &Path ) -> Result<(), NobError> {
    tracing::info!( "Renaming `{}` -> `{}`", from.display(), to.display() );

    fs::rename( from, to ).map_err( |source| {
        tracing::error!( "Could not rename `{}` to `{}`: {}", from.display(), to.display(), source );
        NobError::Rename { from: from.to_path_buf(), to: to.to_path_buf(), source }
    } )
}


/// Copies a regular file through a fixed buffer, keeping its permissions.
pub fn copy_file( src: &Path, dst: &Path ) -> Result<(), NobError> {
    tracing::debug!( "Copying `{}` -> `{}`", src.display(), dst.display() );

    let mut src_file = File::open( src ).map_err( |e| NobError::io( "Could not open file", src, e ) )?;
    let permissions = src_file
        .metadata()
        .map_err( |e| NobError::io( "Could not get mode of file", src, e ) )?
        .permissions();
    let mut dst_file = File::create( dst ).map_err( |e| NobError::io( "Could not create file", dst, e ) )?;

    let mut buf = vec![ 0u8; COPY_BUFFER_SIZE ];
    loop {
        let n = match src_file.read( &mut buf ) {
            Ok( 0 ) => break,
            Ok( n ) => n,
            Err( e ) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err( e ) => return Err( NobError::io( "Could not read from file", src, e ) ),
        };

        dst_file
            .write_all( &buf[ ..n ] )
            .map_err( |e| NobError::io( "Could not write to file", dst, e ) )?;
    }

    dst_file
        .set_permissions( permissions )
        .map_err( |e| NobError::io( "Could not set mode of file", dst, e ) )
}


/// Appends the names of `parent`'s entries to `children`.
///
/// The names live in `temp` until it is rewound.
pub fn read_entire_dir( temp: &mut TempArena, parent: &Path, children: &mut FilePaths ) -> Result<(), NobError> {
    let entries = fs::read_dir( parent ).map_err( |e| NobError::io( "Could not open directory", parent, e ) )?;

    for entry in entries {
        let entry = entry.map_err( |e| NobError::io( "Could not read directory", parent, e ) )?;
        let name = entry.file_name();

        let Some( name ) = name.to_str() else {
            let path = parent.join( &name );
            tracing::error!( "File name is not valid UTF-8: `{}`", path.display() );
            return Err( NobError::NonUtf8Name( path ) );
        };

        children.append( temp.strdup( name ) );
    }

    Ok(())
}


/// Copies a file or a whole directory tree from `src` to `dst`.
///
/// Symlinks are skipped with a warning; other special files fail the copy.
/// The walk stops at the first failure. Scratch names are released from
/// `temp` before returning, whatever the outcome.
pub fn copy_directory_recursively( temp: &mut TempArena, src: &Path, dst: &Path ) -> Result<(), NobError> {
    let checkpoint = temp.save();
    let result = copy_node( temp, src, dst );
    temp.rewind( checkpoint );
    result
}


fn copy_node( temp: &mut TempArena, src: &Path, dst: &Path ) -> Result<(), NobError> {
    match get_file_type( src )? {
        FileType::Directory => {
            mkdir_if_not_exists( dst )?;

            let mut children = FilePaths::new();
            read_entire_dir( temp, src, &mut children )?;

            for &child in children.iter() {
                let name = temp.str( child );
                if name == "." || name == ".." {
                    continue;
                }

                let ( src_child, dst_child ) = ( src.join( name ), dst.join( name ) );
                copy_directory_recursively( temp, &src_child, &dst_child )?;
            }

            Ok(())
        }
        FileType::Regular => copy_file( src, dst ),
        FileType::Symlink => {
            tracing::warn!( "Copying symlinks is not supported yet, skipping `{}`", src.display() );
            Ok(())
        }
        FileType::Other => {
            tracing::error!( "Unsupported type of file `{}`", src.display() );
            Err( NobError::UnsupportedFileType( src.to_path_buf() ) )
        }
    }
}


/// Appends the whole contents of `path` to `sb`.
pub fn read_entire_file( path: &Path, sb: &mut StringBuilder ) -> Result<(), NobError> {
    let mut file = File::open( path ).map_err( |e| NobError::io( "Could not open for reading", path, e ) )?;

    let mut contents = Vec::new();
    file.read_to_end( &mut contents )
        .map_err( |e| NobError::io( "Could not read", path, e ) )?;

    sb.append_buf( &contents );
    Ok(())
}


/// Replaces the contents of `path` with `data`.
pub fn write_entire_file( path: &Path, data: &[u8] ) -> Result<(), NobError> {
    let mut file = File::create( path ).map_err( |e| NobError::io( "Could not open file for writing", path, e ) )?;
    file.write_all( data )
        .map_err( |e| NobError::io( "Could not write into file", path, e ) )
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_file_type() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join( "a.txt" );
        write_entire_file( &file, b"a" ).unwrap();

        assert_eq!( get_file_type( dir.path() ).unwrap(), FileType::Directory );
        assert_eq!( get_file_type( &file ).unwrap(), FileType::Regular );
        assert!( get_file_type( &dir.path().join( "missing" ) ).is_err() );
    }


    #[test]
    fn test_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        assert!( file_exists( dir.path() ).unwrap() );
        assert!( !file_exists( &dir.path().join( "missing" ) ).unwrap() );
    }


    #[test]
    fn test_mkdir_if_not_exists_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join( "dist" );

        mkdir_if_not_exists( &sub ).unwrap();
        mkdir_if_not_exists( &sub ).unwrap();
        assert!( sub.is_dir() );
        assert!( mkdir_if_not_exists( &dir.path().join( "a/b" ) ).is_err() );
    }


    #[test]
    fn test_read_and_write_entire_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "tracks.time" );
        write_entire_file( &path, b"0:00\tIntro\n" ).unwrap();

        let mut sb = StringBuilder::new();
        sb.append_str( ">" );
        read_entire_file( &path, &mut sb ).unwrap();
        assert_eq!( &sb[ .. ], b">0:00\tIntro\n" );

        assert!( read_entire_file( &dir.path().join( "missing" ), &mut sb ).is_err() );
    }


    #[test]
    fn test_copy_file_streams_large_contents() {
        let dir = tempfile::tempdir().unwrap();
        let ( src, dst ) = ( dir.path().join( "src.bin" ), dir.path().join( "dst.bin" ) );
        let data: Vec<u8> = ( 0..COPY_BUFFER_SIZE * 3 + 17 ).map( |i| ( i % 251 ) as u8 ).collect();
        write_entire_file( &src, &data ).unwrap();

        copy_file( &src, &dst ).unwrap();
        assert_eq!( fs::read( &dst ).unwrap(), data );
    }


    #[test]
    fn test_copy_file_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = copy_file( &dir.path().join( "missing" ), &dir.path().join( "dst" ) );
        assert!( matches!( result, Err( NobError::Io { action: "Could not open file", .. } ) ) );
        assert!( !dir.path().join( "dst" ).exists() );
    }


    #[cfg( unix )]
    #[test]
    fn test_copy_file_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let ( src, dst ) = ( dir.path().join( "run.sh" ), dir.path().join( "run-copy.sh" ) );
        write_entire_file( &src, b"#!/bin/sh\n" ).unwrap();
        fs::set_permissions( &src, fs::Permissions::from_mode( 0o751 ) ).unwrap();

        copy_file( &src, &dst ).unwrap();
        assert_eq!( fs::metadata( &dst ).unwrap().permissions().mode() & 0o777, 0o751 );
    }


    #[test]
    fn test_read_entire_dir_lists_children() {
        let dir = tempfile::tempdir().unwrap();
        write_entire_file( &dir.path().join( "a" ), b"" ).unwrap();
        write_entire_file( &dir.path().join( "b" ), b"" ).unwrap();

        let mut temp = TempArena::default();
        let mut children = FilePaths::new();
        read_entire_dir( &mut temp, dir.path(), &mut children ).unwrap();

        let mut names: Vec<&str> = children.iter().map( |&c| temp.str( c ) ).collect();
        names.sort();
        assert_eq!( names, [ "a", "b" ] );
    }


    #[test]
    fn test_copy_directory_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join( "assets" );
        fs::create_dir_all( src.join( "timestamps" ) ).unwrap();
        write_entire_file( &src.join( "music.txt" ), b"ost" ).unwrap();
        write_entire_file( &src.join( "timestamps/rimworld.time" ), b"0:00\tA\n" ).unwrap();

        let dst = dir.path().join( "dist" );
        let mut temp = TempArena::default();
        copy_directory_recursively( &mut temp, &src, &dst ).unwrap();

        assert_eq!( fs::read( dst.join( "music.txt" ) ).unwrap(), b"ost" );
        assert_eq!( fs::read( dst.join( "timestamps/rimworld.time" ) ).unwrap(), b"0:00\tA\n" );
        assert_eq!( temp.used(), 0 );
    }


    #[test]
    fn test_copy_directory_missing_source_fails_and_rewinds() {
        let dir = tempfile::tempdir().unwrap();
        let mut temp = TempArena::default();
        temp.strdup( "outer" );
        let before = temp.used();

        let result = copy_directory_recursively( &mut temp, &dir.path().join( "missing" ), &dir.path().join( "dst" ) );
        assert!( result.is_err() );
        assert_eq!( temp.used(), before );
    }


    #[cfg( unix )]
    #[test]
    fn test_copy_directory_skips_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join( "src" );
        fs::create_dir( &src ).unwrap();
        write_entire_file( &src.join( "real" ), b"x" ).unwrap();
        std::os::unix::fs::symlink( src.join( "real" ), src.join( "link" ) ).unwrap();

        let dst = dir.path().join( "dst" );
        copy_directory_recursively( &mut TempArena::default(), &src, &dst ).unwrap();

        assert!( dst.join( "real" ).exists() );
        assert!( fs::symlink_metadata( dst.join( "link" ) ).is_err() );
    }


    #[test]
    fn test_rename() {
        let dir = tempfile::tempdir().unwrap();
        let ( from, to ) = ( dir.path().join( "nob" ), dir.path().join( "nob.old" ) );
        write_entire_file( &from, b"bin" ).unwrap();

        rename( &from, &to ).unwrap();
        assert!( !from.exists() );
        assert!( to.exists() );
        assert!( matches!( rename( &from, &to ), Err( NobError::Rename { .. } ) ) );
    }
}
