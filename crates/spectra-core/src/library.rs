//! Track discovery
//!
//! Turns files and directories given on startup into track references.

use std::path::{ Path, PathBuf };

use thiserror::Error;

use crate::playlist::TrackRef;


/// Supported audio file extensions.
const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "wav", "m4a", "aac", "opus", "aiff", "alac",
];


/// Errors that can occur during library scanning.
#[derive( Debug, Error )]
pub enum LibraryError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Path not found: {0}" )]
    NotFound( PathBuf ),
}


/// Scanner that collects audio files from a set of roots.
#[derive( Debug, Default )]
pub struct LibraryScanner {
    roots: Vec<PathBuf>,
}


impl LibraryScanner {
    /// Creates a new scanner with no roots.
    pub fn new() -> Self {
        Self::default()
    }


    /// Adds a root file or directory.
    pub fn add_root( &mut self, path: PathBuf ) {
        if !self.roots.contains( &path ) {
            self.roots.push( path );
        }
    }


    /// Gets all roots.
    pub fn roots( &self ) -> &[PathBuf] {
        &self.roots
    }


    /// Scans all roots in order.
    ///
    /// Files given directly are kept even without a known extension.
    /// Directory contents are sorted by path so the playlist order is stable.
    pub fn scan( &self ) -> Result<Vec<TrackRef>, LibraryError> {
        let mut tracks = Vec::new();

        for root in &self.roots {
            if root.is_file() {
                tracks.push( TrackRef::from_path( root.clone() ) );
                continue;
            }

            tracing::info!( "Scanning: {:?}", root );
            let mut found = Vec::new();
            Self::scan_recursive( root, &mut found )?;
            found.sort();
            tracks.extend( found.into_iter().map( TrackRef::from_path ) );
        }

        tracing::info!( "Found {} tracks", tracks.len() );
        Ok( tracks )
    }


    fn scan_recursive( dir: &Path, found: &mut Vec<PathBuf> ) -> Result<(), LibraryError> {
        let entries = match std::fs::read_dir( dir ) {
            Ok( e ) => e,
            Err( e ) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                tracing::warn!( "Access denied: {:?}", dir );
                return Ok(());
            }
            Err( e ) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err( LibraryError::NotFound( dir.to_path_buf() ) );
            }
            Err( e ) => return Err( LibraryError::Io( e ) ),
        };

        for entry in entries.flatten() {
            let path = entry.path();

            if path.is_dir() {
                Self::scan_recursive( &path, found )?;
            } else if is_audio_file( &path ) {
                found.push( path );
            }
        }

        Ok(())
    }
}


/// Checks if a file has a supported audio extension.
pub fn is_audio_file( path: &Path ) -> bool {
    path.extension()
        .and_then( |e| e.to_str() )
        .map( |e| SUPPORTED_EXTENSIONS.contains( &e.to_lowercase().as_str() ) )
        .unwrap_or( false )
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_is_audio_file() {
        assert!( is_audio_file( Path::new( "a/b/song.FLAC" ) ) );
        assert!( !is_audio_file( Path::new( "cover.jpg" ) ) );
        assert!( !is_audio_file( Path::new( "README" ) ) );
    }


    #[test]
    fn test_scan_directory_sorted_and_filtered() {
        let dir = std::env::temp_dir().join( "spectra-library-test" );
        let nested = dir.join( "disc2" );
        std::fs::create_dir_all( &nested ).unwrap();
        std::fs::write( dir.join( "b.mp3" ), b"" ).unwrap();
        std::fs::write( dir.join( "a.wav" ), b"" ).unwrap();
        std::fs::write( dir.join( "notes.txt" ), b"" ).unwrap();
        std::fs::write( nested.join( "c.ogg" ), b"" ).unwrap();

        let mut scanner = LibraryScanner::new();
        scanner.add_root( dir.clone() );
        let tracks = scanner.scan().unwrap();
        let names: Vec<_> = tracks.iter().map( |t| t.name() ).collect();

        assert_eq!( names, vec![ "a", "b", "c" ] );
    }


    #[test]
    fn test_missing_root_is_reported() {
        let mut scanner = LibraryScanner::new();
        scanner.add_root( std::env::temp_dir().join( "spectra-library-missing" ) );
        assert!( matches!( scanner.scan(), Err( LibraryError::NotFound( _ ) ) ) );
    }


    #[test]
    fn test_duplicate_roots_are_ignored() {
        let mut scanner = LibraryScanner::new();
        scanner.add_root( PathBuf::from( "/music" ) );
        scanner.add_root( PathBuf::from( "/music" ) );
        assert_eq!( scanner.roots().len(), 1 );
    }
}
