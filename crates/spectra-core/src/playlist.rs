//! Playlist selection
//!
//! Holds the ordered track references and the currently selected index.

use std::fs::File;
use std::io::{ BufRead, BufReader };
use std::path::{ Path, PathBuf };

use thiserror::Error;


/// Errors that can occur while populating a playlist.
#[derive( Debug, Error )]
pub enum PlaylistError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),
}


/// A playable source and the label shown for it.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct TrackRef {
    source: PathBuf,
    name: String,
}


impl TrackRef {
    /// Creates a track reference with an explicit display name.
    pub fn new( source: impl Into<PathBuf>, name: impl Into<String> ) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
        }
    }


    /// Creates a track reference named after the file stem of its source.
    pub fn from_path( source: impl Into<PathBuf> ) -> Self {
        let source = source.into();
        let name = source
            .file_stem()
            .map( |s| s.to_string_lossy().into_owned() )
            .unwrap_or_else( || source.display().to_string() );
        Self { source, name }
    }


    /// Gets the source locator.
    pub fn source( &self ) -> &Path {
        &self.source
    }


    /// Gets the display name.
    pub fn name( &self ) -> &str {
        &self.name
    }
}


/// Ordered track list with a single selected index.
///
/// Once the list is non-empty the index is always in `[0, len)`.
#[derive( Debug, Default, Clone )]
pub struct Playlist {
    tracks: Vec<TrackRef>,
    selected: usize,
}


impl Playlist {
    /// Creates a new empty playlist.
    pub fn new() -> Self {
        Self::default()
    }


    /// Creates a playlist from the given tracks, selecting the first one.
    pub fn from_tracks( tracks: impl IntoIterator<Item = TrackRef> ) -> Self {
        Self {
            tracks: tracks.into_iter().collect(),
            selected: 0,
        }
    }


    /// Adds a track to the end of the playlist.
    pub fn add( &mut self, track: TrackRef ) {
        self.tracks.push( track );
    }


    /// Adds multiple tracks to the playlist.
    pub fn add_many( &mut self, tracks: impl IntoIterator<Item = TrackRef> ) {
        self.tracks.extend( tracks );
    }


    /// Selects the track at `index`.
    ///
    /// Out-of-range indices are ignored and leave the selection unchanged.
    ///
    /// @param index - Zero-based track index
    ///
    /// @returns true if the selection was accepted
    pub fn select_index( &mut self, index: usize ) -> bool {
        if index < self.tracks.len() {
            self.selected = index;
            true
        } else {
            false
        }
    }


    /// Gets the index after the current one, wrapping to the start.
    pub fn next_index( &self ) -> Option<usize> {
        if self.tracks.is_empty() {
            return None;
        }
        Some(( self.selected + 1 ) % self.tracks.len() )
    }


    /// Gets the index before the current one, wrapping to the end.
    pub fn previous_index( &self ) -> Option<usize> {
        if self.tracks.is_empty() {
            return None;
        }
        Some(( self.selected + self.tracks.len() - 1 ) % self.tracks.len() )
    }


    /// Gets the selected track.
    pub fn current( &self ) -> Option<&TrackRef> {
        self.tracks.get( self.selected )
    }


    /// Gets the selected index.
    pub fn current_index( &self ) -> usize {
        self.selected
    }


    /// Gets all tracks in the playlist.
    pub fn tracks( &self ) -> &[TrackRef] {
        &self.tracks
    }


    /// Gets the number of tracks.
    pub fn len( &self ) -> usize {
        self.tracks.len()
    }


    /// Returns true if the playlist is empty.
    pub fn is_empty( &self ) -> bool {
        self.tracks.is_empty()
    }


    /// Loads tracks from an M3U file.
    ///
    /// `#EXTINF:<secs>,<title>` lines name the entry that follows them.
    /// Relative entries resolve against the playlist's directory.
    pub fn load_m3u( path: &Path ) -> Result<Self, PlaylistError> {
        let file = File::open( path )?;
        let base = path.parent().map( Path::to_path_buf ).unwrap_or_default();
        Self::parse_m3u( BufReader::new( file ), &base )
    }


    fn parse_m3u( reader: impl BufRead, base: &Path ) -> Result<Self, PlaylistError> {
        let mut playlist = Self::new();
        let mut pending_title: Option<String> = None;

        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();

            if trimmed.is_empty() {
                continue;
            }

            if let Some( info ) = trimmed.strip_prefix( "#EXTINF:" ) {
                pending_title = info
                    .split_once( ',' )
                    .map( |( _, title )| title.trim() )
                    .filter( |title| !title.is_empty() )
                    .map( str::to_string );
                if pending_title.is_none() {
                    tracing::warn!( "Untitled EXTINF entry, naming it from the file: {}", trimmed );
                }
                continue;
            }

            if trimmed.starts_with( '#' ) {
                continue;
            }

            let entry = PathBuf::from( trimmed );
            let source = if entry.is_relative() { base.join( entry ) } else { entry };

            let track = match pending_title.take() {
                Some( title ) => TrackRef::new( source, title ),
                None => TrackRef::from_path( source ),
            };
            playlist.add( track );
        }

        Ok( playlist )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn playlist_of( count: usize ) -> Playlist {
        Playlist::from_tracks(
            ( 0..count ).map( |i| TrackRef::new( format!( "/music/{}.mp3", i ), format!( "Track {}", i ) ) )
        )
    }


    #[test]
    fn test_select_out_of_range_is_ignored() {
        let mut playlist = playlist_of( 3 );
        assert!( playlist.select_index( 2 ) );
        assert!( !playlist.select_index( 3 ) );
        assert_eq!( playlist.current_index(), 2 );
    }


    #[test]
    fn test_next_wraps_to_start() {
        let mut playlist = playlist_of( 3 );
        playlist.select_index( 2 );
        assert_eq!( playlist.next_index(), Some( 0 ) );
    }


    #[test]
    fn test_previous_wraps_to_end() {
        let playlist = playlist_of( 4 );
        assert_eq!( playlist.previous_index(), Some( 3 ) );
    }


    #[test]
    fn test_next_cycle_returns_to_start() {
        for len in 1..6 {
            for start in 0..len {
                let mut playlist = playlist_of( len );
                playlist.select_index( start );
                for _ in 0..len {
                    let next = playlist.next_index().unwrap();
                    playlist.select_index( next );
                }
                assert_eq!( playlist.current_index(), start );
            }
        }
    }


    #[test]
    fn test_empty_playlist_has_no_neighbours() {
        let mut playlist = Playlist::new();
        assert_eq!( playlist.next_index(), None );
        assert_eq!( playlist.previous_index(), None );
        assert!( !playlist.select_index( 0 ) );
        assert!( playlist.current().is_none() );
    }


    #[test]
    fn test_from_path_uses_file_stem() {
        let track = TrackRef::from_path( "/music/Blue Monday.flac" );
        assert_eq!( track.name(), "Blue Monday" );
    }


    #[test]
    fn test_parse_m3u_titles_and_relative_paths() {
        let input = "#EXTM3U\n#EXTINF:215,Artist - Song\nsong.mp3\n\n# comment\n/abs/other.ogg\n";
        let playlist = Playlist::parse_m3u( input.as_bytes(), Path::new( "/base" ) ).unwrap();

        assert_eq!( playlist.len(), 2 );
        assert_eq!( playlist.tracks()[ 0 ].name(), "Artist - Song" );
        assert_eq!( playlist.tracks()[ 0 ].source(), Path::new( "/base/song.mp3" ) );
        assert_eq!( playlist.tracks()[ 1 ].name(), "other" );
        assert_eq!( playlist.tracks()[ 1 ].source(), Path::new( "/abs/other.ogg" ) );
    }


    #[test]
    fn test_parse_m3u_untitled_extinf_uses_file_stem() {
        let input = "#EXTM3U\n#EXTINF:-1\ngood1.mp3\n#EXTINF:12,  \ngood2.mp3\ngood3.mp3\n";
        let playlist = Playlist::parse_m3u( input.as_bytes(), Path::new( "/base" ) ).unwrap();

        let names: Vec<&str> = playlist.tracks().iter().map( TrackRef::name ).collect();
        assert_eq!( names, vec![ "good1", "good2", "good3" ] );
        assert_eq!( playlist.tracks()[ 0 ].source(), Path::new( "/base/good1.mp3" ) );
    }


    #[test]
    fn test_load_m3u_from_disk() {
        let dir = std::env::temp_dir().join( "spectra-playlist-test" );
        std::fs::create_dir_all( &dir ).unwrap();
        let path = dir.join( "mix.m3u" );
        std::fs::write( &path, "#EXTM3U\nintro.wav\n" ).unwrap();

        let playlist = Playlist::load_m3u( &path ).unwrap();
        assert_eq!( playlist.len(), 1 );
        assert_eq!( playlist.tracks()[ 0 ].source(), dir.join( "intro.wav" ) );
        assert_eq!( playlist.current_index(), 0 );
    }
}
