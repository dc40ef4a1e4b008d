//! Text displays: elapsed time and current track name.

use crate::playlist::Playlist;


/// Formats seconds as zero-padded `mm:ss`.
///
/// Minutes are not wrapped at 60. Negative and non-finite input shows as `00:00`.
pub fn format_clock( seconds: f64 ) -> String {
    let whole = if seconds.is_finite() && seconds > 0.0 { seconds.floor() as u64 } else { 0 };
    format!( "{:02}:{:02}", whole / 60, whole % 60 )
}


/// Elapsed-time label.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct TimeDisplay {
    text: String,
}


impl TimeDisplay {
    pub fn new() -> Self {
        Self { text: format_clock( 0.0 ) }
    }


    /// Recomputes the label from a playback position.
    pub fn update( &mut self, seconds: f64 ) {
        self.text = format_clock( seconds );
    }


    pub fn text( &self ) -> &str {
        &self.text
    }
}


impl Default for TimeDisplay {
    fn default() -> Self {
        Self::new()
    }
}


/// Current-track label.
#[derive( Debug, Clone, Default, PartialEq, Eq )]
pub struct TrackLabel {
    text: String,
}


impl TrackLabel {
    /// Creates a label showing the playlist's current selection.
    pub fn new( playlist: &Playlist ) -> Self {
        let mut label = Self::default();
        label.refresh( playlist );
        label
    }


    /// Shows the name of the selected track, or nothing for an empty playlist.
    pub fn refresh( &mut self, playlist: &Playlist ) {
        self.text = playlist
            .current()
            .map( |track| track.name().to_string() )
            .unwrap_or_default();
    }


    pub fn text( &self ) -> &str {
        &self.text
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::playlist::TrackRef;


    #[test]
    fn test_format_clock() {
        assert_eq!( format_clock( 0.0 ), "00:00" );
        assert_eq!( format_clock( 65.0 ), "01:05" );
        assert_eq!( format_clock( 754.0 ), "12:34" );
        assert_eq!( format_clock( 3661.0 ), "61:01" );
    }


    #[test]
    fn test_format_clock_truncates_fractions() {
        assert_eq!( format_clock( 59.999 ), "00:59" );
    }


    #[test]
    fn test_format_clock_guards_bad_input() {
        assert_eq!( format_clock( -3.0 ), "00:00" );
        assert_eq!( format_clock( f64::NAN ), "00:00" );
    }


    #[test]
    fn test_time_display_updates() {
        let mut display = TimeDisplay::new();
        assert_eq!( display.text(), "00:00" );
        display.update( 125.4 );
        assert_eq!( display.text(), "02:05" );
    }


    #[test]
    fn test_track_label_follows_selection() {
        let mut playlist = Playlist::from_tracks([
            TrackRef::new( "a.mp3", "Alpha" ),
            TrackRef::new( "b.mp3", "Bravo" ),
        ]);
        let mut label = TrackLabel::new( &playlist );
        assert_eq!( label.text(), "Alpha" );

        playlist.select_index( 1 );
        label.refresh( &playlist );
        assert_eq!( label.text(), "Bravo" );
    }


    #[test]
    fn test_track_label_empty_playlist() {
        assert_eq!( TrackLabel::new( &Playlist::new() ).text(), "" );
    }
}
