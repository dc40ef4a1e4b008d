//! Transport intents.
//!
//! Every user action on the widget is expressed as an [`Intent`] and
//! dispatched through [`Transport::handle`](crate::Transport::handle).
//! Intents can also be parsed from short text commands.

use std::str::FromStr;

use thiserror::Error;


/// Errors that can occur while parsing an intent.
#[derive( Debug, Error, PartialEq, Eq )]
pub enum IntentError {
    #[error( "Unknown command: {0}" )]
    Unknown( String ),

    #[error( "Invalid argument: {0}" )]
    InvalidArgument( String ),

    #[error( "Missing argument: {0}" )]
    MissingArgument( String ),
}


/// A user action on the transport.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Intent {
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    /// Zero-based playlist index.
    SelectTrack( usize ),
}


impl Intent {
    /// Parses a command string.
    ///
    /// Track numbers are 1-based, matching the numbering shown to the user.
    ///
    /// @param input - The command string to parse
    ///
    /// @returns The parsed intent or an error
    pub fn parse( input: &str ) -> Result<Self, IntentError> {
        let input = input.trim();
        let mut parts = input.splitn( 2, ' ' );
        let cmd = parts.next().unwrap_or( "" ).to_lowercase();
        let args = parts.next().map( |s| s.trim() );

        match cmd.as_str() {
            "play" | "p" => Ok( Intent::Play ),
            "pause" | "pa" => Ok( Intent::Pause ),
            "stop" | "st" => Ok( Intent::Stop ),
            "next" | "n" => Ok( Intent::Next ),
            "prev" | "previous" | "pr" => Ok( Intent::Previous ),
            "select" | "track" | "t" => {
                let number = args
                    .ok_or_else( || IntentError::MissingArgument( "track number".into() ) )?;
                let number: usize = number.parse()
                    .map_err( |_| IntentError::InvalidArgument( format!( "Invalid track number: {}", number ) ) )?;
                let index = number.checked_sub( 1 )
                    .ok_or_else( || IntentError::InvalidArgument( "Track numbers start at 1".into() ) )?;
                Ok( Intent::SelectTrack( index ) )
            }

            "" => Err( IntentError::Unknown( "empty command".into() ) ),
            other => Err( IntentError::Unknown( other.to_string() ) ),
        }
    }


    /// Returns a brief description of the intent for help text.
    pub fn description( &self ) -> &'static str {
        match self {
            Intent::Play => "Start or resume playback",
            Intent::Pause => "Pause playback",
            Intent::Stop => "Stop and rewind",
            Intent::Next => "Next track",
            Intent::Previous => "Previous track",
            Intent::SelectTrack( _ ) => "Play track by number",
        }
    }
}


impl FromStr for Intent {
    type Err = IntentError;


    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        Self::parse( s )
    }
}


/// Returns help text listing all available commands.
pub fn help_text() -> &'static str {
    r#"Transport:
  /play           Start or resume playback   [p]
  /pause          Pause playback             [Space]
  /stop           Stop and rewind            [s]
  /next           Next track                 [n]
  /prev           Previous track             [b]
  /select <n>     Play track number n        [Enter]

Other:
  /               Open command line
  ?               Show this help
  q               Quit"#
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_transport_aliases() {
        assert_eq!( Intent::parse( "p" ), Ok( Intent::Play ) );
        assert_eq!( Intent::parse( "PAUSE" ), Ok( Intent::Pause ) );
        assert_eq!( Intent::parse( "st" ), Ok( Intent::Stop ) );
        assert_eq!( Intent::parse( " next " ), Ok( Intent::Next ) );
        assert_eq!( Intent::parse( "previous" ), Ok( Intent::Previous ) );
    }


    #[test]
    fn test_parse_select_is_one_based() {
        assert_eq!( Intent::parse( "select 3" ), Ok( Intent::SelectTrack( 2 ) ) );
        assert_eq!( "track 1".parse(), Ok( Intent::SelectTrack( 0 ) ) );
    }


    #[test]
    fn test_parse_select_zero_is_invalid() {
        assert!( matches!( Intent::parse( "select 0" ), Err( IntentError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_select_not_a_number() {
        assert!( matches!( Intent::parse( "select two" ), Err( IntentError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_missing_arg() {
        assert!( matches!( Intent::parse( "select" ), Err( IntentError::MissingArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_unknown() {
        assert!( matches!( Intent::parse( "shuffle" ), Err( IntentError::Unknown( _ ) ) ) );
        assert!( matches!( Intent::parse( "" ), Err( IntentError::Unknown( _ ) ) ) );
    }
}
