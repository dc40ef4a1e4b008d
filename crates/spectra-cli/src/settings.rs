//! Application settings
//!
//! Read from `settings.json` in the platform config directory. Command-line
//! arguments take precedence.

use std::fs;
use std::path::{ Path, PathBuf };

use serde::{ Deserialize, Serialize };
use tracing::Level;

use spectra_core::schedule::DEFAULT_FRAME_RATE;

use crate::cli::Args;


/// Application settings.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
#[serde( default )]
pub struct Settings {
    /// Visualizer frames per second
    pub frame_rate: u32,

    /// Start playing as soon as the player opens
    pub autoplay: bool,

    /// Maximum log level: error, warn, info, debug or trace
    pub log_level: String,
}


impl Default for Settings {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            autoplay: false,
            log_level: "info".to_string(),
        }
    }
}


impl Settings {
    /// Returns the path to the settings file.
    fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map( |p| p.join( "spectra" ).join( "settings.json" ) )
    }


    /// Loads settings from disk, or returns defaults if missing or unreadable.
    ///
    /// Runs before logging is set up, so a read or parse problem is handed
    /// back for the caller to log.
    pub fn load() -> ( Self, Option<String> ) {
        match Self::settings_path() {
            Some( path ) => Self::load_from( &path ),
            None => ( Self::default(), None ),
        }
    }


    /// Loads settings from `path`. A missing file is not a problem.
    pub fn load_from( path: &Path ) -> ( Self, Option<String> ) {
        if !path.exists() {
            return ( Self::default(), None );
        }

        let parsed = fs::read_to_string( path )
            .map_err( |e| format!( "Failed to read settings {:?}: {}", path, e ) )
            .and_then( |contents| Self::parse( &contents )
                .map_err( |e| format!( "Invalid settings {:?}, using defaults: {}", path, e ) ) );

        match parsed {
            Ok( settings ) => ( settings, None ),
            Err( problem ) => ( Self::default(), Some( problem ) ),
        }
    }


    fn parse( contents: &str ) -> Result<Self, serde_json::Error> {
        serde_json::from_str( contents )
    }


    /// Applies command-line overrides.
    pub fn with_args( mut self, args: &Args ) -> Self {
        if let Some( fps ) = args.fps {
            self.frame_rate = fps;
        }
        if args.autoplay {
            self.autoplay = true;
        }
        if args.verbose {
            self.log_level = "debug".to_string();
        }
        self
    }


    /// Gets the log level, falling back to INFO for unknown names.
    pub fn level( &self ) -> Level {
        self.log_level.parse().unwrap_or( Level::INFO )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_missing_fields_use_defaults() {
        let settings = Settings::parse( r#"{ "autoplay": true }"# ).unwrap();
        assert!( settings.autoplay );
        assert_eq!( settings.frame_rate, DEFAULT_FRAME_RATE );
        assert_eq!( settings.level(), Level::INFO );
    }


    #[test]
    fn test_malformed_file_reports_problem() {
        let dir = std::env::temp_dir().join( "spectra-settings-test" );
        fs::create_dir_all( &dir ).unwrap();
        let path = dir.join( "settings.json" );
        fs::write( &path, "{ not json" ).unwrap();

        let ( settings, problem ) = Settings::load_from( &path );
        assert_eq!( settings, Settings::default() );
        assert!( problem.is_some_and( |p| p.starts_with( "Invalid settings" ) ) );
    }


    #[test]
    fn test_missing_file_is_silent() {
        let path = std::env::temp_dir().join( "spectra-settings-test" ).join( "absent.json" );
        let ( settings, problem ) = Settings::load_from( &path );
        assert_eq!( settings, Settings::default() );
        assert!( problem.is_none() );
    }


    #[test]
    fn test_args_override_settings() {
        let args = Args { fps: Some( 30 ), verbose: true, ..Default::default() };
        let settings = Settings::default().with_args( &args );

        assert_eq!( settings.frame_rate, 30 );
        assert_eq!( settings.level(), Level::DEBUG );
        assert!( !settings.autoplay );
    }


    #[test]
    fn test_unknown_level_falls_back() {
        let settings = Settings { log_level: "loud".into(), ..Default::default() };
        assert_eq!( settings.level(), Level::INFO );
    }
}
