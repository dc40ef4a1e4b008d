//! Command-line argument parsing for Spectra.

use std::path::PathBuf;

use clap::Parser;


/// Spectra - a terminal audio player with a live spectrum.
#[derive( Parser, Debug, Default )]
#[command( name = "spectra" )]
#[command( version, about, long_about = None )]
pub struct Args {
    /// M3U playlist to load before any files.
    #[arg( short, long )]
    pub playlist: Option<PathBuf>,

    /// Visualizer frames per second.
    #[arg( long )]
    pub fps: Option<u32>,

    /// Start playing the first track immediately.
    #[arg( short, long )]
    pub autoplay: bool,

    /// Write debug-level logs.
    #[arg( short, long )]
    pub verbose: bool,

    /// Files or directories to add to the playlist.
    #[arg( trailing_var_arg = true )]
    pub files: Vec<PathBuf>,
}
