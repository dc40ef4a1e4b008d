//! Log file setup.
//!
//! The terminal belongs to the UI, so logs go to
//! `<data dir>/spectra/spectra.log`.

use std::fs::{ self, File };
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{ anyhow, Context, Result };
use tracing::Level;


/// Gets the log file path.
pub fn log_path() -> Option<PathBuf> {
    dirs::data_local_dir().map( |d| d.join( "spectra" ).join( "spectra.log" ) )
}


/// Installs the global subscriber.
///
/// @returns The log file in use, or None when no data directory exists
pub fn init( level: Level ) -> Result<Option<PathBuf>> {
    let Some( path ) = log_path() else {
        return Ok( None );
    };

    if let Some( parent ) = path.parent() {
        fs::create_dir_all( parent )
            .with_context( || format!( "Failed to create log directory {:?}", parent ) )?;
    }
    let file = File::create( &path ).with_context( || format!( "Failed to open log file {:?}", path ) )?;

    tracing_subscriber::fmt()
        .with_writer( Mutex::new( file ) )
        .with_ansi( false )
        .with_max_level( level )
        .try_init()
        .map_err( |e| anyhow!( "Failed to install logger: {}", e ) )?;

    tracing::info!( "Logging at {} to {:?}", level, path );
    Ok( Some( path ) )
}
