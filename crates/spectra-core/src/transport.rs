//! Transport controller
//!
//! Dispatches [`Intent`]s to the playback engine and playlist, and keeps
//! the track label and time display in step with them.

use thiserror::Error;

use crate::analysis::{ AnalysisAdapter, AnalysisError, AudioContext };
use crate::display::{ TimeDisplay, TrackLabel };
use crate::engine::{ EngineState, MediaElement, MediaError, MediaEvent, PlaybackEngine };
use crate::intent::Intent;
use crate::playlist::Playlist;


/// Errors surfaced by transport operations.
///
/// These are host failures passed through unchanged; the transport does
/// not retry.
#[derive( Debug, Error )]
pub enum TransportError {
    #[error( "Playback failed: {0}" )]
    Engine( #[from] MediaError ),

    #[error( "Analysis failed: {0}" )]
    Analysis( #[from] AnalysisError ),
}


/// The player widget's controller and the state it drives.
pub struct Transport<M: MediaElement, C: AudioContext> {
    playlist: Playlist,
    engine: PlaybackEngine<M>,
    analysis: AnalysisAdapter<C>,
    track_label: TrackLabel,
    time_display: TimeDisplay,
}


impl<M: MediaElement, C: AudioContext> Transport<M, C> {
    /// Binds a playlist, media element and analysis adapter together.
    ///
    /// The current selection becomes the media source and the track
    /// label shows it; nothing is loaded yet.
    pub fn new( playlist: Playlist, media: M, analysis: AnalysisAdapter<C> ) -> Self {
        let mut engine = PlaybackEngine::new( media );
        if let Some( track ) = playlist.current() {
            engine.assign_source( track.source() );
        }

        let track_label = TrackLabel::new( &playlist );

        Self {
            playlist,
            engine,
            analysis,
            track_label,
            time_display: TimeDisplay::new(),
        }
    }


    /// Dispatches a single intent.
    pub fn handle( &mut self, intent: Intent ) -> Result<(), TransportError> {
        tracing::debug!( "Intent: {:?}", intent );

        match intent {
            Intent::Play => self.play(),
            Intent::Pause => {
                self.pause();
                Ok(())
            }
            Intent::Stop => self.stop(),
            Intent::Next => self.next().map( |_| () ),
            Intent::Previous => self.previous().map( |_| () ),
            Intent::SelectTrack( index ) => self.select_track( index ).map( |_| () ),
        }
    }


    /// Builds or resumes the analysis pipeline, then starts playback.
    pub fn play( &mut self ) -> Result<(), TransportError> {
        self.analysis.ensure_pipeline( self.engine.media_mut() )?;
        self.engine.play()?;
        tracing::info!( "Playing" );
        Ok(())
    }


    /// Pauses playback, keeping the position.
    pub fn pause( &mut self ) {
        self.engine.pause();
        tracing::info!( "Paused" );
    }


    /// Pauses playback and rewinds to zero.
    ///
    /// The time display reads `00:00` afterwards even if the rewind fails.
    pub fn stop( &mut self ) -> Result<(), TransportError> {
        let rewound = self.engine.stop();
        self.time_display.update( 0.0 );
        tracing::info!( "Stopped" );
        Ok( rewound? )
    }


    /// Selects, loads and plays the track at `index`.
    ///
    /// Out-of-range indices are ignored.
    ///
    /// @returns Ok(true) if the track was accepted
    pub fn select_track( &mut self, index: usize ) -> Result<bool, TransportError> {
        if !self.playlist.select_index( index ) {
            tracing::debug!( "Ignoring selection {} of {}", index, self.playlist.len() );
            return Ok( false );
        }

        self.track_label.refresh( &self.playlist );

        let Some( track ) = self.playlist.current() else {
            return Ok( false );
        };
        let source = track.source().to_path_buf();

        self.engine.load_source( &source )?;
        self.engine.play()?;
        tracing::info!( "Track {}: {}", index + 1, self.track_label.text() );
        Ok( true )
    }


    /// Selects the next track, wrapping to the first.
    pub fn next( &mut self ) -> Result<bool, TransportError> {
        match self.playlist.next_index() {
            Some( index ) => self.select_track( index ),
            None => Ok( false ),
        }
    }


    /// Selects the previous track, wrapping to the last.
    pub fn previous( &mut self ) -> Result<bool, TransportError> {
        match self.playlist.previous_index() {
            Some( index ) => self.select_track( index ),
            None => Ok( false ),
        }
    }


    /// Processes pending media notifications.
    ///
    /// A native play notification builds or resumes the analysis pipeline;
    /// position notifications refresh the time display.
    pub fn pump( &mut self ) -> Vec<MediaEvent> {
        let events = self.engine.poll_events();

        for event in &events {
            match event {
                MediaEvent::Play => {
                    if let Err( e ) = self.analysis.ensure_pipeline( self.engine.media_mut() ) {
                        tracing::warn!( "{}", e );
                    }
                }
                MediaEvent::TimeUpdate( seconds ) => self.time_display.update( *seconds ),
                MediaEvent::Ended => tracing::info!( "Track ended" ),
                MediaEvent::Pause | MediaEvent::Error( _ ) => {}
            }
        }

        events
    }


    pub fn playlist( &self ) -> &Playlist {
        &self.playlist
    }


    pub fn state( &self ) -> EngineState {
        self.engine.state()
    }


    pub fn engine( &self ) -> &PlaybackEngine<M> {
        &self.engine
    }


    pub fn track_label( &self ) -> &TrackLabel {
        &self.track_label
    }


    pub fn time_display( &self ) -> &TimeDisplay {
        &self.time_display
    }


    pub fn analysis( &self ) -> &AnalysisAdapter<C> {
        &self.analysis
    }


    /// Gets the analysis adapter for the visualizer.
    pub fn analysis_mut( &mut self ) -> &mut AnalysisAdapter<C> {
        &mut self.analysis
    }
}


#[cfg( test )]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::analysis::fake::{ adapter, FakeContext, Probe };
    use crate::analysis::ContextState;
    use crate::engine::fake::FakeMedia;
    use crate::playlist::TrackRef;


    fn transport( count: usize, probe: &Probe ) -> Transport<FakeMedia, FakeContext> {
        let playlist = Playlist::from_tracks(
            ( 0..count ).map( |i| TrackRef::new( format!( "/music/{}.ogg", i ), format!( "Song {}", i ) ) )
        );
        Transport::new( playlist, FakeMedia::default(), adapter( probe, ContextState::Suspended ) )
    }


    #[test]
    fn test_startup_shows_first_track() {
        let transport = transport( 3, &Probe::default() );
        assert_eq!( transport.track_label().text(), "Song 0" );
        assert_eq!( transport.time_display().text(), "00:00" );
        assert_eq!( transport.engine().media().source.as_deref(), Some( Path::new( "/music/0.ogg" ) ) );
        assert_eq!( transport.state(), EngineState::Idle );
    }


    #[test]
    fn test_play_twice_builds_pipeline_once() {
        let probe = Probe::default();
        let mut transport = transport( 2, &probe );

        transport.handle( Intent::Play ).unwrap();
        let first = transport.analysis().pipeline().map( |p| p.id() );
        transport.handle( Intent::Play ).unwrap();
        let second = transport.analysis().pipeline().map( |p| p.id() );

        assert!( first.is_some() );
        assert_eq!( first, second );
        assert_eq!( probe.opened.get(), 1 );
        assert_eq!( probe.resumed.get(), 1 );
        assert_eq!( transport.state(), EngineState::Playing );
    }


    #[test]
    fn test_pause_keeps_position() {
        let mut transport = transport( 1, &Probe::default() );
        transport.handle( Intent::Play ).unwrap();
        transport.engine.media_mut().position = 30.0;

        transport.handle( Intent::Pause ).unwrap();
        assert_eq!( transport.state(), EngineState::Paused );
        assert_eq!( transport.engine().position(), 30.0 );
    }


    #[test]
    fn test_stop_resets_time_display() {
        let mut transport = transport( 1, &Probe::default() );
        transport.handle( Intent::Play ).unwrap();
        transport.engine.media_mut().events.push( MediaEvent::TimeUpdate( 95.0 ) );
        transport.pump();
        assert_eq!( transport.time_display().text(), "01:35" );

        transport.handle( Intent::Stop ).unwrap();
        assert_eq!( transport.time_display().text(), "00:00" );
        assert_eq!( transport.engine().position(), 0.0 );
        assert_eq!( transport.state(), EngineState::Idle );
    }


    #[test]
    fn test_select_track_loads_and_plays() {
        let mut transport = transport( 3, &Probe::default() );

        assert!( transport.select_track( 2 ).unwrap() );
        assert_eq!( transport.playlist().current_index(), 2 );
        assert_eq!( transport.track_label().text(), "Song 2" );
        assert_eq!( transport.engine().media().loads, 1 );
        assert_eq!( transport.engine().media().source.as_deref(), Some( Path::new( "/music/2.ogg" ) ) );
        assert_eq!( transport.state(), EngineState::Playing );
    }


    #[test]
    fn test_select_out_of_range_changes_nothing() {
        let mut transport = transport( 3, &Probe::default() );
        transport.select_track( 1 ).unwrap();

        assert!( !transport.select_track( 3 ).unwrap() );
        assert_eq!( transport.playlist().current_index(), 1 );
        assert_eq!( transport.track_label().text(), "Song 1" );
        assert_eq!( transport.engine().media().loads, 1 );
    }


    #[test]
    fn test_next_and_previous_wrap() {
        let mut transport = transport( 3, &Probe::default() );

        transport.handle( Intent::Previous ).unwrap();
        assert_eq!( transport.playlist().current_index(), 2 );

        transport.handle( Intent::Next ).unwrap();
        assert_eq!( transport.playlist().current_index(), 0 );
        assert_eq!( transport.track_label().text(), "Song 0" );
    }


    #[test]
    fn test_next_cycle_returns_to_start() {
        let mut transport = transport( 4, &Probe::default() );
        transport.select_track( 1 ).unwrap();

        for _ in 0..4 {
            transport.handle( Intent::Next ).unwrap();
        }
        assert_eq!( transport.playlist().current_index(), 1 );
    }


    #[test]
    fn test_empty_playlist_navigation_is_a_no_op() {
        let mut transport = transport( 0, &Probe::default() );

        assert!( !transport.next().unwrap() );
        assert!( !transport.previous().unwrap() );
        assert_eq!( transport.track_label().text(), "" );
        assert_eq!( transport.engine().media().loads, 0 );
    }


    #[test]
    fn test_native_play_event_builds_pipeline() {
        let probe = Probe::default();
        let mut transport = transport( 2, &probe );

        transport.select_track( 1 ).unwrap();
        assert!( !transport.analysis().is_ready() );

        transport.pump();
        assert!( transport.analysis().is_ready() );
        assert_eq!( probe.opened.get(), 1 );
    }


    #[test]
    fn test_engine_failure_is_passed_through() {
        let mut transport = transport( 2, &Probe::default() );
        transport.engine.media_mut().fail_load = true;

        let result = transport.handle( Intent::SelectTrack( 1 ) );
        assert!( matches!( result, Err( TransportError::Engine( MediaError::Open( _ ) ) ) ) );
        assert_eq!( transport.track_label().text(), "Song 1" );
        assert_eq!( transport.state(), EngineState::Loading );
    }
}
