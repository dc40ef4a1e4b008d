//! Playback engine adapter
//!
//! Wraps a host media element behind a small state machine:
//! Idle → Loading → Playing ⇄ Paused, with stop returning to Idle at
//! position zero.

use std::path::Path;

use thiserror::Error;

use crate::tap::OutputTap;


/// Errors reported by a media element.
#[derive( Debug, Error )]
pub enum MediaError {
    #[error( "No source set" )]
    NoSource,

    #[error( "Failed to open source: {0}" )]
    Open( String ),

    #[error( "Decode error: {0}" )]
    Decode( String ),

    #[error( "Audio output error: {0}" )]
    Output( String ),
}


/// Notifications emitted by a media element.
#[derive( Debug, Clone, PartialEq )]
pub enum MediaEvent {
    /// Playback started or resumed.
    Play,
    Pause,
    /// The playback position changed, in seconds.
    TimeUpdate( f64 ),
    /// The source played to its end.
    Ended,
    Error( String ),
}


/// Host media-playback primitive.
pub trait MediaElement {
    /// Assigns the source. Takes effect on the next `load`.
    fn set_source( &mut self, source: &Path );

    /// Opens the assigned source, discarding any previous one.
    fn load( &mut self ) -> Result<(), MediaError>;

    /// Starts or resumes playback, loading first if nothing is loaded.
    fn play( &mut self ) -> Result<(), MediaError>;

    fn pause( &mut self );

    /// Moves the playback position.
    fn set_current_time( &mut self, seconds: f64 ) -> Result<(), MediaError>;

    /// Gets the playback position in seconds.
    fn current_time( &self ) -> f64;

    /// Routes the element's output into a tap holding `window` samples.
    ///
    /// Calling this again replaces the previous tap.
    fn tap_output( &mut self, window: usize ) -> OutputTap;

    /// Takes all notifications raised since the last call.
    fn drain_events( &mut self ) -> Vec<MediaEvent>;
}


/// Playback state as seen by the widget.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum EngineState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
}


/// State-tracking wrapper around a media element.
#[derive( Debug )]
pub struct PlaybackEngine<M> {
    media: M,
    state: EngineState,
}


impl<M: MediaElement> PlaybackEngine<M> {
    /// Creates an idle engine around `media`.
    pub fn new( media: M ) -> Self {
        Self {
            media,
            state: EngineState::Idle,
        }
    }


    /// Assigns a new source and reloads it.
    ///
    /// The engine is in Loading afterwards regardless of its prior state,
    /// and stays there if the load fails.
    pub fn load_source( &mut self, source: &Path ) -> Result<(), MediaError> {
        tracing::info!( "Loading: {:?}", source );
        self.state = EngineState::Loading;
        self.media.set_source( source );
        self.media.load()
    }


    /// Assigns a source without loading it, leaving the state unchanged.
    pub fn assign_source( &mut self, source: &Path ) {
        self.media.set_source( source );
    }


    /// Starts playback from the current position.
    pub fn play( &mut self ) -> Result<(), MediaError> {
        if self.state != EngineState::Playing {
            self.state = EngineState::Loading;
        }
        self.media.play()?;
        self.state = EngineState::Playing;
        Ok(())
    }


    /// Pauses playback, keeping the position.
    pub fn pause( &mut self ) {
        self.media.pause();
        if self.state == EngineState::Playing {
            self.state = EngineState::Paused;
        }
    }


    /// Pauses playback and rewinds to zero.
    pub fn stop( &mut self ) -> Result<(), MediaError> {
        self.media.pause();
        self.state = EngineState::Idle;
        self.media.set_current_time( 0.0 )
    }


    /// Gets the engine state.
    pub fn state( &self ) -> EngineState {
        self.state
    }


    /// Gets the playback position in seconds.
    pub fn position( &self ) -> f64 {
        self.media.current_time()
    }


    /// Drains pending media notifications, folding them into the state.
    pub fn poll_events( &mut self ) -> Vec<MediaEvent> {
        let events = self.media.drain_events();
        for event in &events {
            match event {
                MediaEvent::Play => self.state = EngineState::Playing,
                MediaEvent::Pause | MediaEvent::Ended => {
                    if self.state == EngineState::Playing {
                        self.state = EngineState::Paused;
                    }
                }
                MediaEvent::Error( message ) => {
                    tracing::warn!( "Media error: {}", message );
                }
                MediaEvent::TimeUpdate( _ ) => {}
            }
        }
        events
    }


    /// Gets the wrapped media element.
    pub fn media( &self ) -> &M {
        &self.media
    }


    /// Gets the wrapped media element mutably.
    pub fn media_mut( &mut self ) -> &mut M {
        &mut self.media
    }
}


#[cfg( test )]
pub( crate ) mod fake {
    use std::path::{ Path, PathBuf };

    use super::*;


    /// Scriptable in-memory media element.
    #[derive( Debug, Default )]
    pub struct FakeMedia {
        pub source: Option<PathBuf>,
        pub loads: usize,
        pub plays: usize,
        pub playing: bool,
        pub position: f64,
        pub fail_load: bool,
        pub taps: usize,
        pub tap: Option<OutputTap>,
        pub events: Vec<MediaEvent>,
    }


    impl MediaElement for FakeMedia {
        fn set_source( &mut self, source: &Path ) {
            self.source = Some( source.to_path_buf() );
        }


        fn load( &mut self ) -> Result<(), MediaError> {
            if self.fail_load {
                return Err( MediaError::Open( "unsupported".into() ) );
            }
            self.loads += 1;
            self.playing = false;
            self.position = 0.0;
            Ok(())
        }


        fn play( &mut self ) -> Result<(), MediaError> {
            if self.source.is_none() {
                return Err( MediaError::NoSource );
            }
            self.plays += 1;
            self.playing = true;
            self.events.push( MediaEvent::Play );
            Ok(())
        }


        fn pause( &mut self ) {
            if self.playing {
                self.playing = false;
                self.events.push( MediaEvent::Pause );
            }
        }


        fn set_current_time( &mut self, seconds: f64 ) -> Result<(), MediaError> {
            self.position = seconds;
            self.events.push( MediaEvent::TimeUpdate( seconds ) );
            Ok(())
        }


        fn current_time( &self ) -> f64 {
            self.position
        }


        fn tap_output( &mut self, window: usize ) -> OutputTap {
            self.taps += 1;
            let tap = OutputTap::new( window );
            self.tap = Some( tap.clone() );
            tap
        }


        fn drain_events( &mut self ) -> Vec<MediaEvent> {
            std::mem::take( &mut self.events )
        }
    }
}


#[cfg( test )]
mod tests {
    use std::path::Path;

    use super::fake::FakeMedia;
    use super::*;


    #[test]
    fn test_load_then_play() {
        let mut engine = PlaybackEngine::new( FakeMedia::default() );
        engine.load_source( Path::new( "a.mp3" ) ).unwrap();
        assert_eq!( engine.state(), EngineState::Loading );

        engine.play().unwrap();
        assert_eq!( engine.state(), EngineState::Playing );
        assert_eq!( engine.media().loads, 1 );
    }


    #[test]
    fn test_pause_and_resume() {
        let mut engine = PlaybackEngine::new( FakeMedia::default() );
        engine.load_source( Path::new( "a.mp3" ) ).unwrap();
        engine.play().unwrap();
        engine.media_mut().position = 12.5;

        engine.pause();
        assert_eq!( engine.state(), EngineState::Paused );
        assert_eq!( engine.position(), 12.5 );

        engine.play().unwrap();
        assert_eq!( engine.state(), EngineState::Playing );
    }


    #[test]
    fn test_pause_when_idle_stays_idle() {
        let mut engine = PlaybackEngine::new( FakeMedia::default() );
        engine.pause();
        assert_eq!( engine.state(), EngineState::Idle );
    }


    #[test]
    fn test_stop_rewinds_to_idle() {
        let mut engine = PlaybackEngine::new( FakeMedia::default() );
        engine.load_source( Path::new( "a.mp3" ) ).unwrap();
        engine.play().unwrap();
        engine.media_mut().position = 42.0;

        engine.stop().unwrap();
        assert_eq!( engine.state(), EngineState::Idle );
        assert_eq!( engine.position(), 0.0 );
        assert!( !engine.media().playing );
    }


    #[test]
    fn test_failed_load_stays_loading() {
        let mut engine = PlaybackEngine::new( FakeMedia { fail_load: true, ..Default::default() } );
        assert!( engine.load_source( Path::new( "bad.xyz" ) ).is_err() );
        assert_eq!( engine.state(), EngineState::Loading );
    }


    #[test]
    fn test_play_without_source_fails_in_loading() {
        let mut engine = PlaybackEngine::new( FakeMedia::default() );
        assert!( matches!( engine.play(), Err( MediaError::NoSource ) ) );
        assert_eq!( engine.state(), EngineState::Loading );
    }


    #[test]
    fn test_ended_event_pauses() {
        let mut engine = PlaybackEngine::new( FakeMedia::default() );
        engine.load_source( Path::new( "a.mp3" ) ).unwrap();
        engine.play().unwrap();
        engine.media_mut().events.push( MediaEvent::Ended );

        let events = engine.poll_events();
        assert_eq!( events, vec![ MediaEvent::Play, MediaEvent::Ended ] );
        assert_eq!( engine.state(), EngineState::Paused );
    }
}
