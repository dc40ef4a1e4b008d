//! Audio analysis adapter
//!
//! Owns the frequency-analysis pipeline attached to the playback output.
//! The pipeline is built lazily, at most once, on the first play request
//! or the first native play notification, whichever arrives first.

use std::fmt;
use std::sync::atomic::{ AtomicU64, Ordering };

use thiserror::Error;

use crate::engine::MediaElement;
use crate::tap::OutputTap;


/// Transform window size in samples.
pub const FFT_SIZE: usize = 256;

/// Number of frequency bins produced for [`FFT_SIZE`].
pub const BIN_COUNT: usize = FFT_SIZE / 2;


static NEXT_PIPELINE_ID: AtomicU64 = AtomicU64::new( 1 );


/// Errors that can occur while building or driving the analysis pipeline.
#[derive( Debug, Error )]
pub enum AnalysisError {
    #[error( "Failed to open analysis context: {0}" )]
    Context( String ),

    #[error( "Invalid transform window: {0} samples" )]
    InvalidWindow( usize ),

    #[error( "Failed to resume analysis context: {0}" )]
    Resume( String ),
}


/// Run state of an analysis context.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum ContextState {
    Running,
    Suspended,
}


/// Host audio-analysis context.
pub trait AudioContext {
    type Analyser: FrequencyAnalyser;

    fn state( &self ) -> ContextState;

    fn resume( &mut self ) -> Result<(), AnalysisError>;

    /// Creates an analyser fed from `tap` using a `fft_size` sample window.
    fn create_analyser( &mut self, tap: OutputTap, fft_size: usize ) -> Result<Self::Analyser, AnalysisError>;
}


/// Host frequency-analysis node.
pub trait FrequencyAnalyser {
    fn frequency_bin_count( &self ) -> usize;

    /// Writes one 0-255 magnitude per bin into `out`.
    fn byte_frequency_data( &mut self, out: &mut [u8] );
}


/// Identity of a constructed pipeline.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash )]
pub struct PipelineId( u64 );


/// Analysis context, analyser and snapshot buffer bundled together.
pub struct Pipeline<C: AudioContext> {
    id: PipelineId,
    context: C,
    analyser: C::Analyser,
    buffer: Vec<u8>,
}


impl<C: AudioContext> Pipeline<C> {
    /// Gets the pipeline identity.
    pub fn id( &self ) -> PipelineId {
        self.id
    }


    /// Gets the analysis context.
    pub fn context( &self ) -> &C {
        &self.context
    }


    /// Gets the number of frequency bins.
    pub fn bin_count( &self ) -> usize {
        self.buffer.len()
    }


    fn resume_if_suspended( &mut self ) {
        if self.context.state() == ContextState::Suspended {
            tracing::debug!( "Resuming suspended analysis context" );
            if let Err( e ) = self.context.resume() {
                tracing::warn!( "{}", e );
            }
        }
    }
}


impl<C: AudioContext> fmt::Debug for Pipeline<C> {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.debug_struct( "Pipeline" )
            .field( "id", &self.id )
            .field( "bins", &self.buffer.len() )
            .finish_non_exhaustive()
    }
}


type ContextFactory<C> = Box<dyn FnMut() -> Result<C, AnalysisError>>;


/// Lazily built analysis pipeline.
pub struct AnalysisAdapter<C: AudioContext> {
    open_context: ContextFactory<C>,
    pipeline: Option<Pipeline<C>>,
}


impl<C: AudioContext> AnalysisAdapter<C> {
    /// Creates an adapter that opens contexts with `open_context` when needed.
    pub fn new( open_context: impl FnMut() -> Result<C, AnalysisError> + 'static ) -> Self {
        Self {
            open_context: Box::new( open_context ),
            pipeline: None,
        }
    }


    /// Builds the pipeline on first use and resumes it if suspended.
    ///
    /// Later calls return the same pipeline.
    pub fn ensure_pipeline<M: MediaElement>( &mut self, media: &mut M ) -> Result<&mut Pipeline<C>, AnalysisError> {
        let pipeline = match self.pipeline.take() {
            Some( pipeline ) => pipeline,
            None => self.build( media )?,
        };

        let pipeline = self.pipeline.insert( pipeline );
        pipeline.resume_if_suspended();
        Ok( pipeline )
    }


    fn build<M: MediaElement>( &mut self, media: &mut M ) -> Result<Pipeline<C>, AnalysisError> {
        let mut context = ( self.open_context )()?;
        let tap = media.tap_output( FFT_SIZE );
        let analyser = context.create_analyser( tap, FFT_SIZE )?;
        let buffer = vec![ 0; analyser.frequency_bin_count() ];
        let id = PipelineId( NEXT_PIPELINE_ID.fetch_add( 1, Ordering::Relaxed ) );

        tracing::debug!( "Built analysis pipeline {:?} with {} bins", id, buffer.len() );

        Ok( Pipeline { id, context, analyser, buffer } )
    }


    /// Returns true once the pipeline exists.
    pub fn is_ready( &self ) -> bool {
        self.pipeline.is_some()
    }


    /// Gets the pipeline, if built.
    pub fn pipeline( &self ) -> Option<&Pipeline<C>> {
        self.pipeline.as_ref()
    }


    /// Refreshes and returns the magnitude snapshot.
    ///
    /// Returns None before the pipeline exists. The slice is overwritten
    /// by the next call.
    pub fn snapshot( &mut self ) -> Option<&[u8]> {
        let pipeline = self.pipeline.as_mut()?;
        pipeline.analyser.byte_frequency_data( &mut pipeline.buffer );
        Some( &pipeline.buffer )
    }
}


#[cfg( test )]
pub( crate ) mod fake {
    use std::cell::{ Cell, RefCell };
    use std::rc::Rc;

    use super::*;


    /// Counters shared between a test and the fakes it hands out.
    #[derive( Debug, Default, Clone )]
    pub struct Probe {
        pub opened: Rc<Cell<usize>>,
        pub resumed: Rc<Cell<usize>>,
        pub reads: Rc<Cell<usize>>,
        pub levels: Rc<RefCell<Vec<u8>>>,
    }


    pub struct FakeContext {
        pub state: ContextState,
        probe: Probe,
    }


    pub struct FakeAnalyser {
        bins: usize,
        probe: Probe,
    }


    impl AudioContext for FakeContext {
        type Analyser = FakeAnalyser;


        fn state( &self ) -> ContextState {
            self.state
        }


        fn resume( &mut self ) -> Result<(), AnalysisError> {
            self.probe.resumed.set( self.probe.resumed.get() + 1 );
            self.state = ContextState::Running;
            Ok(())
        }


        fn create_analyser( &mut self, _tap: OutputTap, fft_size: usize ) -> Result<FakeAnalyser, AnalysisError> {
            Ok( FakeAnalyser { bins: fft_size / 2, probe: self.probe.clone() } )
        }
    }


    impl FrequencyAnalyser for FakeAnalyser {
        fn frequency_bin_count( &self ) -> usize {
            self.bins
        }


        fn byte_frequency_data( &mut self, out: &mut [u8] ) {
            self.probe.reads.set( self.probe.reads.get() + 1 );
            let levels = self.probe.levels.borrow();
            for ( i, slot ) in out.iter_mut().enumerate() {
                *slot = levels.get( i ).copied().unwrap_or( 0 );
            }
        }
    }


    /// Builds an adapter whose contexts start in `initial` state.
    pub fn adapter( probe: &Probe, initial: ContextState ) -> AnalysisAdapter<FakeContext> {
        let probe = probe.clone();
        AnalysisAdapter::new( move || {
            probe.opened.set( probe.opened.get() + 1 );
            Ok( FakeContext { state: initial, probe: probe.clone() } )
        })
    }
}


#[cfg( test )]
mod tests {
    use super::fake::{ adapter, Probe };
    use super::*;
    use crate::engine::fake::FakeMedia;


    #[test]
    fn test_pipeline_is_built_once() {
        let probe = Probe::default();
        let mut analysis = adapter( &probe, ContextState::Running );
        let mut media = FakeMedia::default();

        let first = analysis.ensure_pipeline( &mut media ).unwrap().id();
        let second = analysis.ensure_pipeline( &mut media ).unwrap().id();

        assert_eq!( first, second );
        assert_eq!( probe.opened.get(), 1 );
        assert_eq!( media.taps, 1 );
    }


    #[test]
    fn test_pipeline_uses_fixed_window() {
        let probe = Probe::default();
        let mut analysis = adapter( &probe, ContextState::Running );
        let pipeline = analysis.ensure_pipeline( &mut FakeMedia::default() ).unwrap();

        assert_eq!( pipeline.bin_count(), BIN_COUNT );
    }


    #[test]
    fn test_suspended_context_is_resumed_once() {
        let probe = Probe::default();
        let mut analysis = adapter( &probe, ContextState::Suspended );
        let mut media = FakeMedia::default();

        analysis.ensure_pipeline( &mut media ).unwrap();
        assert_eq!( probe.resumed.get(), 1 );
        let context = analysis.pipeline().map( |p| p.context().state() );
        assert_eq!( context, Some( ContextState::Running ) );

        analysis.ensure_pipeline( &mut media ).unwrap();
        assert_eq!( probe.resumed.get(), 1, "running context is left alone" );
    }


    #[test]
    fn test_snapshot_before_pipeline_is_none() {
        let probe = Probe::default();
        let mut analysis = adapter( &probe, ContextState::Running );

        assert!( analysis.snapshot().is_none() );
        assert_eq!( probe.reads.get(), 0 );
    }


    #[test]
    fn test_snapshot_reads_current_levels() {
        let probe = Probe::default();
        let mut analysis = adapter( &probe, ContextState::Running );
        analysis.ensure_pipeline( &mut FakeMedia::default() ).unwrap();
        *probe.levels.borrow_mut() = vec![ 10, 20, 30 ];

        let snapshot = analysis.snapshot().unwrap();
        assert_eq!( snapshot.len(), BIN_COUNT );
        assert_eq!( &snapshot[ ..4 ], &[ 10, 20, 30, 0 ] );
    }


    #[test]
    fn test_failed_context_leaves_no_pipeline() {
        let mut analysis: AnalysisAdapter<fake::FakeContext> =
            AnalysisAdapter::new( || Err( AnalysisError::Context( "no device".into() ) ) );

        assert!( analysis.ensure_pipeline( &mut FakeMedia::default() ).is_err() );
        assert!( !analysis.is_ready() );
    }
}
