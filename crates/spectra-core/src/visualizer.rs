//! Spectrum visualizer
//!
//! Renders one bar per frequency bin onto a drawing surface. Redraws are
//! driven externally, once per display frame, see [`crate::schedule`].

use crate::analysis::{ AnalysisAdapter, AudioContext };


/// Horizontal gap between bars, in surface units.
pub const BAR_GAP: f64 = 1.0;

/// Bar width multiplier applied to `surface_width / bin_count`.
pub const BAR_WIDTH_SCALE: f64 = 2.5;


/// An RGB color whose channels are not clamped.
///
/// Surfaces decide how out-of-range channels render.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub struct Rgb {
    pub r: i32,
    pub g: i32,
    pub b: i32,
}


impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };


    pub const fn new( r: i32, g: i32, b: i32 ) -> Self {
        Self { r, g, b }
    }


    /// Channels saturated into `0..=255`.
    pub fn saturated( self ) -> ( u8, u8, u8 ) {
        let clamp = |c: i32| c.clamp( 0, 255 ) as u8;
        ( clamp( self.r ), clamp( self.g ), clamp( self.b ) )
    }
}


/// Host 2D drawing surface in pixel coordinates, origin at the top left.
pub trait Surface {
    fn width( &self ) -> f64;

    fn height( &self ) -> f64;

    fn fill_rect( &mut self, x: f64, y: f64, width: f64, height: f64, color: Rgb );
}


/// Result of one redraw cycle.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Redraw {
    /// No pipeline yet; the surface was left untouched.
    Skipped,
    Drawn { bars: usize },
}


/// Bar width for a surface and bin count. Not corrected for overflow.
pub fn bar_width( surface_width: f64, bin_count: usize ) -> f64 {
    ( surface_width / bin_count as f64 ) * BAR_WIDTH_SCALE
}


/// Bar color for a magnitude: `rgb(magnitude + 100, 50, 50)`.
pub fn bar_color( magnitude: u8 ) -> Rgb {
    Rgb::new( i32::from( magnitude ) + 100, 50, 50 )
}


/// Clears `surface` to black and draws one bar per magnitude.
///
/// @param magnitudes - One 0-255 value per frequency bin
/// @param surface - Target surface
///
/// @returns The number of bars drawn
pub fn draw_bars<S: Surface + ?Sized>( magnitudes: &[u8], surface: &mut S ) -> usize {
    let width = surface.width();
    let height = surface.height();

    surface.fill_rect( 0.0, 0.0, width, height, Rgb::BLACK );

    let bar_width = bar_width( width, magnitudes.len() );
    let mut x = 0.0;

    for &magnitude in magnitudes {
        let bar_height = f64::from( magnitude ) / 2.0;
        surface.fill_rect( x, height - bar_height, bar_width, bar_height, bar_color( magnitude ) );
        x += bar_width + BAR_GAP;
    }

    magnitudes.len()
}


/// Per-frame spectrum renderer.
#[derive( Debug, Default )]
pub struct Visualizer {
    frames_drawn: u64,
    frames_skipped: u64,
}


impl Visualizer {
    pub fn new() -> Self {
        Self::default()
    }


    /// Runs one redraw cycle.
    ///
    /// Without a pipeline no snapshot is taken and the surface keeps its
    /// previous contents.
    pub fn redraw<C, S>( &mut self, analysis: &mut AnalysisAdapter<C>, surface: &mut S ) -> Redraw
    where
        C: AudioContext,
        S: Surface + ?Sized,
    {
        let Some( snapshot ) = analysis.snapshot() else {
            self.frames_skipped += 1;
            return Redraw::Skipped;
        };

        let bars = draw_bars( snapshot, surface );
        self.frames_drawn += 1;
        Redraw::Drawn { bars }
    }


    /// Gets the number of frames drawn so far.
    pub fn frames_drawn( &self ) -> u64 {
        self.frames_drawn
    }


    /// Gets the number of frames skipped for lack of a pipeline.
    pub fn frames_skipped( &self ) -> u64 {
        self.frames_skipped
    }
}


#[cfg( test )]
pub( crate ) mod fake {
    use super::*;


    /// Surface that records every rectangle.
    #[derive( Debug )]
    pub struct RecordingSurface {
        pub width: f64,
        pub height: f64,
        pub rects: Vec<( f64, f64, f64, f64, Rgb )>,
    }


    impl RecordingSurface {
        pub fn new( width: f64, height: f64 ) -> Self {
            Self { width, height, rects: Vec::new() }
        }
    }


    impl Surface for RecordingSurface {
        fn width( &self ) -> f64 {
            self.width
        }


        fn height( &self ) -> f64 {
            self.height
        }


        fn fill_rect( &mut self, x: f64, y: f64, width: f64, height: f64, color: Rgb ) {
            self.rects.push(( x, y, width, height, color ));
        }
    }
}


#[cfg( test )]
mod tests {
    use super::fake::RecordingSurface;
    use super::*;
    use crate::analysis::fake::{ adapter, Probe };
    use crate::analysis::{ ContextState, BIN_COUNT };
    use crate::engine::fake::FakeMedia;


    #[test]
    fn test_bar_geometry() {
        let mut surface = RecordingSurface::new( 300.0, 150.0 );
        let bars = draw_bars( &[ 0, 200, 255 ], &mut surface );
        assert_eq!( bars, 3 );

        // Background first, then bars left to right.
        assert_eq!( surface.rects[ 0 ], ( 0.0, 0.0, 300.0, 150.0, Rgb::BLACK ) );
        assert_eq!( surface.rects[ 1 ], ( 0.0, 150.0, 250.0, 0.0, Rgb::new( 100, 50, 50 ) ) );
        assert_eq!( surface.rects[ 2 ], ( 251.0, 50.0, 250.0, 100.0, Rgb::new( 300, 50, 50 ) ) );
        assert_eq!( surface.rects[ 3 ], ( 502.0, 22.5, 250.0, 127.5, Rgb::new( 355, 50, 50 ) ) );
    }


    #[test]
    fn test_red_channel_is_not_clamped() {
        assert_eq!( bar_color( 255 ).r, 355 );
        assert_eq!( bar_color( 255 ).saturated(), ( 255, 50, 50 ) );
    }


    #[test]
    fn test_bar_width_for_default_bins() {
        assert_eq!( bar_width( 512.0, BIN_COUNT ), 10.0 );
    }


    #[test]
    fn test_redraw_without_pipeline_skips() {
        let probe = Probe::default();
        let mut analysis = adapter( &probe, ContextState::Running );
        let mut surface = RecordingSurface::new( 100.0, 100.0 );
        let mut visualizer = Visualizer::new();

        assert_eq!( visualizer.redraw( &mut analysis, &mut surface ), Redraw::Skipped );
        assert!( surface.rects.is_empty() );
        assert_eq!( probe.reads.get(), 0 );
        assert_eq!( visualizer.frames_skipped(), 1 );
    }


    #[test]
    fn test_redraw_with_pipeline_draws_every_bin() {
        let probe = Probe::default();
        let mut analysis = adapter( &probe, ContextState::Running );
        analysis.ensure_pipeline( &mut FakeMedia::default() ).unwrap();
        *probe.levels.borrow_mut() = vec![ 255; BIN_COUNT ];

        let mut surface = RecordingSurface::new( 128.0, 200.0 );
        let mut visualizer = Visualizer::new();

        assert_eq!( visualizer.redraw( &mut analysis, &mut surface ), Redraw::Drawn { bars: BIN_COUNT } );
        assert_eq!( surface.rects.len(), BIN_COUNT + 1 );
        assert_eq!( probe.reads.get(), 1 );
        assert_eq!( visualizer.frames_drawn(), 1 );
    }
}
