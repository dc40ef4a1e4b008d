//! Terminal drawing surface for the visualizer.
//!
//! Each terminal cell holds two vertically stacked pixels rendered with an
//! upper half block: the foreground paints the top pixel and the background
//! the bottom one.

use ratatui::{ buffer::Buffer, layout::Rect, style::Color, widgets::Widget };

use spectra_core::{ Rgb, Surface };


const HALF_BLOCK: &str = "\u{2580}";


/// Pixel grid sized to a terminal area.
#[derive( Debug, Default )]
pub struct PixelSurface {
    width: usize,
    height: usize,
    pixels: Vec<( u8, u8, u8 )>,
}


impl PixelSurface {
    pub fn new() -> Self {
        Self::default()
    }


    /// Matches the grid to `area`. Changing size clears the grid.
    pub fn fit( &mut self, area: Rect ) {
        let width = area.width as usize;
        let height = area.height as usize * 2;
        if width != self.width || height != self.height {
            self.width = width;
            self.height = height;
            self.pixels = vec![ ( 0, 0, 0 ); width * height ];
        }
    }


    /// Gets the pixel at `( x, y )`.
    pub fn pixel( &self, x: usize, y: usize ) -> Option<( u8, u8, u8 )> {
        ( x < self.width && y < self.height ).then( || self.pixels[ y * self.width + x ] )
    }


    /// Converts a span to pixel indices clipped to `0..limit`.
    fn span( start: f64, extent: f64, limit: usize ) -> std::ops::Range<usize> {
        let clip = |v: f64| v.round().clamp( 0.0, limit as f64 ) as usize;
        clip( start )..clip( start + extent )
    }
}


impl Surface for PixelSurface {
    fn width( &self ) -> f64 {
        self.width as f64
    }


    fn height( &self ) -> f64 {
        self.height as f64
    }


    fn fill_rect( &mut self, x: f64, y: f64, width: f64, height: f64, color: Rgb ) {
        if !( width > 0.0 && height > 0.0 ) {
            return;
        }
        let rgb = color.saturated();
        for row in Self::span( y, height, self.height ) {
            let start = row * self.width;
            for col in Self::span( x, width, self.width ) {
                self.pixels[ start + col ] = rgb;
            }
        }
    }
}


impl Widget for &PixelSurface {
    fn render( self, area: Rect, buf: &mut Buffer ) {
        let rgb = |( r, g, b ): ( u8, u8, u8 )| Color::Rgb( r, g, b );
        let rows = area.height.min( ( self.height / 2 ) as u16 );
        let cols = area.width.min( self.width as u16 );

        for row in 0..rows {
            for col in 0..cols {
                let ( x, y ) = ( col as usize, row as usize * 2 );
                let ( Some( top ), Some( bottom ) ) = ( self.pixel( x, y ), self.pixel( x, y + 1 ) ) else {
                    continue;
                };
                if let Some( cell ) = buf.cell_mut(( area.x + col, area.y + row )) {
                    cell.set_symbol( HALF_BLOCK ).set_fg( rgb( top ) ).set_bg( rgb( bottom ) );
                }
            }
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn surface( cols: u16, rows: u16 ) -> PixelSurface {
        let mut surface = PixelSurface::new();
        surface.fit( Rect::new( 0, 0, cols, rows ) );
        surface
    }


    #[test]
    fn test_two_pixels_per_row() {
        let surface = surface( 10, 4 );
        assert_eq!( surface.width(), 10.0 );
        assert_eq!( surface.height(), 8.0 );
    }


    #[test]
    fn test_fill_rect_clips_and_saturates() {
        let mut surface = surface( 4, 2 );
        surface.fill_rect( 2.0, 1.0, 10.0, 10.0, Rgb::new( 355, 50, 50 ) );

        assert_eq!( surface.pixel( 1, 1 ), Some(( 0, 0, 0 )) );
        assert_eq!( surface.pixel( 2, 0 ), Some(( 0, 0, 0 )) );
        assert_eq!( surface.pixel( 2, 1 ), Some(( 255, 50, 50 )) );
        assert_eq!( surface.pixel( 3, 3 ), Some(( 255, 50, 50 )) );
        assert_eq!( surface.pixel( 4, 3 ), None );
    }


    #[test]
    fn test_zero_height_draws_nothing() {
        let mut surface = surface( 4, 2 );
        surface.fill_rect( 0.0, 4.0, 4.0, 0.0, Rgb::new( 100, 50, 50 ) );
        assert!( ( 0..4 ).all( |x| surface.pixel( x, 3 ) == Some(( 0, 0, 0 )) ) );
    }


    #[test]
    fn test_render_half_blocks() {
        let mut surface = surface( 1, 1 );
        surface.fill_rect( 0.0, 1.0, 1.0, 1.0, Rgb::new( 200, 50, 50 ) );

        let area = Rect::new( 0, 0, 1, 1 );
        let mut buf = Buffer::empty( area );
        ( &surface ).render( area, &mut buf );

        let cell = &buf[( 0, 0 )];
        assert_eq!( cell.symbol(), HALF_BLOCK );
        assert_eq!( cell.fg, Color::Rgb( 0, 0, 0 ) );
        assert_eq!( cell.bg, Color::Rgb( 200, 50, 50 ) );
    }


    #[test]
    fn test_refit_same_size_keeps_pixels() {
        let mut surface = surface( 2, 1 );
        surface.fill_rect( 0.0, 0.0, 2.0, 2.0, Rgb::new( 150, 50, 50 ) );
        surface.fit( Rect::new( 5, 5, 2, 1 ) );
        assert_eq!( surface.pixel( 0, 0 ), Some(( 150, 50, 50 )) );

        surface.fit( Rect::new( 0, 0, 3, 1 ) );
        assert_eq!( surface.pixel( 0, 0 ), Some(( 0, 0, 0 )) );
    }
}
