//! Output tap
//!
//! A shared window over the most recent samples a media element played.
//! The media element writes into it from its output path; the analyser
//! reads the window once per frame.

use std::collections::VecDeque;
use std::sync::{ Arc, Mutex, PoisonError };


/// Shared, fixed-capacity window of recent mono samples.
#[derive( Debug, Clone )]
pub struct OutputTap {
    window: Arc<Mutex<VecDeque<f32>>>,
    capacity: usize,
}


impl OutputTap {
    /// Creates a tap holding at most `capacity` samples.
    pub fn new( capacity: usize ) -> Self {
        Self {
            window: Arc::new( Mutex::new( VecDeque::with_capacity( capacity ) ) ),
            capacity,
        }
    }


    /// Gets the window size in samples.
    pub fn capacity( &self ) -> usize {
        self.capacity
    }


    /// Pushes interleaved samples, mixing each frame down to mono.
    pub fn push_interleaved( &self, samples: &[f32], channels: usize ) {
        if channels == 0 || self.capacity == 0 {
            return;
        }

        let mut window = self.window.lock().unwrap_or_else( PoisonError::into_inner );
        for frame in samples.chunks( channels ) {
            let mono = frame.iter().sum::<f32>() / frame.len() as f32;
            if window.len() == self.capacity {
                window.pop_front();
            }
            window.push_back( mono );
        }
    }


    /// Copies the most recent samples into `out`, oldest first.
    ///
    /// When fewer samples than `out.len()` are available the front of
    /// `out` is zero-filled.
    pub fn copy_latest( &self, out: &mut [f32] ) {
        let window = self.window.lock().unwrap_or_else( PoisonError::into_inner );
        let available = window.len().min( out.len() );
        let pad = out.len() - available;

        out[ ..pad ].fill( 0.0 );
        let skip = window.len() - available;
        for ( slot, sample ) in out[ pad.. ].iter_mut().zip( window.iter().skip( skip ) ) {
            *slot = *sample;
        }
    }


    /// Drops all buffered samples.
    pub fn clear( &self ) {
        self.window.lock().unwrap_or_else( PoisonError::into_inner ).clear();
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_stereo_is_mixed_to_mono() {
        let tap = OutputTap::new( 4 );
        tap.push_interleaved( &[ 1.0, 0.0, 0.5, 0.5 ], 2 );

        let mut out = [ 9.0; 2 ];
        tap.copy_latest( &mut out );
        assert_eq!( out, [ 0.5, 0.5 ] );
    }


    #[test]
    fn test_window_keeps_latest_samples() {
        let tap = OutputTap::new( 3 );
        tap.push_interleaved( &[ 1.0, 2.0, 3.0, 4.0, 5.0 ], 1 );

        let mut out = [ 0.0; 3 ];
        tap.copy_latest( &mut out );
        assert_eq!( out, [ 3.0, 4.0, 5.0 ] );
    }


    #[test]
    fn test_short_window_is_front_padded() {
        let tap = OutputTap::new( 8 );
        tap.push_interleaved( &[ 0.25 ], 1 );

        let mut out = [ 1.0; 3 ];
        tap.copy_latest( &mut out );
        assert_eq!( out, [ 0.0, 0.0, 0.25 ] );
    }


    #[test]
    fn test_clones_share_the_window() {
        let tap = OutputTap::new( 2 );
        let writer = tap.clone();
        writer.push_interleaved( &[ 0.75 ], 1 );
        tap.clear();

        let mut out = [ 1.0 ];
        writer.copy_latest( &mut out );
        assert_eq!( out, [ 0.0 ] );
    }
}
