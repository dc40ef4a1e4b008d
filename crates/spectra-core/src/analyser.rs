//! Software frequency analysis
//!
//! A native stand-in for a browser analyser node: Blackman-windowed FFT
//! over the output tap, smoothed over time, reported in decibels mapped
//! onto 0-255.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{ Fft, FftPlanner };

use crate::analysis::{ AnalysisError, AudioContext, ContextState, FrequencyAnalyser };
use crate::tap::OutputTap;


/// Default weight of the previous frame when smoothing magnitudes.
pub const DEFAULT_SMOOTHING: f32 = 0.8;

/// Magnitude mapped to 0.
pub const DEFAULT_MIN_DECIBELS: f32 = -100.0;

/// Magnitude mapped to 255.
pub const DEFAULT_MAX_DECIBELS: f32 = -30.0;

const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32768;


/// Analysis context backed by [`SpectrumAnalyser`].
///
/// Starts suspended, like a context created before any user gesture.
#[derive( Debug )]
pub struct SoftwareContext {
    state: ContextState,
}


impl SoftwareContext {
    /// Creates a suspended context.
    pub fn new() -> Self {
        Self { state: ContextState::Suspended }
    }
}


impl Default for SoftwareContext {
    fn default() -> Self {
        Self::new()
    }
}


impl AudioContext for SoftwareContext {
    type Analyser = SpectrumAnalyser;


    fn state( &self ) -> ContextState {
        self.state
    }


    fn resume( &mut self ) -> Result<(), AnalysisError> {
        self.state = ContextState::Running;
        Ok(())
    }


    fn create_analyser( &mut self, tap: OutputTap, fft_size: usize ) -> Result<SpectrumAnalyser, AnalysisError> {
        SpectrumAnalyser::new( tap, fft_size )
    }
}


/// FFT analyser reading from an [`OutputTap`].
pub struct SpectrumAnalyser {
    tap: OutputTap,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    samples: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
}


impl SpectrumAnalyser {
    /// Creates an analyser with a `fft_size` sample window.
    ///
    /// `fft_size` must be a power of two between 32 and 32768.
    pub fn new( tap: OutputTap, fft_size: usize ) -> Result<Self, AnalysisError> {
        if !fft_size.is_power_of_two() || !( MIN_FFT_SIZE..=MAX_FFT_SIZE ).contains( &fft_size ) {
            return Err( AnalysisError::InvalidWindow( fft_size ) );
        }

        let fft = FftPlanner::new().plan_fft_forward( fft_size );

        Ok( Self {
            tap,
            fft,
            window: blackman( fft_size ),
            samples: vec![ 0.0; fft_size ],
            spectrum: vec![ Complex::new( 0.0, 0.0 ); fft_size ],
            smoothed: vec![ 0.0; fft_size / 2 ],
            smoothing: DEFAULT_SMOOTHING,
            min_decibels: DEFAULT_MIN_DECIBELS,
            max_decibels: DEFAULT_MAX_DECIBELS,
        })
    }


    /// Sets the smoothing weight, clamped to `0.0..=1.0`.
    pub fn set_smoothing( &mut self, smoothing: f32 ) {
        self.smoothing = smoothing.clamp( 0.0, 1.0 );
    }


    fn update_magnitudes( &mut self ) {
        self.tap.copy_latest( &mut self.samples );

        for (( slot, sample ), weight ) in self.spectrum.iter_mut().zip( &self.samples ).zip( &self.window ) {
            *slot = Complex::new( sample * weight, 0.0 );
        }
        self.fft.process( &mut self.spectrum );

        let scale = 1.0 / self.samples.len() as f32;
        for ( smoothed, bin ) in self.smoothed.iter_mut().zip( &self.spectrum ) {
            let magnitude = bin.norm() * scale;
            *smoothed = self.smoothing * *smoothed + ( 1.0 - self.smoothing ) * magnitude;
        }
    }


    fn to_byte( &self, magnitude: f32 ) -> u8 {
        if magnitude <= 0.0 {
            return 0;
        }
        let decibels = 20.0 * magnitude.log10();
        let range = self.max_decibels - self.min_decibels;
        let scaled = 255.0 / range * ( decibels - self.min_decibels );
        scaled.clamp( 0.0, 255.0 ) as u8
    }
}


impl FrequencyAnalyser for SpectrumAnalyser {
    fn frequency_bin_count( &self ) -> usize {
        self.smoothed.len()
    }


    fn byte_frequency_data( &mut self, out: &mut [u8] ) {
        self.update_magnitudes();
        for ( slot, magnitude ) in out.iter_mut().zip( &self.smoothed ) {
            *slot = self.to_byte( *magnitude );
        }
    }
}


fn blackman( size: usize ) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;

    ( 0..size )
        .map( |i| {
            let phase = 2.0 * PI * i as f32 / size as f32;
            A0 - A1 * phase.cos() + A2 * ( 2.0 * phase ).cos()
        })
        .collect()
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::analysis::{ BIN_COUNT, FFT_SIZE };


    fn sine( bin: usize, len: usize ) -> Vec<f32> {
        ( 0..len )
            .map( |n| ( 2.0 * PI * bin as f32 * n as f32 / len as f32 ).sin() )
            .collect()
    }


    #[test]
    fn test_rejects_bad_window() {
        assert!( SpectrumAnalyser::new( OutputTap::new( 100 ), 100 ).is_err() );
        assert!( SpectrumAnalyser::new( OutputTap::new( 16 ), 16 ).is_err() );
    }


    #[test]
    fn test_bin_count_is_half_window() {
        let analyser = SpectrumAnalyser::new( OutputTap::new( FFT_SIZE ), FFT_SIZE ).unwrap();
        assert_eq!( analyser.frequency_bin_count(), BIN_COUNT );
    }


    #[test]
    fn test_silence_reads_zero() {
        let mut analyser = SpectrumAnalyser::new( OutputTap::new( FFT_SIZE ), FFT_SIZE ).unwrap();
        let mut out = [ 7u8; BIN_COUNT ];
        analyser.byte_frequency_data( &mut out );
        assert!( out.iter().all( |&v| v == 0 ) );
    }


    #[test]
    fn test_sine_peaks_at_its_bin() {
        let tap = OutputTap::new( FFT_SIZE );
        tap.push_interleaved( &sine( 16, FFT_SIZE ), 1 );
        let mut analyser = SpectrumAnalyser::new( tap, FFT_SIZE ).unwrap();

        let mut out = [ 0u8; BIN_COUNT ];
        analyser.byte_frequency_data( &mut out );

        assert_eq!( out[ 16 ], 255 );
        assert!( out[ 60 ] < 32, "far bin leaked: {}", out[ 60 ] );
    }


    #[test]
    fn test_smoothing_decays_after_silence() {
        let tap = OutputTap::new( FFT_SIZE );
        tap.push_interleaved( &sine( 8, FFT_SIZE ), 1 );
        let mut analyser = SpectrumAnalyser::new( tap.clone(), FFT_SIZE ).unwrap();
        let mut out = [ 0u8; BIN_COUNT ];
        analyser.byte_frequency_data( &mut out );

        tap.clear();
        analyser.byte_frequency_data( &mut out );
        assert!( out[ 8 ] > 0, "previous frame still contributes" );

        analyser.set_smoothing( 0.0 );
        analyser.byte_frequency_data( &mut out );
        assert_eq!( out[ 8 ], 0 );
    }


    #[test]
    fn test_software_context_starts_suspended() {
        let mut context = SoftwareContext::new();
        assert_eq!( context.state(), ContextState::Suspended );
        context.resume().unwrap();
        assert_eq!( context.state(), ContextState::Running );
    }
}
