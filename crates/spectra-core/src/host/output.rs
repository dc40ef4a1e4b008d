//! Audio output via cpal
//!
//! Sends decoded PCM to the system audio device and copies what is
//! played into the analysis tap.

use std::collections::VecDeque;
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::{ Arc, Mutex, PoisonError };

use cpal::traits::{ DeviceTrait, HostTrait, StreamTrait };
use thiserror::Error;

use crate::tap::OutputTap;


/// Errors that can occur with audio output.
#[derive( Debug, Error )]
pub enum OutputError {
    #[error( "No output device available" )]
    NoDevice,

    #[error( "Failed to get stream config: {0}" )]
    StreamConfig( String ),

    #[error( "Failed to build output stream: {0}" )]
    BuildStream( String ),

    #[error( "Failed to play stream: {0}" )]
    PlayStream( String ),
}


/// Sample queue shared between the decode thread and the audio callback.
///
/// Converts from the source channel layout to the device layout on the
/// way out.
pub struct SampleBuffer {
    buffer: Mutex<VecDeque<f32>>,
    capacity: usize,
    paused: AtomicBool,
    source_channels: usize,
    output_channels: usize,
    tap: Mutex<Option<OutputTap>>,
}


impl SampleBuffer {
    /// Creates a paused buffer.
    ///
    /// @param capacity - Maximum number of queued source samples
    /// @param source_channels - Channels produced by the decoder
    /// @param output_channels - Channels expected by the device
    pub fn new( capacity: usize, source_channels: usize, output_channels: usize ) -> Self {
        Self {
            buffer: Mutex::new( VecDeque::with_capacity( capacity ) ),
            capacity,
            paused: AtomicBool::new( true ),
            source_channels: source_channels.max( 1 ),
            output_channels: output_channels.max( 1 ),
            tap: Mutex::new( None ),
        }
    }


    /// Queues samples. Returns how many fit.
    pub fn push( &self, samples: &[f32] ) -> usize {
        let mut buf = self.buffer.lock().unwrap_or_else( PoisonError::into_inner );
        let available = self.capacity.saturating_sub( buf.len() );
        let to_push = samples.len().min( available );
        buf.extend( samples[ ..to_push ].iter().copied() );
        to_push
    }


    /// Fills `output` with device-layout frames, padding with silence.
    ///
    /// Everything written, silence included, is copied into the tap.
    ///
    /// @returns The number of samples taken from the queue
    pub fn pop( &self, output: &mut [f32] ) -> usize {
        let out_ch = self.output_channels;
        let src_ch = self.source_channels;
        let mut consumed = 0;

        output.fill( 0.0 );

        if !self.paused.load( Ordering::Relaxed ) {
            let mut buf = self.buffer.lock().unwrap_or_else( PoisonError::into_inner );
            let frames = ( output.len() / out_ch ).min( buf.len() / src_ch );
            let taken: Vec<f32> = buf.drain( ..frames * src_ch ).collect();

            for ( src_frame, out_frame ) in taken.chunks( src_ch ).zip( output.chunks_mut( out_ch ) ) {
                remix( src_frame, out_frame );
            }
            consumed = taken.len();
        }

        if let Some( tap ) = self.tap.lock().unwrap_or_else( PoisonError::into_inner ).as_ref() {
            tap.push_interleaved( output, out_ch );
        }

        consumed
    }


    /// Returns the number of queued samples.
    pub fn len( &self ) -> usize {
        self.buffer.lock().unwrap_or_else( PoisonError::into_inner ).len()
    }


    pub fn is_empty( &self ) -> bool {
        self.len() == 0
    }


    pub fn clear( &self ) {
        self.buffer.lock().unwrap_or_else( PoisonError::into_inner ).clear();
    }


    pub fn set_paused( &self, paused: bool ) {
        self.paused.store( paused, Ordering::Relaxed );
    }


    pub fn is_paused( &self ) -> bool {
        self.paused.load( Ordering::Relaxed )
    }


    /// Routes played samples into `tap`.
    pub fn set_tap( &self, tap: Option<OutputTap> ) {
        *self.tap.lock().unwrap_or_else( PoisonError::into_inner ) = tap;
    }
}


/// Maps one source frame onto one output frame.
///
/// Mono is duplicated, stereo to mono is averaged, and otherwise
/// channels are copied in order with the last one repeated.
fn remix( src: &[f32], out: &mut [f32] ) {
    match ( src.len(), out.len() ) {
        ( s, o ) if s == o => out.copy_from_slice( src ),
        ( _, 1 ) => out[ 0 ] = src.iter().sum::<f32>() / src.len() as f32,
        _ => {
            for ( ch, slot ) in out.iter_mut().enumerate() {
                *slot = src[ ch.min( src.len() - 1 ) ];
            }
        }
    }
}


/// Audio output stream.
///
/// Not Send: keep it on the thread where it was created.
pub struct AudioOutput {
    stream: cpal::Stream,
    sample_rate: u32,
}


impl AudioOutput {
    /// Opens the default output device for a source format.
    ///
    /// Returns the output and the buffer that feeds it. The device is
    /// asked for the source sample rate; when it cannot provide it the
    /// caller must resample to [`AudioOutput::sample_rate`].
    pub fn new(
        source_sample_rate: u32,
        source_channels: usize,
    ) -> Result<( Self, Arc<SampleBuffer> ), OutputError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or( OutputError::NoDevice )?;

        tracing::info!( "Using output device: {:?}", device.name() );

        let supported: Vec<_> = device
            .supported_output_configs()
            .map_err( |e| OutputError::StreamConfig( e.to_string() ) )?
            .collect();

        let supports_rate = |c: &cpal::SupportedStreamConfigRange| {
            c.min_sample_rate().0 <= source_sample_rate && c.max_sample_rate().0 >= source_sample_rate
        };

        let config = match supported
            .iter()
            .find( |c| usize::from( c.channels() ) == source_channels && supports_rate( c ) )
            .or_else( || supported.iter().find( |c| supports_rate( c ) ) )
        {
            Some( range ) => range.clone().with_sample_rate( cpal::SampleRate( source_sample_rate ) ).config(),
            None => {
                let default_config = device
                    .default_output_config()
                    .map_err( |e| OutputError::StreamConfig( e.to_string() ) )?;
                tracing::info!(
                    "Device does not support {} Hz, using {} Hz",
                    source_sample_rate,
                    default_config.sample_rate().0
                );
                default_config.config()
            }
        };

        tracing::info!( "Audio output config: {} Hz, {} channels", config.sample_rate.0, config.channels );

        // About half a second of source audio.
        let capacity = source_sample_rate as usize * source_channels / 2;
        let sample_buffer = Arc::new( SampleBuffer::new( capacity, source_channels, usize::from( config.channels ) ) );
        let callback_buffer = Arc::clone( &sample_buffer );

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    callback_buffer.pop( data );
                },
                |err| tracing::error!( "Audio output error: {}", err ),
                None,
            )
            .map_err( |e| OutputError::BuildStream( e.to_string() ) )?;

        Ok((
            Self {
                stream,
                sample_rate: config.sample_rate.0,
            },
            sample_buffer,
        ))
    }


    /// Starts the device stream.
    pub fn play( &self ) -> Result<(), OutputError> {
        self.stream.play().map_err( |e| OutputError::PlayStream( e.to_string() ) )
    }


    /// Gets the device sample rate.
    pub fn sample_rate( &self ) -> u32 {
        self.sample_rate
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_paused_buffer_outputs_silence() {
        let buffer = SampleBuffer::new( 16, 2, 2 );
        buffer.push( &[ 0.5; 8 ] );

        let mut out = [ 1.0; 4 ];
        assert_eq!( buffer.pop( &mut out ), 0 );
        assert_eq!( out, [ 0.0; 4 ] );
        assert_eq!( buffer.len(), 8 );
    }


    #[test]
    fn test_push_respects_capacity() {
        let buffer = SampleBuffer::new( 4, 1, 1 );
        assert_eq!( buffer.push( &[ 0.1; 6 ] ), 4 );
        assert_eq!( buffer.len(), 4 );
    }


    #[test]
    fn test_mono_source_is_duplicated() {
        let buffer = SampleBuffer::new( 16, 1, 2 );
        buffer.set_paused( false );
        buffer.push( &[ 0.25, 0.75 ] );

        let mut out = [ 9.0; 6 ];
        assert_eq!( buffer.pop( &mut out ), 2 );
        assert_eq!( out, [ 0.25, 0.25, 0.75, 0.75, 0.0, 0.0 ] );
    }


    #[test]
    fn test_stereo_to_mono_is_averaged() {
        let buffer = SampleBuffer::new( 16, 2, 1 );
        buffer.set_paused( false );
        buffer.push( &[ 1.0, 0.0, 0.5, 0.5 ] );

        let mut out = [ 0.0; 2 ];
        buffer.pop( &mut out );
        assert_eq!( out, [ 0.5, 0.5 ] );
        assert!( buffer.is_empty() );
    }


    #[test]
    fn test_played_samples_reach_the_tap() {
        let buffer = SampleBuffer::new( 16, 2, 2 );
        let tap = OutputTap::new( 2 );
        buffer.set_tap( Some( tap.clone() ) );
        buffer.set_paused( false );
        buffer.push( &[ 0.2, 0.4, 0.6, 0.8 ] );

        let mut out = [ 0.0; 4 ];
        buffer.pop( &mut out );

        let mut window = [ 0.0; 2 ];
        tap.copy_latest( &mut window );
        assert!(( window[ 0 ] - 0.3 ).abs() < 1e-6 );
        assert!(( window[ 1 ] - 0.7 ).abs() < 1e-6 );
    }
}
