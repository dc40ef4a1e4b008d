//! Native media element
//!
//! Plays a file through Symphonia and cpal. Decoding runs on its own
//! thread; everything else happens on the caller's thread.

use std::path::{ Path, PathBuf };
use std::sync::atomic::{ AtomicBool, AtomicU64, Ordering };
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rubato::{ FastFixedOut, PolynomialDegree, Resampler };

use crate::engine::{ MediaElement, MediaError, MediaEvent };
use crate::host::decoder::TrackDecoder;
use crate::host::output::{ AudioOutput, SampleBuffer };
use crate::tap::OutputTap;


/// Minimum position change, in seconds, between time updates.
const TIME_UPDATE_STEP: f64 = 0.25;


/// Converts planar samples back to interleaved format.
/// [[L0, L1, ...], [R0, R1, ...]] → [L0, R0, L1, R1, ...]
fn interleave( channels: &[Vec<f32>] ) -> Vec<f32> {
    let Some( frames ) = channels.first().map( Vec::len ) else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity( frames * channels.len() );
    for f in 0..frames {
        for ch in channels {
            out.push( ch[ f ] );
        }
    }
    out
}


/// A loaded source: decode thread, device stream and shared counters.
struct Playback {
    stop_flag: Arc<AtomicBool>,
    sample_buffer: Arc<SampleBuffer>,
    _output: AudioOutput,
    thread: Option<thread::JoinHandle<()>>,
    frames_decoded: Arc<AtomicU64>,
    sample_rate: u32,
    ended: Arc<AtomicBool>,
}


impl Playback {
    fn position( &self ) -> f64 {
        self.frames_decoded.load( Ordering::Relaxed ) as f64 / f64::from( self.sample_rate )
    }


    fn is_playing( &self ) -> bool {
        !self.sample_buffer.is_paused()
    }
}


impl Drop for Playback {
    fn drop( &mut self ) {
        self.stop_flag.store( true, Ordering::Relaxed );
        self.sample_buffer.clear();
        if let Some( thread ) = self.thread.take() {
            let _ = thread.join();
        }
    }
}


/// Media element backed by the system audio device.
#[derive( Default )]
pub struct NativeMedia {
    source: Option<PathBuf>,
    playback: Option<Playback>,
    tap: Option<OutputTap>,
    events: Vec<MediaEvent>,
    last_reported: f64,
    ended_reported: bool,
}


impl NativeMedia {
    pub fn new() -> Self {
        Self::default()
    }


    /// Gets the assigned source, if any.
    pub fn source( &self ) -> Option<&Path> {
        self.source.as_deref()
    }


    /// Opens the source at `position` seconds, replacing any current playback.
    fn start( &mut self, position: f64, paused: bool ) -> Result<(), MediaError> {
        self.playback = None;

        let source = self.source.clone().ok_or( MediaError::NoSource )?;
        let mut decoder = TrackDecoder::open( &source ).map_err( |e| MediaError::Open( e.to_string() ) )?;
        if position > 0.0 {
            decoder.seek( position ).map_err( |e| MediaError::Decode( e.to_string() ) )?;
        }

        let format = decoder.format();
        let ( source_rate, channels ) = ( format.sample_rate, format.channels );

        let ( output, sample_buffer ) = AudioOutput::new( source_rate, channels )
            .map_err( |e| MediaError::Output( e.to_string() ) )?;
        sample_buffer.set_tap( self.tap.clone() );
        sample_buffer.set_paused( paused );

        let resampler = if output.sample_rate() != source_rate {
            tracing::info!( "Resampling: {} Hz → {} Hz", source_rate, output.sample_rate() );
            let resampler = FastFixedOut::<f32>::new(
                f64::from( output.sample_rate() ) / f64::from( source_rate ),
                2.0,
                PolynomialDegree::Cubic,
                1024,
                channels,
            ).map_err( |e| MediaError::Output( format!( "Failed to create resampler: {}", e ) ) )?;
            Some( resampler )
        } else {
            None
        };

        output.play().map_err( |e| MediaError::Output( e.to_string() ) )?;

        let stop_flag = Arc::new( AtomicBool::new( false ) );
        let frames_decoded = Arc::new( AtomicU64::new( ( position * f64::from( source_rate ) ) as u64 ) );
        let ended = Arc::new( AtomicBool::new( false ) );

        let thread = {
            let stop_flag = Arc::clone( &stop_flag );
            let sample_buffer = Arc::clone( &sample_buffer );
            let frames_decoded = Arc::clone( &frames_decoded );
            let ended = Arc::clone( &ended );
            thread::spawn( move || {
                decode_loop( decoder, resampler, &sample_buffer, &stop_flag, &frames_decoded, &ended );
            })
        };

        self.playback = Some( Playback {
            stop_flag,
            sample_buffer,
            _output: output,
            thread: Some( thread ),
            frames_decoded,
            sample_rate: source_rate,
            ended,
        });
        self.last_reported = position;
        self.ended_reported = false;

        Ok(())
    }


    fn is_playing( &self ) -> bool {
        self.playback.as_ref().is_some_and( Playback::is_playing )
    }
}


impl MediaElement for NativeMedia {
    fn set_source( &mut self, source: &Path ) {
        self.source = Some( source.to_path_buf() );
    }


    fn load( &mut self ) -> Result<(), MediaError> {
        let was_playing = self.is_playing();
        self.start( 0.0, true )?;
        if was_playing {
            self.events.push( MediaEvent::Pause );
        }
        Ok(())
    }


    fn play( &mut self ) -> Result<(), MediaError> {
        if self.playback.is_none() {
            self.start( 0.0, true )?;
        }

        let Some( playback ) = self.playback.as_ref() else {
            return Ok(());
        };
        if playback.is_playing() {
            return Ok(());
        }

        if playback.ended.load( Ordering::Relaxed ) {
            // Played to the end: start over.
            self.start( 0.0, false )?;
        } else {
            playback.sample_buffer.set_paused( false );
        }
        self.events.push( MediaEvent::Play );

        Ok(())
    }


    fn pause( &mut self ) {
        if let Some( playback ) = &self.playback {
            if playback.is_playing() {
                playback.sample_buffer.set_paused( true );
                self.events.push( MediaEvent::Pause );
            }
        }
    }


    fn set_current_time( &mut self, seconds: f64 ) -> Result<(), MediaError> {
        let seconds = seconds.max( 0.0 );
        if self.playback.is_some() {
            let paused = !self.is_playing();
            self.start( seconds, paused )?;
        }
        self.last_reported = seconds;
        self.events.push( MediaEvent::TimeUpdate( seconds ) );
        Ok(())
    }


    fn current_time( &self ) -> f64 {
        self.playback.as_ref().map( Playback::position ).unwrap_or( 0.0 )
    }


    fn tap_output( &mut self, window: usize ) -> OutputTap {
        let tap = OutputTap::new( window );
        if let Some( playback ) = &self.playback {
            playback.sample_buffer.set_tap( Some( tap.clone() ) );
        }
        self.tap = Some( tap.clone() );
        tap
    }


    fn drain_events( &mut self ) -> Vec<MediaEvent> {
        if let Some( playback ) = &self.playback {
            let position = playback.position();
            if playback.is_playing() && ( position - self.last_reported ).abs() >= TIME_UPDATE_STEP {
                self.last_reported = position;
                self.events.push( MediaEvent::TimeUpdate( position ) );
            }

            if playback.ended.load( Ordering::Relaxed ) && !self.ended_reported {
                self.ended_reported = true;
                playback.sample_buffer.set_paused( true );
                self.events.push( MediaEvent::TimeUpdate( position ) );
                self.events.push( MediaEvent::Pause );
                self.events.push( MediaEvent::Ended );
            }
        }

        std::mem::take( &mut self.events )
    }
}


/// Pushes samples into the buffer, waiting while it is full.
fn push_all( sample_buffer: &SampleBuffer, samples: &[f32], stop_flag: &AtomicBool ) {
    let mut offset = 0;
    while offset < samples.len() && !stop_flag.load( Ordering::Relaxed ) {
        let pushed = sample_buffer.push( &samples[ offset.. ] );
        offset += pushed;
        if pushed == 0 {
            thread::sleep( Duration::from_millis( 5 ) );
        }
    }
}


/// Decodes until end of stream or until stopped.
fn decode_loop(
    mut decoder: TrackDecoder,
    mut resampler: Option<FastFixedOut<f32>>,
    sample_buffer: &SampleBuffer,
    stop_flag: &AtomicBool,
    frames_decoded: &AtomicU64,
    ended: &AtomicBool,
) {
    let format = decoder.format();
    let channels = format.channels;
    let mut samples = Vec::new();
    let mut pending: Vec<Vec<f32>> = vec![ Vec::new(); channels ];
    // Keep about 50ms decoded ahead of the device.
    let target_buffer = format.sample_rate as usize * channels / 20;

    loop {
        if stop_flag.load( Ordering::Relaxed ) {
            tracing::debug!( "Decode loop: stop signal received" );
            break;
        }

        if sample_buffer.is_paused() || sample_buffer.len() > target_buffer {
            thread::sleep( Duration::from_millis( 5 ) );
            continue;
        }

        samples.clear();
        match decoder.decode_into( &mut samples ) {
            Ok( Some( frames ) ) => {
                frames_decoded.fetch_add( frames as u64, Ordering::Relaxed );

                let Some( resampler ) = resampler.as_mut() else {
                    push_all( sample_buffer, &samples, stop_flag );
                    continue;
                };

                for frame in samples.chunks( channels ) {
                    for ( ch, sample ) in frame.iter().enumerate() {
                        pending[ ch ].push( *sample );
                    }
                }

                while pending[ 0 ].len() >= resampler.input_frames_next() {
                    let needed = resampler.input_frames_next();
                    let chunk: Vec<Vec<f32>> = pending.iter_mut().map( |ch| ch.drain( ..needed ).collect() ).collect();
                    match resampler.process( &chunk, None ) {
                        Ok( resampled ) => push_all( sample_buffer, &interleave( &resampled ), stop_flag ),
                        Err( e ) => {
                            tracing::error!( "Resample error: {}", e );
                            break;
                        }
                    }
                }
            }
            Ok( None ) => {
                if let Some( resampler ) = resampler.as_mut() {
                    if !pending[ 0 ].is_empty() {
                        match resampler.process_partial( Some( &pending ), None ) {
                            Ok( resampled ) => push_all( sample_buffer, &interleave( &resampled ), stop_flag ),
                            Err( e ) => tracing::error!( "Final resample error: {}", e ),
                        }
                    }
                }

                tracing::info!( "Decode loop: reached end of stream" );
                while !sample_buffer.is_empty() && !stop_flag.load( Ordering::Relaxed ) {
                    thread::sleep( Duration::from_millis( 10 ) );
                }
                ended.store( true, Ordering::Relaxed );
                break;
            }
            Err( e ) => {
                tracing::error!( "Decode error: {}", e );
                ended.store( true, Ordering::Relaxed );
                break;
            }
        }
    }

    tracing::debug!( "Decode loop: exiting" );
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_interleave() {
        let planar = vec![ vec![ 1.0, 2.0 ], vec![ 3.0, 4.0 ] ];
        assert_eq!( interleave( &planar ), vec![ 1.0, 3.0, 2.0, 4.0 ] );
        assert!( interleave( &[] ).is_empty() );
    }


    #[test]
    fn test_play_without_source_fails() {
        let mut media = NativeMedia::new();
        assert!( matches!( media.play(), Err( MediaError::NoSource ) ) );
        assert!( media.drain_events().is_empty() );
    }


    #[test]
    fn test_unloaded_media_reports_zero() {
        let mut media = NativeMedia::new();
        media.set_source( Path::new( "/nonexistent/track.mp3" ) );
        assert_eq!( media.current_time(), 0.0 );
        assert!( matches!( media.load(), Err( MediaError::Open( _ ) ) ) );
    }


    #[test]
    fn test_rewind_without_playback_still_notifies() {
        let mut media = NativeMedia::new();
        media.set_current_time( 0.0 ).unwrap();
        assert_eq!( media.drain_events(), vec![ MediaEvent::TimeUpdate( 0.0 ) ] );
    }


    #[test]
    fn test_tap_is_kept_for_later_loads() {
        let mut media = NativeMedia::new();
        let tap = media.tap_output( 256 );
        assert_eq!( tap.capacity(), 256 );
        assert!( media.tap.is_some() );
    }
}
