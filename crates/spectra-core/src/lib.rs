//! Spectra Core - Audio player widget
//!
//! This crate provides a playlist selector, transport controller, elapsed
//! time and track displays, and a frequency-spectrum visualizer, wired to
//! host media, analysis and drawing primitives through traits. A native
//! host built on Symphonia, cpal and rustfft is included.

pub mod analyser;
pub mod analysis;
pub mod display;
pub mod engine;
pub mod host;
pub mod intent;
pub mod library;
pub mod playlist;
pub mod schedule;
pub mod tap;
pub mod transport;
pub mod visualizer;

pub use analyser::{ SoftwareContext, SpectrumAnalyser };
pub use analysis::{ AnalysisAdapter, AnalysisError, AudioContext, ContextState, FrequencyAnalyser, BIN_COUNT, FFT_SIZE };
pub use display::{ format_clock, TimeDisplay, TrackLabel };
pub use engine::{ EngineState, MediaElement, MediaError, MediaEvent, PlaybackEngine };
pub use intent::{ Intent, IntentError };
pub use playlist::{ Playlist, PlaylistError, TrackRef };
pub use schedule::{ FrameCancel, FrameSchedule };
pub use tap::OutputTap;
pub use transport::{ Transport, TransportError };
pub use visualizer::{ Redraw, Rgb, Surface, Visualizer };
