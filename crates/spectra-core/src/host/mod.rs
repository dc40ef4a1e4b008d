//! Native host primitives
//!
//! Symphonia decoding and cpal output behind [`MediaElement`](crate::MediaElement).

pub mod decoder;
pub mod media;
pub mod output;

pub use media::NativeMedia;
