//! Track decoding via Symphonia
//!
//! Turns a media file into interleaved f32 PCM, one packet at a time.

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{ Decoder, DecoderOptions, CODEC_TYPE_NULL };
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{ FormatOptions, FormatReader, SeekMode, SeekTo, Track };
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;
use thiserror::Error;


const FALLBACK_RATE: u32 = 44_100;
const FALLBACK_CHANNELS: usize = 2;


#[derive( Debug, Error )]
pub enum DecoderError {
    #[error( "Cannot read {path}: {source}" )]
    Io { path: String, source: std::io::Error },

    #[error( "Unrecognised container: {0}" )]
    Probe( String ),

    #[error( "No playable audio track" )]
    NoAudioTrack,

    #[error( "No codec for track: {0}" )]
    Codec( String ),

    #[error( "Packet read failed: {0}" )]
    Packet( String ),

    #[error( "Seek to {position:.2}s failed: {reason}" )]
    Seek { position: f64, reason: String },
}


/// PCM layout of a decoded track.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: usize,
}


/// Decoder for the first audio track of a file.
pub struct TrackDecoder {
    reader: Box<dyn FormatReader>,
    codec: Box<dyn Decoder>,
    track_id: u32,
    format: PcmFormat,
    scratch: Option<SampleBuffer<f32>>,
    /// Frames still to drop after an accurate seek landed early.
    skip_frames: u64,
}


impl TrackDecoder {
    /// Probes `path` and prepares a codec for its first audio track.
    pub fn open( path: &Path ) -> Result<Self, DecoderError> {
        let file = File::open( path ).map_err( |source| DecoderError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let stream = MediaSourceStream::new( Box::new( file ), Default::default() );

        let mut hint = Hint::new();
        if let Some( ext ) = path.extension().and_then( |e| e.to_str() ) {
            hint.with_extension( ext );
        }

        let reader = symphonia::default::get_probe()
            .format( &hint, stream, &FormatOptions::default(), &MetadataOptions::default() )
            .map_err( |e| DecoderError::Probe( e.to_string() ) )?
            .format;

        let track = first_audio_track( reader.tracks() ).ok_or( DecoderError::NoAudioTrack )?;
        let track_id = track.id;
        let params = &track.codec_params;
        let format = PcmFormat {
            sample_rate: params.sample_rate.unwrap_or( FALLBACK_RATE ),
            channels: params.channels.map_or( FALLBACK_CHANNELS, |c| c.count() ),
        };

        let codec = symphonia::default::get_codecs()
            .make( params, &DecoderOptions::default() )
            .map_err( |e| DecoderError::Codec( e.to_string() ) )?;

        tracing::info!( "Decoding {:?}: {} Hz, {} channels", path, format.sample_rate, format.channels );

        Ok( Self { reader, codec, track_id, format, scratch: None, skip_frames: 0 } )
    }


    pub fn format( &self ) -> PcmFormat {
        self.format
    }


    /// Appends the next packet's samples to `out`, interleaved.
    ///
    /// @returns Frames appended, or None at end of stream
    pub fn decode_into( &mut self, out: &mut Vec<f32> ) -> Result<Option<usize>, DecoderError> {
        loop {
            let packet = match self.reader.next_packet() {
                Ok( packet ) => packet,
                Err( SymphoniaError::IoError( e ) ) if e.kind() == ErrorKind::UnexpectedEof => return Ok( None ),
                Err( e ) => return Err( DecoderError::Packet( e.to_string() ) ),
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.codec.decode( &packet ) {
                Ok( decoded ) => decoded,
                Err( SymphoniaError::DecodeError( e ) ) => {
                    tracing::debug!( "Dropping undecodable packet: {}", e );
                    continue;
                }
                Err( e ) => return Err( DecoderError::Packet( e.to_string() ) ),
            };

            let signal = *decoded.spec();
            let needed = decoded.capacity() * signal.channels.count();
            let scratch = match self.scratch.take() {
                Some( buf ) if buf.capacity() >= needed => buf,
                _ => SampleBuffer::new( decoded.capacity() as u64, signal ),
            };
            let scratch = self.scratch.insert( scratch );
            scratch.copy_interleaved_ref( decoded );

            let channels = self.format.channels.max( 1 );
            let frames = scratch.samples().len() / channels;
            let skipped = frames.min( self.skip_frames as usize );
            self.skip_frames -= skipped as u64;
            if skipped == frames {
                continue;
            }

            out.extend_from_slice( &scratch.samples()[ skipped * channels.. ] );
            return Ok( Some( frames - skipped ) );
        }
    }


    /// Moves to `position` seconds and flushes codec state.
    pub fn seek( &mut self, position: f64 ) -> Result<(), DecoderError> {
        let target = SeekTo::Time { time: Time::from( position ), track_id: Some( self.track_id ) };
        let seeked = self.reader
            .seek( SeekMode::Accurate, target )
            .map_err( |e| DecoderError::Seek { position, reason: e.to_string() } )?;
        self.codec.reset();
        self.skip_frames = seeked.required_ts.saturating_sub( seeked.actual_ts );
        Ok(())
    }
}


fn first_audio_track( tracks: &[Track] ) -> Option<&Track> {
    tracks.iter().find( |t| t.codec_params.codec != CODEC_TYPE_NULL )
}


#[cfg( test )]
mod tests {
    use std::path::PathBuf;

    use super::*;


    const RATE: u32 = 8_000;


    /// Writes a 16-bit stereo PCM WAV holding `frames` frames of a ramp.
    fn write_wav( name: &str, frames: u32 ) -> PathBuf {
        let dir = std::env::temp_dir().join( "spectra-decoder-test" );
        std::fs::create_dir_all( &dir ).unwrap();
        let path = dir.join( name );

        let channels: u16 = 2;
        let block_align = channels * 2;
        let data_len = frames * u32::from( block_align );

        let mut bytes = Vec::with_capacity( 44 + data_len as usize );
        bytes.extend_from_slice( b"RIFF" );
        bytes.extend_from_slice( &( 36 + data_len ).to_le_bytes() );
        bytes.extend_from_slice( b"WAVEfmt " );
        bytes.extend_from_slice( &16u32.to_le_bytes() );
        bytes.extend_from_slice( &1u16.to_le_bytes() );
        bytes.extend_from_slice( &channels.to_le_bytes() );
        bytes.extend_from_slice( &RATE.to_le_bytes() );
        bytes.extend_from_slice( &( RATE * u32::from( block_align ) ).to_le_bytes() );
        bytes.extend_from_slice( &block_align.to_le_bytes() );
        bytes.extend_from_slice( &16u16.to_le_bytes() );
        bytes.extend_from_slice( b"data" );
        bytes.extend_from_slice( &data_len.to_le_bytes() );
        for i in 0..frames {
            let sample = ( i % 1000 ) as i16 * 16;
            bytes.extend_from_slice( &sample.to_le_bytes() );
            bytes.extend_from_slice( &( -sample ).to_le_bytes() );
        }

        std::fs::write( &path, bytes ).unwrap();
        path
    }


    fn drain( decoder: &mut TrackDecoder ) -> ( usize, Vec<f32> ) {
        let mut samples = Vec::new();
        let mut frames = 0;
        while let Some( n ) = decoder.decode_into( &mut samples ).unwrap() {
            frames += n;
        }
        ( frames, samples )
    }


    #[test]
    fn test_decodes_every_frame_then_ends() {
        let path = write_wav( "full.wav", RATE );
        let mut decoder = TrackDecoder::open( &path ).unwrap();

        assert_eq!( decoder.format(), PcmFormat { sample_rate: RATE, channels: 2 } );

        let ( frames, samples ) = drain( &mut decoder );
        assert_eq!( frames, RATE as usize );
        assert_eq!( samples.len(), frames * 2 );
        assert!( decoder.decode_into( &mut Vec::new() ).unwrap().is_none() );
    }


    #[test]
    fn test_seek_leaves_remaining_frames() {
        let path = write_wav( "seek.wav", RATE );
        let mut decoder = TrackDecoder::open( &path ).unwrap();

        decoder.seek( 0.5 ).unwrap();
        let ( frames, _ ) = drain( &mut decoder );
        assert_eq!( frames, RATE as usize / 2 );
    }


    #[test]
    fn test_open_errors() {
        let missing = std::env::temp_dir().join( "spectra-decoder-test" ).join( "missing.wav" );
        assert!( matches!( TrackDecoder::open( &missing ), Err( DecoderError::Io { .. } ) ) );

        let text = std::env::temp_dir().join( "spectra-decoder-test" ).join( "notes.txt" );
        std::fs::create_dir_all( text.parent().unwrap() ).unwrap();
        std::fs::write( &text, "not audio at all" ).unwrap();
        assert!( matches!( TrackDecoder::open( &text ), Err( DecoderError::Probe( _ ) ) ) );
    }
}
