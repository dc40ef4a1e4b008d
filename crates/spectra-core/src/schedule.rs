//! Display-frame scheduling
//!
//! A cancellable frame clock. The redraw cycle waits on
//! [`FrameSchedule::next_frame`] between frames instead of sleeping, so
//! it can share a single-threaded runtime with input handling.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{ self, Interval, MissedTickBehavior };


/// Default display refresh rate.
pub const DEFAULT_FRAME_RATE: u32 = 60;


/// Handle that stops a [`FrameSchedule`].
///
/// Dropping the handle also stops the schedule.
#[derive( Debug )]
pub struct FrameCancel {
    tx: watch::Sender<bool>,
}


impl FrameCancel {
    /// Stops the schedule. Pending and future `next_frame` calls return false.
    pub fn cancel( &self ) {
        self.tx.send_replace( true );
    }


    pub fn is_cancelled( &self ) -> bool {
        *self.tx.borrow()
    }
}


/// Frame clock ticking at a fixed rate until cancelled.
#[derive( Debug )]
pub struct FrameSchedule {
    interval: Interval,
    cancelled: watch::Receiver<bool>,
}


impl FrameSchedule {
    /// Creates a schedule and its cancel handle.
    ///
    /// Must be called from within a Tokio runtime. A rate of zero is
    /// treated as one frame per second.
    pub fn new( frame_rate: u32 ) -> ( Self, FrameCancel ) {
        let period = Duration::from_secs( 1 ) / frame_rate.max( 1 );
        let mut interval = time::interval( period );
        interval.set_missed_tick_behavior( MissedTickBehavior::Skip );

        let ( tx, cancelled ) = watch::channel( false );

        ( Self { interval, cancelled }, FrameCancel { tx } )
    }


    /// Gets the time between frames.
    pub fn period( &self ) -> Duration {
        self.interval.period()
    }


    /// Waits for the next frame.
    ///
    /// @returns false once the schedule is cancelled
    pub async fn next_frame( &mut self ) -> bool {
        if *self.cancelled.borrow() {
            return false;
        }

        tokio::select! {
            biased;

            changed = self.cancelled.changed() => match changed {
                Ok(()) => !*self.cancelled.borrow(),
                Err( _ ) => false,
            },
            _ = self.interval.tick() => true,
        }
    }


    /// Calls `frame` once per frame until cancelled.
    ///
    /// @returns The number of frames run
    pub async fn run<F: FnMut()>( mut self, mut frame: F ) -> u64 {
        let mut frames = 0;
        while self.next_frame().await {
            frame();
            frames += 1;
        }
        tracing::debug!( "Frame schedule stopped after {} frames", frames );
        frames
    }
}


#[cfg( test )]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;


    #[tokio::test( start_paused = true )]
    async fn test_period_follows_frame_rate() {
        let ( schedule, _cancel ) = FrameSchedule::new( 50 );
        assert_eq!( schedule.period(), Duration::from_millis( 20 ) );

        let ( schedule, _cancel ) = FrameSchedule::new( 0 );
        assert_eq!( schedule.period(), Duration::from_secs( 1 ) );
    }


    #[tokio::test( start_paused = true )]
    async fn test_frames_tick_until_cancelled() {
        let ( mut schedule, cancel ) = FrameSchedule::new( 60 );

        for _ in 0..3 {
            assert!( schedule.next_frame().await );
        }

        cancel.cancel();
        assert!( cancel.is_cancelled() );
        assert!( !schedule.next_frame().await );
        assert!( !schedule.next_frame().await );
    }


    #[tokio::test( start_paused = true )]
    async fn test_dropping_handle_stops_schedule() {
        let ( mut schedule, cancel ) = FrameSchedule::new( 60 );
        drop( cancel );
        assert!( !schedule.next_frame().await );
    }


    #[tokio::test( start_paused = true )]
    async fn test_run_stops_from_inside_a_frame() {
        let ( schedule, cancel ) = FrameSchedule::new( 60 );
        let seen = Rc::new( Cell::new( 0 ) );
        let counter = Rc::clone( &seen );

        let frames = schedule.run( move || {
            counter.set( counter.get() + 1 );
            if counter.get() == 5 {
                cancel.cancel();
            }
        }).await;

        assert_eq!( frames, 5 );
        assert_eq!( seen.get(), 5 );
    }
}
