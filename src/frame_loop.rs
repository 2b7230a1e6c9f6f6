use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// One frame's worth of work, split into the steps the loop runs in order.
pub trait FrameTarget {
    type Error;

    fn update_controls(&mut self);
    fn render_scene(&mut self) -> Result<(), Self::Error>;
    /// Runs after the scene so overlay elements composite on top of it.
    fn render_overlay(&mut self) -> Result<(), Self::Error>;
}

/// Shared flag that ends a [`FrameLoop`].
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Schedule the next frame.
    Continue,
    Stopped,
}

pub struct FrameLoop {
    stop: StopSignal,
    frames: u64,
}

impl FrameLoop {
    pub fn new(stop: StopSignal) -> Self {
        Self { stop, frames: 0 }
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn step<T: FrameTarget>(&mut self, target: &mut T) -> Result<FrameOutcome, T::Error> {
        if self.stop.is_stopped() {
            return Ok(FrameOutcome::Stopped);
        }

        target.update_controls();
        target.render_scene()?;
        target.render_overlay()?;
        self.frames += 1;

        if self.stop.is_stopped() {
            Ok(FrameOutcome::Stopped)
        } else {
            Ok(FrameOutcome::Continue)
        }
    }
}
