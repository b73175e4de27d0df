//! Tick timing.
//!
//! The [`Time`] resource is advanced by the [`Engine`](crate::engine::Engine)
//! with the frame delta it is handed, so simulated time is whatever the host
//! loop says it is. Nodes read it through [`NodeContext::time`](crate::tree::NodeContext::time).

use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
pub struct Time {
    /// Duration of the last tick.
    delta: Duration,
    /// Sum of all deltas so far.
    elapsed: Duration,
    frame_count: u64,
}

impl Time {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one tick of `delta`.
    pub fn advance(&mut self, delta: Duration) {
        self.delta = delta;
        self.elapsed += delta;
        self.frame_count += 1;
    }

    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Delta time in seconds (f32), the most common way to use it.
    pub fn delta_secs(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Estimated ticks per second from the last delta.
    pub fn fps(&self) -> f32 {
        if self.delta.as_secs_f32() > 0.0 {
            1.0 / self.delta.as_secs_f32()
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_accumulates() {
        let mut time = Time::new();
        assert_eq!(time.fps(), 0.0);
        time.advance(Duration::from_millis(20));
        time.advance(Duration::from_millis(30));
        assert_eq!(time.frame_count(), 2);
        assert_eq!(time.elapsed(), Duration::from_millis(50));
        assert!((time.fps() - 33.333).abs() < 0.01);
    }
}
