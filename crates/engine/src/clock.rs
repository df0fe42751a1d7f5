/// Game-time source for one simulation tick per frame.
pub trait FrameClock {
    /// Seconds since the previous frame, already scaled by any global time
    /// multiplier.
    fn delta_seconds(&mut self) -> f32;
}

/// Constant delta, for headless runs and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedFrameClock {
    delta_seconds: f32,
    time_scale: f32,
    frames: u64,
}

impl FixedFrameClock {
    pub fn new(delta_seconds: f32) -> Self {
        Self {
            delta_seconds: delta_seconds.max(0.0),
            time_scale: 1.0,
            frames: 0,
        }
    }

    pub fn with_time_scale(mut self, time_scale: f32) -> Self {
        self.time_scale = time_scale.max(0.0);
        self
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.frames as f64 * f64::from(self.delta_seconds * self.time_scale)
    }
}

impl FrameClock for FixedFrameClock {
    fn delta_seconds(&mut self) -> f32 {
        self.frames = self.frames.saturating_add(1);
        self.delta_seconds * self.time_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_applies_time_scale_and_counts_frames() {
        let mut clock = FixedFrameClock::new(0.1).with_time_scale(2.0);
        assert_eq!(clock.delta_seconds(), 0.2);
        assert_eq!(clock.delta_seconds(), 0.2);
        assert_eq!(clock.frames(), 2);
        assert!((clock.elapsed_seconds() - 0.4).abs() < 1.0e-6);
    }

    #[test]
    fn negative_inputs_clamp_to_zero() {
        let mut clock = FixedFrameClock::new(-1.0);
        assert_eq!(clock.delta_seconds(), 0.0);
    }
}
