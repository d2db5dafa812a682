use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

/// Frames per second averaged over one-second windows.
#[derive(Debug)]
pub struct FpsCounter {
    frames: u32,
    since: Instant,
}

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self { frames: 0, since: now }
    }

    /// Count a frame; yields the rate once a window has elapsed.
    pub fn tick(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.since);
        if elapsed < WINDOW {
            return None;
        }
        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.since = now;
        Some(fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_once_per_window() {
        let start = Instant::now();
        let mut fps = FpsCounter::new(start);
        for i in 1..60 {
            assert_eq!(fps.tick(start + Duration::from_millis(i * 16)), None);
        }
        let rate = fps.tick(start + Duration::from_secs(1)).unwrap();
        assert!((rate - 60.0).abs() < 1e-3, "{rate}");
        assert_eq!(fps.tick(start + Duration::from_millis(1016)), None);
    }
}
