//! Fixed-timestep clock plus wall-clock helpers.
//!
//! `draw_web()` fires at ~60fps with a variable delta. `TickClock` turns that
//! into whole ticks so the reveal animation advances in deterministic steps.

/// Reveal ticks per second (20ms per tick).
pub const TICKS_PER_SEC: u32 = 50;

pub struct TickClock {
    ms_per_tick: f64,
    /// Milliseconds not yet consumed as ticks.
    accumulator: f64,
    last_timestamp: Option<f64>,
}

impl TickClock {
    pub fn new(ticks_per_sec: u32) -> Self {
        Self {
            ms_per_tick: 1000.0 / ticks_per_sec as f64,
            accumulator: 0.0,
            last_timestamp: None,
        }
    }

    /// Feed a `performance.now()` timestamp; returns ticks to process.
    pub fn update(&mut self, now_ms: f64) -> u32 {
        let delta = match self.last_timestamp {
            // Clamp so a backgrounded tab doesn't replay seconds of frames.
            Some(prev) => (now_ms - prev).clamp(0.0, 500.0),
            None => 0.0,
        };
        self.last_timestamp = Some(now_ms);

        self.accumulator += delta;
        let ticks = (self.accumulator / self.ms_per_tick) as u32;
        self.accumulator -= ticks as f64 * self.ms_per_tick;
        ticks
    }
}

/// Milliseconds since the Unix epoch.
#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> i64 {
    js_sys::Date::now() as i64
}

#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> i64 {
    0
}

/// `Date.getTimezoneOffset()` of the browser (minutes, UTC minus local).
#[cfg(target_arch = "wasm32")]
pub fn local_offset_minutes() -> i32 {
    js_sys::Date::new_0().get_timezone_offset() as i32
}

#[cfg(not(target_arch = "wasm32"))]
pub fn local_offset_minutes() -> i32 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_returns_zero_ticks() {
        let mut clock = TickClock::new(TICKS_PER_SEC);
        assert_eq!(clock.update(1234.0), 0);
    }

    #[test]
    fn ticks_at_twenty_ms() {
        let mut clock = TickClock::new(TICKS_PER_SEC);
        clock.update(0.0);
        assert_eq!(clock.update(20.0), 1);
        assert_eq!(clock.update(70.0), 2);
    }

    #[test]
    fn remainder_carried_over() {
        let mut clock = TickClock::new(TICKS_PER_SEC);
        clock.update(0.0);
        assert_eq!(clock.update(30.0), 1); // 10ms left over
        assert_eq!(clock.update(40.0), 1); // 10 + 10
    }

    #[test]
    fn large_gap_is_clamped() {
        let mut clock = TickClock::new(TICKS_PER_SEC);
        clock.update(0.0);
        assert_eq!(clock.update(10_000.0), 25);
    }

    #[test]
    fn steady_60fps() {
        let mut clock = TickClock::new(TICKS_PER_SEC);
        clock.update(0.0);
        let total: u32 = (1..=60).map(|i| clock.update(i as f64 * 16.667)).sum();
        assert!((49..=51).contains(&total), "expected ~50 ticks, got {total}");
    }

    #[test]
    fn native_clock_is_fixed() {
        assert_eq!(now_ms(), 0);
        assert_eq!(local_offset_minutes(), 0);
    }
}
