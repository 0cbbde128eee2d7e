// crates/cineloop-media/src/clock.rs
//
// Wall-clock playback position. Video frames and the audio sink both follow
// this clock; the session reports it as the engine position.
//
// position = base_ms + (now - anchor) * rate   while running
//          = base_ms                           while stopped
// always clamped to the media duration once one is known.

use std::time::Instant;

#[derive(Debug, Clone)]
pub(crate) struct PlaybackClock {
    base_ms:     u64,
    anchor:      Option<Instant>,
    rate:        f64,
    duration_ms: u64,
}

impl PlaybackClock {
    pub fn new(duration_ms: u64) -> Self {
        Self { base_ms: 0, anchor: None, rate: 1.0, duration_ms }
    }

    pub fn position(&self, now: Instant) -> u64 {
        let raw = match self.anchor {
            Some(anchor) => {
                let elapsed = now.saturating_duration_since(anchor).as_secs_f64() * 1000.0;
                self.base_ms.saturating_add((elapsed * self.rate) as u64)
            }
            None => self.base_ms,
        };
        self.clamp(raw)
    }

    pub fn is_running(&self) -> bool { self.anchor.is_some() }
    pub fn rate(&self) -> f64 { self.rate }
    pub fn duration_ms(&self) -> u64 { self.duration_ms }

    pub fn set_duration(&mut self, duration_ms: u64) {
        self.duration_ms = duration_ms;
    }

    pub fn play(&mut self, now: Instant) {
        if self.anchor.is_none() {
            self.anchor = Some(now);
        }
    }

    pub fn pause(&mut self, now: Instant) {
        self.rebase(now);
        self.anchor = None;
    }

    pub fn seek(&mut self, ms: u64, now: Instant) {
        self.base_ms = self.clamp(ms);
        if self.anchor.is_some() {
            self.anchor = Some(now);
        }
    }

    pub fn set_rate(&mut self, rate: f64, now: Instant) {
        self.rebase(now);
        self.rate = rate;
    }

    /// Running and at (or past) the end of the media.
    pub fn reached_end(&self, now: Instant) -> bool {
        self.is_running() && self.duration_ms > 0 && self.position(now) >= self.duration_ms
    }

    /// Fold elapsed time into `base_ms` so a rate change or pause does not
    /// retroactively rescale it.
    fn rebase(&mut self, now: Instant) {
        if self.anchor.is_some() {
            self.base_ms = self.position(now);
            self.anchor = Some(now);
        }
    }

    fn clamp(&self, ms: u64) -> u64 {
        if self.duration_ms > 0 { ms.min(self.duration_ms) } else { ms }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    #[test]
    fn stopped_clock_holds_position() {
        let t0 = Instant::now();
        let mut c = PlaybackClock::new(10_000);
        c.seek(2_500, t0);
        assert_eq!(c.position(t0 + ms(5_000)), 2_500);
        assert!(!c.is_running());
    }

    #[test]
    fn running_clock_advances_with_rate() {
        let t0 = Instant::now();
        let mut c = PlaybackClock::new(60_000);
        c.play(t0);
        assert_eq!(c.position(t0 + ms(1_000)), 1_000);
        c.set_rate(2.0, t0 + ms(1_000));
        assert_eq!(c.position(t0 + ms(2_000)), 3_000);
        c.pause(t0 + ms(2_000));
        assert_eq!(c.position(t0 + ms(9_000)), 3_000);
    }

    #[test]
    fn seek_while_running_restarts_from_target() {
        let t0 = Instant::now();
        let mut c = PlaybackClock::new(60_000);
        c.play(t0);
        c.seek(30_000, t0 + ms(500));
        assert_eq!(c.position(t0 + ms(1_500)), 31_000);
    }

    #[test]
    fn position_is_clamped_to_duration() {
        let t0 = Instant::now();
        let mut c = PlaybackClock::new(1_000);
        c.play(t0);
        assert_eq!(c.position(t0 + ms(5_000)), 1_000);
        assert!(c.reached_end(t0 + ms(5_000)));
        c.seek(9_999, t0);
        assert_eq!(c.position(t0), 1_000);
    }

    #[test]
    fn unknown_duration_does_not_clamp_or_end() {
        let t0 = Instant::now();
        let mut c = PlaybackClock::new(0);
        c.play(t0);
        assert_eq!(c.position(t0 + ms(4_000)), 4_000);
        assert!(!c.reached_end(t0 + ms(4_000)));
    }
}
