//! Small timing primitives shared across the gameplay systems.
//!
//! [`Cooldown`] gates repeatable actions (footstep sounds, fireball spawns) against a monotonic
//! clock, and [`Countdown`] is a one-shot delay advanced by the tick delta. Timed choreography in
//! this crate is written as explicit phase + elapsed-time state advanced by these types, never as
//! nested deferred callbacks, so tests can drive sequences with synthetic deltas.

/// Rate limiter keyed to a monotonic "now" in seconds (`Time::elapsed_seconds`).
/// The first call always fires.
#[derive(Debug, Clone)]
pub struct Cooldown {
    interval: f32,
    last: Option<f32>,
}

impl Cooldown {
    pub fn from_millis(ms: u64) -> Self {
        Self {
            interval: ms as f32 / 1000.0,
            last: None,
        }
    }

    /// True when the interval has elapsed since the last fire (or nothing has fired yet).
    pub fn ready(&self, now: f32) -> bool {
        match self.last {
            Some(last) => now - last >= self.interval,
            None => true,
        }
    }

    /// Marks the action as fired at `now` without checking readiness.
    pub fn fire(&mut self, now: f32) {
        self.last = Some(now);
    }

    /// Fires if ready, returning whether the gated action should run.
    pub fn try_fire(&mut self, now: f32) -> bool {
        if self.ready(now) {
            self.fire(now);
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// One-shot timer counting down by tick delta. `tick` reports completion exactly
/// once; afterwards the countdown stays finished until rearmed.
#[derive(Debug, Clone)]
pub struct Countdown {
    remaining: f32,
    fired: bool,
}

impl Countdown {
    pub fn from_millis(ms: u64) -> Self {
        Self {
            remaining: ms as f32 / 1000.0,
            fired: false,
        }
    }

    pub fn from_secs(secs: f32) -> Self {
        Self {
            remaining: secs,
            fired: false,
        }
    }

    /// Advances the timer. Returns true only on the tick where the delay runs out.
    pub fn tick(&mut self, dt: f32) -> bool {
        if self.fired {
            return false;
        }
        self.remaining -= dt;
        if self.remaining <= 0.0 {
            self.remaining = 0.0;
            self.fired = true;
            true
        } else {
            false
        }
    }

    pub fn finished(&self) -> bool {
        self.fired
    }

    pub fn remaining(&self) -> f32 {
        self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_first_call_fires() {
        let mut cd = Cooldown::from_millis(500);
        assert!(cd.try_fire(10.0));
        assert!(!cd.try_fire(10.2));
        assert!(cd.try_fire(10.5));
    }

    #[test]
    fn cooldown_reset_rearms() {
        let mut cd = Cooldown::from_millis(1000);
        assert!(cd.try_fire(0.0));
        assert!(!cd.try_fire(0.1));
        cd.reset();
        assert!(cd.try_fire(0.2));
    }

    #[test]
    fn countdown_fires_exactly_once() {
        let mut timer = Countdown::from_millis(250);
        assert!(!timer.tick(0.1));
        assert!(!timer.finished());
        assert!(timer.tick(0.2));
        assert!(timer.finished());
        // Further ticks never report completion again.
        assert!(!timer.tick(1.0));
        assert!(!timer.tick(1.0));
    }

    #[test]
    fn countdown_clamps_remaining_at_zero() {
        let mut timer = Countdown::from_secs(0.1);
        timer.tick(5.0);
        assert_eq!(timer.remaining(), 0.0);
    }
}
