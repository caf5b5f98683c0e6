use crate::config::GasGateConfig;
use std::time::{Duration, Instant};

/// Rising gas-ceiling schedule for the gas gate.
///
/// Created fresh at the start of each gate wait. The ceiling starts at
/// `start_gwei` and is bumped by `step_gwei` once per interval, never
/// past `max_gwei`. The polling loop that actually fetches prices lives
/// with the chain crate; this is the pure state machine.
#[derive(Debug, Clone)]
pub struct GasCeiling {
    current_gwei: f64,
    step_gwei: f64,
    max_gwei: f64,
    step_interval: Duration,
    next_bump_at: Instant,
}

impl GasCeiling {
    pub fn new(config: &GasGateConfig) -> Self {
        Self::new_at(config, Instant::now())
    }

    pub fn new_at(config: &GasGateConfig, now: Instant) -> Self {
        let step_interval = Duration::from_secs_f64(config.step_interval_minutes * 60.0);
        Self {
            current_gwei: config.start_gwei,
            step_gwei: config.step_gwei,
            max_gwei: config.max_gwei,
            step_interval,
            next_bump_at: now + step_interval,
        }
    }

    pub fn current_gwei(&self) -> f64 {
        self.current_gwei
    }

    /// Applies any due ceiling bump. Returns true when the ceiling rose.
    pub fn tick(&mut self, now: Instant) -> bool {
        if now < self.next_bump_at || self.step_gwei == 0.0 || self.current_gwei >= self.max_gwei {
            return false;
        }

        self.current_gwei = (self.current_gwei + self.step_gwei).min(self.max_gwei);
        self.next_bump_at = now + self.step_interval;
        true
    }

    /// Whether the observed network price satisfies the gate as the
    /// ceiling stands right now.
    pub fn admits(&self, price_gwei: f64) -> bool {
        price_gwei <= self.current_gwei
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(start: f64, step: f64, max: f64) -> GasGateConfig {
        GasGateConfig {
            enabled: true,
            start_gwei: start,
            step_gwei: step,
            step_interval_minutes: 1.0,
            max_gwei: max,
        }
    }

    #[test]
    fn starts_at_configured_ceiling() {
        let ceiling = GasCeiling::new_at(&config(1.0, 0.5, 2.0), Instant::now());
        assert_eq!(ceiling.current_gwei(), 1.0);
        assert!(ceiling.admits(1.0));
        assert!(!ceiling.admits(1.1));
    }

    #[test]
    fn no_bump_before_interval() {
        let now = Instant::now();
        let mut ceiling = GasCeiling::new_at(&config(1.0, 0.5, 2.0), now);
        assert!(!ceiling.tick(now + Duration::from_secs(59)));
        assert_eq!(ceiling.current_gwei(), 1.0);
    }

    #[test]
    fn bumps_once_per_interval() {
        let now = Instant::now();
        let mut ceiling = GasCeiling::new_at(&config(1.0, 0.5, 2.0), now);

        let t1 = now + Duration::from_secs(61);
        assert!(ceiling.tick(t1));
        assert_eq!(ceiling.current_gwei(), 1.5);

        // next bump only a full interval after the last one
        assert!(!ceiling.tick(t1 + Duration::from_secs(30)));
        assert!(ceiling.tick(t1 + Duration::from_secs(61)));
        assert_eq!(ceiling.current_gwei(), 2.0);
    }

    #[test]
    fn ceiling_never_exceeds_max() {
        let now = Instant::now();
        let mut ceiling = GasCeiling::new_at(&config(1.0, 0.7, 2.0), now);

        let mut t = now;
        for _ in 0..10 {
            t += Duration::from_secs(61);
            ceiling.tick(t);
        }
        assert_eq!(ceiling.current_gwei(), 2.0);
        assert!(!ceiling.tick(t + Duration::from_secs(120)));
    }

    #[test]
    fn zero_step_never_bumps() {
        let now = Instant::now();
        let mut ceiling = GasCeiling::new_at(&config(1.0, 0.0, 2.0), now);
        assert!(!ceiling.tick(now + Duration::from_secs(3600)));
        assert_eq!(ceiling.current_gwei(), 1.0);
    }

    #[test]
    fn admits_only_at_or_below_current_ceiling() {
        let now = Instant::now();
        let mut ceiling = GasCeiling::new_at(&config(1.0, 1.0, 5.0), now);
        assert!(!ceiling.admits(1.5));
        ceiling.tick(now + Duration::from_secs(61));
        assert!(ceiling.admits(1.5));
    }
}
