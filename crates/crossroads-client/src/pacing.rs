//! Just-in-time arrival for reservations.

use crossroads_beacon::Timestamp;

/// Speed changes smaller than this are not reissued.
const SPEED_TOLERANCE: f64 = 1e-3;

/// Picks a speed that brings the vehicle to the entrance when its
/// reservation opens instead of early.
///
/// `target = remaining_distance / time_until_entry`, clipped to the platform
/// maximum.
#[derive(Debug, Clone)]
pub struct SpeedPacer {
    max_speed: f64,
    remaining: f64,
    last_issued: Option<f64>,
}

impl SpeedPacer {
    pub fn new(max_speed: f64, distance_to_entrance: f64) -> Self {
        Self {
            max_speed,
            remaining: distance_to_entrance,
            last_issued: None,
        }
    }

    /// Start a new approach.
    pub fn reset(&mut self, distance_to_entrance: f64) {
        self.remaining = distance_to_entrance.max(0.0);
        self.last_issued = None;
    }

    /// Account for distance travelled toward the entrance.
    pub fn advance(&mut self, meters: f64) {
        self.remaining = (self.remaining - meters.max(0.0)).max(0.0);
    }

    pub fn remaining(&self) -> f64 {
        self.remaining
    }

    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    /// The speed to run at, or `None` to leave the current speed alone.
    pub fn target_speed(&self, entry: Option<Timestamp>, now: Timestamp) -> Option<f64> {
        let entry = entry?;
        let until_ms = entry.saturating_since(now);
        if until_ms == 0 {
            return Some(self.max_speed);
        }
        let seconds = until_ms as f64 / 1_000.0;
        Some((self.remaining / seconds).min(self.max_speed))
    }

    /// Like [`target_speed`](Self::target_speed), but only when it differs
    /// from what was last issued.
    pub fn next_command(&mut self, entry: Option<Timestamp>, now: Timestamp) -> Option<f64> {
        let speed = self.target_speed(entry, now)?;
        if let Some(last) = self.last_issued {
            if (last - speed).abs() < SPEED_TOLERANCE {
                return None;
            }
        }
        self.last_issued = Some(speed);
        Some(speed)
    }

    /// Record a speed set outside the pacer.
    pub fn note_issued(&mut self, speed: f64) {
        self.last_issued = Some(speed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paces_to_arrive_on_time() {
        let pacer = SpeedPacer::new(0.75, 0.36);
        // 0.36 m in 1.2 s
        let speed = pacer.target_speed(Some(Timestamp(2_200)), Timestamp(1_000)).unwrap();
        assert!((speed - 0.3).abs() < 1e-9);
    }

    #[test]
    fn clips_to_max_speed() {
        let pacer = SpeedPacer::new(0.75, 0.36);
        assert_eq!(pacer.target_speed(Some(Timestamp(1_100)), Timestamp(1_000)), Some(0.75));
    }

    #[test]
    fn full_speed_once_reservation_opens() {
        let pacer = SpeedPacer::new(0.75, 0.36);
        assert_eq!(pacer.target_speed(Some(Timestamp(900)), Timestamp(1_000)), Some(0.75));
    }

    #[test]
    fn no_reservation_leaves_speed_alone() {
        let pacer = SpeedPacer::new(0.75, 0.36);
        assert_eq!(pacer.target_speed(None, Timestamp(1_000)), None);
    }

    #[test]
    fn progress_shrinks_remaining_distance() {
        let mut pacer = SpeedPacer::new(0.75, 0.36);
        pacer.advance(0.16);
        assert!((pacer.remaining() - 0.2).abs() < 1e-9);
        pacer.advance(1.0);
        assert_eq!(pacer.remaining(), 0.0);
        pacer.reset(0.5);
        assert_eq!(pacer.remaining(), 0.5);
    }

    #[test]
    fn repeated_speed_is_not_reissued() {
        let mut pacer = SpeedPacer::new(0.75, 0.36);
        assert!(pacer.next_command(Some(Timestamp(2_200)), Timestamp(1_000)).is_some());
        assert!(pacer.next_command(Some(Timestamp(2_200)), Timestamp(1_000)).is_none());
        assert_eq!(pacer.next_command(Some(Timestamp(0)), Timestamp(1_000)), Some(0.75));
    }
}
