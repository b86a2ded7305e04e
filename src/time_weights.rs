use chrono::{DateTime, Duration, Utc};

use crate::models::CheckinRecord;

#[derive(Clone, Debug)]
pub struct HeatConfig {
    pub window_days: u32,
}

impl Default for HeatConfig {
    fn default() -> Self {
        Self { window_days: 20 }
    }
}

impl HeatConfig {
    pub fn window_seconds(&self) -> f64 {
        self.window_days as f64 * 86_400.0
    }
}

/// Linear decay from 1.0 at age zero to 0.0 at the end of the window.
///
/// Negative ages (check-ins stamped after `now`) are not clamped and weigh more than 1.0.
pub fn checkin_weight(age: Duration, config: &HeatConfig) -> f64 {
    let window = config.window_seconds();
    if window <= 0.0 {
        return 0.0;
    }

    let age_seconds = age.num_milliseconds() as f64 / 1000.0;
    (window - age_seconds).max(0.0) / window
}

pub fn heat_score(checkins: &[CheckinRecord], now: DateTime<Utc>, config: &HeatConfig) -> f64 {
    checkins
        .iter()
        .map(|checkin| checkin_weight(now - checkin.created_at, config))
        .fold(0.0, |heat, weight| heat + weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Actor, Tag};
    use chrono::TimeZone;

    fn checkin_at(id: i64, created_at: DateTime<Utc>) -> CheckinRecord {
        CheckinRecord {
            id,
            location_id: 1,
            actor: Actor::Anonymous(format!("device-{id}")),
            tags: vec![Tag::Food],
            created_at,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn empty_history_is_cold() {
        let heat = heat_score(&[], now(), &HeatConfig::default());
        assert_eq!(heat, 0.0);
        assert!(heat.is_sign_positive());
    }

    #[test]
    fn expired_checkins_sum_to_positive_zero() {
        let checkins = [checkin_at(1, now() - Duration::days(21))];
        assert!(heat_score(&checkins, now(), &HeatConfig::default()).is_sign_positive());
    }

    #[test]
    fn fresh_checkin_weighs_one() {
        assert_eq!(checkin_weight(Duration::zero(), &HeatConfig::default()), 1.0);
    }

    #[test]
    fn ten_days_is_half_of_twenty_day_window() {
        let checkins = [checkin_at(1, now() - Duration::days(10))];
        let heat = heat_score(&checkins, now(), &HeatConfig::default());
        assert!((heat - 0.5).abs() < 1e-12);
    }

    #[test]
    fn at_or_past_window_weighs_nothing() {
        let config = HeatConfig::default();
        assert_eq!(checkin_weight(Duration::days(20), &config), 0.0);
        assert_eq!(checkin_weight(Duration::days(45), &config), 0.0);
    }

    #[test]
    fn weight_never_increases_with_age() {
        let config = HeatConfig::default();
        let mut previous = f64::INFINITY;
        for hours in (0..=20 * 24).step_by(7) {
            let weight = checkin_weight(Duration::hours(hours), &config);
            assert!(weight <= previous);
            previous = weight;
        }
    }

    #[test]
    fn future_checkin_is_not_clamped() {
        let weight = checkin_weight(Duration::days(-2), &HeatConfig::default());
        assert!((weight - 1.1).abs() < 1e-12);
    }

    #[test]
    fn contributions_add_up() {
        let checkins = [
            checkin_at(1, now()),
            checkin_at(2, now()),
            checkin_at(3, now() - Duration::days(5)),
            checkin_at(4, now() - Duration::days(30)),
        ];
        let heat = heat_score(&checkins, now(), &HeatConfig::default());
        assert!((heat - 2.75).abs() < 1e-12);
    }

    #[test]
    fn zero_window_does_not_divide_by_zero() {
        let config = HeatConfig { window_days: 0 };
        assert_eq!(checkin_weight(Duration::days(-1), &config), 0.0);
        assert_eq!(checkin_weight(Duration::zero(), &config), 0.0);
    }
}
