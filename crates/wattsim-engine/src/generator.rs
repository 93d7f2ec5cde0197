//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Synthetic consumption reading generator."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};

use crate::config::SimulationConfig;
use crate::point::MonitoringPoint;
use crate::random::RandomSource;
use crate::reading::Reading;

/// Produce one reading for `point` at the simulated instant `at`.
///
/// Rules apply in order and the first three short-circuit:
///
/// 1. inactive points yield an `inactive` reading without drawing randomness;
/// 2. one draw below `error_probability` yields an `error` reading;
/// 3. otherwise the baseline is scaled by the peak factor (once, if the hour
///    falls in any peak window and the instant is not before the run's start
///    date), then by the weekend factor, then by a second draw mapped to
///    `1 ± consumption_variance`.
///
/// The value is rounded to two decimals once, at the end.
pub fn generate(
    point: &MonitoringPoint,
    at: NaiveDateTime,
    config: &SimulationConfig,
    random: &mut dyn RandomSource,
) -> Reading {
    if !point.is_active() {
        return Reading::inactive(point.id(), at);
    }
    if random.next_unit() < config.error_probability {
        return Reading::error(point.id(), at);
    }

    let mut consumption = point.consumo_base_kwh();
    if peak_applies(at, config) {
        consumption *= config.peak_factor;
    }
    if is_weekend(at) {
        consumption *= config.weekend_factor;
    }
    let spread = random.next_unit() * 2.0 - 1.0;
    consumption *= 1.0 + spread * config.consumption_variance;

    Reading::active(point.id(), round_kwh(consumption).max(0.0), at)
}

/// True when the peak multiplier should be applied at `at`.
pub fn peak_applies(at: NaiveDateTime, config: &SimulationConfig) -> bool {
    if !config.simulate_peaks {
        return false;
    }
    if matches!(config.start_date, Some(start) if at < start) {
        return false;
    }
    is_peak_hour(at.hour(), config)
}

pub fn is_peak_hour(hour: u32, config: &SimulationConfig) -> bool {
    config.peak_windows.iter().any(|window| window.contains(hour))
}

pub fn is_weekend(at: NaiveDateTime) -> bool {
    matches!(at.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn round_kwh(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeakWindow;
    use crate::random::{ScriptedRandom, SeededRandom};
    use crate::reading::ReadingStatus;
    use wattsim_common::time::parse_sim_datetime;

    fn ts(raw: &str) -> NaiveDateTime {
        parse_sim_datetime(raw).unwrap()
    }

    fn point(base: f64) -> MonitoringPoint {
        MonitoringPoint::new("meter-01", "Oficina", base, 1000.0).unwrap()
    }

    fn config() -> SimulationConfig {
        SimulationConfig {
            simulate_peaks: true,
            peak_windows: vec![
                PeakWindow::new("morning", 8, 12),
                PeakWindow::new("afternoon", 14, 18),
            ],
            peak_factor: 2.0,
            weekend_factor: 0.5,
            consumption_variance: 0.2,
            error_probability: 0.1,
            ..SimulationConfig::default()
        }
    }

    // 2025-01-01 is a Wednesday, 2025-01-04 a Saturday, 2025-01-05 a Sunday.
    const WEEKDAY_OFF_PEAK: &str = "2025-01-01 06:00:00";
    const WEEKDAY_PEAK: &str = "2025-01-01 09:00:00";
    const SATURDAY_PEAK: &str = "2025-01-04 10:00:00";

    #[test]
    fn inactive_points_draw_nothing() {
        let p = point(10.0).with_active(false);
        let mut random = ScriptedRandom::new([0.0]);
        let reading = generate(&p, ts(WEEKDAY_PEAK), &config(), &mut random);
        assert_eq!(reading.status, ReadingStatus::Inactive);
        assert_eq!(reading.consumption_kwh, 0.0);
        assert_eq!(random.draws(), 0);
    }

    #[test]
    fn error_draw_short_circuits_before_variance() {
        let mut random = ScriptedRandom::new([0.05]);
        let reading = generate(&point(10.0), ts(WEEKDAY_PEAK), &config(), &mut random);
        assert_eq!(reading.status, ReadingStatus::Error);
        assert_eq!(reading.consumption_kwh, 0.0);
        assert_eq!(random.draws(), 1);
    }

    #[test]
    fn error_probability_extremes() {
        let mut random = SeededRandom::from_seed(11);
        let always = SimulationConfig {
            error_probability: 1.0,
            ..config()
        };
        let never = SimulationConfig {
            error_probability: 0.0,
            ..config()
        };
        for _ in 0..200 {
            let r = generate(&point(3.0), ts(WEEKDAY_PEAK), &always, &mut random);
            assert_eq!(r.status, ReadingStatus::Error);
            let r = generate(&point(3.0), ts(WEEKDAY_PEAK), &never, &mut random);
            assert_eq!(r.status, ReadingStatus::Active);
        }
    }

    #[test]
    fn midpoint_variance_keeps_base_off_peak() {
        let mut random = ScriptedRandom::new([0.5, 0.5]);
        let reading = generate(&point(10.0), ts(WEEKDAY_OFF_PEAK), &config(), &mut random);
        assert_eq!(reading.status, ReadingStatus::Active);
        assert_eq!(reading.consumption_kwh, 10.0);
        assert_eq!(random.draws(), 2);
    }

    #[test]
    fn peak_multiplies_once_even_with_overlapping_windows() {
        let overlapping = SimulationConfig {
            peak_windows: vec![PeakWindow::new("a", 8, 12), PeakWindow::new("b", 9, 10)],
            ..config()
        };
        let mut random = ScriptedRandom::new([0.5, 0.5]);
        let reading = generate(&point(10.0), ts(WEEKDAY_PEAK), &overlapping, &mut random);
        assert_eq!(reading.consumption_kwh, 20.0);
    }

    #[test]
    fn peak_window_end_is_exclusive() {
        let mut random = ScriptedRandom::new([0.5, 0.5]);
        let noon = generate(&point(10.0), ts("2025-01-01 12:00:00"), &config(), &mut random);
        assert_eq!(noon.consumption_kwh, 10.0);
        let eight = generate(&point(10.0), ts("2025-01-01 08:00:00"), &config(), &mut random);
        assert_eq!(eight.consumption_kwh, 20.0);
    }

    #[test]
    fn peak_disabled_or_before_start_date() {
        let disabled = SimulationConfig {
            simulate_peaks: false,
            ..config()
        };
        let mut random = ScriptedRandom::new([0.5, 0.5]);
        let r = generate(&point(10.0), ts(WEEKDAY_PEAK), &disabled, &mut random);
        assert_eq!(r.consumption_kwh, 10.0);

        let gated = config().with_range(ts("2025-02-01 00:00:00"), None);
        assert!(!peak_applies(ts(WEEKDAY_PEAK), &gated));
        assert!(peak_applies(ts("2025-02-03 09:00:00"), &gated));
        assert!(peak_applies(ts("2025-02-01 09:00:00"), &gated));
    }

    #[test]
    fn weekend_composes_with_peak() {
        let mut random = ScriptedRandom::new([0.5, 0.5]);
        let reading = generate(&point(10.0), ts(SATURDAY_PEAK), &config(), &mut random);
        assert_eq!(reading.consumption_kwh, 10.0);

        let off_peak_sunday = generate(&point(10.0), ts("2025-01-05 20:00:00"), &config(), &mut random);
        assert_eq!(off_peak_sunday.consumption_kwh, 5.0);
        assert!(is_weekend(ts("2025-01-05 20:00:00")));
        assert!(!is_weekend(ts("2025-01-06 20:00:00")));
    }

    #[test]
    fn variance_bounds_follow_draw() {
        let mut low = ScriptedRandom::new([0.5, 0.0]);
        let reading = generate(&point(10.0), ts(WEEKDAY_OFF_PEAK), &config(), &mut low);
        assert_eq!(reading.consumption_kwh, 8.0);

        let mut high = ScriptedRandom::new([0.5, 0.75]);
        let reading = generate(&point(10.0), ts(WEEKDAY_OFF_PEAK), &config(), &mut high);
        assert_eq!(reading.consumption_kwh, 11.0);
    }

    #[test]
    fn active_readings_stay_within_variance_band() {
        let cfg = SimulationConfig {
            error_probability: 0.0,
            ..config()
        };
        let mut random = SeededRandom::from_seed(2025);
        let instants = [WEEKDAY_OFF_PEAK, WEEKDAY_PEAK, SATURDAY_PEAK, "2025-01-05 02:00:00"];
        for raw in instants {
            let at = ts(raw);
            let mut expected = 7.31;
            if peak_applies(at, &cfg) {
                expected *= cfg.peak_factor;
            }
            if is_weekend(at) {
                expected *= cfg.weekend_factor;
            }
            for _ in 0..100 {
                let reading = generate(&point(7.31), at, &cfg, &mut random);
                assert!(reading.consumption_kwh >= 0.0);
                let lower = expected * (1.0 - cfg.consumption_variance) - 0.005;
                let upper = expected * (1.0 + cfg.consumption_variance) + 0.005;
                assert!(
                    (lower..=upper).contains(&reading.consumption_kwh),
                    "{} outside [{lower}, {upper}] at {raw}",
                    reading.consumption_kwh
                );
                let cents = reading.consumption_kwh * 100.0;
                assert!((cents - cents.round()).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn generator_leaves_inputs_untouched() {
        let p = point(4.2);
        let cfg = config();
        let before = cfg.clone();
        let mut random = SeededRandom::from_seed(1);
        let reading = generate(&p, ts(WEEKDAY_PEAK), &cfg, &mut random);
        assert_eq!(cfg, before);
        assert!(p.is_active());
        assert_eq!(reading.point_id, "meter-01");
        assert_eq!(reading.timestamp, ts(WEEKDAY_PEAK));
    }

    #[test]
    fn rounding_is_two_decimals() {
        assert_eq!(round_kwh(1.234), 1.23);
        assert_eq!(round_kwh(1.236), 1.24);
        assert_eq!(round_kwh(0.0), 0.0);
    }
}
