//! Cooldown / anti-spam gate.
//!
//! Decides whether an anomalous observation may fire. Checks run in a fixed
//! order and the first one that objects wins:
//!
//! 1. daily cap (cooldown enabled only)
//! 2. cooldown since the last trigger (cooldown enabled only)
//! 3. consecutive-anomaly hysteresis
//!
//! The cooldown compares against the data-derived evaluation time; the daily
//! cap follows the wall-clock calendar day.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use mailpulse_core::Verdict;

use crate::evaluator::Observation;
use crate::schema::{AlertState, CooldownSpec};

#[derive(Debug, Clone, PartialEq)]
pub struct GateDecision {
    pub verdict: Verdict,
    pub reason: Option<String>,
    pub in_cooldown: bool,
    pub cooldown_remaining_minutes: Option<i64>,
}

impl GateDecision {
    fn new(verdict: Verdict, reason: Option<String>) -> Self {
        Self {
            verdict,
            reason,
            in_cooldown: false,
            cooldown_remaining_minutes: None,
        }
    }

    fn suppressed(reason: String) -> Self {
        Self::new(Verdict::Suppressed, Some(reason))
    }

    pub fn triggered(&self) -> bool {
        self.verdict == Verdict::Triggered
    }
}

pub struct CooldownGate;

impl CooldownGate {
    /// Apply the gate to `state`, mutating it in place.
    pub fn apply(
        state: &mut AlertState,
        spec: &CooldownSpec,
        observation: &Observation,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> GateDecision {
        state.last_value = Some(observation.current_value);
        state.last_baseline = Some(observation.baseline_value);
        state.last_score = observation.score;

        if spec.enabled {
            state.roll_day(today);
            if state.alerts_today >= spec.max_alerts_per_day {
                return GateDecision::suppressed(format!(
                    "max alerts per day reached ({})",
                    spec.max_alerts_per_day
                ));
            }

            if let Some(last) = state.last_triggered_at {
                let until = last + Duration::minutes(i64::from(spec.cooldown_minutes));
                if now < until {
                    let remaining = (until - now).num_minutes();
                    return GateDecision {
                        in_cooldown: true,
                        cooldown_remaining_minutes: Some(remaining),
                        ..GateDecision::suppressed(format!(
                            "in cooldown, {remaining} minutes remaining"
                        ))
                    };
                }
            }
        }

        if !observation.anomalous {
            state.consecutive_anomaly_count = 0;
            return GateDecision::new(Verdict::NotTriggered, observation.reason.clone());
        }

        let required = spec.consecutive_anomalies.max(1);
        if state.consecutive_anomaly_count + 1 < required {
            state.consecutive_anomaly_count += 1;
            return GateDecision::suppressed(format!(
                "{}/{} consecutive anomalies observed",
                state.consecutive_anomaly_count, required
            ));
        }

        state.roll_day(today);
        state.trigger_count += 1;
        state.alerts_today += 1;
        state.last_triggered_at = Some(now);
        state.consecutive_anomaly_count = 0;
        GateDecision::new(Verdict::Triggered, observation.reason.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 2, h, m, 0).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    fn observation(anomalous: bool) -> Observation {
        Observation {
            now: at(9, 0),
            current_value: 42.0,
            baseline_value: 10.0,
            score: Some(3.1),
            percentage_change: Some(320.0),
            anomalous,
            reason: anomalous.then(|| "spike".to_string()),
            time_series: Vec::new(),
            top_contributors: Vec::new(),
        }
    }

    fn spec(cooldown_minutes: u32, max_per_day: u32, consecutive: u32) -> CooldownSpec {
        CooldownSpec {
            enabled: true,
            cooldown_minutes,
            max_alerts_per_day: max_per_day,
            consecutive_anomalies: consecutive,
        }
    }

    #[test]
    fn records_last_values_even_when_quiet() {
        let mut state = AlertState::default();
        let decision = CooldownGate::apply(&mut state, &spec(60, 10, 1), &observation(false), at(9, 0), day(2));
        assert_eq!(decision.verdict, Verdict::NotTriggered);
        assert_eq!(state.last_value, Some(42.0));
        assert_eq!(state.last_baseline, Some(10.0));
        assert_eq!(state.last_score, Some(3.1));
        assert_eq!(state.trigger_count, 0);
    }

    #[test]
    fn hysteresis_needs_three_in_a_row() {
        let mut state = AlertState::default();
        let spec = spec(0, 10, 3);

        let d1 = CooldownGate::apply(&mut state, &spec, &observation(true), at(9, 0), day(2));
        assert_eq!(d1.verdict, Verdict::Suppressed);
        assert_eq!(d1.reason.as_deref(), Some("1/3 consecutive anomalies observed"));

        let d2 = CooldownGate::apply(&mut state, &spec, &observation(true), at(9, 5), day(2));
        assert_eq!(d2.reason.as_deref(), Some("2/3 consecutive anomalies observed"));

        let d3 = CooldownGate::apply(&mut state, &spec, &observation(true), at(9, 10), day(2));
        assert!(d3.triggered());
        assert_eq!(state.consecutive_anomaly_count, 0);
        assert_eq!(state.trigger_count, 1);
    }

    #[test]
    fn quiet_evaluation_resets_streak() {
        let mut state = AlertState::default();
        let spec = spec(0, 10, 2);
        CooldownGate::apply(&mut state, &spec, &observation(true), at(9, 0), day(2));
        assert_eq!(state.consecutive_anomaly_count, 1);
        CooldownGate::apply(&mut state, &spec, &observation(false), at(9, 5), day(2));
        assert_eq!(state.consecutive_anomaly_count, 0);
    }

    #[test]
    fn cooldown_reports_remaining_minutes() {
        let mut state = AlertState::default();
        let spec = spec(60, 10, 1);
        assert!(CooldownGate::apply(&mut state, &spec, &observation(true), at(9, 0), day(2)).triggered());

        let decision = CooldownGate::apply(&mut state, &spec, &observation(true), at(9, 15), day(2));
        assert_eq!(decision.verdict, Verdict::Suppressed);
        assert!(decision.in_cooldown);
        assert_eq!(decision.cooldown_remaining_minutes, Some(45));
        assert_eq!(decision.reason.as_deref(), Some("in cooldown, 45 minutes remaining"));

        assert!(CooldownGate::apply(&mut state, &spec, &observation(true), at(10, 0), day(2)).triggered());
        assert_eq!(state.trigger_count, 2);
    }

    #[test]
    fn daily_cap_resets_next_day() {
        let mut state = AlertState::default();
        let spec = spec(0, 2, 1);

        assert!(CooldownGate::apply(&mut state, &spec, &observation(true), at(9, 0), day(2)).triggered());
        assert!(CooldownGate::apply(&mut state, &spec, &observation(true), at(9, 5), day(2)).triggered());
        let capped = CooldownGate::apply(&mut state, &spec, &observation(true), at(9, 10), day(2));
        assert_eq!(capped.reason.as_deref(), Some("max alerts per day reached (2)"));
        assert_eq!(state.alerts_today, 2);

        let next = CooldownGate::apply(&mut state, &spec, &observation(true), at(9, 15), day(3));
        assert!(next.triggered());
        assert_eq!(state.alerts_today, 1);
        assert_eq!(state.alerts_today_date, Some(day(3)));
        assert_eq!(state.trigger_count, 3);
    }

    #[test]
    fn disabled_cooldown_skips_cap_and_cooldown() {
        let mut state = AlertState::default();
        let spec = CooldownSpec {
            enabled: false,
            ..spec(60, 1, 1)
        };
        for minute in 0..3 {
            let decision = CooldownGate::apply(&mut state, &spec, &observation(true), at(9, minute), day(2));
            assert!(decision.triggered());
        }
        assert_eq!(state.alerts_today, 3);
    }
}
