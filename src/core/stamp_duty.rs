use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::brackets::{self, Bracket};
use super::error::StampDutyError;
use super::types::State;

const NSW_BRACKETS: [Bracket; 6] = [
    Bracket::new(0.0, 0.0125, 0.0),
    Bracket::new(17_000.0, 0.015, 212.5),
    Bracket::new(36_000.0, 0.0175, 497.5),
    Bracket::new(97_000.0, 0.035, 1_565.0),
    Bracket::new(364_000.0, 0.045, 10_910.0),
    Bracket::new(1_212_000.0, 0.055, 49_070.0),
];

const VIC_BRACKETS: [Bracket; 4] = [
    Bracket::new(0.0, 0.014, 0.0),
    Bracket::new(25_000.0, 0.024, 350.0),
    Bracket::new(130_000.0, 0.06, 2_870.0),
    Bracket::new(960_000.0, 0.065, 52_670.0),
];

const QLD_BRACKETS: [Bracket; 5] = [
    Bracket::new(0.0, 0.0, 0.0),
    Bracket::new(5_000.0, 0.015, 0.0),
    Bracket::new(75_000.0, 0.035, 1_050.0),
    Bracket::new(540_000.0, 0.045, 17_325.0),
    Bracket::new(1_000_000.0, 0.0575, 38_025.0),
];

const WA_BRACKETS: [Bracket; 5] = [
    Bracket::new(0.0, 0.019, 0.0),
    Bracket::new(120_000.0, 0.0285, 2_280.0),
    Bracket::new(150_000.0, 0.038, 3_135.0),
    Bracket::new(360_000.0, 0.0475, 11_115.0),
    Bracket::new(725_000.0, 0.0515, 28_452.5),
];

const SA_BRACKETS: [Bracket; 9] = [
    Bracket::new(0.0, 0.01, 0.0),
    Bracket::new(12_000.0, 0.02, 120.0),
    Bracket::new(30_000.0, 0.03, 480.0),
    Bracket::new(50_000.0, 0.035, 1_080.0),
    Bracket::new(100_000.0, 0.04, 2_830.0),
    Bracket::new(200_000.0, 0.0425, 6_830.0),
    Bracket::new(250_000.0, 0.0475, 8_955.0),
    Bracket::new(300_000.0, 0.05, 11_330.0),
    Bracket::new(500_000.0, 0.055, 21_330.0),
];

const TAS_BRACKETS: [Bracket; 6] = [
    Bracket::new(0.0, 0.0175, 0.0),
    Bracket::new(3_000.0, 0.0225, 52.5),
    Bracket::new(25_000.0, 0.035, 547.5),
    Bracket::new(75_000.0, 0.04, 2_297.5),
    Bracket::new(200_000.0, 0.0425, 7_297.5),
    Bracket::new(375_000.0, 0.045, 14_735.0),
];

const ACT_BRACKETS: [Bracket; 6] = [
    Bracket::new(0.0, 0.012, 0.0),
    Bracket::new(260_000.0, 0.022, 3_120.0),
    Bracket::new(300_000.0, 0.034, 4_000.0),
    Bracket::new(500_000.0, 0.0432, 10_800.0),
    Bracket::new(750_000.0, 0.059, 21_600.0),
    Bracket::new(1_000_000.0, 0.064, 36_350.0),
];

const NT_BRACKETS: [Bracket; 3] = [
    Bracket::new(0.0, 0.015, 0.0),
    Bracket::new(525_000.0, 0.0495, 7_875.0),
    Bracket::new(3_000_000.0, 0.0545, 130_387.5),
];

/// Duty schedule for one jurisdiction plus first-home-buyer relief.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StampDutySchedule {
    pub brackets: Vec<Bracket>,
    /// First-home buyers pay nothing at or below this value.
    pub exemption_threshold: f64,
    /// First-home buyers get `concession_rate` off standard duty at or below this value.
    pub concession_threshold: f64,
    pub concession_rate: f64,
}

impl StampDutySchedule {
    pub fn builtin(state: State) -> Self {
        let (brackets, exemption_threshold, concession_threshold, concession_rate): (
            &[Bracket],
            f64,
            f64,
            f64,
        ) = match state {
            State::NSW => (&NSW_BRACKETS, 650_000.0, 800_000.0, 0.5),
            State::VIC => (&VIC_BRACKETS, 600_000.0, 750_000.0, 0.5),
            State::QLD => (&QLD_BRACKETS, 700_000.0, 800_000.0, 0.5),
            State::WA => (&WA_BRACKETS, 450_000.0, 600_000.0, 0.5),
            State::SA => (&SA_BRACKETS, 0.0, 0.0, 0.0),
            State::TAS => (&TAS_BRACKETS, 750_000.0, 0.0, 0.0),
            State::ACT => (&ACT_BRACKETS, 1_000_000.0, 0.0, 0.0),
            State::NT => (&NT_BRACKETS, 0.0, 650_000.0, 0.3),
        };
        Self {
            brackets: brackets.to_vec(),
            exemption_threshold,
            concession_threshold,
            concession_rate,
        }
    }

    pub fn validate(&self, state: State) -> Result<(), StampDutyError> {
        brackets::check_consistency(&self.brackets)
            .map_err(|reason| StampDutyError::InvalidSchedule { state, reason })?;
        if !(0.0..=1.0).contains(&self.concession_rate) {
            return Err(StampDutyError::InvalidSchedule {
                state,
                reason: format!("concession rate {} outside 0..=1", self.concession_rate),
            });
        }
        if !(self.exemption_threshold >= 0.0 && self.concession_threshold >= 0.0) {
            return Err(StampDutyError::InvalidSchedule {
                state,
                reason: "relief thresholds must be >= 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn standard_duty(&self, value: f64) -> f64 {
        calculate_progressive_duty(value, &self.brackets)
    }

    /// Investor surcharges are not modelled; `_is_investor` has no effect.
    pub fn duty(&self, value: f64, is_first_home_buyer: bool, _is_investor: bool) -> f64 {
        if is_first_home_buyer {
            if value <= self.exemption_threshold {
                return 0.0;
            }
            if value <= self.concession_threshold {
                return self.standard_duty(value) * (1.0 - self.concession_rate);
            }
        }
        self.standard_duty(value)
    }
}

/// Schedules keyed by jurisdiction. Jurisdictions without a schedule use the
/// baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct StampDutyTable {
    schedules: BTreeMap<State, StampDutySchedule>,
    baseline: State,
}

impl Default for StampDutyTable {
    fn default() -> Self {
        Self {
            schedules: State::ALL
                .into_iter()
                .map(|state| (state, StampDutySchedule::builtin(state)))
                .collect(),
            baseline: State::NSW,
        }
    }
}

impl StampDutyTable {
    pub fn new(
        schedules: BTreeMap<State, StampDutySchedule>,
        baseline: State,
    ) -> Result<Self, StampDutyError> {
        for (state, schedule) in &schedules {
            schedule.validate(*state)?;
        }
        if !schedules.contains_key(&baseline) {
            return Err(StampDutyError::MissingBaseline(baseline));
        }
        Ok(Self {
            schedules,
            baseline,
        })
    }

    pub fn baseline(&self) -> State {
        self.baseline
    }

    pub fn schedule(&self, state: State) -> &StampDutySchedule {
        self.schedules
            .get(&state)
            .or_else(|| self.schedules.get(&self.baseline))
            .expect("baseline schedule checked at construction")
    }

    pub fn calculate_stamp_duty(
        &self,
        value: f64,
        state: State,
        is_first_home_buyer: bool,
        is_investor: bool,
    ) -> f64 {
        self.schedule(state)
            .duty(value, is_first_home_buyer, is_investor)
    }
}

pub fn calculate_progressive_duty(value: f64, thresholds: &[Bracket]) -> f64 {
    brackets::evaluate(value, thresholds).max(0.0)
}

/// Duty under the built-in schedules.
pub fn calculate_stamp_duty(
    value: f64,
    state: State,
    is_first_home_buyer: bool,
    is_investor: bool,
) -> f64 {
    StampDutySchedule::builtin(state).duty(value, is_first_home_buyer, is_investor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{any, prop_assert, proptest};
    use proptest::sample::select;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    #[test]
    fn builtin_schedules_are_internally_consistent() {
        for state in State::ALL {
            StampDutySchedule::builtin(state)
                .validate(state)
                .unwrap_or_else(|e| panic!("{state} schedule invalid: {e}"));
        }
    }

    #[test]
    fn duty_at_each_threshold_equals_base_amount() {
        for state in State::ALL {
            let schedule = StampDutySchedule::builtin(state);
            for bracket in &schedule.brackets {
                assert_eq!(
                    calculate_progressive_duty(bracket.threshold, &schedule.brackets),
                    bracket.base_amount,
                    "{state} bracket at {}",
                    bracket.threshold
                );
            }
        }
    }

    #[test]
    fn lowest_bracket_cannot_go_negative() {
        for state in State::ALL {
            let schedule = StampDutySchedule::builtin(state);
            assert_eq!(schedule.brackets[0].threshold, 0.0);
            assert_eq!(schedule.standard_duty(0.0), 0.0);
            assert_eq!(schedule.standard_duty(-10_000.0), 0.0);
        }
    }

    #[test]
    fn nsw_standard_duty_matches_hand_calculation() {
        // 10,910 + (800,000 - 364,000) * 4.5%
        assert_close(
            calculate_stamp_duty(800_000.0, State::NSW, false, false),
            30_530.0,
            1e-6,
        );
    }

    #[test]
    fn nsw_first_home_buyer_exemption_boundary() {
        assert_eq!(calculate_stamp_duty(650_000.0, State::NSW, true, false), 0.0);
        assert!(calculate_stamp_duty(650_001.0, State::NSW, true, false) > 0.0);
    }

    #[test]
    fn first_home_buyer_concession_halves_standard_duty() {
        let value = 700_000.0;
        let standard = calculate_stamp_duty(value, State::NSW, false, false);
        let concession = calculate_stamp_duty(value, State::NSW, true, false);
        assert_close(concession, standard * 0.5, 1e-9);
    }

    #[test]
    fn first_home_buyer_above_concession_pays_standard() {
        let value = 900_000.0;
        assert_eq!(
            calculate_stamp_duty(value, State::NSW, true, false),
            calculate_stamp_duty(value, State::NSW, false, false)
        );
    }

    #[test]
    fn exemption_boundary_holds_for_every_jurisdiction_with_an_exemption() {
        for state in State::ALL {
            let schedule = StampDutySchedule::builtin(state);
            let threshold = schedule.exemption_threshold;
            if threshold <= 0.0 {
                continue;
            }
            assert_eq!(schedule.duty(threshold, true, false), 0.0, "{state}");
            assert!(schedule.duty(threshold + 1.0, true, false) > 0.0, "{state}");
        }
    }

    // Investor surcharges are a known simplification: the flag is accepted
    // but never changes the duty.
    #[test]
    fn investor_flag_does_not_change_duty() {
        for state in State::ALL {
            for value in [300_000.0, 800_000.0, 2_000_000.0] {
                for fhb in [false, true] {
                    assert_eq!(
                        calculate_stamp_duty(value, state, fhb, true),
                        calculate_stamp_duty(value, state, fhb, false)
                    );
                }
            }
        }
    }

    #[test]
    fn table_falls_back_to_baseline_for_missing_jurisdiction() {
        let mut schedules = BTreeMap::new();
        schedules.insert(State::NSW, StampDutySchedule::builtin(State::NSW));
        let table = StampDutyTable::new(schedules, State::NSW).expect("valid table");
        assert_eq!(
            table.calculate_stamp_duty(800_000.0, State::QLD, false, false),
            calculate_stamp_duty(800_000.0, State::NSW, false, false)
        );
    }

    #[test]
    fn table_rejects_inconsistent_schedule_and_missing_baseline() {
        let mut broken = StampDutySchedule::builtin(State::VIC);
        broken.brackets[2].base_amount += 100.0;
        let mut schedules = BTreeMap::new();
        schedules.insert(State::VIC, broken);
        schedules.insert(State::NSW, StampDutySchedule::builtin(State::NSW));
        assert!(matches!(
            StampDutyTable::new(schedules, State::NSW),
            Err(StampDutyError::InvalidSchedule {
                state: State::VIC,
                ..
            })
        ));

        let mut only_vic = BTreeMap::new();
        only_vic.insert(State::VIC, StampDutySchedule::builtin(State::VIC));
        assert_eq!(
            StampDutyTable::new(only_vic, State::NSW),
            Err(StampDutyError::MissingBaseline(State::NSW))
        );
    }

    #[test]
    fn default_table_matches_free_function() {
        let table = StampDutyTable::default();
        for state in State::ALL {
            assert_eq!(
                table.calculate_stamp_duty(555_555.0, state, true, false),
                calculate_stamp_duty(555_555.0, state, true, false)
            );
        }
    }

    proptest! {
        #[test]
        fn prop_duty_is_non_decreasing_in_value(
            state in select(State::ALL.to_vec()),
            first_home_buyer in any::<bool>(),
            low in 0u32..3_500_000,
            delta in 0u32..500_000,
        ) {
            let low = low as f64;
            let high = low + delta as f64;
            let a = calculate_stamp_duty(low, state, first_home_buyer, false);
            let b = calculate_stamp_duty(high, state, first_home_buyer, false);
            prop_assert!(b + 1e-9 >= a, "{state}: duty({high}) = {b} < duty({low}) = {a}");
        }
    }
}
