//! Health formula library.
//!
//! Stateless conversions and estimators:
//! - Volume conversion between ml, oz and cups
//! - BMI with category
//! - Daily calorie need (revised Harris-Benedict)
//! - Daily hydration goal
//!
//! None of these guard their inputs. Callers run values through
//! [`crate::validate`] first.

use crate::{
    ActivityLevel, BmiCategory, BmiReading, Climate, HydrationActivity, Sex, Unit,
};

/// Milliliters per US fluid ounce
pub const ML_PER_OZ: f64 = 29.5735;

/// Milliliters per US cup
pub const ML_PER_CUP: f64 = 236.588;

/// Hydration baseline in ml per kg of body weight
pub const ML_PER_KG: f64 = 33.0;

fn ml_per_unit(unit: Unit) -> f64 {
    match unit {
        Unit::Ml => 1.0,
        Unit::Oz => ML_PER_OZ,
        Unit::Cups => ML_PER_CUP,
    }
}

/// Convert a volume between units, going through milliliters
pub fn convert(amount: f64, from: Unit, to: Unit) -> f64 {
    if from == to {
        return amount;
    }
    let ml = amount * ml_per_unit(from);
    ml / ml_per_unit(to)
}

/// Render a milliliter amount in the given unit, rounded to a whole number
pub fn format_amount(ml: f64, unit: Unit) -> String {
    let converted = convert(ml, Unit::Ml, unit).round();
    format!("{}{}", converted, unit)
}

/// Classify an unrounded BMI value
pub fn bmi_category(bmi: f64) -> BmiCategory {
    if bmi < 18.5 {
        BmiCategory::Underweight
    } else if bmi < 25.0 {
        BmiCategory::Normal
    } else if bmi < 30.0 {
        BmiCategory::Overweight
    } else {
        BmiCategory::Obese
    }
}

/// Body mass index from weight in kg and height in cm
pub fn bmi(weight_kg: f64, height_cm: f64) -> BmiReading {
    let height_m = height_cm / 100.0;
    let raw = weight_kg / (height_m * height_m);

    BmiReading {
        weight_kg,
        height_cm,
        bmi: (raw * 10.0).round() / 10.0,
        category: bmi_category(raw),
    }
}

/// Basal metabolic rate, revised Harris-Benedict equation
pub fn basal_metabolic_rate(age: u32, sex: Sex, weight_kg: f64, height_cm: f64) -> f64 {
    let age = f64::from(age);
    match sex {
        Sex::Male => 88.362 + 13.397 * weight_kg + 4.799 * height_cm - 5.677 * age,
        Sex::Female => 447.593 + 9.247 * weight_kg + 3.098 * height_cm - 4.330 * age,
    }
}

/// Estimated daily calorie need, rounded to a whole calorie
pub fn calories(
    age: u32,
    sex: Sex,
    weight_kg: f64,
    height_cm: f64,
    activity: ActivityLevel,
) -> u32 {
    let bmr = basal_metabolic_rate(age, sex, weight_kg, height_cm);
    let total = (bmr * activity.factor()).round();
    tracing::debug!(bmr, total, ?activity, "Computed calorie need");
    total.max(0.0) as u32
}

/// Daily hydration goal in ml.
///
/// Both the activity and climate multipliers are always applied.
pub fn hydration_goal(weight_kg: f64, activity: HydrationActivity, climate: Climate) -> u32 {
    let mut goal = weight_kg * ML_PER_KG;
    goal *= activity.multiplier();
    goal *= climate.multiplier();
    goal.round().max(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        let tolerance = 1e-3 * expected.abs().max(1.0);
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {} to be within {} of {}",
            actual,
            tolerance,
            expected
        );
    }

    #[test]
    fn test_convert_identity() {
        for unit in Unit::ALL {
            assert_eq!(convert(123.4, unit, unit), 123.4);
        }
    }

    #[test]
    fn test_convert_known_ratios() {
        assert_close(convert(1.0, Unit::Oz, Unit::Ml), 29.5735);
        assert_close(convert(1.0, Unit::Cups, Unit::Ml), 236.588);
        assert_close(convert(1.0, Unit::Cups, Unit::Oz), 8.0);
        assert_close(convert(1000.0, Unit::Ml, Unit::Oz), 33.814);
    }

    #[test]
    fn test_convert_round_trips_between_every_pair() {
        for amount in [0.5, 1.0, 250.0, 2000.0, 12345.678] {
            for from in Unit::ALL {
                for to in Unit::ALL {
                    let back = convert(convert(amount, from, to), to, from);
                    assert_close(back, amount);
                }
            }
        }
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(250.0, Unit::Ml), "250ml");
        assert_eq!(format_amount(236.588, Unit::Oz), "8oz");
        assert_eq!(format_amount(473.176, Unit::Cups), "2cups");
    }

    #[test]
    fn test_bmi_normal() {
        let reading = bmi(70.0, 170.0);
        assert_eq!(reading.bmi, 24.2);
        assert_eq!(reading.category, BmiCategory::Normal);
    }

    #[test]
    fn test_bmi_categories() {
        assert_eq!(bmi(50.0, 170.0).category, BmiCategory::Underweight);
        assert_eq!(bmi(80.0, 170.0).category, BmiCategory::Overweight);
        assert_eq!(bmi(100.0, 170.0).category, BmiCategory::Obese);
    }

    #[test]
    fn test_bmi_thresholds_are_upper_exclusive() {
        assert_eq!(bmi_category(18.49), BmiCategory::Underweight);
        assert_eq!(bmi_category(18.5), BmiCategory::Normal);
        assert_eq!(bmi_category(25.0), BmiCategory::Overweight);
        assert_eq!(bmi_category(30.0), BmiCategory::Obese);
    }

    #[test]
    fn test_calories_male_sedentary() {
        // 88.362 + 13.397*70 + 4.799*170 - 5.677*25 = 1700.057
        let bmr = basal_metabolic_rate(25, Sex::Male, 70.0, 170.0);
        assert_close(bmr, 1700.057);
        assert_eq!(
            calories(25, Sex::Male, 70.0, 170.0, ActivityLevel::Sedentary),
            (1700.057_f64 * 1.2).round() as u32
        );
        assert_eq!(
            calories(25, Sex::Male, 70.0, 170.0, ActivityLevel::Sedentary),
            2040
        );
    }

    #[test]
    fn test_calories_female_very_active() {
        // 447.593 + 9.247*60 + 3.098*165 - 4.330*30 = 1383.683
        let bmr = basal_metabolic_rate(30, Sex::Female, 60.0, 165.0);
        assert_close(bmr, 1383.683);
        assert_eq!(
            calories(30, Sex::Female, 60.0, 165.0, ActivityLevel::VeryActive),
            2629
        );
    }

    #[test]
    fn test_hydration_goal_without_multipliers() {
        assert_eq!(
            hydration_goal(70.0, HydrationActivity::Sedentary, Climate::Moderate),
            2310
        );
    }

    #[test]
    fn test_hydration_goal_active_hot() {
        assert_eq!(
            hydration_goal(70.0, HydrationActivity::Active, Climate::Hot),
            3881
        );
    }

    #[test]
    fn test_hydration_goal_moderate_cold() {
        // 70 * 33 * 1.2 * 0.9 = 2494.8
        assert_eq!(
            hydration_goal(70.0, HydrationActivity::Moderate, Climate::Cold),
            2495
        );
    }
}
