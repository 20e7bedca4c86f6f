/// Length units seen across the upstream sources. MHM reports millimeters,
/// the PI historian reports feet, the dashboard displays inches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LengthUnit {
    Millimeters,
    Feet,
    Inches,
}

impl LengthUnit {
    fn inches_per_unit(self) -> f64 {
        match self {
            LengthUnit::Millimeters => 1.0 / 25.4,
            LengthUnit::Feet => 12.0,
            LengthUnit::Inches => 1.0,
        }
    }
}

/// Converts a reading between length units, rounded to two decimals for
/// display output. A missing reading stays missing.
pub fn convert_length(value: Option<f64>, from: LengthUnit, to: LengthUnit) -> Option<f64> {
    value.map(|v| round2(v * from.inches_per_unit() / to.inches_per_unit()))
}

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_reading_stays_missing() {
        assert_eq!(convert_length(None, LengthUnit::Millimeters, LengthUnit::Inches), None);
        assert_eq!(convert_length(None, LengthUnit::Feet, LengthUnit::Inches), None);
    }

    #[test]
    fn millimeters_to_inches() {
        assert_eq!(convert_length(Some(25.4), LengthUnit::Millimeters, LengthUnit::Inches), Some(1.0));
        assert_eq!(convert_length(Some(208.0), LengthUnit::Millimeters, LengthUnit::Inches), Some(8.19));
    }

    #[test]
    fn feet_to_inches() {
        assert_eq!(convert_length(Some(1.0), LengthUnit::Feet, LengthUnit::Inches), Some(12.0));
        assert_eq!(convert_length(Some(2.5), LengthUnit::Feet, LengthUnit::Inches), Some(30.0));
    }

    #[test]
    fn identity_conversion_still_rounds() {
        assert_eq!(convert_length(Some(1.005), LengthUnit::Inches, LengthUnit::Inches), Some(1.0));
        assert_eq!(convert_length(Some(3.14159), LengthUnit::Inches, LengthUnit::Inches), Some(3.14));
    }
}
