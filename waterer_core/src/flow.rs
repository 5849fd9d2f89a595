//! Pulse count to volume conversion.

/// Fixed flow-meter calibration: `volume_ml = pulses * 1000 / pulses_per_liter`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowCalibration {
    pub pulses_per_liter: f32,
}

impl FlowCalibration {
    pub fn new(pulses_per_liter: f32) -> Self {
        Self { pulses_per_liter }
    }

    pub fn is_valid(&self) -> bool {
        self.pulses_per_liter.is_finite() && self.pulses_per_liter > 0.0
    }

    /// Dispensed volume in milliliters for `pulses` counted edges.
    #[inline]
    pub fn volume_ml(&self, pulses: u32) -> f32 {
        // f64 intermediate keeps large counts exact before the final narrowing
        (f64::from(pulses) * 1000.0 / f64::from(self.pulses_per_liter)) as f32
    }
}

impl Default for FlowCalibration {
    fn default() -> Self {
        Self {
            pulses_per_liter: 2887.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_liter_of_pulses_is_1000_ml() {
        let cal = FlowCalibration::new(450.0);
        assert!((cal.volume_ml(450) - 1000.0).abs() < 1e-3);
        assert_eq!(cal.volume_ml(0), 0.0);
    }

    #[test]
    fn validity() {
        assert!(FlowCalibration::default().is_valid());
        assert!(!FlowCalibration::new(0.0).is_valid());
        assert!(!FlowCalibration::new(f32::NAN).is_valid());
        assert!(!FlowCalibration::new(-1.0).is_valid());
    }
}
