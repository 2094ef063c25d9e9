use super::{PrognosticsModel, SystemModel};

/// Parameters of the equivalent-circuit battery model.
#[derive(Clone, Copy, Debug)]
pub struct CircuitBatteryParams {
    /// Open-circuit voltage floor.
    pub v_l: f64,
    pub gamma: f64,
    pub beta: f64,
    pub lambda: f64,
    pub mu: f64,
    /// Initial internal resistance.
    pub rint0: f64,
    /// Initial total usable energy, J.
    pub ecrit0: f64,
    /// End-of-discharge voltage cutoff.
    pub veod: f64,
}

impl Default for CircuitBatteryParams {
    fn default() -> CircuitBatteryParams {
        CircuitBatteryParams {
            v_l: 11.1484939314367,
            gamma: 3.35528174473004,
            beta: 8.48265208876828,
            lambda: 0.0463517799905509,
            mu: 2.75931102946793,
            rint0: 0.0273193836397481,
            ecrit0: 202426.858437571,
            veod: 10.3,
        }
    }
}

/// A three-state equivalent-circuit battery: internal resistance, state of
/// charge, and critical energy. Cheap enough to run thousands of observer
/// steps in a test, which is its job here.
///
/// States: `[Rint, SOC, Ecrit]`. Input: power draw `P` (W). Output: terminal
/// voltage `Vm` (V).
#[derive(Clone, Copy, Debug, Default)]
pub struct CircuitBatteryModel {
    pub parameters: CircuitBatteryParams,
}

impl CircuitBatteryModel {
    pub const RINT: usize = 0;
    pub const SOC: usize = 1;
    pub const ECRIT: usize = 2;

    pub fn new() -> CircuitBatteryModel {
        CircuitBatteryModel::default()
    }

    /// Open-circuit voltage as a function of state of charge.
    fn open_circuit_voltage(&self, soc: f64) -> f64 {
        let p = &self.parameters;
        p.v_l + p.lambda * (p.gamma * soc).exp() - p.mu * (-p.beta * soc.sqrt()).exp()
    }

    /// Terminal voltage under a power draw, solving `Rint i^2 - Voc i + P = 0`
    /// for the current.
    fn terminal_voltage(&self, x: &[f64], power: f64) -> f64 {
        let rint = x[Self::RINT];
        let voc = self.open_circuit_voltage(x[Self::SOC]);
        let current = (voc - (voc * voc - 4.0 * rint * power).sqrt()) / (2.0 * rint);
        voc - current * rint
    }
}

impl SystemModel for CircuitBatteryModel {
    fn state_size(&self) -> usize {
        3
    }

    fn inputs(&self) -> &[&str] {
        &["power"]
    }

    fn outputs(&self) -> &[&str] {
        &["voltage"]
    }

    fn state_eqn(&self, _t: f64, x: &[f64], u: &[f64], n: &[f64], dt: f64) -> Vec<f64> {
        let power = u[0];
        let mut x_new = vec![
            x[Self::RINT],
            x[Self::SOC] - power * dt / x[Self::ECRIT],
            x[Self::ECRIT],
        ];
        for (value, noise) in x_new.iter_mut().zip(n.iter()) {
            *value += dt * noise;
        }
        x_new[Self::RINT] = x_new[Self::RINT].max(0.0);
        x_new[Self::SOC] = x_new[Self::SOC].max(0.0).min(1.0);
        x_new[Self::ECRIT] = x_new[Self::ECRIT].max(0.0);
        x_new
    }

    fn output_eqn(&self, _t: f64, x: &[f64], u: &[f64], n: &[f64]) -> Vec<f64> {
        vec![self.terminal_voltage(x, u[0]) + n[0]]
    }

    fn initialize(&self, u: &[f64], z: &[f64]) -> Vec<f64> {
        let p = &self.parameters;
        let vm = z[0];
        let current = u[0] / vm;
        let v_drop = current * p.rint0;

        // Walk the SOC curve from full charge down to the first state of
        // charge consistent with the measured voltage.
        let mut soc0 = 0.0;
        let mut soc = 1.0;
        while soc >= 0.0 {
            if self.open_circuit_voltage(soc) - v_drop <= vm {
                soc0 = soc;
                break;
            }
            soc -= 1e-4;
        }
        vec![p.rint0, soc0, p.ecrit0]
    }
}

impl PrognosticsModel for CircuitBatteryModel {
    fn events(&self) -> &[&str] {
        &["EOD"]
    }

    fn predicted_outputs(&self) -> &[&str] {
        &["SOC"]
    }

    fn threshold_eqn(&self, _t: f64, x: &[f64], u: &[f64]) -> bool {
        self.terminal_voltage(x, u[0]) <= self.parameters.veod
    }

    fn event_state_eqn(&self, x: &[f64]) -> f64 {
        x[Self::SOC]
    }

    fn predicted_output_eqn(&self, _t: f64, x: &[f64], _u: &[f64], _z: &[f64]) -> Vec<f64> {
        vec![x[Self::SOC]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_recovers_full_charge() {
        let model = CircuitBatteryModel::new();
        let full_voltage = model.open_circuit_voltage(1.0);
        let x0 = model.initialize(&[0.0], &[full_voltage + 0.1]);
        assert!((x0[CircuitBatteryModel::SOC] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn discharge_depletes_state_of_charge() {
        let model = CircuitBatteryModel::new();
        let mut x = vec![model.parameters.rint0, 1.0, model.parameters.ecrit0];
        let zeros = [0.0; 3];
        for step in 0..1000 {
            x = model.state_eqn(step as f64, &x, &[100.0], &zeros, 1.0);
        }
        // 100 kJ drawn out of ~202 kJ.
        assert!(x[CircuitBatteryModel::SOC] < 0.55);
        assert!(x[CircuitBatteryModel::SOC] > 0.45);
        assert!(model.event_state_eqn(&x) < 0.55);
        assert!(!model.threshold_eqn(0.0, &x, &[100.0]));
    }

    #[test]
    fn threshold_fires_near_depletion() {
        let model = CircuitBatteryModel::new();
        let x = vec![model.parameters.rint0, 0.01, model.parameters.ecrit0];
        assert!(model.threshold_eqn(0.0, &x, &[100.0]));
    }
}
