use super::{PrognosticsModel, SystemModel};

/// Universal gas constant, J/(K mol).
const GAS_CONSTANT: f64 = 8.3144621;
/// Faraday constant, C/mol.
const FARADAY: f64 = 96487.0;

/// Default mobile Li-ion charge, C.
pub const QMOBILE_DEFAULT: f64 = 7600.0;
/// Default total electrode volume, m^3.
pub const VOL_DEFAULT: f64 = 2e-5;

/// Parameters of the electrochemistry battery model. The derived quantities
/// (total charge capacity, per-volume charge bounds) are recomputed by
/// [`BatteryModel::set_parameters`] whenever the primary ones change.
#[derive(Clone, Debug)]
pub struct BatteryParams {
    /// Mobile Li-ion charge, C.
    pub q_mobile: f64,
    /// Mole-fraction bounds of the negative electrode.
    pub xn_max: f64,
    pub xn_min: f64,
    /// Mole-fraction bounds of the positive electrode.
    pub xp_max: f64,
    pub xp_min: f64,
    /// Ohmic resistance.
    pub ro: f64,
    /// Butler-Volmer symmetry factor.
    pub alpha: f64,
    /// Electrode surface areas.
    pub sn: f64,
    pub sp: f64,
    /// Lumped exchange-current coefficients.
    pub kn: f64,
    pub kp: f64,
    /// Total electrode volume and the fraction of it at the surface.
    pub vol: f64,
    pub vol_s_fraction: f64,
    /// Bulk-to-surface diffusion time constant.
    pub t_diffusion: f64,
    /// Ohmic, negative-surface and positive-surface overpotential time
    /// constants.
    pub to: f64,
    pub tsn: f64,
    pub tsp: f64,
    /// Reference electrode potentials.
    pub u0p: f64,
    pub u0n: f64,
    /// End-of-discharge voltage threshold.
    pub veod: f64,
    /// Redlich-Kister expansion coefficients for each electrode.
    pub a_n: [f64; 13],
    pub a_p: [f64; 13],

    // Derived.
    pub q_max: f64,
    pub vol_s: f64,
    pub vol_b: f64,
    pub q_s_max: f64,
    pub q_b_max: f64,
    pub qn_max: f64,
}

/// An electro-chemical model of a lithium-ion battery discharging toward an
/// end-of-discharge voltage threshold.
///
/// States: bulk temperature, ohmic overpotential, surface overpotentials,
/// and the bulk/surface charges of both electrodes. Input: power draw (W).
/// Outputs: measured temperature (degC) and terminal voltage (V). The single
/// event is end of discharge; the predicted output is the state of charge.
#[derive(Clone, Debug)]
pub struct BatteryModel {
    pub parameters: BatteryParams,
}

impl Default for BatteryModel {
    fn default() -> BatteryModel {
        BatteryModel::new()
    }
}

impl BatteryModel {
    pub const TB: usize = 0;
    pub const VO: usize = 1;
    pub const VSN: usize = 2;
    pub const VSP: usize = 3;
    pub const QN_B: usize = 4;
    pub const QN_S: usize = 5;
    pub const QP_B: usize = 6;
    pub const QP_S: usize = 7;

    pub fn new() -> BatteryModel {
        let mut a_n = [0.0; 13];
        a_n[0] = -86.30243;
        let mut a_p = [0.0; 13];
        a_p[0] = -53000.0;

        let mut model = BatteryModel {
            parameters: BatteryParams {
                q_mobile: QMOBILE_DEFAULT,
                xn_max: 0.6,
                xn_min: 0.0,
                xp_max: 1.0,
                xp_min: 0.4,
                ro: 0.085,
                alpha: 0.5,
                sn: 0.000437545,
                sp: 0.00030962,
                kn: 2120.96,
                kp: 248898.0,
                vol: VOL_DEFAULT,
                vol_s_fraction: 0.1,
                t_diffusion: 7e6,
                to: 6.08671,
                tsn: 90.31,
                tsp: 46.4311,
                u0p: 4.03,
                u0n: 0.01,
                veod: 3.0,
                a_n,
                a_p,
                q_max: 0.0,
                vol_s: 0.0,
                vol_b: 0.0,
                q_s_max: 0.0,
                q_b_max: 0.0,
                qn_max: 0.0,
            },
        };
        model.set_parameters(QMOBILE_DEFAULT, VOL_DEFAULT);
        model
    }

    /// Sets the mobile charge and electrode volume and recomputes every
    /// derived parameter.
    pub fn set_parameters(&mut self, q_mobile: f64, vol: f64) {
        let p = &mut self.parameters;
        p.q_mobile = q_mobile;
        p.vol = vol;
        p.q_max = p.q_mobile / (p.xn_max - p.xn_min);
        p.vol_s = p.vol_s_fraction * p.vol;
        p.vol_b = p.vol - p.vol_s;
        p.q_s_max = p.q_max * p.vol_s / p.vol;
        p.q_b_max = p.q_max * p.vol_b / p.vol;
        p.qn_max = p.q_max * p.xn_max;
    }

    /// Redlich-Kister electrode potential at surface mole fraction `x_s`.
    fn electrode_potential(&self, x_s: f64, u0: f64, a: &[f64; 13], tb: f64) -> f64 {
        let x_s = x_s.max(1e-6).min(1.0 - 1e-6);
        let y = 2.0 * x_s - 1.0;
        let mut v = u0 + GAS_CONSTANT * tb / FARADAY * ((1.0 - x_s) / x_s).ln();
        for (i, &a_i) in a.iter().enumerate() {
            let term = if i == 0 {
                y
            } else {
                y.powi(i as i32 + 1) - 2.0 * x_s * i as f64 * (1.0 - x_s) * y.powi(i as i32 - 1)
            };
            v += a_i * term / FARADAY;
        }
        v
    }

    /// Noise-free terminal voltage for the given state.
    fn voltage(&self, x: &[f64]) -> f64 {
        let p = &self.parameters;
        let tb = x[Self::TB];
        let xn_s = x[Self::QN_S] / p.q_s_max;
        let xp_s = x[Self::QP_S] / p.q_s_max;
        let ven = self.electrode_potential(xn_s, p.u0n, &p.a_n, tb);
        let vep = self.electrode_potential(xp_s, p.u0p, &p.a_p, tb);
        vep - ven - x[Self::VO] - x[Self::VSN] - x[Self::VSP]
    }

    /// The state with both electrodes equilibrated at the given positive
    /// mole fraction and no overpotentials.
    fn rest_state(&self, xp: f64, tb: f64) -> Vec<f64> {
        let p = &self.parameters;
        let xn = p.xn_max * (p.xp_max - xp) / (p.xp_max - p.xp_min);
        vec![
            tb,
            0.0,
            0.0,
            0.0,
            xn * p.q_b_max,
            xn * p.q_s_max,
            xp * p.q_b_max,
            xp * p.q_s_max,
        ]
    }
}

impl SystemModel for BatteryModel {
    fn state_size(&self) -> usize {
        8
    }

    fn inputs(&self) -> &[&str] {
        &["power"]
    }

    fn outputs(&self) -> &[&str] {
        &["temperature", "voltage"]
    }

    fn state_eqn(&self, _t: f64, x: &[f64], u: &[f64], n: &[f64], dt: f64) -> Vec<f64> {
        let p = &self.parameters;
        let tb = x[Self::TB];
        let power = u[0];

        let cn_bulk = x[Self::QN_B] / p.vol_b;
        let cn_surface = x[Self::QN_S] / p.vol_s;
        let cp_bulk = x[Self::QP_B] / p.vol_b;
        let cp_surface = x[Self::QP_S] / p.vol_s;
        let xn_s = (x[Self::QN_S] / p.q_s_max).max(1e-6).min(1.0 - 1e-6);
        let xp_s = (x[Self::QP_S] / p.q_s_max).max(1e-6).min(1.0 - 1e-6);

        let diffusion_n = (cn_bulk - cn_surface) / p.t_diffusion;
        let diffusion_p = (cp_bulk - cp_surface) / p.t_diffusion;

        let v = self.voltage(x);
        let current = power / v;

        let jn = current / p.sn;
        let jp = current / p.sp;
        let jn0 = p.kn * (1.0 - xn_s).powf(p.alpha) * xn_s.powf(p.alpha);
        let jp0 = p.kp * (1.0 - xp_s).powf(p.alpha) * xp_s.powf(p.alpha);
        let thermal_voltage = GAS_CONSTANT * tb / (FARADAY * p.alpha);
        let vsn_nominal = thermal_voltage * (jn / (2.0 * jn0)).asinh();
        let vsp_nominal = thermal_voltage * (jp / (2.0 * jp0)).asinh();
        let vo_nominal = current * p.ro;

        let dx = [
            0.0,
            (vo_nominal - x[Self::VO]) / p.to,
            (vsn_nominal - x[Self::VSN]) / p.tsn,
            (vsp_nominal - x[Self::VSP]) / p.tsp,
            -diffusion_n,
            diffusion_n - current,
            -diffusion_p,
            diffusion_p + current,
        ];

        x.iter()
            .zip(dx.iter())
            .zip(n.iter())
            .map(|((&xi, &dxi), &ni)| xi + dxi * dt + ni * dt)
            .collect()
    }

    fn output_eqn(&self, _t: f64, x: &[f64], _u: &[f64], n: &[f64]) -> Vec<f64> {
        vec![x[Self::TB] - 273.15 + n[0], self.voltage(x) + n[1]]
    }

    fn initialize(&self, _u: &[f64], z: &[f64]) -> Vec<f64> {
        let p = &self.parameters;
        let tb = z[0] + 273.15;
        let vm = z[1];

        // Walk the rest-voltage curve from full charge toward depletion and
        // stop at the first mole fraction consistent with the measurement. A
        // measurement above the full-charge voltage clips to full charge.
        let mut xp = p.xp_min;
        while xp < p.xp_max {
            let candidate = self.rest_state(xp, tb);
            if self.voltage(&candidate) <= vm {
                break;
            }
            xp += 1e-4;
        }
        self.rest_state(xp.min(p.xp_max), tb)
    }
}

impl PrognosticsModel for BatteryModel {
    fn events(&self) -> &[&str] {
        &["EOD"]
    }

    fn predicted_outputs(&self) -> &[&str] {
        &["SOC"]
    }

    fn threshold_eqn(&self, _t: f64, x: &[f64], _u: &[f64]) -> bool {
        self.voltage(x) <= self.parameters.veod
    }

    fn event_state_eqn(&self, x: &[f64]) -> f64 {
        (x[Self::QN_B] + x[Self::QN_S]) / self.parameters.qn_max
    }

    fn predicted_output_eqn(&self, _t: f64, x: &[f64], _u: &[f64], _z: &[f64]) -> Vec<f64> {
        vec![self.event_state_eqn(x)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZERO_STATE_NOISE: [f64; 8] = [0.0; 8];

    #[test]
    fn initialize_from_full_charge_measurement() {
        let model = BatteryModel::new();
        let x0 = model.initialize(&[0.0], &[20.0, 4.2]);
        assert!((x0[BatteryModel::TB] - 293.15).abs() < 1e-9);
        assert!((model.event_state_eqn(&x0) - 1.0).abs() < 1e-3);
        // Fully charged and at rest: above the EOD threshold.
        assert!(!model.threshold_eqn(0.0, &x0, &[0.0]));
        let z = model.output_eqn(0.0, &x0, &[0.0], &[0.0, 0.0]);
        assert!((z[0] - 20.0).abs() < 1e-9);
        assert!(z[1] > 4.0 && z[1] < 4.3);
    }

    #[test]
    fn initialize_from_partial_charge_measurement() {
        let model = BatteryModel::new();
        let x0 = model.initialize(&[0.0], &[20.0, 3.7]);
        let soc = model.event_state_eqn(&x0);
        assert!(soc > 0.1 && soc < 0.9);
        let z = model.output_eqn(0.0, &x0, &[0.0], &[0.0, 0.0]);
        assert!((z[1] - 3.7).abs() < 0.01);
    }

    #[test]
    fn constant_power_discharge_reaches_threshold() {
        let model = BatteryModel::new();
        let mut x = model.initialize(&[0.0], &[20.0, 4.2]);
        let load = [8.0];
        let mut toe = f64::INFINITY;
        for step in 0..5000 {
            let t = step as f64;
            if model.threshold_eqn(t, &x, &load) {
                toe = t;
                break;
            }
            x = model.state_eqn(t, &x, &load, &ZERO_STATE_NOISE, 1.0);
        }
        assert!(
            toe > 2500.0 && toe < 3500.0,
            "end of discharge at {} s",
            toe
        );
        // Health decreased along the way and the voltage is at the cutoff.
        assert!(model.event_state_eqn(&x) < 0.3);
    }

    #[test]
    fn event_state_decreases_monotonically_under_load() {
        let model = BatteryModel::new();
        let mut x = model.initialize(&[0.0], &[20.0, 4.2]);
        let load = [8.0];
        let mut previous = model.event_state_eqn(&x);
        for step in 0..1000 {
            x = model.state_eqn(step as f64, &x, &load, &ZERO_STATE_NOISE, 1.0);
            let current = model.event_state_eqn(&x);
            assert!(current <= previous + 1e-12);
            previous = current;
        }
    }
}
