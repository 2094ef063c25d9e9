use crate::linalg::Matrix;

/// The battery equivalent-circuit fixture model.
pub mod circuit_battery;

/// The battery electrochemistry fixture model.
pub mod battery;

pub use self::battery::BatteryModel;
pub use self::circuit_battery::CircuitBatteryModel;

/// Default finite-difference step for the Jacobian methods.
pub const JACOBIAN_EPSILON: f64 = 1e-2;

/// A discrete-time non-linear state-space model of a physical system.
///
/// The state equation advances the state vector by one time step, the output
/// equation predicts the measurements, and `initialize` inverts a first
/// measurement into an initial state. All equations are pure functions of
/// their arguments: given the same state, input and noise vectors they must
/// return the same result, which is what lets the Monte-Carlo predictor call
/// them from many threads at once.
///
/// `n` is an additive noise vector sized like the state (state equation) or
/// the output (output equation); observers pass zeros when they want the
/// deterministic part only.
pub trait SystemModel {
    /// The number of values in the state vector.
    fn state_size(&self) -> usize;

    /// The symbolic names of the input channels; their count fixes the input
    /// vector size.
    fn inputs(&self) -> &[&str];

    /// The symbolic names of the output channels; their count fixes the
    /// output vector size.
    fn outputs(&self) -> &[&str];

    fn input_size(&self) -> usize {
        self.inputs().len()
    }

    fn output_size(&self) -> usize {
        self.outputs().len()
    }

    /// The integration step used when no explicit step is requested.
    fn default_time_step(&self) -> f64 {
        1.0
    }

    /// Computes the state at `t + dt` from the state at `t`.
    fn state_eqn(&self, t: f64, x: &[f64], u: &[f64], n: &[f64], dt: f64) -> Vec<f64>;

    /// Predicts the measurement for the state at `t`.
    fn output_eqn(&self, t: f64, x: &[f64], u: &[f64], n: &[f64]) -> Vec<f64>;

    /// Derives an initial state from a first input and measurement.
    fn initialize(&self, u: &[f64], z: &[f64]) -> Vec<f64>;

    /// Central finite-difference Jacobian of the state equation with respect
    /// to the state, with perturbations of `epsilon / 2` on either side.
    /// Models that know an analytic Jacobian override this.
    fn state_jacobian(
        &self,
        t: f64,
        x: &[f64],
        u: &[f64],
        n: &[f64],
        dt: f64,
        epsilon: f64,
    ) -> Matrix {
        let nx = self.state_size();
        let mut jacobian = Matrix::new(nx, nx);
        for i in 0..nx {
            let mut x_plus = x.to_vec();
            let mut x_minus = x.to_vec();
            x_plus[i] += epsilon / 2.0;
            x_minus[i] -= epsilon / 2.0;
            let f_plus = self.state_eqn(t, &x_plus, u, n, dt);
            let f_minus = self.state_eqn(t, &x_minus, u, n, dt);
            for row in 0..nx {
                jacobian[(row, i)] = (f_plus[row] - f_minus[row]) / epsilon;
            }
        }
        jacobian
    }

    /// Central finite-difference Jacobian of the output equation with
    /// respect to the state.
    fn output_jacobian(&self, t: f64, x: &[f64], u: &[f64], n: &[f64], epsilon: f64) -> Matrix {
        let nx = self.state_size();
        let nz = self.output_size();
        let mut jacobian = Matrix::new(nz, nx);
        for i in 0..nx {
            let mut x_plus = x.to_vec();
            let mut x_minus = x.to_vec();
            x_plus[i] += epsilon / 2.0;
            x_minus[i] -= epsilon / 2.0;
            let h_plus = self.output_eqn(t, &x_plus, u, n);
            let h_minus = self.output_eqn(t, &x_minus, u, n);
            for row in 0..nz {
                jacobian[(row, i)] = (h_plus[row] - h_minus[row]) / epsilon;
            }
        }
        jacobian
    }
}

/// A [`SystemModel`] extended with the equations prognostics needs: a
/// failure-threshold predicate, a scalar health indicator, and the output
/// channels the user wants projected forward.
pub trait PrognosticsModel: SystemModel {
    /// The symbolic names of the events this model can predict.
    fn events(&self) -> &[&str];

    /// The symbolic names of the predicted outputs; their count fixes the
    /// predicted output vector size.
    fn predicted_outputs(&self) -> &[&str];

    /// The number of parameters consumed per load-estimate sample.
    fn input_parameter_count(&self) -> usize {
        self.input_size()
    }

    /// Whether the failure threshold has been reached.
    fn threshold_eqn(&self, t: f64, x: &[f64], u: &[f64]) -> bool;

    /// A health indicator in [0, 1], monotonically decreasing from 1
    /// (healthy) to 0 (event reached).
    fn event_state_eqn(&self, x: &[f64]) -> f64;

    /// Computes the predicted outputs for the state at `t`.
    fn predicted_output_eqn(&self, t: f64, x: &[f64], u: &[f64], z: &[f64]) -> Vec<f64>;
}
