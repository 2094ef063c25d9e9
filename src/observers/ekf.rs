use super::Observer;
use crate::config::ConfigMap;
use crate::errors::ProgError;
use crate::linalg::Matrix;
use crate::models::{SystemModel, JACOBIAN_EPSILON};
use crate::udata::{covar, UData, UType, MEAN};

/// An extended Kalman filter.
///
/// Prediction propagates the mean through the state equation and the
/// covariance through the model's state Jacobian; the update uses the
/// standard gain `K = P H^T (H P H^T + R)^-1`. Models that do not override
/// the Jacobian methods are linearized by central finite differences, so
/// any [`SystemModel`] works out of the box.
///
/// Shares the UKF's configuration keys `Observer.Q` and `Observer.R`.
pub struct ExtendedKalmanFilter<M: SystemModel> {
    model: M,
    q: Matrix,
    r: Matrix,
    p: Matrix,
    epsilon: f64,
    x_estimated: Vec<f64>,
    z_estimated: Vec<f64>,
    u_prev: Vec<f64>,
    last_time: f64,
    initialized: bool,
}

impl<M: SystemModel> ExtendedKalmanFilter<M> {
    pub fn new(model: M, q: Matrix, r: Matrix) -> Result<ExtendedKalmanFilter<M>, ProgError> {
        let nx = model.state_size();
        let nz = model.output_size();
        if !q.is_square() || q.rows() != nx {
            return Err(ProgError::BadConfig(format!(
                "Q must be {}x{}, got {}x{}",
                nx,
                nx,
                q.rows(),
                q.cols()
            )));
        }
        if !r.is_square() || r.rows() != nz {
            return Err(ProgError::BadConfig(format!(
                "R must be {}x{}, got {}x{}",
                nz,
                nz,
                r.rows(),
                r.cols()
            )));
        }
        Ok(ExtendedKalmanFilter {
            epsilon: JACOBIAN_EPSILON,
            x_estimated: vec![0.0; nx],
            z_estimated: vec![0.0; nz],
            u_prev: vec![0.0; model.input_size()],
            p: Matrix::new(nx, nx),
            model,
            q,
            r,
            last_time: 0.0,
            initialized: false,
        })
    }

    /// Creates an EKF from `Observer.Q` and `Observer.R`.
    pub fn from_config(model: M, config: &ConfigMap) -> Result<ExtendedKalmanFilter<M>, ProgError> {
        config.require_keys(&[super::ukf::Q_KEY, super::ukf::R_KEY])?;
        let q = super::ukf::square_from_values(super::ukf::Q_KEY, &config.get_f64s(super::ukf::Q_KEY)?)?;
        let r = super::ukf::square_from_values(super::ukf::R_KEY, &config.get_f64s(super::ukf::R_KEY)?)?;
        ExtendedKalmanFilter::new(model, q, r)
    }

    /// Sets the finite-difference step used for the Jacobians.
    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon;
    }

    /// The posterior state covariance.
    pub fn covariance(&self) -> &Matrix {
        &self.p
    }

    fn predict_output(&self, t: f64, x: &[f64], u: &[f64]) -> Vec<f64> {
        let zero_noise = vec![0.0; self.model.output_size()];
        self.model.output_eqn(t, x, u, &zero_noise)
    }
}

impl<M: SystemModel> Observer for ExtendedKalmanFilter<M> {
    fn initialize(&mut self, t0: f64, x0: &[f64], u0: &[f64]) -> Result<(), ProgError> {
        debug!("initializing EKF");
        self.last_time = t0;
        self.x_estimated = x0.to_vec();
        self.u_prev = u0.to_vec();
        self.p = self.q.clone();
        self.z_estimated = self.predict_output(t0, x0, u0);
        self.initialized = true;
        Ok(())
    }

    fn step(&mut self, t: f64, u: &[f64], z: &[f64]) -> Result<(), ProgError> {
        trace!("EKF step at t = {}", t);
        if !self.initialized {
            return Err(ProgError::NotInitialized);
        }
        if t - self.last_time <= 0.0 {
            return Err(ProgError::BadInput(format!(
                "time has not advanced: {} <= {}",
                t, self.last_time
            )));
        }
        let dt = t - self.last_time;
        let nx = self.model.state_size();
        let zero_noise_x = vec![0.0; nx];
        let zero_noise_z = vec![0.0; self.model.output_size()];

        // Predict.
        let f = self
            .model
            .state_jacobian(t, &self.x_estimated, &self.u_prev, &zero_noise_x, dt, self.epsilon);
        let x_hat = self
            .model
            .state_eqn(t, &self.x_estimated, &self.u_prev, &zero_noise_x, dt);
        let p_hat = &(&f * &self.p) * &f.transpose() + &self.q;

        // Update.
        let h = self.model.output_jacobian(t, &x_hat, u, &zero_noise_z, self.epsilon);
        let z_hat = self.model.output_eqn(t, &x_hat, u, &zero_noise_z);
        let innovation_cov = &(&h * &p_hat) * &h.transpose() + &self.r;
        let gain = &(&p_hat * &h.transpose()) * &innovation_cov.inverse()?;
        let innovation = Matrix::from_column(z) - &Matrix::from_column(&z_hat);
        let x_new = (Matrix::from_column(&x_hat) + &gain * &innovation).to_vec()?;
        let p_new = (Matrix::identity(nx) - &gain * &h) * p_hat;
        let z_new = self.predict_output(t, &x_new, u);

        self.x_estimated = x_new;
        self.z_estimated = z_new;
        self.p = p_new;
        self.u_prev = u.to_vec();
        self.last_time = t;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// One `MeanCovar` UData per state variable, with the covariance slots
    /// holding that variable's row of P.
    fn state_estimate(&self) -> Vec<UData> {
        let nx = self.model.state_size();
        let mut estimate = Vec::with_capacity(nx);
        for i in 0..nx {
            let mut entry = UData::sized(UType::MeanCovar, nx);
            entry.set(MEAN, self.x_estimated[i]).expect("mean slot");
            let row = self.p.row(i).expect("covariance row").to_vec().expect("row vector");
            entry.set_vec(covar(0), &row).expect("covariance slots");
            estimate.push(entry);
        }
        estimate
    }

    fn state_mean(&self) -> &[f64] {
        &self.x_estimated
    }

    fn output_mean(&self) -> &[f64] {
        &self.z_estimated
    }
}
