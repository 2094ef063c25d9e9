use super::Observer;
use crate::config::ConfigMap;
use crate::errors::ProgError;
use crate::linalg::Matrix;
use crate::models::SystemModel;
use crate::udata::{covar, UData, UType, MEAN};

/// Configuration key for the process-noise covariance (row-major, n^2).
pub const Q_KEY: &str = "Observer.Q";
/// Configuration key for the measurement-noise covariance (row-major, n^2).
pub const R_KEY: &str = "Observer.R";
/// Configuration keys for the optional sigma-point tuning scalars.
pub const KAPPA_KEY: &str = "Observer.kappa";
pub const ALPHA_KEY: &str = "Observer.alpha";
pub const BETA_KEY: &str = "Observer.beta";

/// Parses a row-major value list into the square matrix it describes.
pub(crate) fn square_from_values(key: &str, values: &[f64]) -> Result<Matrix, ProgError> {
    let dim = (values.len() as f64).sqrt().round() as usize;
    if dim * dim != values.len() {
        return Err(ProgError::BadConfig(format!(
            "{} cannot describe a square matrix ({} values)",
            key,
            values.len()
        )));
    }
    Matrix::from_row_major(dim, dim, values)
}

/// The deterministically chosen sample set of the unscented transform.
#[derive(Clone, Debug)]
pub struct SigmaPoints {
    /// One sigma point per column; `2n + 1` columns.
    pub points: Matrix,
    /// Recombination weight of each column.
    pub weights: Vec<f64>,
    pub kappa: f64,
    pub alpha: f64,
    pub beta: f64,
}

/// An unscented Kalman filter.
///
/// Instead of linearizing the model, the UKF pushes a deterministic set of
/// sigma points through the state and output equations and recombines them
/// by weighted mean and covariance. The sigma spread for the state
/// prediction is taken from Q (the augmented-form shortcut); covariance
/// regrowth comes from the additive Q in the predicted covariance, and the
/// measurement update redraws its sigma points from the predicted
/// covariance so the gain sees the full prior spread.
///
/// Tuning defaults: `kappa = 3 - n_x`, `alpha = 1`, `beta = 0`.
pub struct UnscentedKalmanFilter<M: SystemModel> {
    model: M,
    q: Matrix,
    r: Matrix,
    p: Matrix,
    kappa: f64,
    alpha: f64,
    beta: f64,
    x_estimated: Vec<f64>,
    z_estimated: Vec<f64>,
    u_prev: Vec<f64>,
    last_time: f64,
    initialized: bool,
}

impl<M: SystemModel> UnscentedKalmanFilter<M> {
    /// Creates a UKF with the given process and measurement noise
    /// covariances.
    pub fn new(model: M, q: Matrix, r: Matrix) -> Result<UnscentedKalmanFilter<M>, ProgError> {
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
        Ok(UnscentedKalmanFilter {
            kappa: 3.0 - nx as f64,
            alpha: 1.0,
            beta: 0.0,
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

    /// Creates a UKF from `Observer.Q`, `Observer.R` and the optional
    /// tuning keys.
    pub fn from_config(model: M, config: &ConfigMap) -> Result<UnscentedKalmanFilter<M>, ProgError> {
        config.require_keys(&[Q_KEY, R_KEY])?;
        let q = square_from_values(Q_KEY, &config.get_f64s(Q_KEY)?)?;
        let r = square_from_values(R_KEY, &config.get_f64s(R_KEY)?)?;
        let mut ukf = UnscentedKalmanFilter::new(model, q, r)?;
        if config.has_key(KAPPA_KEY) {
            ukf.kappa = config.get_f64(KAPPA_KEY)?;
        }
        if config.has_key(ALPHA_KEY) {
            ukf.alpha = config.get_f64(ALPHA_KEY)?;
        }
        if config.has_key(BETA_KEY) {
            ukf.beta = config.get_f64(BETA_KEY)?;
        }
        info!("created UKF over a {}-state model", ukf.model.state_size());
        Ok(ukf)
    }

    pub fn set_kappa(&mut self, kappa: f64) {
        self.kappa = kappa;
    }

    pub fn set_alpha(&mut self, alpha: f64) {
        self.alpha = alpha;
    }

    pub fn set_beta(&mut self, beta: f64) {
        self.beta = beta;
    }

    /// The posterior state covariance.
    pub fn covariance(&self) -> &Matrix {
        &self.p
    }

    /// Computes the scaled sigma points of the distribution `(mean, cov)`.
    ///
    /// Column 0 is the mean; columns `1..=n` add the columns of
    /// `chol((n + kappa) cov)` and columns `n+1..=2n` subtract them. The
    /// alpha scaling then contracts every non-central point toward the mean
    /// and rebalances the weights.
    pub fn compute_sigma_points(
        mean: &[f64],
        cov: &Matrix,
        kappa: f64,
        alpha: f64,
        beta: f64,
    ) -> Result<SigmaPoints, ProgError> {
        let n = mean.len();
        let count = 2 * n + 1;
        let spread = (cov * (n as f64 + kappa)).chol()?;

        let mut points = Matrix::new(n, count);
        points.set_col_slice(0, mean)?;
        for j in 0..n {
            for i in 0..n {
                points[(i, j + 1)] = mean[i] + spread[(i, j)];
                points[(i, j + n + 1)] = mean[i] - spread[(i, j)];
            }
        }

        let mut weights = vec![0.5 / (n as f64 + kappa); count];
        weights[0] = kappa / (n as f64 + kappa);

        // Scale points and weights for alpha.
        for j in 1..count {
            for i in 0..n {
                points[(i, j)] = mean[i] + alpha * (points[(i, j)] - mean[i]);
            }
        }
        let alpha2 = alpha * alpha;
        weights[0] = weights[0] / alpha2 + (1.0 / alpha2 - 1.0);
        for w in weights.iter_mut().skip(1) {
            *w /= alpha2;
        }

        Ok(SigmaPoints {
            points,
            weights,
            kappa,
            alpha,
            beta,
        })
    }

    fn predict_output(&self, t: f64, x: &[f64], u: &[f64]) -> Vec<f64> {
        let zero_noise = vec![0.0; self.model.output_size()];
        self.model.output_eqn(t, x, u, &zero_noise)
    }
}

impl<M: SystemModel> Observer for UnscentedKalmanFilter<M> {
    fn initialize(&mut self, t0: f64, x0: &[f64], u0: &[f64]) -> Result<(), ProgError> {
        debug!("initializing UKF");
        // Validates that Q spreads into sigma points before committing.
        UnscentedKalmanFilter::<M>::compute_sigma_points(
            x0, &self.q, self.kappa, self.alpha, self.beta,
        )?;

        self.last_time = t0;
        self.x_estimated = x0.to_vec();
        self.u_prev = u0.to_vec();
        self.p = self.q.clone();
        self.z_estimated = self.predict_output(t0, x0, u0);
        self.initialized = true;
        Ok(())
    }

    fn step(&mut self, t: f64, u: &[f64], z: &[f64]) -> Result<(), ProgError> {
        trace!("UKF step at t = {}", t);
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
        let nz = self.model.output_size();
        let zero_noise_x = vec![0.0; nx];
        let zero_noise_z = vec![0.0; nz];

        // Predict: spread sigma points from Q around the current estimate
        // and push them through the state equation.
        let sigma = UnscentedKalmanFilter::<M>::compute_sigma_points(
            &self.x_estimated,
            &self.q,
            self.kappa,
            self.alpha,
            self.beta,
        )?;
        let count = 2 * nx + 1;
        let mut xkk1 = Matrix::new(nx, count);
        for j in 0..count {
            let x_j = sigma.points.col(j)?.to_vec()?;
            let propagated = self.model.state_eqn(t, &x_j, &self.u_prev, &zero_noise_x, dt);
            xkk1.set_col_slice(j, &propagated)?;
        }

        let w = Matrix::from_column(&sigma.weights);
        let x_hat = xkk1.weighted_mean(&w)?;
        let p_hat = xkk1.weighted_covariance(&w, self.alpha, self.beta)? + &self.q;

        // Update: redraw sigma points from the predicted covariance and push
        // them through the output equation.
        let x_hat_vec = x_hat.to_vec()?;
        let sigma_upd = UnscentedKalmanFilter::<M>::compute_sigma_points(
            &x_hat_vec, &p_hat, self.kappa, self.alpha, self.beta,
        )?;
        let mut zkk1 = Matrix::new(nz, count);
        for j in 0..count {
            let x_j = sigma_upd.points.col(j)?.to_vec()?;
            let predicted = self.model.output_eqn(t, &x_j, u, &zero_noise_z);
            zkk1.set_col_slice(j, &predicted)?;
        }

        let z_hat = zkk1.weighted_mean(&w)?;
        let pzz = zkk1.weighted_covariance(&w, self.alpha, self.beta)? + &self.r;

        // State-output cross covariance.
        let mut pxz = Matrix::new(nx, nz);
        for j in 0..count {
            let dx = sigma_upd.points.col(j)? - &x_hat;
            let dz = zkk1.col(j)? - &z_hat;
            pxz += &(&(&dx * &dz.transpose()) * sigma.weights[j]);
        }

        let gain = &pxz * &pzz.inverse()?;
        let innovation = Matrix::from_column(z) - &z_hat;
        let x_new = (&x_hat + &(&gain * &innovation)).to_vec()?;
        let p_new = p_hat - &(&gain * &pzz) * &gain.transpose();
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
