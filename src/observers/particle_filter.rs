use super::Observer;
use crate::config::ConfigMap;
use crate::errors::ProgError;
use crate::linalg::Matrix;
use crate::models::SystemModel;
use crate::udata::{sample, weight, UData, UType};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::f64::consts::PI;

/// Configuration key for the particle count.
pub const PARTICLE_COUNT_KEY: &str = "Observer.ParticleCount";
/// Configuration key for the per-state process-noise variance vector.
pub const PROCESS_NOISE_KEY: &str = "Observer.ProcessNoise";
/// Configuration key for the per-output sensor-noise variance vector.
pub const SENSOR_NOISE_KEY: &str = "Observer.SensorNoise";
/// Configuration key for the optional resampling threshold.
pub const MIN_EFFECTIVE_KEY: &str = "Observer.MinEffective";

/// The particle ensemble: one state and output column per particle, plus
/// the importance weights.
#[derive(Clone, Debug)]
pub struct Particles {
    pub x: Matrix,
    pub z: Matrix,
    pub w: Vec<f64>,
}

/// A sampling-importance-resampling particle filter.
///
/// Each step propagates every particle through the state equation under a
/// fresh process-noise draw, weighs it by the multivariate-gaussian
/// likelihood of the measurement, normalizes, and systematically resamples
/// whenever the effective sample size drops below the configured threshold
/// (`N / 3` by default).
pub struct ParticleFilter<M: SystemModel> {
    model: M,
    particle_count: usize,
    min_effective: f64,
    particles: Particles,
    process_noise_variance: Vec<f64>,
    sensor_noise_variance: Vec<f64>,
    r: Matrix,
    rng: StdRng,
    x_mean: Vec<f64>,
    z_mean: Vec<f64>,
    u_prev: Vec<f64>,
    last_time: f64,
    initialized: bool,
}

impl<M: SystemModel> ParticleFilter<M> {
    /// Creates a particle filter with the given ensemble size and noise
    /// variance vectors.
    pub fn new(
        model: M,
        particle_count: usize,
        process_noise_variance: Vec<f64>,
        sensor_noise_variance: Vec<f64>,
    ) -> Result<ParticleFilter<M>, ProgError> {
        if particle_count == 0 {
            return Err(ProgError::BadConfig("particle count must be positive".to_owned()));
        }
        if process_noise_variance.len() != model.state_size() {
            return Err(ProgError::BadConfig(format!(
                "process noise has {} entries, the model has {} states",
                process_noise_variance.len(),
                model.state_size()
            )));
        }
        if sensor_noise_variance.len() != model.output_size() {
            return Err(ProgError::BadConfig(format!(
                "sensor noise has {} entries, the model has {} outputs",
                sensor_noise_variance.len(),
                model.output_size()
            )));
        }

        let mut r = Matrix::new(sensor_noise_variance.len(), sensor_noise_variance.len());
        for (i, &variance) in sensor_noise_variance.iter().enumerate() {
            r[(i, i)] = variance;
        }

        let nx = model.state_size();
        let nz = model.output_size();
        let nu = model.input_size();
        Ok(ParticleFilter {
            particles: Particles {
                x: Matrix::new(nx, particle_count),
                z: Matrix::new(nz, particle_count),
                w: vec![0.0; particle_count],
            },
            min_effective: particle_count as f64 / 3.0,
            x_mean: vec![0.0; nx],
            z_mean: vec![0.0; nz],
            u_prev: vec![0.0; nu],
            model,
            particle_count,
            process_noise_variance,
            sensor_noise_variance,
            r,
            rng: StdRng::from_entropy(),
            last_time: 0.0,
            initialized: false,
        })
    }

    /// Creates a particle filter from `Observer.ParticleCount`,
    /// `Observer.ProcessNoise`, `Observer.SensorNoise` and the optional
    /// `Observer.MinEffective`.
    pub fn from_config(model: M, config: &ConfigMap) -> Result<ParticleFilter<M>, ProgError> {
        config.require_keys(&[PARTICLE_COUNT_KEY, PROCESS_NOISE_KEY, SENSOR_NOISE_KEY])?;
        let count = config.get_u64(PARTICLE_COUNT_KEY)? as usize;
        let process_noise = config.get_f64s(PROCESS_NOISE_KEY)?;
        let sensor_noise = config.get_f64s(SENSOR_NOISE_KEY)?;
        let mut filter = ParticleFilter::new(model, count, process_noise, sensor_noise)?;
        if config.has_key(MIN_EFFECTIVE_KEY) {
            filter.min_effective = config.get_f64(MIN_EFFECTIVE_KEY)?;
        }
        debug!("created particle filter with {} particles", count);
        Ok(filter)
    }

    pub fn particle_count(&self) -> usize {
        self.particle_count
    }

    /// Sets the effective-sample-size threshold below which the ensemble is
    /// resampled.
    pub fn set_min_effective(&mut self, min_effective: f64) {
        self.min_effective = min_effective;
    }

    pub fn particles(&self) -> &Particles {
        &self.particles
    }

    pub fn process_noise_variance(&self) -> &[f64] {
        &self.process_noise_variance
    }

    pub fn sensor_noise_variance(&self) -> &[f64] {
        &self.sensor_noise_variance
    }

    /// Multivariate-gaussian likelihood of observing `actual` when the
    /// particle predicts `predicted`, under sensor covariance R.
    fn likelihood(
        &self,
        actual: &[f64],
        predicted: &Matrix,
        r_inverse: &Matrix,
        r_determinant: f64,
    ) -> f64 {
        let innovation = Matrix::from_column(actual) - predicted;
        let exponent = -0.5 * (&(&innovation.transpose() * r_inverse) * &innovation)[(0, 0)];
        let nz = actual.len() as f64;
        1.0 / (2.0 * PI).powf(nz / 2.0) / r_determinant.sqrt() * exponent.exp()
    }

    fn generate_process_noise(&mut self) -> Vec<f64> {
        let rng = &mut self.rng;
        self.process_noise_variance
            .iter()
            .map(|&variance| variance.sqrt() * rng.sample::<f64, _>(StandardNormal))
            .collect()
    }

    /// Systematic resampling: one uniform offset, then a deterministic walk
    /// along the weight CDF. Shuffles particle identities without losing
    /// any and resets all weights to 1/N.
    fn systematic_resample(particles: &mut Particles, rng: &mut StdRng) {
        let n = particles.w.len();
        let mut cdf = vec![0.0; n];
        let mut acc = 0.0;
        for (i, &w) in particles.w.iter().enumerate() {
            acc += w;
            cdf[i] = acc;
        }

        let source = particles.clone();
        let u1: f64 = rng.gen_range(0.0..1.0 / n as f64);
        let mut cursor = 0;
        for p in 0..n {
            let u = u1 + (p as f64 - 1.0) / n as f64;
            while u > cdf[cursor] && cursor < n - 1 {
                cursor += 1;
            }
            for i in 0..source.x.rows() {
                particles.x[(i, p)] = source.x[(i, cursor)];
            }
            for i in 0..source.z.rows() {
                particles.z[(i, p)] = source.z[(i, cursor)];
            }
        }
        for w in particles.w.iter_mut() {
            *w = 1.0 / n as f64;
        }
    }

    fn weighted_column_mean(columns: &Matrix, weights: &[f64]) -> Vec<f64> {
        let mut mean = vec![0.0; columns.rows()];
        for (p, &w) in weights.iter().enumerate() {
            for (i, value) in mean.iter_mut().enumerate() {
                *value += w * columns[(i, p)];
            }
        }
        mean
    }
}

impl<M: SystemModel> Observer for ParticleFilter<M> {
    fn initialize(&mut self, t0: f64, x0: &[f64], u0: &[f64]) -> Result<(), ProgError> {
        debug!("initializing particle filter");
        self.rng = StdRng::from_entropy();
        self.last_time = t0;
        self.u_prev = u0.to_vec();

        let zero_noise = vec![0.0; self.model.output_size()];
        let z0 = self.model.output_eqn(t0, x0, u0, &zero_noise);
        for p in 0..self.particle_count {
            self.particles.x.set_col_slice(p, x0)?;
            self.particles.z.set_col_slice(p, &z0)?;
            self.particles.w[p] = 1.0 / self.particle_count as f64;
        }
        self.x_mean = x0.to_vec();
        self.z_mean = z0;
        self.initialized = true;
        Ok(())
    }

    fn step(&mut self, t: f64, u: &[f64], z: &[f64]) -> Result<(), ProgError> {
        trace!("particle filter step at t = {}", t);
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
        let r_inverse = self.r.inverse()?;
        let r_determinant = self.r.determinant()?;
        let zero_noise = vec![0.0; self.model.output_size()];

        // Stage the new ensemble so a failure leaves the filter untouched.
        let mut staged = self.particles.clone();
        for p in 0..self.particle_count {
            let noise = self.generate_process_noise();
            let x_prev = staged.x.col(p)?.to_vec()?;
            let x_new = self.model.state_eqn(t, &x_prev, &self.u_prev, &noise, dt);
            let z_new = self.model.output_eqn(t, &x_new, u, &zero_noise);
            let lh = self.likelihood(z, &Matrix::from_column(&z_new), &r_inverse, r_determinant);
            staged.x.set_col_slice(p, &x_new)?;
            staged.z.set_col_slice(p, &z_new)?;
            staged.w[p] = lh;
        }

        let total: f64 = staged.w.iter().sum();
        if !total.is_normal() {
            return Err(ProgError::BadInput(format!(
                "particle weights degenerate (sum = {})",
                total
            )));
        }
        for w in staged.w.iter_mut() {
            *w /= total;
        }

        let n_effective = 1.0 / staged.w.iter().map(|w| w * w).sum::<f64>();
        if n_effective < self.min_effective {
            trace!(
                "effective sample size {:.1} below {:.1}, resampling",
                n_effective,
                self.min_effective
            );
            ParticleFilter::<M>::systematic_resample(&mut staged, &mut self.rng);
        }

        self.x_mean = ParticleFilter::<M>::weighted_column_mean(&staged.x, &staged.w);
        self.z_mean = ParticleFilter::<M>::weighted_column_mean(&staged.z, &staged.w);
        self.particles = staged;
        self.u_prev = u.to_vec();
        self.last_time = t;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// One `WeightedSamples` UData per state variable, interleaving each
    /// particle's value with its weight.
    fn state_estimate(&self) -> Vec<UData> {
        let nx = self.model.state_size();
        let mut estimate = Vec::with_capacity(nx);
        for i in 0..nx {
            let mut entry = UData::sized(UType::WeightedSamples, self.particle_count);
            for p in 0..self.particle_count {
                entry.set(sample(p), self.particles.x[(i, p)]).expect("sample slot");
                entry.set(weight(p), self.particles.w[p]).expect("weight slot");
            }
            estimate.push(entry);
        }
        estimate
    }

    fn state_mean(&self) -> &[f64] {
        &self.x_mean
    }

    fn output_mean(&self) -> &[f64] {
        &self.z_mean
    }
}
