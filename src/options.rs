use num_traits::cast;

use crate::{Error, Float};

/// Immutable integration settings.
///
/// All magnitudes are stored as absolute values, and the minimum step size never exceeds the
/// maximum step size. Use [`Options::new`] or [`OptionsBuilder`] to construct one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Options<F: Float> {
    dt: F,
    tol: F,
    dt_max: F,
    dt_min: F,
    t_start: F,
}

impl<F: Float> Options<F> {
    /// Validate and construct options.
    ///
    /// # Arguments
    ///
    /// * `dt`: The step size used by fixed-step methods.
    /// * `tol`: The local error tolerance used by adaptive methods.
    /// * `dt_max`: The largest step an adaptive method may take.
    /// * `dt_min`: The smallest step an adaptive method may take.
    /// * `t_start`: The time at which the initial condition is given.
    ///
    /// # Result
    ///
    /// An error if any magnitude is zero or not finite, or if `|dt_min| > |dt_max|`.
    pub fn new(dt: F, tol: F, dt_max: F, dt_min: F, t_start: F) -> Result<Self, Error<F>> {
        let dt = magnitude("dt", dt)?;
        let tol = magnitude("tol", tol)?;
        let dt_max = magnitude("dt_max", dt_max)?;
        let dt_min = magnitude("dt_min", dt_min)?;
        if !t_start.is_finite() {
            return Err(Error::NonFinite {
                name: "t_start",
                value: t_start,
            });
        }
        if dt_min > dt_max {
            return Err(Error::StepBounds { dt_min, dt_max });
        }
        Ok(Self {
            dt,
            tol,
            dt_max,
            dt_min,
            t_start,
        })
    }

    /// Start building options from the defaults.
    pub fn builder() -> OptionsBuilder<F> {
        OptionsBuilder::default()
    }

    /// The fixed step size.
    pub fn dt(&self) -> F {
        self.dt
    }
    /// The local error tolerance.
    pub fn tol(&self) -> F {
        self.tol
    }
    /// The maximum adaptive step size.
    pub fn dt_max(&self) -> F {
        self.dt_max
    }
    /// The minimum adaptive step size.
    pub fn dt_min(&self) -> F {
        self.dt_min
    }
    /// The time of the initial condition.
    pub fn t_start(&self) -> F {
        self.t_start
    }

    /// Clamp a proposed adaptive step size into `[dt_min, dt_max]`.
    pub(crate) fn clamp_step_size(&self, dt: F) -> F {
        dt.max(self.dt_min).min(self.dt_max)
    }
}

impl<F: Float> Default for Options<F> {
    fn default() -> Self {
        let defaults = OptionsBuilder::default();
        Self {
            dt: defaults.dt,
            tol: defaults.tol,
            dt_max: defaults.dt_max,
            dt_min: defaults.dt_min,
            t_start: defaults.t_start,
        }
    }
}

/// Builder for [`Options`]. Validation happens in [`OptionsBuilder::build`].
#[derive(Clone, Copy, Debug)]
pub struct OptionsBuilder<F: Float> {
    dt: F,
    tol: F,
    dt_max: F,
    dt_min: F,
    t_start: F,
}

impl<F: Float> Default for OptionsBuilder<F> {
    fn default() -> Self {
        Self {
            dt: cast(1e-4).unwrap(),
            tol: cast(1e-4).unwrap(),
            dt_max: cast(0.1).unwrap(),
            dt_min: cast(1e-10).unwrap(),
            t_start: F::zero(),
        }
    }
}

impl<F: Float> OptionsBuilder<F> {
    /// Set the fixed step size.
    pub fn with_dt(self, dt: F) -> Self {
        Self { dt, ..self }
    }
    /// Set the local error tolerance.
    pub fn with_tol(self, tol: F) -> Self {
        Self { tol, ..self }
    }
    /// Set the maximum adaptive step size.
    pub fn with_dt_max(self, dt_max: F) -> Self {
        Self { dt_max, ..self }
    }
    /// Set the minimum adaptive step size.
    pub fn with_dt_min(self, dt_min: F) -> Self {
        Self { dt_min, ..self }
    }
    /// Set the time of the initial condition.
    pub fn with_t_start(self, t_start: F) -> Self {
        Self { t_start, ..self }
    }

    /// Validate the settings, see [`Options::new`].
    pub fn build(self) -> Result<Options<F>, Error<F>> {
        Options::new(self.dt, self.tol, self.dt_max, self.dt_min, self.t_start)
    }
}

fn magnitude<F: Float>(name: &'static str, value: F) -> Result<F, Error<F>> {
    let value = value.abs();
    if value.is_finite() && value > F::zero() {
        Ok(value)
    } else {
        Err(Error::NonPositive { name, value })
    }
}
