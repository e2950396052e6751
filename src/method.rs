//! The registry of integration methods.
//!
//! Each [`Method`] maps to exactly one [`MethodDescriptor`], which is the single source of the
//! order, FSAL and adaptivity flags used by the kernels and the driver.

use core::fmt;
use core::str::FromStr;

use crate::kernel;
use crate::{
    ButcherTableau, Float, Options, State, StepOutcome, System, SystemEvaluationCounter,
    UnknownMethod,
};

/// An explicit Runge-Kutta method.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Method {
    Heun2,
    Ralston2,
    Kutta3,
    Heun3,
    Ralston3,
    Ssprk3,
    Ralston4,
    Kutta4,
    Rk4,
    Rk21,
    Bs32,
    #[default]
    Dopri54,
    Tsit54,
}

/// Static properties of a [`Method`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MethodDescriptor {
    /// The lowercase name accepted by [`crate::solve`].
    pub name: &'static str,
    /// The order of the propagated solution. Adaptive methods also use it as the exponent of
    /// step size control.
    pub order: usize,
    /// Whether the last stage derivative is carried over as the first stage of the next step.
    pub fsal: bool,
    /// Whether the method estimates its error and adapts the step size.
    pub adaptive: bool,
    pub tableau: ButcherTableau,
}

impl MethodDescriptor {
    const fn fixed(name: &'static str, order: usize, tableau: ButcherTableau) -> Self {
        Self {
            name,
            order,
            fsal: false,
            adaptive: false,
            tableau,
        }
    }

    const fn embedded(
        name: &'static str,
        order: usize,
        fsal: bool,
        tableau: ButcherTableau,
    ) -> Self {
        Self {
            name,
            order,
            fsal,
            adaptive: true,
            tableau,
        }
    }
}

/// Indexed by `Method as usize`.
static REGISTRY: [MethodDescriptor; 13] = [
    MethodDescriptor::fixed("heun2", 2, ButcherTableau::HEUN2),
    MethodDescriptor::fixed("ralston2", 2, ButcherTableau::RALSTON2),
    MethodDescriptor::fixed("kutta3", 3, ButcherTableau::KUTTA3),
    MethodDescriptor::fixed("heun3", 3, ButcherTableau::HEUN3),
    MethodDescriptor::fixed("ralston3", 3, ButcherTableau::RALSTON3),
    MethodDescriptor::fixed("ssprk3", 3, ButcherTableau::SSPRK3),
    MethodDescriptor::fixed("ralston4", 4, ButcherTableau::RALSTON4),
    MethodDescriptor::fixed("kutta4", 4, ButcherTableau::KUTTA4),
    MethodDescriptor::fixed("rk4", 4, ButcherTableau::RK4),
    MethodDescriptor::embedded("rk21", 2, false, ButcherTableau::RK21),
    MethodDescriptor::embedded("bs32", 3, false, ButcherTableau::BS32),
    MethodDescriptor::embedded("dopri54", 5, true, ButcherTableau::DOPRI54),
    MethodDescriptor::embedded("tsit54", 5, true, ButcherTableau::TSIT54),
];

impl Method {
    /// Every supported method, fixed-step methods first.
    pub const ALL: [Method; 13] = [
        Method::Heun2,
        Method::Ralston2,
        Method::Kutta3,
        Method::Heun3,
        Method::Ralston3,
        Method::Ssprk3,
        Method::Ralston4,
        Method::Kutta4,
        Method::Rk4,
        Method::Rk21,
        Method::Bs32,
        Method::Dopri54,
        Method::Tsit54,
    ];

    pub fn descriptor(self) -> &'static MethodDescriptor {
        &REGISTRY[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn order(self) -> usize {
        self.descriptor().order
    }

    pub fn is_adaptive(self) -> bool {
        self.descriptor().adaptive
    }

    pub fn is_fsal(self) -> bool {
        self.descriptor().fsal
    }

    pub fn tableau(self) -> &'static ButcherTableau {
        &self.descriptor().tableau
    }

    /// Take a single step of this method.
    ///
    /// # Arguments
    ///
    /// * `system`: The ODE system.
    /// * `t`: The time at the start of the step.
    /// * `y`: The state at the start of the step.
    /// * `dy`: The derivative at `(t, y)`, e.g. the [`StepOutcome::derivative`] of the previous
    ///   step. Only read by FSAL methods.
    /// * `dt`: The trial step size. May be negative.
    /// * `options`: Tolerance and step size bounds, only read by adaptive methods.
    ///
    /// # Examples
    ///
    /// ```
    /// let decay = |_t: f64, y: &f64| -y;
    /// let options = butcher::Options::builder().with_tol(1e-8).build().unwrap();
    ///
    /// let first = butcher::Method::Tsit54.step(&decay, 0., &1., &-1., 0.1, &options);
    /// let dy = first.derivative.unwrap();
    /// let second = butcher::Method::Tsit54.step(&decay, first.dt, &first.y, &dy, 0.1, &options);
    ///
    /// approx::assert_relative_eq!(second.y, (-first.dt - second.dt).exp(), max_relative = 1e-7);
    /// ```
    pub fn step<F, Y, S>(
        self,
        system: &S,
        t: F,
        y: &Y,
        dy: &Y,
        dt: F,
        options: &Options<F>,
    ) -> StepOutcome<F, Y>
    where
        F: Float,
        Y: State<F>,
        S: System<F, Y>,
    {
        let mut system = SystemEvaluationCounter::new(system);
        kernel::step(self.descriptor(), &mut system, t, y, dy, dt, options)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = UnknownMethod;

    /// Parse a case-insensitive method name.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|method| method.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| UnknownMethod(name.to_string()))
    }
}
