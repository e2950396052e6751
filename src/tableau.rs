//! Butcher tableaux of the supported explicit Runge-Kutta methods.
//!
//! Rows of `a` may omit trailing zeros. Embedded methods carry a second weight vector `b_low`
//! producing the lower order estimate used for error control.

/// Coefficients defining an explicit Runge-Kutta method.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ButcherTableau {
    /// Node offsets.
    pub c: &'static [f64],
    /// Stage combination weights; row `i` has at most `i` entries.
    pub a: &'static [&'static [f64]],
    /// Weights of the propagated solution.
    pub b: &'static [f64],
    /// Weights of the embedded lower order solution, if any.
    pub b_low: Option<&'static [f64]>,
}

impl ButcherTableau {
    /// The number of stages.
    pub fn stages(&self) -> usize {
        self.c.len()
    }

    /// Whether the tableau carries an embedded error estimator.
    pub fn is_embedded(&self) -> bool {
        self.b_low.is_some()
    }

    /// Whether the last stage is evaluated at the propagated solution, so that its derivative can
    /// be reused as the first stage of the next step.
    pub fn is_fsal(&self) -> bool {
        self.c.first() == Some(&0.)
            && self.c.last() == Some(&1.)
            && self.a.last().is_some_and(|row| {
                row.len() + 1 == self.b.len()
                    && row.iter().zip(self.b).all(|(a, b)| a == b)
                    && self.b.last() == Some(&0.)
            })
    }

    pub const HEUN2: Self = Self {
        c: &[0., 1.],
        a: &[&[], &[1.]],
        b: &[1. / 2., 1. / 2.],
        b_low: None,
    };

    pub const RALSTON2: Self = Self {
        c: &[0., 2. / 3.],
        a: &[&[], &[2. / 3.]],
        b: &[1. / 4., 3. / 4.],
        b_low: None,
    };

    pub const KUTTA3: Self = Self {
        c: &[0., 1. / 2., 1.],
        a: &[&[], &[1. / 2.], &[-1., 2.]],
        b: &[1. / 6., 2. / 3., 1. / 6.],
        b_low: None,
    };

    pub const HEUN3: Self = Self {
        c: &[0., 1. / 3., 2. / 3.],
        a: &[&[], &[1. / 3.], &[0., 2. / 3.]],
        b: &[1. / 4., 0., 3. / 4.],
        b_low: None,
    };

    pub const RALSTON3: Self = Self {
        c: &[0., 1. / 2., 3. / 4.],
        a: &[&[], &[1. / 2.], &[0., 3. / 4.]],
        b: &[2. / 9., 1. / 3., 4. / 9.],
        b_low: None,
    };

    /// Third order strong stability preserving method of Shu and Osher.
    pub const SSPRK3: Self = Self {
        c: &[0., 1., 1. / 2.],
        a: &[&[], &[1.], &[1. / 4., 1. / 4.]],
        b: &[1. / 6., 1. / 6., 2. / 3.],
        b_low: None,
    };

    /// Ralston's minimum truncation error fourth order method. The coefficients are irrational
    /// (they involve `sqrt(5)`) and are given to double precision.
    pub const RALSTON4: Self = Self {
        c: &[0., 0.4, 0.455_737_254_218_789_43, 1.],
        a: &[
            &[],
            &[0.4],
            &[0.296_977_609_247_753_6, 0.158_759_644_971_035_83],
            &[
                0.218_100_388_225_920_47,
                -3.050_965_148_692_930_8,
                3.832_864_760_467_010_3,
            ],
        ],
        b: &[
            0.174_760_282_262_690_37,
            -0.551_480_662_878_732_94,
            1.205_535_599_396_523_5,
            0.171_184_781_219_519_03,
        ],
        b_low: None,
    };

    /// Kutta's 3/8 rule.
    pub const KUTTA4: Self = Self {
        c: &[0., 1. / 3., 2. / 3., 1.],
        a: &[&[], &[1. / 3.], &[-1. / 3., 1.], &[1., -1., 1.]],
        b: &[1. / 8., 3. / 8., 3. / 8., 1. / 8.],
        b_low: None,
    };

    pub const RK4: Self = Self {
        c: &[0., 1. / 2., 1. / 2., 1.],
        a: &[&[], &[1. / 2.], &[0., 1. / 2.], &[0., 0., 1.]],
        b: &[1. / 6., 1. / 3., 1. / 3., 1. / 6.],
        b_low: None,
    };

    /// Heun's method with an embedded forward Euler error estimate.
    pub const RK21: Self = Self {
        c: &[0., 1.],
        a: &[&[], &[1.]],
        b: &[1. / 2., 1. / 2.],
        b_low: Some(&[1., 0.]),
    };

    /// Bogacki-Shampine 3(2).
    pub const BS32: Self = Self {
        c: &[0., 1. / 2., 3. / 4., 1.],
        a: &[&[], &[1. / 2.], &[0., 3. / 4.], &[2. / 9., 1. / 3., 4. / 9.]],
        b: &[2. / 9., 1. / 3., 4. / 9., 0.],
        b_low: Some(&[7. / 24., 1. / 4., 1. / 3., 1. / 8.]),
    };

    /// Dormand-Prince 5(4).
    pub const DOPRI54: Self = Self {
        c: &[0., 1. / 5., 3. / 10., 4. / 5., 8. / 9., 1., 1.],
        a: &[
            &[],
            &[1. / 5.],
            &[3. / 40., 9. / 40.],
            &[44. / 45., -56. / 15., 32. / 9.],
            &[19372. / 6561., -25360. / 2187., 64448. / 6561., -212. / 729.],
            &[
                9017. / 3168.,
                -355. / 33.,
                46732. / 5247.,
                49. / 176.,
                -5103. / 18656.,
            ],
            &[
                35. / 384.,
                0.,
                500. / 1113.,
                125. / 192.,
                -2187. / 6784.,
                11. / 84.,
            ],
        ],
        b: &[
            35. / 384.,
            0.,
            500. / 1113.,
            125. / 192.,
            -2187. / 6784.,
            11. / 84.,
            0.,
        ],
        b_low: Some(&[
            5179. / 57600.,
            0.,
            7571. / 16695.,
            393. / 640.,
            -92097. / 339200.,
            187. / 2100.,
            1. / 40.,
        ]),
    };

    /// Tsitouras 5(4), from Tsitouras, Ch. "Runge-Kutta pairs of order 5(4) satisfying only the
    /// first column simplifying assumption." Computers & Mathematics with Applications 62 (2011).
    pub const TSIT54: Self = Self {
        c: &[0., 0.161, 0.327, 0.9, 0.980_025_540_904_509_7, 1., 1.],
        a: &[
            &[],
            &[0.161],
            &[-0.008_480_655_492_356_989, 0.335_480_655_492_357],
            &[
                2.897_153_057_105_493,
                -6.359_448_489_975_075,
                4.362_295_432_869_581_5,
            ],
            &[
                5.325_864_828_439_257,
                -11.748_883_564_062_828,
                7.495_539_342_889_836_5,
                -0.092_495_066_361_755_25,
            ],
            &[
                5.861_455_442_946_42,
                -12.920_969_317_847_11,
                8.159_367_898_576_159,
                -0.071_584_973_281_401,
                -0.028_269_050_394_068_383,
            ],
            &[
                0.096_460_766_818_065_23,
                0.01,
                0.479_889_650_414_499_6,
                1.379_008_574_103_742,
                -3.290_069_515_436_081,
                2.324_710_524_099_774,
            ],
        ],
        b: &[
            0.096_460_766_818_065_23,
            0.01,
            0.479_889_650_414_499_6,
            1.379_008_574_103_742,
            -3.290_069_515_436_081,
            2.324_710_524_099_774,
            0.,
        ],
        b_low: Some(&[
            0.098_240_777_870_291_007,
            0.010_816_434_459_656_747,
            0.472_008_772_404_237_6,
            1.523_719_581_277_004_9,
            -3.872_426_680_888_636_2,
            2.782_792_630_028_961,
            -1. / 66.,
        ]),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [(ButcherTableau, usize); 13] = [
        (ButcherTableau::HEUN2, 2),
        (ButcherTableau::RALSTON2, 2),
        (ButcherTableau::KUTTA3, 3),
        (ButcherTableau::HEUN3, 3),
        (ButcherTableau::RALSTON3, 3),
        (ButcherTableau::SSPRK3, 3),
        (ButcherTableau::RALSTON4, 4),
        (ButcherTableau::KUTTA4, 4),
        (ButcherTableau::RK4, 4),
        (ButcherTableau::RK21, 2),
        (ButcherTableau::BS32, 3),
        (ButcherTableau::DOPRI54, 5),
        (ButcherTableau::TSIT54, 5),
    ];

    #[test]
    fn shapes_are_consistent() {
        for (tableau, _) in ALL {
            assert_eq!(tableau.a.len(), tableau.stages());
            assert_eq!(tableau.b.len(), tableau.stages());
            if let Some(b_low) = tableau.b_low {
                assert_eq!(b_low.len(), tableau.stages());
            }
            for (i, row) in tableau.a.iter().enumerate() {
                assert!(row.len() <= i);
            }
        }
    }

    #[test]
    fn rows_sum_to_nodes() {
        for (tableau, _) in ALL {
            for (c, row) in tableau.c.iter().zip(tableau.a) {
                approx::assert_abs_diff_eq!(row.iter().sum::<f64>(), *c, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn low_order_conditions() {
        // Order conditions up to third order; fourth and fifth order are covered by the
        // convergence tests in the driver.
        for (tableau, order) in ALL {
            let weights = std::iter::once(tableau.b).chain(tableau.b_low);
            for b in weights {
                approx::assert_abs_diff_eq!(b.iter().sum::<f64>(), 1., epsilon = 1e-12);
            }

            let bc = |power: i32| -> f64 {
                tableau
                    .b
                    .iter()
                    .zip(tableau.c)
                    .map(|(b, c)| b * c.powi(power))
                    .sum()
            };
            if order >= 2 {
                approx::assert_abs_diff_eq!(bc(1), 1. / 2., epsilon = 1e-12);
            }
            if order >= 3 {
                approx::assert_abs_diff_eq!(bc(2), 1. / 3., epsilon = 1e-12);
                let bac: f64 = tableau
                    .b
                    .iter()
                    .zip(tableau.a)
                    .map(|(b, row)| {
                        b * row
                            .iter()
                            .zip(tableau.c)
                            .map(|(a, c)| a * c)
                            .sum::<f64>()
                    })
                    .sum();
                approx::assert_abs_diff_eq!(bac, 1. / 6., epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn fsal_detection() {
        assert!(ButcherTableau::DOPRI54.is_fsal());
        assert!(ButcherTableau::TSIT54.is_fsal());
        assert!(ButcherTableau::BS32.is_fsal());
        assert!(!ButcherTableau::RK4.is_fsal());
        assert!(!ButcherTableau::RK21.is_fsal());
    }
}
