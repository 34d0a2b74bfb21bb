//! A module for kernel functions measuring the similarity between two fingerprints.
//!
//! The following kernels are implemented:
//! * gaussian (squared exponential, also known as RBF),
//! * laplacian,
//! * linear,
//! * quadratic (rational quadratic),
//! * matern 3/2,
//! * matern 5/2,
//! * constant.
//!
//! Stationary kernels accept either a single width shared by every active dimension
//! or one width per active dimension (anisotropic kernel).

use crate::errors::{GpError, Result};
use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, ArrayView1, Data, Ix1, Ix2, Zip};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

/// The available kernel types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(into = "String"),
    serde(try_from = "String")
)]
pub enum KernelKind {
    /// `s * exp(-sum(d_j^2 / (2 w_j^2)))`
    Gaussian,
    /// `s * exp(-sum(|d_j| / w_j))`
    Laplacian,
    /// `s * x.y`
    Linear,
    /// `s * (1 + sum(d_j^2 / (2 p w_j^2)))^-p` where p is the kernel degree
    Quadratic,
    /// `s * (1 + sqrt(3) r) exp(-sqrt(3) r)` with r the width scaled distance
    Matern32,
    /// `s * (1 + sqrt(5) r + 5/3 r^2) exp(-sqrt(5) r)` with r the width scaled distance
    Matern52,
    /// `s`
    Constant,
}

impl KernelKind {
    /// Accepted kernel type names
    pub const NAMES: [&'static str; 7] = [
        "gaussian",
        "laplacian",
        "linear",
        "quadratic",
        "matern32",
        "matern52",
        "constant",
    ];

    /// Whether the kernel is parameterized by width(s)
    pub fn has_width(&self) -> bool {
        !matches!(self, KernelKind::Linear | KernelKind::Constant)
    }

    /// Whether the kernel value only depends on `x - y`
    pub fn is_stationary(&self) -> bool {
        !matches!(self, KernelKind::Linear)
    }

    fn name(&self) -> &'static str {
        match self {
            KernelKind::Gaussian => "gaussian",
            KernelKind::Laplacian => "laplacian",
            KernelKind::Linear => "linear",
            KernelKind::Quadratic => "quadratic",
            KernelKind::Matern32 => "matern32",
            KernelKind::Matern52 => "matern52",
            KernelKind::Constant => "constant",
        }
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for KernelKind {
    type Err = GpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gaussian" | "rbf" | "sqe" => Ok(KernelKind::Gaussian),
            "laplacian" => Ok(KernelKind::Laplacian),
            "linear" => Ok(KernelKind::Linear),
            "quadratic" => Ok(KernelKind::Quadratic),
            "matern32" => Ok(KernelKind::Matern32),
            "matern52" => Ok(KernelKind::Matern52),
            "constant" => Ok(KernelKind::Constant),
            _ => Err(GpError::InvalidKernelSpec(format!(
                "unknown kernel type '{}', expected one of {:?}",
                s,
                KernelKind::NAMES
            ))),
        }
    }
}

impl From<KernelKind> for String {
    fn from(item: KernelKind) -> String {
        item.name().to_string()
    }
}

impl TryFrom<String> for KernelKind {
    type Error = GpError;
    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// A kernel specification: kernel type and its hyperparameters.
///
/// Several specifications are summed up to build a composite kernel
/// (see [crate::covariance]).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(default),
    serde(bound(
        serialize = "F: Serialize",
        deserialize = "F: Deserialize<'de>"
    ))
)]
pub struct KernelSpec<F: Float> {
    /// Kernel type
    #[cfg_attr(feature = "serializable", serde(rename = "type"))]
    kind: KernelKind,
    /// Either one width for all active dimensions or one width per active dimension
    #[cfg_attr(feature = "serializable", serde(with = "serde_widths"))]
    width: Array1<F>,
    /// Multiplicative factor of the kernel value
    scaling: F,
    /// Exponent of the quadratic kernel
    degree: F,
    /// Per-dimension activity mask, all dimensions active when `None`
    active: Option<Vec<bool>>,
}

impl<F: Float> Default for KernelSpec<F> {
    fn default() -> Self {
        KernelSpec::new(KernelKind::Gaussian)
    }
}

impl<F: Float> fmt::Display for KernelSpec<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.kind.has_width() {
            write!(
                f,
                "{}(width={}, scaling={})",
                self.kind, self.width, self.scaling
            )
        } else {
            write!(f, "{}(scaling={})", self.kind, self.scaling)
        }
    }
}

impl<F: Float> KernelSpec<F> {
    /// Default width value
    pub const DEFAULT_WIDTH: f64 = 1.0;
    /// Default scaling value
    pub const DEFAULT_SCALING: f64 = 1.0;
    /// Default quadratic kernel degree
    pub const DEFAULT_DEGREE: f64 = 1.0;

    /// Kernel specification of the given type with default hyperparameters
    pub fn new(kind: KernelKind) -> Self {
        KernelSpec {
            kind,
            width: Array1::from_elem(1, F::cast(Self::DEFAULT_WIDTH)),
            scaling: F::cast(Self::DEFAULT_SCALING),
            degree: F::cast(Self::DEFAULT_DEGREE),
            active: None,
        }
    }

    /// Gaussian kernel with default hyperparameters
    pub fn gaussian() -> Self {
        Self::new(KernelKind::Gaussian)
    }

    /// Laplacian kernel with default hyperparameters
    pub fn laplacian() -> Self {
        Self::new(KernelKind::Laplacian)
    }

    /// Linear kernel with default scaling
    pub fn linear() -> Self {
        Self::new(KernelKind::Linear)
    }

    /// Set an isotropic width
    pub fn with_width(mut self, width: F) -> Self {
        self.width = Array1::from_elem(1, width);
        self
    }

    /// Set one width per active dimension
    pub fn with_widths(mut self, widths: Array1<F>) -> Self {
        self.width = widths;
        self
    }

    /// Set the scaling factor
    pub fn with_scaling(mut self, scaling: F) -> Self {
        self.scaling = scaling;
        self
    }

    /// Set the quadratic kernel degree
    pub fn with_degree(mut self, degree: F) -> Self {
        self.degree = degree;
        self
    }

    /// Restrict the kernel to the dimensions flagged `true`
    pub fn with_active(mut self, mask: Vec<bool>) -> Self {
        self.active = Some(mask);
        self
    }

    /// Kernel type
    pub fn kind(&self) -> KernelKind {
        self.kind
    }

    /// Kernel widths
    pub fn widths(&self) -> &Array1<F> {
        &self.width
    }

    /// Kernel scaling factor
    pub fn scaling(&self) -> F {
        self.scaling
    }

    /// Quadratic kernel degree
    pub fn degree(&self) -> F {
        self.degree
    }

    /// Activity mask if any
    pub fn active(&self) -> Option<&[bool]> {
        self.active.as_deref()
    }

    /// Number of dimensions the kernel operates on given `ncols` input dimensions
    pub fn n_active(&self, ncols: usize) -> usize {
        match &self.active {
            Some(mask) => mask.iter().filter(|a| **a).count(),
            None => ncols,
        }
    }

    /// Check the specification is usable on inputs with `ncols` dimensions
    pub fn check(&self, ncols: usize) -> Result<()> {
        let positive = |v: F| v > F::zero() && v.is_finite();
        if !positive(self.scaling) {
            return Err(GpError::InvalidKernelSpec(format!(
                "{} kernel scaling should be positive, got {}",
                self.kind, self.scaling
            )));
        }
        if let Some(mask) = &self.active {
            if mask.len() != ncols {
                return Err(GpError::InvalidKernelSpec(format!(
                    "{} kernel active mask has {} entries whereas inputs have {} dimensions",
                    self.kind,
                    mask.len(),
                    ncols
                )));
            }
        }
        if self.kind.has_width() {
            let n_active = self.n_active(ncols);
            if self.width.len() != 1 && self.width.len() != n_active {
                return Err(GpError::InvalidKernelSpec(format!(
                    "{} kernel expects 1 or {} widths, got {}",
                    self.kind,
                    n_active,
                    self.width.len()
                )));
            }
            if self.width.iter().any(|w| !positive(*w)) {
                return Err(GpError::InvalidKernelSpec(format!(
                    "{} kernel widths should be positive, got {}",
                    self.kind, self.width
                )));
            }
        }
        if self.kind == KernelKind::Quadratic && !positive(self.degree) {
            return Err(GpError::InvalidKernelSpec(format!(
                "quadratic kernel degree should be positive, got {}",
                self.degree
            )));
        }
        Ok(())
    }

    /// Kernel value k(x, y) between two fingerprints.
    /// *Panics* if x and y have not the same number of components
    /// or if the specification does not [check](KernelSpec::check) against them
    pub fn value(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix1>,
        y: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> F {
        assert!(x.len() == y.len());
        self.value_view(&x.view(), &y.view())
    }

    /// Pairwise kernel values between rows of `x` (n, nx) and rows of `y` (m, nx)
    /// as a (n, m) matrix
    pub fn matrix(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Array2<F>> {
        if x.ncols() != y.ncols() {
            return Err(GpError::DimensionMismatch(format!(
                "kernel inputs have {} and {} columns",
                x.ncols(),
                y.ncols()
            )));
        }
        self.check(x.ncols())?;
        let (x, y) = (x.view(), y.view());
        let mut k = Array2::zeros((x.nrows(), y.nrows()));
        Zip::from(k.rows_mut())
            .and(x.rows())
            .par_for_each(|mut k_i, x_i| {
                Zip::from(&mut k_i)
                    .and(y.rows())
                    .for_each(|k_ij, y_j| *k_ij = self.value_view(&x_i, &y_j));
            });
        Ok(k)
    }

    /// Kernel values k(x_i, x_i) for each row of `x`
    pub fn diag(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        self.check(x.ncols())?;
        if self.kind.is_stationary() {
            return Ok(Array1::from_elem(x.nrows(), self.stationary_value(F::zero(), F::zero())));
        }
        Ok(x.rows()
            .into_iter()
            .map(|x_i| self.value_view(&x_i, &x_i))
            .collect())
    }

    fn is_active(&self, j: usize) -> bool {
        self.active.as_ref().map_or(true, |mask| mask[j])
    }

    fn value_view(&self, x: &ArrayView1<F>, y: &ArrayView1<F>) -> F {
        match self.kind {
            KernelKind::Linear => {
                let mut dot = F::zero();
                Zip::indexed(x).and(y).for_each(|j, a, b| {
                    if self.is_active(j) {
                        dot += *a * *b;
                    }
                });
                self.scaling * dot
            }
            KernelKind::Constant => self.scaling,
            _ => {
                let (sq, l1) = self.scaled_distances(x, y);
                self.stationary_value(sq, l1)
            }
        }
    }

    /// Squared euclidean and manhattan distances between x and y
    /// once each active component is divided by its width
    fn scaled_distances(&self, x: &ArrayView1<F>, y: &ArrayView1<F>) -> (F, F) {
        let isotropic = self.width.len() == 1;
        let mut k = 0;
        let mut sq = F::zero();
        let mut l1 = F::zero();
        for (j, (a, b)) in x.iter().zip(y.iter()).enumerate() {
            if !self.is_active(j) {
                continue;
            }
            let w = if isotropic { self.width[0] } else { self.width[k] };
            k += 1;
            let u = (*a - *b) / w;
            sq += u * u;
            l1 += num_traits::Float::abs(u);
        }
        (sq, l1)
    }

    fn stationary_value(&self, sq: F, l1: F) -> F {
        let s = self.scaling;
        match self.kind {
            KernelKind::Gaussian => s * F::exp(F::cast(-0.5) * sq),
            KernelKind::Laplacian => s * F::exp(-l1),
            KernelKind::Quadratic => {
                let p = self.degree;
                s * (F::one() + sq / (F::cast(2.) * p)).powf(-p)
            }
            KernelKind::Matern32 => {
                let r = F::cast(3.).sqrt() * sq.sqrt();
                s * (F::one() + r) * F::exp(-r)
            }
            KernelKind::Matern52 => {
                let r = F::cast(5.).sqrt() * sq.sqrt();
                s * (F::one() + r + r * r / F::cast(3.)) * F::exp(-r)
            }
            KernelKind::Constant => s,
            KernelKind::Linear => unreachable!("linear kernel is not stationary"),
        }
    }

    /// Number of tunable hyperparameters (widths then scaling)
    pub(crate) fn n_hyperparameters(&self) -> usize {
        if self.kind.has_width() {
            self.width.len() + 1
        } else {
            1
        }
    }

    /// Tunable hyperparameters on log10 scale (widths then scaling)
    pub(crate) fn log10_hyperparameters(&self) -> Vec<f64> {
        let mut params = vec![];
        if self.kind.has_width() {
            params.extend(self.width.iter().map(|w| to_f64(w.log10())));
        }
        params.push(to_f64(self.scaling.log10()));
        params
    }

    /// Copy of the specification with hyperparameters set from log10 values
    /// given in [KernelSpec::log10_hyperparameters] order
    pub(crate) fn with_log10_hyperparameters(&self, params: &[f64]) -> Self {
        let base: f64 = 10.;
        let mut spec = self.clone();
        let n_width = if self.kind.has_width() {
            self.width.len()
        } else {
            0
        };
        if n_width > 0 {
            spec.width = params[..n_width]
                .iter()
                .map(|v| F::cast(base.powf(*v)))
                .collect();
        }
        spec.scaling = F::cast(base.powf(params[n_width]));
        spec
    }
}

/// Widths as a plain number or list of numbers
#[cfg(feature = "serializable")]
mod serde_widths {
    use linfa::Float;
    use ndarray::Array1;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Widths<F> {
        One(F),
        Many(Vec<F>),
    }

    pub fn serialize<F, S>(width: &Array1<F>, serializer: S) -> Result<S::Ok, S::Error>
    where
        F: Float + Serialize,
        S: Serializer,
    {
        width.to_vec().serialize(serializer)
    }

    pub fn deserialize<'de, F, D>(deserializer: D) -> Result<Array1<F>, D::Error>
    where
        F: Float + Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Ok(match Widths::<F>::deserialize(deserializer)? {
            Widths::One(w) => Array1::from_elem(1, w),
            Widths::Many(ws) => Array1::from(ws),
        })
    }
}

#[inline]
pub(crate) fn to_f64<F: Float>(v: F) -> f64 {
    num_traits::ToPrimitive::to_f64(&v).unwrap_or(f64::NAN)
}
