pub mod banded;
pub mod error;
pub mod interpolation;
pub mod oscillator;
pub mod pca;
pub mod solvers;
pub mod spectral;
/// The `wavelab_core` crate provides the numerical engine behind Wavelab.
///
/// Key components:
/// - **Traits**: `Scalar` (numeric type abstraction), `DynamicalSystem` (ODE right-hand sides).
/// - **Banded**: tridiagonal storage and the Thomas solve.
/// - **Interpolation**: simple and compact (Pade) mid-point interpolation of 2-D fields.
/// - **Solvers**: adaptive embedded Runge-Kutta pairs (RK23, RK45) with dense output.
/// - **Oscillator**: the cubic-quintic oscillator lattice and its simulation driver.
/// - **Spectral**: Welch power spectral density and dominant-frequency estimation.
/// - **PCA**: standardization, SVD-based principal components and spectral peak of a mode.
pub mod traits;

pub use error::{AnalysisError, Result};
