//! Learned surrogates for nonlinear equation systems.
//!
//! A [`Surrogate`] wraps one ONNX model with a single input of shape
//! `(1, N)` and a single output of shape `(1, M)`. Simulation code writes
//! the input buffer, calls [`Surrogate::evaluate`], and reads the output
//! buffer. [`capi`] exposes the same operations to C.

pub mod capi;
pub mod config;
pub mod error;
mod surrogate;

pub use config::{Optimization, RuntimeLogLevel, SurrogateConfig};
pub use error::{Result, SurrogateError};
pub use surrogate::{Binding, Surrogate};

pub use onnx::Onnx;
