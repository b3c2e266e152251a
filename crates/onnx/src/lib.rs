//! Owned handles over the ONNX Runtime C API.
//!
//! Everything acquired from the runtime is released in `Drop`. Values and
//! sessions hold an `Arc<Onnx>` so the environment outlives them.

pub mod error;
pub mod ffi;
mod onnx;
pub mod session;
pub mod value;

pub use error::{OnnxError, Result};
pub use ffi::{ONNXTensorElementDataType as ElementType, OrtLoggingLevel as LogLevel};
pub use onnx::{Onnx, OptimizationLevel, SessionOptions};
pub use session::{Session, TensorInfo};
pub use value::{Tensor, TensorElement, Value};
