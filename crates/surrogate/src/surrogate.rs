use {
    crate::{
        config::SurrogateConfig,
        error::{Result, SurrogateError},
    },
    onnx::{ElementType, Onnx, OnnxError, Session, SessionOptions, Tensor, TensorInfo},
    std::{
        ffi::CString,
        path::{Path, PathBuf},
        sync::Arc,
    },
};

/// A model node bound to a host buffer of shape `(1, size)`.
pub struct Binding {
    name: CString,
    tensor: Tensor<f32>,
}

impl Binding {
    fn new(onnx: &Arc<Onnx>, name: CString, size: usize) -> Result<Self> {
        let tensor = Tensor::<f32>::zeros(onnx, &[1, size]).map_err(|e| {
            SurrogateError::Load(format!(
                "Failed to allocate tensor for {:?}: {}",
                name,
                e.message()
            ))
        })?;
        Ok(Binding { name, tensor })
    }

    pub fn name(&self) -> &str {
        // built from a &str, so always valid UTF-8
        self.name.to_str().unwrap_or_default()
    }

    pub fn as_slice(&self) -> &[f32] {
        self.tensor.as_slice()
    }
}

/// A single-input, single-output ONNX model evaluated in place.
///
/// The input and output buffers are allocated once, when the model is
/// loaded, and keep their addresses until the surrogate is dropped. Each
/// [`evaluate`](Self::evaluate) reads the input buffer and overwrites the
/// output buffer.
pub struct Surrogate {
    // fields drop in declaration order: the session goes before the buffers
    // it was bound to, and the runtime reference goes last
    session: Session,
    input: Binding,
    output: Binding,
    model_name: String,
    model_path: PathBuf,
}

impl Surrogate {
    /// Load the model described by `config` into the runtime `onnx`.
    pub fn new(onnx: &Arc<Onnx>, config: &SurrogateConfig) -> Result<Self> {
        config.validate()?;
        let path = &config.model_path;
        if !path.is_file() {
            return Err(SurrogateError::Load(format!(
                "Model file {} not found",
                path.display()
            )));
        }

        let options = SessionOptions {
            optimization_level: config.optimization_level.into(),
            ..SessionOptions::default()
        };
        let session = onnx
            .create_session(&options, path)
            .map_err(load_error(&format!("Failed to load {}", path.display())))?;

        let inputs = session
            .input_count()
            .map_err(load_error("Failed to count model inputs"))?;
        let outputs = session
            .output_count()
            .map_err(load_error("Failed to count model outputs"))?;
        if inputs != 1 || outputs != 1 {
            return Err(SurrogateError::Load(format!(
                "Model {} has {} inputs and {} outputs, expected exactly one of each",
                path.display(),
                inputs,
                outputs
            )));
        }

        let input_name = node_name(
            "input",
            config.input_name.as_deref(),
            session.input_name(0),
        )?;
        let output_name = node_name(
            "output",
            config.output_name.as_deref(),
            session.output_name(0),
        )?;
        log::debug!(
            "{}: input node {:?}, output node {:?}",
            config.model_name,
            input_name,
            output_name
        );

        let input_info = session
            .input_info(0)
            .map_err(load_error("Failed to read input type"))?;
        check_tensor("input", &input_name, &input_info, config.input_size)?;
        let output_info = session
            .output_info(0)
            .map_err(load_error("Failed to read output type"))?;
        check_tensor("output", &output_name, &output_info, config.output_size)?;

        let input = Binding::new(onnx, input_name, config.input_size)?;
        let output = Binding::new(onnx, output_name, config.output_size)?;

        log::info!(
            "Loaded surrogate {} from {} ({} -> {}, onnxruntime {})",
            config.model_name,
            path.display(),
            config.input_size,
            config.output_size,
            onnx.version()
        );

        Ok(Surrogate {
            session,
            input,
            output,
            model_name: config.model_name.clone(),
            model_path: path.clone(),
        })
    }

    /// Load the model into a runtime of its own, logging under the model name.
    pub fn create(config: &SurrogateConfig) -> Result<Self> {
        config.validate()?;
        let onnx = Onnx::new(&config.model_name, config.log_level.into()).map_err(load_error(
            "Failed to initialize ONNX Runtime",
        ))?;
        Self::new(&onnx, config)
    }

    pub fn input(&self) -> &[f32] {
        self.input.as_slice()
    }

    /// Input buffer to fill before calling [`evaluate`](Self::evaluate).
    pub fn input_mut(&mut self) -> &mut [f32] {
        self.input.tensor.as_mut_slice()
    }

    pub fn set_input(&mut self, values: &[f32]) -> Result<()> {
        let buffer = self.input.tensor.as_mut_slice();
        if values.len() != buffer.len() {
            return Err(SurrogateError::InvalidInput {
                expected: buffer.len(),
                actual: values.len(),
            });
        }
        buffer.copy_from_slice(values);
        Ok(())
    }

    /// Output buffer, valid after a successful [`evaluate`](Self::evaluate).
    pub fn output(&self) -> &[f32] {
        self.output.as_slice()
    }

    /// Run the model on the current input buffer.
    ///
    /// A runtime failure leaves the output buffer in an unspecified state.
    /// Callers should treat it as fatal (see [`SurrogateError::is_fatal`]).
    pub fn evaluate(&mut self) -> Result<()> {
        let Surrogate {
            session,
            input,
            output,
            model_name,
            ..
        } = self;
        session
            .run_bound(
                &[(input.name.as_c_str(), input.tensor.value())],
                &mut [(output.name.as_c_str(), output.tensor.value_mut())],
            )
            .map_err(|e| {
                SurrogateError::Runtime(format!(
                    "Evaluation of {} failed: {}",
                    model_name,
                    e.message()
                ))
            })
    }

    /// Run the model, aborting the process if the runtime fails.
    pub fn evaluate_or_abort(&mut self) {
        if let Err(e) = self.evaluate() {
            base::log_fatal!("{}", e);
        }
    }

    /// Copy `input` into the input buffer, evaluate, and return the output.
    pub fn evaluate_slice(&mut self, input: &[f32]) -> Result<&[f32]> {
        self.set_input(input)?;
        self.evaluate()?;
        Ok(self.output())
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn input_size(&self) -> usize {
        self.input.tensor.len()
    }

    pub fn output_size(&self) -> usize {
        self.output.tensor.len()
    }

    pub fn input_name(&self) -> &str {
        self.input.name()
    }

    pub fn output_name(&self) -> &str {
        self.output.name()
    }
}

fn load_error(context: &str) -> impl FnOnce(OnnxError) -> SurrogateError + '_ {
    move |e| SurrogateError::Load(format!("{}: {}", context, e.message()))
}

/// Pick the configured node name, or the model's own when none is given.
fn node_name(
    side: &str,
    configured: Option<&str>,
    declared: onnx::Result<String>,
) -> Result<CString> {
    let declared =
        declared.map_err(load_error(&format!("Failed to read model {} name", side)))?;
    let name = match configured {
        Some(name) if name != declared => {
            return Err(SurrogateError::Load(format!(
                "Model {} node is named {:?}, not {:?}",
                side, declared, name
            )));
        }
        _ => declared,
    };
    CString::new(name)
        .map_err(|_| SurrogateError::Load(format!("Null byte in model {} node name", side)))
}

/// The node must hold `f32` values and accept shape `(1, size)`.
fn check_tensor(side: &str, name: &CString, info: &TensorInfo, size: usize) -> Result<()> {
    if info.element_type != ElementType::Float {
        return Err(SurrogateError::Load(format!(
            "Model {} {:?} has element type {:?}, expected Float",
            side, name, info.element_type
        )));
    }
    if !shape_accepts(&info.shape, &[1, size]) {
        return Err(SurrogateError::Load(format!(
            "Model {} {:?} has shape {:?}, which does not accept [1, {}]",
            side, name, info.shape, size
        )));
    }
    Ok(())
}

/// Negative dimensions are dynamic and match any size.
fn shape_accepts(declared: &[i64], shape: &[usize]) -> bool {
    declared.len() == shape.len()
        && declared
            .iter()
            .zip(shape)
            .all(|(&dim, &size)| dim < 0 || dim as u64 == size as u64)
}
