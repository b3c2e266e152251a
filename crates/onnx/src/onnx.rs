use {
    crate::*,
    std::{
        ffi::{CStr, CString},
        path::Path,
        ptr::null_mut,
        sync::Arc,
    },
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OptimizationLevel {
    Disabled,
    EnableBasic,
    EnableExtended,
    #[default]
    EnableAll,
}

impl From<OptimizationLevel> for ffi::GraphOptimizationLevel {
    fn from(level: OptimizationLevel) -> Self {
        match level {
            OptimizationLevel::Disabled => ffi::GraphOptimizationLevel::DisableAll,
            OptimizationLevel::EnableBasic => ffi::GraphOptimizationLevel::EnableBasic,
            OptimizationLevel::EnableExtended => ffi::GraphOptimizationLevel::EnableExtended,
            OptimizationLevel::EnableAll => ffi::GraphOptimizationLevel::EnableAll,
        }
    }
}

/// Settings applied to a session when it is created.
///
/// Sessions always run on the CPU in sequential execution mode. The default
/// uses one intra-op and one inter-op thread with all graph optimizations
/// enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub optimization_level: OptimizationLevel,
    pub intra_threads: usize,
    pub inter_threads: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            optimization_level: OptimizationLevel::EnableAll,
            intra_threads: 1,
            inter_threads: 1,
        }
    }
}

/// ONNX Runtime API table and environment.
///
/// Sessions and tensors keep an `Arc` to this, so the environment is released
/// only after the last of them is gone.
#[derive(Debug)]
pub struct Onnx {
    pub(crate) api: *const ffi::OrtApi,
    pub(crate) environment: *mut ffi::OrtEnv,
    pub(crate) version: String,
    pub(crate) allocator: *mut ffi::OrtAllocator,
    pub(crate) allocator_free: ffi::AllocatorFreeFn,
    pub(crate) release_env: ffi::ReleaseEnvFn,
    pub(crate) create_session: ffi::CreateSessionFn,
    pub(crate) create_session_from_array: ffi::CreateSessionFromArrayFn,
    pub(crate) create_session_options: ffi::CreateSessionOptionsFn,
    pub(crate) set_session_execution_mode: ffi::SetSessionExecutionModeFn,
    pub(crate) set_session_graph_optimization_level: ffi::SetSessionGraphOptimizationLevelFn,
    pub(crate) set_intra_op_num_threads: ffi::SetNumThreadsFn,
    pub(crate) set_inter_op_num_threads: ffi::SetNumThreadsFn,
    pub(crate) release_session_options: ffi::ReleaseSessionOptionsFn,
    pub(crate) session_get_input_count: ffi::SessionGetInputCountFn,
    pub(crate) session_get_output_count: ffi::SessionGetOutputCountFn,
    pub(crate) session_get_input_name: ffi::SessionGetNameFn,
    pub(crate) session_get_output_name: ffi::SessionGetNameFn,
    pub(crate) session_get_input_type_info: ffi::SessionGetTypeInfoFn,
    pub(crate) session_get_output_type_info: ffi::SessionGetTypeInfoFn,
    pub(crate) release_type_info: ffi::ReleaseTypeInfoFn,
    pub(crate) cast_type_info_to_tensor_info: ffi::CastTypeInfoToTensorInfoFn,
    pub(crate) get_dimensions_count: ffi::GetDimensionsCountFn,
    pub(crate) get_dimensions: ffi::GetDimensionsFn,
    pub(crate) get_tensor_element_type: ffi::GetTensorElementTypeFn,
    pub(crate) run: ffi::RunFn,
    pub(crate) release_session: ffi::ReleaseSessionFn,
    pub(crate) create_memory_info: ffi::CreateCpuMemoryInfoFn,
    pub(crate) release_memory_info: ffi::ReleaseMemoryInfoFn,
    pub(crate) create_tensor: ffi::CreateTensorWithDataAsOrtValueFn,
    pub(crate) release_value: ffi::ReleaseValueFn,
}

unsafe impl Send for Onnx {}
unsafe impl Sync for Onnx {}

impl Onnx {
    /// Load the API table and create an environment logging under `log_id`.
    pub fn new(log_id: &str, log_level: ffi::OrtLoggingLevel) -> Result<Arc<Self>> {
        let api_base = unsafe { ffi::OrtGetApiBase() };
        if api_base.is_null() {
            return Err(OnnxError::runtime_error(
                "Failed to get ONNX Runtime API base",
            ));
        }

        let version = unsafe {
            let version_ptr = ((*api_base).GetVersionString)();
            if version_ptr.is_null() {
                String::from("unknown")
            } else {
                CStr::from_ptr(version_ptr).to_string_lossy().into_owned()
            }
        };

        let api = unsafe { ((*api_base).GetApi)(ffi::ORT_API_VERSION) };
        if api.is_null() {
            return Err(OnnxError::runtime_error(&format!(
                "ONNX Runtime {} doesn't support API version {}",
                version,
                ffi::ORT_API_VERSION
            )));
        }

        let log_id = CString::new(log_id)
            .map_err(|_| OnnxError::invalid_argument("Null byte in log id"))?;

        unsafe {
            let api_ref = &*api;

            // the default allocator is process-wide and never released
            let mut allocator: *mut ffi::OrtAllocator = null_mut();
            let get_allocator: ffi::GetAllocatorWithDefaultOptionsFn =
                api_ref.get_fn(ffi::IDX_GET_ALLOCATOR_WITH_DEFAULT_OPTIONS);
            error::check_status(api, get_allocator(&mut allocator as *mut _))?;

            let create_env: ffi::CreateEnvFn = api_ref.get_fn(ffi::IDX_CREATE_ENV);
            let mut environment: *mut ffi::OrtEnv = null_mut();
            error::check_status(
                api,
                create_env(log_level, log_id.as_ptr(), &mut environment as *mut _),
            )?;

            Ok(Arc::new(Self {
                api,
                environment,
                version,
                allocator,
                allocator_free: api_ref.get_fn(ffi::IDX_ALLOCATOR_FREE),
                release_env: api_ref.get_fn(ffi::IDX_RELEASE_ENV),
                create_session: api_ref.get_fn(ffi::IDX_CREATE_SESSION),
                create_session_from_array: api_ref.get_fn(ffi::IDX_CREATE_SESSION_FROM_ARRAY),
                create_session_options: api_ref.get_fn(ffi::IDX_CREATE_SESSION_OPTIONS),
                set_session_execution_mode: api_ref.get_fn(ffi::IDX_SET_SESSION_EXECUTION_MODE),
                set_session_graph_optimization_level: api_ref
                    .get_fn(ffi::IDX_SET_SESSION_GRAPH_OPTIMIZATION_LEVEL),
                set_intra_op_num_threads: api_ref.get_fn(ffi::IDX_SET_INTRA_OP_NUM_THREADS),
                set_inter_op_num_threads: api_ref.get_fn(ffi::IDX_SET_INTER_OP_NUM_THREADS),
                release_session_options: api_ref.get_fn(ffi::IDX_RELEASE_SESSION_OPTIONS),
                session_get_input_count: api_ref.get_fn(ffi::IDX_SESSION_GET_INPUT_COUNT),
                session_get_output_count: api_ref.get_fn(ffi::IDX_SESSION_GET_OUTPUT_COUNT),
                session_get_input_name: api_ref.get_fn(ffi::IDX_SESSION_GET_INPUT_NAME),
                session_get_output_name: api_ref.get_fn(ffi::IDX_SESSION_GET_OUTPUT_NAME),
                session_get_input_type_info: api_ref
                    .get_fn(ffi::IDX_SESSION_GET_INPUT_TYPE_INFO),
                session_get_output_type_info: api_ref
                    .get_fn(ffi::IDX_SESSION_GET_OUTPUT_TYPE_INFO),
                release_type_info: api_ref.get_fn(ffi::IDX_RELEASE_TYPE_INFO),
                cast_type_info_to_tensor_info: api_ref
                    .get_fn(ffi::IDX_CAST_TYPE_INFO_TO_TENSOR_INFO),
                get_dimensions_count: api_ref.get_fn(ffi::IDX_GET_DIMENSIONS_COUNT),
                get_dimensions: api_ref.get_fn(ffi::IDX_GET_DIMENSIONS),
                get_tensor_element_type: api_ref.get_fn(ffi::IDX_GET_TENSOR_ELEMENT_TYPE),
                run: api_ref.get_fn(ffi::IDX_RUN),
                release_session: api_ref.get_fn(ffi::IDX_RELEASE_SESSION),
                create_memory_info: api_ref.get_fn(ffi::IDX_CREATE_CPU_MEMORY_INFO),
                release_memory_info: api_ref.get_fn(ffi::IDX_RELEASE_MEMORY_INFO),
                create_tensor: api_ref.get_fn(ffi::IDX_CREATE_TENSOR_WITH_DATA_AS_ORT_VALUE),
                release_value: api_ref.get_fn(ffi::IDX_RELEASE_VALUE),
            }))
        }
    }

    /// Version string reported by the loaded runtime library.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Create a session from an ONNX model file.
    pub fn create_session(
        self: &Arc<Self>,
        options: &SessionOptions,
        model_path: impl AsRef<Path>,
    ) -> Result<Session> {
        let native = NativeOptions::new(self, options)?;
        let path = encode_path(model_path.as_ref())?;
        let mut session: *mut ffi::OrtSession = null_mut();
        let status = unsafe {
            (self.create_session)(
                self.environment,
                path.as_ptr(),
                native.options,
                &mut session as *mut _,
            )
        };
        unsafe { error::check_status(self.api, status)? };
        Ok(Session::from_raw(self, session))
    }

    /// Create a session from an in-memory ONNX model.
    pub fn create_session_from_memory(
        self: &Arc<Self>,
        options: &SessionOptions,
        model: &[u8],
    ) -> Result<Session> {
        let native = NativeOptions::new(self, options)?;
        let mut session: *mut ffi::OrtSession = null_mut();
        let status = unsafe {
            (self.create_session_from_array)(
                self.environment,
                model.as_ptr() as *const std::ffi::c_void,
                model.len(),
                native.options,
                &mut session as *mut _,
            )
        };
        unsafe { error::check_status(self.api, status)? };
        Ok(Session::from_raw(self, session))
    }
}

impl Drop for Onnx {
    fn drop(&mut self) {
        if !self.environment.is_null() {
            unsafe { (self.release_env)(self.environment) };
        }
    }
}

/// Owned `OrtSessionOptions`, released when dropped.
struct NativeOptions<'a> {
    onnx: &'a Onnx,
    options: *mut ffi::OrtSessionOptions,
}

impl<'a> NativeOptions<'a> {
    fn new(onnx: &'a Onnx, settings: &SessionOptions) -> Result<Self> {
        let mut options: *mut ffi::OrtSessionOptions = null_mut();
        unsafe {
            error::check_status(
                onnx.api,
                (onnx.create_session_options)(&mut options as *mut _),
            )?
        };
        let native = NativeOptions { onnx, options };

        unsafe {
            error::check_status(
                onnx.api,
                (onnx.set_session_execution_mode)(options, ffi::ExecutionMode::Sequential),
            )?;
            error::check_status(
                onnx.api,
                (onnx.set_session_graph_optimization_level)(
                    options,
                    settings.optimization_level.into(),
                ),
            )?;
            error::check_status(
                onnx.api,
                (onnx.set_intra_op_num_threads)(options, thread_count(settings.intra_threads)?),
            )?;
            error::check_status(
                onnx.api,
                (onnx.set_inter_op_num_threads)(options, thread_count(settings.inter_threads)?),
            )?;
        }

        Ok(native)
    }
}

impl Drop for NativeOptions<'_> {
    fn drop(&mut self) {
        if !self.options.is_null() {
            unsafe { (self.onnx.release_session_options)(self.options) };
        }
    }
}

fn thread_count(threads: usize) -> Result<i32> {
    i32::try_from(threads)
        .map_err(|_| OnnxError::invalid_argument(&format!("Thread count {} too large", threads)))
}

#[cfg(not(windows))]
fn encode_path(path: &Path) -> Result<Vec<ffi::OrtChar>> {
    let path_str = path
        .to_str()
        .ok_or_else(|| OnnxError::invalid_argument("Invalid UTF-8 in model path"))?;
    let c_path = CString::new(path_str)
        .map_err(|_| OnnxError::invalid_argument("Null byte in model path"))?;
    Ok(c_path
        .into_bytes_with_nul()
        .into_iter()
        .map(|b| b as ffi::OrtChar)
        .collect())
}

#[cfg(windows)]
fn encode_path(path: &Path) -> Result<Vec<ffi::OrtChar>> {
    use std::os::windows::ffi::OsStrExt;
    let mut wide: Vec<u16> = path.as_os_str().encode_wide().collect();
    if wide.contains(&0) {
        return Err(OnnxError::invalid_argument("Null byte in model path"));
    }
    wide.push(0);
    Ok(wide)
}
