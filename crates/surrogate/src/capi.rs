//! C interface for generated simulation code.
//!
//! ```c
//! surrogate_init_logging("logs");
//! Surrogate* s = surrogate_init("eq14.onnx", "simpleLoop_eq14", 2, 1, NULL, NULL);
//! if (s == NULL) {
//!     fprintf(stderr, "%s\n", surrogate_last_error());
//! }
//! float* x = surrogate_input_ptr(s);
//! x[0] = 1.0f; x[1] = 0.5f;
//! surrogate_eval(s);
//! float y = surrogate_output_ptr(s)[0];
//! surrogate_deinit(s);
//! ```
//!
//! All surrogates created here share one ONNX Runtime environment, created
//! by the first `surrogate_init`. If that fails, the runtime stays
//! unavailable for the rest of the process.

use {
    crate::{
        config::SurrogateConfig,
        error::{Result, SurrogateError},
        surrogate::Surrogate,
    },
    onnx::{LogLevel, Onnx},
    std::{
        cell::RefCell,
        ffi::{CStr, CString, c_char, c_int, c_uint},
        ptr::{null, null_mut},
        sync::{Arc, OnceLock},
    },
};

static RUNTIME: OnceLock<std::result::Result<Arc<Onnx>, String>> = OnceLock::new();

fn runtime() -> Result<Arc<Onnx>> {
    RUNTIME
        .get_or_init(|| Onnx::new("surrogate", LogLevel::Warning).map_err(|e| e.to_string()))
        .as_ref()
        .map(Arc::clone)
        .map_err(|msg| runtime_unavailable(msg))
}

fn runtime_unavailable(reason: &str) -> SurrogateError {
    SurrogateError::Load(format!(
        "ONNX Runtime could not be initialized for this process: {}",
        reason
    ))
}

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(error: &SurrogateError) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(error.to_string()).ok();
    });
}

/// Read an optional C string argument. Null means "not given".
unsafe fn optional_str(ptr: *const c_char, what: &str) -> Result<Option<String>> {
    if ptr.is_null() {
        return Ok(None);
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(|s| Some(s.to_string()))
        .map_err(|_| SurrogateError::Load(format!("Invalid UTF-8 in {}", what)))
}

unsafe fn required_str(ptr: *const c_char, what: &str) -> Result<String> {
    unsafe { optional_str(ptr, what) }?
        .ok_or_else(|| SurrogateError::Load(format!("Missing {}", what)))
}

unsafe fn init(
    model_path: *const c_char,
    model_name: *const c_char,
    n_inputs: c_uint,
    n_outputs: c_uint,
    input_name: *const c_char,
    output_name: *const c_char,
) -> Result<Surrogate> {
    let mut config = unsafe {
        SurrogateConfig::new(
            required_str(model_path, "model path")?,
            required_str(model_name, "model name")?,
            n_inputs as usize,
            n_outputs as usize,
            None,
            None,
        )
    };
    config.input_name = unsafe { optional_str(input_name, "input node name")? };
    config.output_name = unsafe { optional_str(output_name, "output node name")? };
    Surrogate::new(&runtime()?, &config)
}

/// Install the process logger.
///
/// With a directory, log lines go to daily files in it; with null they go
/// to stdout. Returns 0 on success and -1 if the directory cannot be used.
/// Only the first logger installed in a process takes effect.
///
/// # Safety
/// `dir` must be null or point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn surrogate_init_logging(dir: *const c_char) -> c_int {
    let dir = match unsafe { optional_str(dir, "log directory") } {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("surrogate_init_logging failed: {}", e);
            return -1;
        }
    };
    match dir {
        Some(dir) => match base::init_file_logger(&dir) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("surrogate_init_logging failed for {}: {}", dir, e);
                -1
            }
        },
        None => {
            base::init_stdout_logger();
            0
        }
    }
}

/// Load a surrogate model.
///
/// Returns null if the model cannot be loaded; the reason is logged and
/// available from [`surrogate_last_error`]. `input_name` and `output_name`
/// may be null to use the names declared by the model.
///
/// # Safety
/// Every non-null pointer must point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn surrogate_init(
    model_path: *const c_char,
    model_name: *const c_char,
    n_inputs: c_uint,
    n_outputs: c_uint,
    input_name: *const c_char,
    output_name: *const c_char,
) -> *mut Surrogate {
    match unsafe {
        init(
            model_path,
            model_name,
            n_inputs,
            n_outputs,
            input_name,
            output_name,
        )
    } {
        Ok(surrogate) => Box::into_raw(Box::new(surrogate)),
        Err(e) => {
            log::error!("surrogate_init failed: {}", e);
            set_last_error(&e);
            null_mut()
        }
    }
}

/// Input buffer of `n_inputs` floats, stable until `surrogate_deinit`.
///
/// # Safety
/// `handle` must be null or a live pointer from [`surrogate_init`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn surrogate_input_ptr(handle: *mut Surrogate) -> *mut f32 {
    match unsafe { handle.as_mut() } {
        Some(surrogate) => surrogate.input_mut().as_mut_ptr(),
        None => null_mut(),
    }
}

/// Output buffer of `n_outputs` floats, stable until `surrogate_deinit`.
///
/// # Safety
/// `handle` must be null or a live pointer from [`surrogate_init`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn surrogate_output_ptr(handle: *const Surrogate) -> *const f32 {
    match unsafe { handle.as_ref() } {
        Some(surrogate) => surrogate.output().as_ptr(),
        None => null(),
    }
}

/// Evaluate the model on the current input buffer.
///
/// Aborts the process if evaluation fails.
///
/// # Safety
/// `handle` must be a live pointer from [`surrogate_init`], not used by
/// another thread during the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn surrogate_eval(handle: *mut Surrogate) {
    match unsafe { handle.as_mut() } {
        Some(surrogate) => surrogate.evaluate_or_abort(),
        None => base::log_fatal!("surrogate_eval called with a null handle"),
    }
}

/// Release a surrogate. Null is ignored.
///
/// # Safety
/// `handle` must be null or a pointer from [`surrogate_init`] that has not
/// been released yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn surrogate_deinit(handle: *mut Surrogate) {
    if !handle.is_null() {
        drop(unsafe { Box::from_raw(handle) });
    }
}

/// Message of the last failed `surrogate_init` on this thread, or null.
///
/// The string stays valid until the next failing call on the same thread.
#[unsafe(no_mangle)]
pub extern "C" fn surrogate_last_error() -> *const c_char {
    LAST_ERROR.with(|e| e.borrow().as_ref().map_or(null(), |msg| msg.as_ptr()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handles() {
        unsafe {
            assert!(surrogate_input_ptr(null_mut()).is_null());
            assert!(surrogate_output_ptr(null()).is_null());
            surrogate_deinit(null_mut());
        }
    }

    #[test]
    fn test_optional_str() {
        let name = CString::new("x").unwrap();
        unsafe {
            assert_eq!(optional_str(null(), "name").unwrap(), None);
            assert_eq!(
                optional_str(name.as_ptr(), "name").unwrap().as_deref(),
                Some("x")
            );
            assert!(matches!(
                required_str(null(), "model path"),
                Err(SurrogateError::Load(_))
            ));
        }
    }

    #[test]
    fn test_runtime_unavailable_names_the_process() {
        let err = runtime_unavailable("libonnxruntime.so not found");
        assert!(matches!(err, SurrogateError::Load(_)));
        let msg = err.to_string();
        assert!(msg.contains("could not be initialized for this process"));
        assert!(msg.contains("libonnxruntime.so not found"));
    }

    #[test]
    fn test_init_logging_rejects_unusable_dir() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let dir = CString::new(file.path().join("logs").to_str().unwrap()).unwrap();
        assert_eq!(unsafe { surrogate_init_logging(dir.as_ptr()) }, -1);
    }

    #[test]
    fn test_last_error_is_per_thread() {
        set_last_error(&SurrogateError::Load("first".into()));
        let msg = unsafe { CStr::from_ptr(surrogate_last_error()) };
        assert_eq!(msg.to_str().unwrap(), "load error: first");

        std::thread::spawn(|| assert!(surrogate_last_error().is_null()))
            .join()
            .unwrap();
    }
}
