use {
    crate::ffi::{self, OrtApi, OrtErrorCode, OrtStatus},
    std::ffi::CStr,
    thiserror::Error,
};

/// Error reported by ONNX Runtime or by this binding
#[derive(Debug, Clone, Error)]
#[error("ONNX error ({code:?}): {message}")]
pub struct OnnxError {
    code: OrtErrorCode,
    message: String,
}

impl OnnxError {
    pub fn new(code: OrtErrorCode, message: impl Into<String>) -> Self {
        OnnxError {
            code,
            message: message.into(),
        }
    }

    /// Create a runtime error with a message
    pub(crate) fn runtime_error(msg: &str) -> Self {
        Self::new(OrtErrorCode::RuntimeException, msg)
    }

    pub(crate) fn invalid_argument(msg: &str) -> Self {
        Self::new(OrtErrorCode::InvalidArgument, msg)
    }

    /// Create an error from an OrtStatus pointer, releasing the status
    ///
    /// # Safety
    /// - status must be a valid non-null OrtStatus pointer
    /// - api must be a valid OrtApi pointer
    pub(crate) unsafe fn from_status(api: *const OrtApi, status: *mut OrtStatus) -> Self {
        unsafe {
            let api = &*api;

            let get_error_code: ffi::GetErrorCodeFn = api.get_fn(ffi::IDX_GET_ERROR_CODE);
            let code = get_error_code(status);

            let get_error_message: ffi::GetErrorMessageFn =
                api.get_fn(ffi::IDX_GET_ERROR_MESSAGE);
            let msg_ptr = get_error_message(status);
            let message = if msg_ptr.is_null() {
                String::from("Unknown error")
            } else {
                CStr::from_ptr(msg_ptr).to_string_lossy().into_owned()
            };

            let release_status: ffi::ReleaseStatusFn = api.get_fn(ffi::IDX_RELEASE_STATUS);
            release_status(status);

            OnnxError { code, message }
        }
    }

    pub fn code(&self) -> OrtErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type for ONNX operations
pub type Result<T> = std::result::Result<T, OnnxError>;

/// Convert an OrtStatus into a Result
///
/// # Safety
/// - status can be null (indicates success)
/// - if non-null, status must be a valid OrtStatus pointer
/// - api must be a valid OrtApi pointer
pub(crate) unsafe fn check_status(api: *const OrtApi, status: *mut OrtStatus) -> Result<()> {
    if status.is_null() {
        Ok(())
    } else {
        unsafe { Err(OnnxError::from_status(api, status)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_implements_error_trait() {
        let err = OnnxError::new(OrtErrorCode::Fail, "test error");
        fn assert_error<T: std::error::Error + Send + Sync>(_: &T) {}
        assert_error(&err);
    }

    #[test]
    fn test_error_display() {
        let err = OnnxError::invalid_argument("invalid input");
        let display = format!("{}", err);
        assert!(display.contains("invalid input"));
        assert!(display.contains("InvalidArgument"));
    }

    #[test]
    fn test_runtime_error_code() {
        let err = OnnxError::runtime_error("boom");
        assert_eq!(err.code(), OrtErrorCode::RuntimeException);
        assert_eq!(err.message(), "boom");
    }
}
