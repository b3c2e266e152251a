use {
    crate::*,
    std::{
        ffi::{CStr, c_char},
        ptr::null_mut,
        sync::Arc,
    },
};

/// ONNX Runtime session
pub struct Session {
    onnx: Arc<Onnx>,
    session: *mut ffi::OrtSession,
}

// An OrtSession may move between threads; `run_bound` takes `&mut self`, so
// it is never run from two threads at once.
unsafe impl Send for Session {}

/// Element type and dimensions of a model input or output.
///
/// Dynamic dimensions are reported as `-1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorInfo {
    pub element_type: ffi::ONNXTensorElementDataType,
    pub shape: Vec<i64>,
}

#[derive(Clone, Copy)]
enum Side {
    Input,
    Output,
}

impl Session {
    pub(crate) fn from_raw(onnx: &Arc<Onnx>, session: *mut ffi::OrtSession) -> Self {
        Session {
            onnx: Arc::clone(onnx),
            session,
        }
    }

    /// Get the number of model inputs
    pub fn input_count(&self) -> Result<usize> {
        let mut count: usize = 0;
        unsafe {
            error::check_status(
                self.onnx.api,
                (self.onnx.session_get_input_count)(self.session, &mut count as *mut _),
            )?
        };
        Ok(count)
    }

    /// Get the number of model outputs
    pub fn output_count(&self) -> Result<usize> {
        let mut count: usize = 0;
        unsafe {
            error::check_status(
                self.onnx.api,
                (self.onnx.session_get_output_count)(self.session, &mut count as *mut _),
            )?
        };
        Ok(count)
    }

    /// Get the name of an input by index
    pub fn input_name(&self, index: usize) -> Result<String> {
        self.node_name(Side::Input, index)
    }

    /// Get the name of an output by index
    pub fn output_name(&self, index: usize) -> Result<String> {
        self.node_name(Side::Output, index)
    }

    pub fn input_info(&self, index: usize) -> Result<TensorInfo> {
        self.tensor_info(Side::Input, index)
    }

    pub fn output_info(&self, index: usize) -> Result<TensorInfo> {
        self.tensor_info(Side::Output, index)
    }

    fn node_name(&self, side: Side, index: usize) -> Result<String> {
        let get_name = match side {
            Side::Input => self.onnx.session_get_input_name,
            Side::Output => self.onnx.session_get_output_name,
        };
        unsafe {
            let mut name_ptr: *mut c_char = null_mut();
            error::check_status(
                self.onnx.api,
                get_name(
                    self.session,
                    index,
                    self.onnx.allocator,
                    &mut name_ptr as *mut _,
                ),
            )?;

            let name = CStr::from_ptr(name_ptr).to_str().map(str::to_string);
            (self.onnx.allocator_free)(self.onnx.allocator, name_ptr as *mut std::ffi::c_void);
            name.map_err(|_| OnnxError::runtime_error("Invalid UTF-8 in node name"))
        }
    }

    fn tensor_info(&self, side: Side, index: usize) -> Result<TensorInfo> {
        let get_type_info = match side {
            Side::Input => self.onnx.session_get_input_type_info,
            Side::Output => self.onnx.session_get_output_type_info,
        };
        unsafe {
            let mut type_info: *mut ffi::OrtTypeInfo = null_mut();
            error::check_status(
                self.onnx.api,
                get_type_info(self.session, index, &mut type_info as *mut _),
            )?;
            let type_info = TypeInfo {
                onnx: &*self.onnx,
                type_info,
            };

            // borrowed from type_info, not owned
            let mut tensor_info: *const ffi::OrtTensorTypeAndShapeInfo = std::ptr::null();
            error::check_status(
                self.onnx.api,
                (self.onnx.cast_type_info_to_tensor_info)(
                    type_info.type_info,
                    &mut tensor_info as *mut _,
                ),
            )?;
            if tensor_info.is_null() {
                return Err(OnnxError::runtime_error("Node is not a tensor type"));
            }

            read_tensor_info(&self.onnx, tensor_info)
        }
    }

    /// Run the model, writing results into preallocated output values.
    ///
    /// Every output value must already have the shape and element type the
    /// graph produces; the runtime fills its buffer in place.
    pub fn run_bound(
        &mut self,
        inputs: &[(&CStr, &Value)],
        outputs: &mut [(&CStr, &mut Value)],
    ) -> Result<()> {
        let input_names: Vec<*const c_char> = inputs.iter().map(|(name, _)| name.as_ptr()).collect();
        let input_values: Vec<*const ffi::OrtValue> =
            inputs.iter().map(|(_, value)| value.as_ptr()).collect();
        let output_names: Vec<*const c_char> =
            outputs.iter().map(|(name, _)| name.as_ptr()).collect();
        let mut output_values: Vec<*mut ffi::OrtValue> =
            outputs.iter_mut().map(|(_, value)| value.as_mut_ptr()).collect();

        let status = unsafe {
            (self.onnx.run)(
                self.session,
                std::ptr::null(), // default run options
                input_names.as_ptr(),
                input_values.as_ptr(),
                inputs.len(),
                output_names.as_ptr(),
                outputs.len(),
                output_values.as_mut_ptr(),
            )
        };
        unsafe { error::check_status(self.onnx.api, status)? };

        debug_assert!(
            outputs
                .iter()
                .zip(&output_values)
                .all(|((_, value), &ptr)| value.as_ptr() == ptr as *const _),
            "preallocated outputs must be filled in place"
        );
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.session.is_null() {
            unsafe { (self.onnx.release_session)(self.session) };
        }
    }
}

/// Owned `OrtTypeInfo`, released when dropped.
struct TypeInfo<'a> {
    onnx: &'a Onnx,
    type_info: *mut ffi::OrtTypeInfo,
}

impl Drop for TypeInfo<'_> {
    fn drop(&mut self) {
        if !self.type_info.is_null() {
            unsafe { (self.onnx.release_type_info)(self.type_info) };
        }
    }
}

/// Read element type and dimensions from tensor type/shape info.
///
/// # Safety
/// `info` must be a valid pointer for the duration of the call.
unsafe fn read_tensor_info(
    onnx: &Onnx,
    info: *const ffi::OrtTensorTypeAndShapeInfo,
) -> Result<TensorInfo> {
    unsafe {
        let mut element_type = ffi::ONNXTensorElementDataType::Undefined;
        error::check_status(
            onnx.api,
            (onnx.get_tensor_element_type)(info, &mut element_type as *mut _),
        )?;

        let mut dim_count: usize = 0;
        error::check_status(
            onnx.api,
            (onnx.get_dimensions_count)(info, &mut dim_count as *mut _),
        )?;

        let mut shape = vec![0i64; dim_count];
        error::check_status(
            onnx.api,
            (onnx.get_dimensions)(info, shape.as_mut_ptr(), dim_count),
        )?;

        Ok(TensorInfo {
            element_type,
            shape,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Session>();
    }

    #[test]
    fn test_tensor_info_equality() {
        let a = TensorInfo {
            element_type: ffi::ONNXTensorElementDataType::Float,
            shape: vec![-1, 4],
        };
        assert_eq!(a.clone(), a);
        assert_ne!(
            a,
            TensorInfo {
                element_type: ffi::ONNXTensorElementDataType::Double,
                shape: vec![-1, 4],
            }
        );
    }
}
