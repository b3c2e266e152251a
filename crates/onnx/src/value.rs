use {
    crate::*,
    std::{ptr::NonNull, sync::Arc},
};

mod sealed {
    pub trait Sealed {}
}

/// Types that can be used as tensor elements
pub trait TensorElement: sealed::Sealed + Sized + Copy + Default + Send {
    fn element_type() -> ffi::ONNXTensorElementDataType;
}

macro_rules! tensor_element {
    ($ty:ty, $element:ident) => {
        impl sealed::Sealed for $ty {}
        impl TensorElement for $ty {
            fn element_type() -> ffi::ONNXTensorElementDataType {
                ffi::ONNXTensorElementDataType::$element
            }
        }
    };
}

tensor_element!(f32, Float);
tensor_element!(f64, Double);
tensor_element!(i32, Int32);
tensor_element!(i64, Int64);
tensor_element!(bool, Bool);

/// ONNX Runtime value handle
pub struct Value {
    onnx: Arc<Onnx>,
    value: *mut ffi::OrtValue,
}

unsafe impl Send for Value {}

impl Value {
    pub(crate) fn as_ptr(&self) -> *const ffi::OrtValue {
        self.value
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut ffi::OrtValue {
        self.value
    }

    fn release(&mut self) {
        if !self.value.is_null() {
            unsafe { (self.onnx.release_value)(self.value) };
            self.value = std::ptr::null_mut();
        }
    }
}

impl Drop for Value {
    fn drop(&mut self) {
        self.release();
    }
}

/// Tensor over a host buffer owned by this struct.
///
/// The runtime reads and writes the buffer directly, so its address stays
/// fixed until the tensor is dropped. The `OrtValue` is released before the
/// buffer is freed.
pub struct Tensor<T: TensorElement> {
    value: Value,
    data: NonNull<T>,
    len: usize,
    shape: Vec<usize>,
}

unsafe impl<T: TensorElement> Send for Tensor<T> {}

impl<T: TensorElement> Tensor<T> {
    pub fn zeros(onnx: &Arc<Onnx>, shape: &[usize]) -> Result<Self> {
        let len = element_count(shape)?;
        Self::from_boxed(onnx, shape, vec![T::default(); len].into_boxed_slice())
    }

    pub fn from_slice(onnx: &Arc<Onnx>, shape: &[usize], data: &[T]) -> Result<Self> {
        let expected = element_count(shape)?;
        if data.len() != expected {
            return Err(OnnxError::invalid_argument(&format!(
                "Data length {} doesn't match shape {:?} (expected {})",
                data.len(),
                shape,
                expected
            )));
        }
        Self::from_boxed(onnx, shape, data.into())
    }

    fn from_boxed(onnx: &Arc<Onnx>, shape: &[usize], buffer: Box<[T]>) -> Result<Self> {
        let shape_i64 = shape
            .iter()
            .map(|&dim| i64::try_from(dim))
            .collect::<std::result::Result<Vec<i64>, _>>()
            .map_err(|_| OnnxError::invalid_argument("Tensor dimension too large"))?;

        let len = buffer.len();
        let byte_len = std::mem::size_of_val(&*buffer);
        // SAFETY: Box::into_raw never returns null
        let data = unsafe { NonNull::new_unchecked(Box::into_raw(buffer) as *mut T) };
        // from here on the buffer is freed by Tensor::drop, even on error
        let mut tensor = Tensor {
            value: Value {
                onnx: Arc::clone(onnx),
                value: std::ptr::null_mut(),
            },
            data,
            len,
            shape: shape.to_vec(),
        };

        unsafe {
            let mut memory_info: *mut ffi::OrtMemoryInfo = std::ptr::null_mut();
            error::check_status(
                onnx.api,
                (onnx.create_memory_info)(
                    ffi::OrtAllocatorType::Arena,
                    ffi::OrtMemType::Default,
                    &mut memory_info as *mut _,
                ),
            )?;

            let status = (onnx.create_tensor)(
                memory_info,
                data.as_ptr() as *mut std::ffi::c_void,
                byte_len,
                shape_i64.as_ptr(),
                shape_i64.len(),
                T::element_type(),
                &mut tensor.value.value as *mut _,
            );

            // the value keeps its own copy of the memory info
            (onnx.release_memory_info)(memory_info);
            error::check_status(onnx.api, status)?;
        }

        Ok(tensor)
    }

    pub fn as_slice(&self) -> &[T] {
        unsafe { std::slice::from_raw_parts(self.data.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { std::slice::from_raw_parts_mut(self.data.as_ptr(), self.len) }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }
}

impl<T: TensorElement> Drop for Tensor<T> {
    fn drop(&mut self) {
        self.value.release();
        unsafe {
            drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                self.data.as_ptr(),
                self.len,
            )));
        }
    }
}

fn element_count(shape: &[usize]) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| OnnxError::invalid_argument(&format!("Shape {:?} overflows", shape)))
}
