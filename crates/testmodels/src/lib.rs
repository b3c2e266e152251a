//! Small ONNX models for tests, encoded on the fly.

pub mod proto;

use {
    proto::{Dimension, GraphProto, NodeProto, TensorProto},
    std::{
        fs,
        io,
        path::{Path, PathBuf},
    },
    tempfile::TempDir,
};

/// `y = x · W` with `x` of shape `(1, n)` and `W` of shape `(n, m)`.
///
/// The default weights are small integers, so results are exact in `f32`
/// regardless of summation order.
#[derive(Debug, Clone)]
pub struct MatMulModel {
    pub n: usize,
    pub m: usize,
    pub weights: Vec<f32>,
    pub input_name: String,
    pub output_name: String,
    pub dynamic_batch: bool,
    pub dynamic_columns: bool,
    pub elem_type: i32,
}

impl MatMulModel {
    pub fn new(n: usize, m: usize) -> Self {
        let weights = (0..n)
            .flat_map(|i| (0..m).map(move |j| ((i + 2 * j) % 5) as f32 - 2.0))
            .collect();
        MatMulModel {
            n,
            m,
            weights,
            input_name: "x".to_string(),
            output_name: "y".to_string(),
            dynamic_batch: false,
            dynamic_columns: false,
            elem_type: proto::FLOAT,
        }
    }

    pub fn names(mut self, input: &str, output: &str) -> Self {
        self.input_name = input.to_string();
        self.output_name = output.to_string();
        self
    }

    pub fn dynamic_batch(mut self) -> Self {
        self.dynamic_batch = true;
        self
    }

    /// Declare the output width as symbolic. The runtime only learns the
    /// real width (`m`) when the graph runs.
    pub fn dynamic_columns(mut self) -> Self {
        self.dynamic_columns = true;
        self
    }

    pub fn double(mut self) -> Self {
        self.elem_type = proto::DOUBLE;
        self
    }

    /// Reference result for one input row.
    pub fn expected(&self, x: &[f32]) -> Vec<f32> {
        assert_eq!(x.len(), self.n);
        (0..self.m)
            .map(|j| (0..self.n).map(|i| x[i] * self.weights[i * self.m + j]).sum())
            .collect()
    }

    pub fn encode(&self) -> Vec<u8> {
        let batch = if self.dynamic_batch {
            Dimension::dynamic("batch")
        } else {
            Dimension::fixed(1)
        };
        let columns = if self.dynamic_columns {
            Dimension::dynamic("columns")
        } else {
            Dimension::fixed(self.m)
        };
        let raw_data = if self.elem_type == proto::DOUBLE {
            self.weights
                .iter()
                .flat_map(|&w| (w as f64).to_le_bytes())
                .collect()
        } else {
            self.weights.iter().flat_map(|w| w.to_le_bytes()).collect()
        };

        proto::model(GraphProto {
            name: "matmul".to_string(),
            node: vec![NodeProto {
                input: vec![self.input_name.clone(), "W".to_string()],
                output: vec![self.output_name.clone()],
                name: "matmul".to_string(),
                op_type: "MatMul".to_string(),
            }],
            initializer: vec![TensorProto {
                dims: vec![self.n as i64, self.m as i64],
                data_type: self.elem_type,
                name: "W".to_string(),
                raw_data,
            }],
            input: vec![proto::tensor_value(
                &self.input_name,
                self.elem_type,
                vec![batch.clone(), Dimension::fixed(self.n)],
            )],
            output: vec![proto::tensor_value(
                &self.output_name,
                self.elem_type,
                vec![batch, columns],
            )],
        })
    }
}

/// `c = a + b`, two inputs of shape `(1, n)`.
pub fn add_model(n: usize) -> Vec<u8> {
    let dims = || vec![Dimension::fixed(1), Dimension::fixed(n)];
    proto::model(GraphProto {
        name: "add".to_string(),
        node: vec![NodeProto {
            input: vec!["a".to_string(), "b".to_string()],
            output: vec!["c".to_string()],
            name: "add".to_string(),
            op_type: "Add".to_string(),
        }],
        initializer: Vec::new(),
        input: vec![
            proto::tensor_value("a", proto::FLOAT, dims()),
            proto::tensor_value("b", proto::FLOAT, dims()),
        ],
        output: vec![proto::tensor_value("c", proto::FLOAT, dims())],
    })
}

/// Temporary directory holding model files, removed on drop.
pub struct ModelDir {
    dir: TempDir,
}

impl ModelDir {
    pub fn new() -> io::Result<Self> {
        Ok(ModelDir {
            dir: tempfile::Builder::new().prefix("surrogate-models").tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.dir.path().join(file_name);
        fs::write(&path, bytes)?;
        Ok(path)
    }
}
