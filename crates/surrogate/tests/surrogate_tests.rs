use {
    std::{fs, sync::Arc},
    surrogate::{Onnx, RuntimeLogLevel, Surrogate, SurrogateConfig, SurrogateError},
    testmodels::{MatMulModel, ModelDir, add_model},
};

fn runtime() -> Arc<Onnx> {
    Onnx::new("surrogate-tests", onnx::LogLevel::Warning).expect("onnxruntime must be installed")
}

fn matmul_fixture(dir: &ModelDir, model: &MatMulModel) -> SurrogateConfig {
    let path = dir.write("matmul.onnx", &model.encode()).unwrap();
    SurrogateConfig::new(
        path,
        "matmul",
        model.n,
        model.m,
        Some(&model.input_name),
        Some(&model.output_name),
    )
}

fn expect_load_error(result: Result<Surrogate, SurrogateError>) -> String {
    match result {
        Err(SurrogateError::Load(msg)) => msg,
        Err(other) => panic!("expected a load error, got {}", other),
        Ok(_) => panic!("expected a load error, model loaded"),
    }
}

#[test]
fn test_load_single_input_single_output() {
    let onnx = runtime();
    let dir = ModelDir::new().unwrap();
    let config = matmul_fixture(&dir, &MatMulModel::new(3, 2));
    let surrogate = Surrogate::new(&onnx, &config).unwrap();

    assert_eq!(surrogate.model_name(), "matmul");
    assert_eq!(surrogate.model_path(), config.model_path.as_path());
    assert_eq!(surrogate.input_size(), 3);
    assert_eq!(surrogate.output_size(), 2);
    assert_eq!(surrogate.input(), &[0.0; 3]);
    assert_eq!(surrogate.output(), &[0.0; 2]);
    assert_eq!(surrogate.input_name(), "x");
    assert_eq!(surrogate.output_name(), "y");
}

#[test]
fn test_evaluate_writes_output_and_keeps_input() {
    let onnx = runtime();
    let dir = ModelDir::new().unwrap();
    let model = MatMulModel::new(4, 3);
    let mut surrogate = Surrogate::new(&onnx, &matmul_fixture(&dir, &model)).unwrap();

    let x = [0.5, -1.0, 2.0, 4.0];
    surrogate.input_mut().copy_from_slice(&x);
    surrogate.evaluate().unwrap();

    assert_eq!(surrogate.output().len(), 3);
    assert_eq!(surrogate.output(), model.expected(&x).as_slice());
    assert_eq!(surrogate.input(), &x);
}

#[test]
fn test_buffers_keep_their_address() {
    let onnx = runtime();
    let dir = ModelDir::new().unwrap();
    let mut surrogate =
        Surrogate::new(&onnx, &matmul_fixture(&dir, &MatMulModel::new(2, 2))).unwrap();

    let input = surrogate.input_mut().as_mut_ptr();
    let output = surrogate.output().as_ptr();
    surrogate.evaluate().unwrap();
    surrogate.evaluate_slice(&[1.0, 1.0]).unwrap();
    assert_eq!(surrogate.input_mut().as_mut_ptr(), input);
    assert_eq!(surrogate.output().as_ptr(), output);
}

#[test]
fn test_consecutive_evaluations_are_independent() {
    let onnx = runtime();
    let dir = ModelDir::new().unwrap();
    let model = MatMulModel::new(3, 2);
    let mut surrogate = Surrogate::new(&onnx, &matmul_fixture(&dir, &model)).unwrap();

    let first = surrogate.evaluate_slice(&[1.0, 2.0, 3.0]).unwrap().to_vec();
    let second = surrogate.evaluate_slice(&[-3.0, 0.0, 1.0]).unwrap().to_vec();
    assert_eq!(first, model.expected(&[1.0, 2.0, 3.0]));
    assert_eq!(second, model.expected(&[-3.0, 0.0, 1.0]));

    // same input again gives the same result
    let again = surrogate.evaluate_slice(&[1.0, 2.0, 3.0]).unwrap();
    assert_eq!(again, first.as_slice());
}

#[test]
fn test_evaluate_runtime_failure_is_fatal() {
    let onnx = runtime();
    let dir = ModelDir::new().unwrap();
    // the graph really produces 3 columns behind a symbolic output width
    let model = MatMulModel::new(2, 3).dynamic_columns();
    let mut config = matmul_fixture(&dir, &model);
    config.output_size = 2;

    let mut surrogate = Surrogate::new(&onnx, &config).unwrap();
    surrogate.set_input(&[1.0, 2.0]).unwrap();
    match surrogate.evaluate() {
        Err(err @ SurrogateError::Runtime(_)) => {
            assert!(err.is_fatal());
            assert!(err.to_string().contains("matmul"));
        }
        other => panic!("expected a runtime error, got {:?}", other),
    }
    assert_eq!(surrogate.input(), &[1.0, 2.0]);
    assert!(matches!(
        surrogate.evaluate_slice(&[0.0, 0.0]),
        Err(SurrogateError::Runtime(_))
    ));
}

#[test]
fn test_set_input_length_mismatch() {
    let onnx = runtime();
    let dir = ModelDir::new().unwrap();
    let mut surrogate =
        Surrogate::new(&onnx, &matmul_fixture(&dir, &MatMulModel::new(3, 1))).unwrap();

    let err = surrogate.set_input(&[1.0, 2.0]).unwrap_err();
    assert_eq!(
        err,
        SurrogateError::InvalidInput {
            expected: 3,
            actual: 2
        }
    );
    assert!(surrogate.evaluate_slice(&[1.0; 4]).is_err());
    assert_eq!(surrogate.input(), &[0.0; 3]);
}

#[test]
fn test_node_names_are_discovered() {
    let onnx = runtime();
    let dir = ModelDir::new().unwrap();
    let model = MatMulModel::new(2, 1).names("onnx::Flatten_0", "13");
    let mut config = matmul_fixture(&dir, &model);
    config.input_name = None;
    config.output_name = None;

    let surrogate = Surrogate::new(&onnx, &config).unwrap();
    assert_eq!(surrogate.input_name(), "onnx::Flatten_0");
    assert_eq!(surrogate.output_name(), "13");
}

#[test]
fn test_dynamic_batch_dimension_is_accepted() {
    let onnx = runtime();
    let dir = ModelDir::new().unwrap();
    let model = MatMulModel::new(3, 2).dynamic_batch();
    let mut surrogate = Surrogate::new(&onnx, &matmul_fixture(&dir, &model)).unwrap();
    let y = surrogate.evaluate_slice(&[1.0, 0.0, -1.0]).unwrap();
    assert_eq!(y, model.expected(&[1.0, 0.0, -1.0]).as_slice());
}

#[test]
fn test_two_input_model_is_rejected() {
    let onnx = runtime();
    let dir = ModelDir::new().unwrap();
    let path = dir.write("add.onnx", &add_model(2)).unwrap();
    let config = SurrogateConfig::new(path, "add", 2, 2, None, None);
    let msg = expect_load_error(Surrogate::new(&onnx, &config));
    assert!(msg.contains("2 inputs"));
}

#[test]
fn test_wrong_node_names_are_rejected() {
    let onnx = runtime();
    let dir = ModelDir::new().unwrap();
    let mut config = matmul_fixture(&dir, &MatMulModel::new(2, 2));
    config.input_name = Some("input".to_string());
    expect_load_error(Surrogate::new(&onnx, &config));

    config.input_name = Some("x".to_string());
    config.output_name = Some("output".to_string());
    expect_load_error(Surrogate::new(&onnx, &config));
}

#[test]
fn test_wrong_sizes_are_rejected() {
    let onnx = runtime();
    let dir = ModelDir::new().unwrap();
    let mut config = matmul_fixture(&dir, &MatMulModel::new(3, 2));
    config.input_size = 4;
    let msg = expect_load_error(Surrogate::new(&onnx, &config));
    assert!(msg.contains("shape"));

    config.input_size = 3;
    config.output_size = 1;
    expect_load_error(Surrogate::new(&onnx, &config));

    config.output_size = 0;
    expect_load_error(Surrogate::new(&onnx, &config));
}

#[test]
fn test_non_float_model_is_rejected() {
    let onnx = runtime();
    let dir = ModelDir::new().unwrap();
    let config = matmul_fixture(&dir, &MatMulModel::new(2, 2).double());
    let msg = expect_load_error(Surrogate::new(&onnx, &config));
    assert!(msg.contains("element type"));
}

#[test]
fn test_missing_model_file() {
    let onnx = runtime();
    let config = SurrogateConfig::new("/nonexistent/eq14.onnx", "eq14", 2, 1, None, None);
    let msg = expect_load_error(Surrogate::new(&onnx, &config));
    assert!(msg.contains("/nonexistent/eq14.onnx"));
}

#[test]
fn test_malformed_model_file() {
    let onnx = runtime();
    let dir = ModelDir::new().unwrap();
    let path = dir.write("broken.onnx", b"this is not protobuf").unwrap();
    let config = SurrogateConfig::new(path, "broken", 2, 1, None, None);
    expect_load_error(Surrogate::new(&onnx, &config));
}

#[test]
fn test_repeated_create_and_drop() {
    let onnx = runtime();
    let dir = ModelDir::new().unwrap();
    let model = MatMulModel::new(2, 3);
    let config = matmul_fixture(&dir, &model);
    for i in 0..20 {
        let mut surrogate = Surrogate::new(&onnx, &config).unwrap();
        let x = [i as f32, 1.0];
        assert_eq!(
            surrogate.evaluate_slice(&x).unwrap(),
            model.expected(&x).as_slice()
        );
    }
    assert_eq!(Arc::strong_count(&onnx), 1);
}

#[test]
fn test_failed_create_releases_everything() {
    let onnx = runtime();
    let dir = ModelDir::new().unwrap();
    let mut config = matmul_fixture(&dir, &MatMulModel::new(2, 2));
    config.output_name = Some("wrong".to_string());
    for _ in 0..5 {
        expect_load_error(Surrogate::new(&onnx, &config));
    }
    assert_eq!(Arc::strong_count(&onnx), 1);

    config.output_name = None;
    assert!(Surrogate::new(&onnx, &config).is_ok());
}

#[test]
fn test_create_with_own_runtime() {
    let dir = ModelDir::new().unwrap();
    let model = MatMulModel::new(2, 1);
    let mut config = matmul_fixture(&dir, &model);
    config.log_level = RuntimeLogLevel::Error;

    let mut surrogate = Surrogate::create(&config).unwrap();
    let y = surrogate.evaluate_slice(&[2.0, 3.0]).unwrap();
    assert_eq!(y, model.expected(&[2.0, 3.0]).as_slice());
}

#[test]
fn test_surrogates_evaluate_on_separate_threads() {
    let onnx = runtime();
    let dir = ModelDir::new().unwrap();
    let model = MatMulModel::new(3, 2);
    let config = matmul_fixture(&dir, &model);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let mut surrogate = Surrogate::new(&onnx, &config).unwrap();
            let model = model.clone();
            std::thread::spawn(move || {
                let x = [i as f32, -1.0, 0.5];
                let y = surrogate.evaluate_slice(&x).unwrap().to_vec();
                assert_eq!(y, model.expected(&x));
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_load_from_config_file() {
    let onnx = runtime();
    let dir = ModelDir::new().unwrap();
    let model = MatMulModel::new(2, 2);
    dir.write("eq7.onnx", &model.encode()).unwrap();
    let config_path = dir.path().join("eq7.json");
    fs::write(
        &config_path,
        r#"{"model_path": "eq7.onnx", "model_name": "eq7", "input_size": 2, "output_size": 2}"#,
    )
    .unwrap();

    let config = SurrogateConfig::from_file(&config_path).unwrap();
    let mut surrogate = Surrogate::new(&onnx, &config).unwrap();
    let y = surrogate.evaluate_slice(&[1.0, -1.0]).unwrap();
    assert_eq!(y, model.expected(&[1.0, -1.0]).as_slice());
}

#[test]
fn test_malformed_config_file() {
    let dir = ModelDir::new().unwrap();
    let config_path = dir.path().join("broken.json");
    fs::write(&config_path, "{ \"model_path\": 3 }").unwrap();
    assert!(matches!(
        SurrogateConfig::from_file(&config_path),
        Err(SurrogateError::Config(_))
    ));
}
