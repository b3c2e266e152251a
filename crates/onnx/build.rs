use std::{env, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-env-changed=ONNXRUNTIME_DIR");
    println!("cargo:rerun-if-env-changed=ONNXRUNTIME_LIB_DIR");
    println!("cargo:rustc-link-lib=onnxruntime");

    // Search order:
    // 1. ONNXRUNTIME_DIR/lib
    // 2. ONNXRUNTIME_LIB_DIR
    // 3. pkg-config
    // 4. common system paths

    if let Ok(dir) = env::var("ONNXRUNTIME_DIR") {
        let lib_path = PathBuf::from(dir).join("lib");
        println!("cargo:rustc-link-search=native={}", lib_path.display());
        return;
    }

    if let Ok(lib_dir) = env::var("ONNXRUNTIME_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", lib_dir);
        return;
    }

    if let Some(path) = pkg_config_lib_dir() {
        println!("cargo:rustc-link-search=native={}", path);
        return;
    }

    let system_paths = [
        "/usr/local/lib",
        "/usr/lib",
        "/usr/lib/x86_64-linux-gnu",
        "/usr/lib/aarch64-linux-gnu",
        "/opt/homebrew/lib",
    ];
    let lib_names = ["libonnxruntime.so", "libonnxruntime.dylib"];

    for path in &system_paths {
        if lib_names
            .iter()
            .any(|name| PathBuf::from(path).join(name).exists())
        {
            println!("cargo:rustc-link-search=native={}", path);
            return;
        }
    }

    println!(
        "cargo:warning=Could not find the onnxruntime library. Set ONNXRUNTIME_DIR or ONNXRUNTIME_LIB_DIR."
    );
}

fn pkg_config_lib_dir() -> Option<String> {
    let output = std::process::Command::new("pkg-config")
        .args(["--libs-only-L", "libonnxruntime"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let libs = String::from_utf8(output.stdout).ok()?;
    libs.split_whitespace()
        .find_map(|lib| lib.strip_prefix("-L"))
        .map(str::to_string)
}
