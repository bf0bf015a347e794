//! Build script for pdfium-bridge-ffi
//!
//! Generates the C header with cbindgen.

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=src/bitmap.rs");
    println!("cargo:rerun-if-changed=cbindgen.toml");

    let Ok(crate_dir) = std::env::var("CARGO_MANIFEST_DIR") else {
        eprintln!("cbindgen: CARGO_MANIFEST_DIR not set, header not generated");
        return;
    };
    let crate_dir = std::path::PathBuf::from(crate_dir);
    let output_dir = crate_dir.join("include");

    if let Err(e) = std::fs::create_dir_all(&output_dir) {
        eprintln!("cbindgen: cannot create {}: {e}", output_dir.display());
        return;
    }

    let header_path = output_dir.join("pdfium_bridge.h");

    let config = match cbindgen::Config::from_file(crate_dir.join("cbindgen.toml")) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("cbindgen: {e}");
            return;
        }
    };

    match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
    {
        Ok(bindings) => {
            bindings.write_to_file(&header_path);
        }
        Err(cbindgen::Error::ParseSyntaxError { .. }) => {
            // Syntax error during parsing - report but don't fail build
            eprintln!("cbindgen: Syntax error while parsing, header not generated");
        }
        Err(e) => {
            eprintln!("cbindgen error: {e:?}");
        }
    }
}
