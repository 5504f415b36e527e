fn main() {
    // opencv's binding generator needs libclang; on macOS point it at the CommandLineTools copy
    if std::env::var_os("CARGO_FEATURE_OPENCV").is_some()
        && std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("macos")
        && std::env::var_os("LIBCLANG_PATH").is_none()
    {
        std::env::set_var("LIBCLANG_PATH", "/Library/Developer/CommandLineTools/usr/lib");
        std::env::set_var("DYLD_FALLBACK_LIBRARY_PATH", "/Library/Developer/CommandLineTools/usr/lib");
    }

    println!("cargo:rerun-if-changed=build.rs");
}
