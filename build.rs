fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/modelgate.proto");
    // protoc is not on PATH in this environment; fall back to the vendored
    // binary so the existing proto compilation step can run unchanged.
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }
    tonic_build::compile_protos("proto/modelgate.proto")?;
    Ok(())
}
