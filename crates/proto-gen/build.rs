// Build script to compile Protocol Buffer definitions

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Compile the credentials service (messages, server and client stubs)
    tonic_build::compile_protos("../../proto/credentials.proto")?;

    // Tell Cargo to rerun if proto files change
    println!("cargo:rerun-if-changed=../../proto/credentials.proto");

    Ok(())
}
