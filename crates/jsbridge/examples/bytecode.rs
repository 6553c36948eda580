//! Compile a script ahead of time, persist it, and run it from disk.
//!
//! Run with: cargo run -p jsbridge --example bytecode

use anyhow::Result;
use jsbridge::{CompiledBytecode, Runtime, compile_source, is_valid_artifact};

const SOURCE: &str = r#"
function celsius(f) { return (f - 32) * 5 / 9; }
[32, 68, 98.6, 212].map(celsius).map(c => c.toFixed(1)).join(', ')
"#;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let artifact = compile_source(SOURCE, "celsius.js", true)?;
    println!("compiled {} bytes (eager)", artifact.len());

    let path = std::env::temp_dir().join("celsius.jsbc");
    artifact.write_to(&path)?;

    let bytes = std::fs::read(&path)?;
    println!("valid artifact: {}", is_valid_artifact(&bytes));

    let mut rt = Runtime::new()?;

    // The engine reads the host buffer in place.
    let result = rt.execute_artifact(&CompiledBytecode::borrowed(&bytes))?;
    println!("zero-copy: {}", result.to_display_string(&mut rt)?);

    let loaded = CompiledBytecode::read_from(&path)?;
    let result = rt.execute_artifact(&loaded)?;
    println!("owned:     {}", result.to_display_string(&mut rt)?);

    std::fs::remove_file(&path)?;
    Ok(())
}
