//! Prepare a script once and evaluate it repeatedly.
//!
//! Run with: cargo run -p jsbridge --example prepared_javascript

use anyhow::Result;
use jsbridge::{Runtime, Value};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut rt = Runtime::new()?;
    rt.evaluate(
        r#"
        var readings = [];
        function record(value) {
            readings.push(value);
            return readings.length;
        }
        "#,
        "setup.js",
    )?;

    let average = rt.prepare(
        "readings.reduce((sum, v) => sum + v, 0) / readings.length",
        "average.js",
    )?;

    let record = rt
        .global()?
        .get(&mut rt, "record")?
        .as_object(&mut rt)?
        .as_function(&mut rt)?;

    for reading in [21.5, 22.0, 22.75, 23.25] {
        let count = record.call(&mut rt, &[Value::from(reading)])?;
        let avg = rt.evaluate_prepared(&average)?;
        println!(
            "readings: {}  average: {:.2}",
            count.as_number()?,
            avg.as_number()?
        );
    }

    rt.destroy();
    Ok(())
}
