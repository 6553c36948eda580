//! jsbridge
//!
//! Embeds a single-threaded JavaScript engine (V8, through `deno_core`) and
//! exposes it to a host through owned handles and structured results.
//!
//! # Architecture
//!
//! - A [`Runtime`] owns one isolate and is confined to its creating thread
//! - Values, objects, functions and strings are handles tagged with the id
//!   of their runtime; using one with another runtime is a host error
//! - Every entry into the engine runs under an exception guard, so script
//!   failures come back as [`Error::Script`] and never unwind into the host
//! - Scripts can be compiled ahead of time into bytecode artifacts and run
//!   later from owned or borrowed memory
//!
//! ```no_run
//! use jsbridge::{Runtime, Value};
//!
//! let mut rt = Runtime::new()?;
//! let add = rt
//!     .evaluate("(function (a, b) { return a + b; })", "add.js")?
//!     .as_object(&mut rt)?
//!     .as_function(&mut rt)?;
//! let sum = add.call(&mut rt, &[Value::from(5), Value::from(3)])?;
//! assert_eq!(sum.as_number()?, 8.0);
//! # Ok::<(), jsbridge::Error>(())
//! ```

mod array;
mod bigint;
pub mod bytecode;
mod config;
mod engine;
mod error;
mod exception;
mod function;
mod handle;
mod object;
pub mod platform;
mod prepared;
mod propname;
mod runtime;
mod string;
mod value;

pub use array::Array;
pub use bigint::BigInt;
pub use bytecode::{
    ARTIFACT_FORMAT_VERSION, ArtifactView, CompiledBytecode, MAGIC, artifact_version, compile_source,
    is_valid_artifact,
};
pub use config::{RuntimeConfig, RuntimeConfigBuilder};
pub use error::{Error, ErrorKind, Result};
pub use function::Function;
pub use handle::RuntimeId;
pub use object::Object;
pub use prepared::PreparedScript;
pub use propname::PropNameId;
pub use runtime::{InterruptHandle, Runtime};
pub use string::JsString;
pub use value::{Value, ValueKind};
