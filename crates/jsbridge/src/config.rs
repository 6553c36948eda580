//! Runtime configuration.
//!
//! A [`RuntimeConfig`] is an immutable snapshot of every option a runtime
//! is created with. Build one with [`RuntimeConfigBuilder`] or parse it from
//! a TOML table. Numeric options left at zero mean "use the engine default".

use std::path::Path;

use deno_core::v8;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Stack size V8 reserves for script on 64-bit targets, in KiB.
const ENGINE_STACK_SIZE_KB: u32 = 984;

/// Smallest script stack a configured native stack gap may leave, in KiB.
const MIN_STACK_SIZE_KB: u32 = 64;

/// Options a runtime is created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Initial heap size in bytes. Requires `max_heap_size`.
    pub initial_heap_size: usize,
    /// Maximum heap size in bytes.
    pub max_heap_size: usize,
    /// Allow `eval` and `new Function` from script.
    pub enable_eval: bool,
    /// Allow the engine to generate machine code.
    pub enable_jit: bool,
    /// Enable staged language features the engine ships disabled.
    pub enable_experimental_features: bool,
    /// Drain the microtask queue after every evaluation and call.
    pub enable_microtask_queue: bool,
    /// Run the engine's sampling profiler.
    pub enable_sample_profiling: bool,
    /// Bytes of native stack kept free below script frames.
    pub native_stack_gap: u32,
    /// Upper bound on the arguments of a single call.
    pub max_num_registers: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            initial_heap_size: 0,
            max_heap_size: 0,
            enable_eval: true,
            enable_jit: true,
            enable_experimental_features: false,
            enable_microtask_queue: false,
            enable_sample_profiling: false,
            native_stack_gap: 0,
            max_num_registers: 0,
        }
    }
}

impl RuntimeConfig {
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::new()
    }

    /// Parse and validate a config from TOML text.
    ///
    /// Missing keys take their default values.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: RuntimeConfig =
            toml::from_str(text).map_err(|e| Error::host(format!("invalid runtime config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::host(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_heap_size != 0 && self.max_heap_size == 0 {
            return Err(Error::host(
                "initial_heap_size requires max_heap_size to be set as well",
            ));
        }
        if self.max_heap_size != 0 && self.initial_heap_size > self.max_heap_size {
            return Err(Error::host(format!(
                "initial_heap_size ({}) cannot exceed max_heap_size ({})",
                self.initial_heap_size, self.max_heap_size
            )));
        }
        if self.stack_size_kb().is_some_and(|kb| kb < MIN_STACK_SIZE_KB) {
            return Err(Error::host(format!(
                "native_stack_gap ({}) leaves less than {} KiB of script stack",
                self.native_stack_gap, MIN_STACK_SIZE_KB
            )));
        }
        Ok(())
    }

    /// Isolate parameters, or `None` when the engine defaults apply.
    pub(crate) fn create_params(&self) -> Option<v8::CreateParams> {
        if self.max_heap_size == 0 {
            return None;
        }
        Some(v8::CreateParams::default().heap_limits(self.initial_heap_size, self.max_heap_size))
    }

    /// Process-wide engine flags this config needs.
    pub(crate) fn engine_flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if !self.enable_eval {
            flags.push("--disallow-code-generation-from-strings".to_string());
        }
        if !self.enable_jit {
            flags.push("--jitless".to_string());
        }
        if self.enable_experimental_features {
            flags.push("--harmony".to_string());
        }
        if self.enable_sample_profiling {
            flags.push("--prof".to_string());
        }
        if let Some(kb) = self.stack_size_kb() {
            flags.push(format!("--stack-size={}", kb));
        }
        flags
    }

    /// Script stack size left after the native stack gap.
    fn stack_size_kb(&self) -> Option<u32> {
        if self.native_stack_gap == 0 {
            return None;
        }
        let gap_kb = self.native_stack_gap.div_ceil(1024);
        Some(ENGINE_STACK_SIZE_KB.saturating_sub(gap_kb))
    }
}

/// Fluent builder for [`RuntimeConfig`].
///
/// ```
/// use jsbridge::RuntimeConfigBuilder;
///
/// let config = RuntimeConfigBuilder::new()
///     .max_heap_size(64 * 1024 * 1024)
///     .enable_microtask_queue(true)
///     .build()
///     .unwrap();
/// assert!(config.enable_microtask_queue);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_heap_size(mut self, bytes: usize) -> Self {
        self.config.initial_heap_size = bytes;
        self
    }

    pub fn max_heap_size(mut self, bytes: usize) -> Self {
        self.config.max_heap_size = bytes;
        self
    }

    pub fn enable_eval(mut self, enable: bool) -> Self {
        self.config.enable_eval = enable;
        self
    }

    pub fn enable_jit(mut self, enable: bool) -> Self {
        self.config.enable_jit = enable;
        self
    }

    pub fn enable_experimental_features(mut self, enable: bool) -> Self {
        self.config.enable_experimental_features = enable;
        self
    }

    pub fn enable_microtask_queue(mut self, enable: bool) -> Self {
        self.config.enable_microtask_queue = enable;
        self
    }

    pub fn enable_sample_profiling(mut self, enable: bool) -> Self {
        self.config.enable_sample_profiling = enable;
        self
    }

    pub fn native_stack_gap(mut self, bytes: u32) -> Self {
        self.config.native_stack_gap = bytes;
        self
    }

    pub fn max_num_registers(mut self, count: u32) -> Self {
        self.config.max_num_registers = count;
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<RuntimeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfigBuilder::new().build().unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert!(config.enable_eval);
        assert!(config.enable_jit);
        assert!(!config.enable_microtask_queue);
        assert!(config.create_params().is_none());
        assert!(config.engine_flags().is_empty());
    }

    #[test]
    fn test_builder_sets_fields() {
        let config = RuntimeConfigBuilder::new()
            .initial_heap_size(1 << 20)
            .max_heap_size(32 << 20)
            .enable_eval(false)
            .enable_jit(false)
            .enable_experimental_features(true)
            .enable_microtask_queue(true)
            .enable_sample_profiling(true)
            .native_stack_gap(64 * 1024)
            .max_num_registers(128)
            .build()
            .unwrap();

        assert_eq!(config.initial_heap_size, 1 << 20);
        assert_eq!(config.max_heap_size, 32 << 20);
        assert_eq!(config.max_num_registers, 128);
        assert_eq!(
            config.engine_flags(),
            vec![
                "--disallow-code-generation-from-strings",
                "--jitless",
                "--harmony",
                "--prof",
                "--stack-size=920",
            ]
        );
    }

    #[test]
    fn test_initial_heap_requires_max() {
        let err = RuntimeConfigBuilder::new()
            .initial_heap_size(1 << 20)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Host);
        assert!(err.contains("requires max_heap_size"));
    }

    #[test]
    fn test_initial_heap_cannot_exceed_max() {
        let err = RuntimeConfigBuilder::new()
            .initial_heap_size(8 << 20)
            .max_heap_size(4 << 20)
            .build()
            .unwrap_err();
        assert!(err.contains("cannot exceed"));
    }

    #[test]
    fn test_stack_gap_too_large() {
        let err = RuntimeConfigBuilder::new()
            .native_stack_gap(960 * 1024)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Host);
        assert!(err.contains("native_stack_gap"));
    }

    #[test]
    fn test_from_toml_str() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            max_heap_size = 67108864
            enable_microtask_queue = true
            max_num_registers = 16
            "#,
        )
        .unwrap();
        assert_eq!(config.max_heap_size, 64 << 20);
        assert!(config.enable_microtask_queue);
        assert!(config.enable_eval);
        assert_eq!(config.max_num_registers, 16);
    }

    #[test]
    fn test_from_toml_rejects_unknown_and_invalid() {
        let err = RuntimeConfig::from_toml_str("heap = 3").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Host);

        let err = RuntimeConfig::from_toml_str("initial_heap_size = 1024").unwrap_err();
        assert!(err.contains("requires max_heap_size"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime.toml");
        std::fs::write(&path, "enable_eval = false\n").unwrap();

        let config = RuntimeConfig::load(&path).unwrap();
        assert!(!config.enable_eval);

        let missing = RuntimeConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::Host);
    }
}
