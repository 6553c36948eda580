//! Ahead-of-time compilation and execution of bytecode artifacts.
//!
//! An artifact packages the engine's code cache for a script together with
//! the exact source text it was produced from. Executing an artifact hands
//! the cache to the engine, which skips parsing and compilation when the
//! cache matches; otherwise the embedded source is compiled as a fallback.
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! magic      4 bytes   C6 1F C6 D0
//! version    u32       ARTIFACT_FORMAT_VERSION
//! flags      u32       bit 0: compiled eagerly
//! engine     u32 len + UTF-8
//! url        u32 len + UTF-8
//! source     u32 len + UTF-8
//! cache      u32 len + bytes
//! ```

use std::borrow::Cow;
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use deno_core::RuntimeOptions;
use deno_core::v8;
use parking_lot::Mutex;

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::exception::{take_compile_error, take_exception};
use crate::handle::RuntimeId;
use crate::platform;
use crate::runtime::with_source_url;
use crate::string::new_string;
use crate::value::Value;

/// Leading bytes of every artifact.
pub const MAGIC: [u8; 4] = [0xC6, 0x1F, 0xC6, 0xD0];

/// Version of the artifact layout this build reads and writes.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Shortest buffer that can carry the magic and a version.
const MIN_ARTIFACT_LEN: usize = 8;

const FLAG_OPTIMIZED: u32 = 1;

/// Quick structural check: long enough and starts with [`MAGIC`].
///
/// Says nothing about whether the rest of the buffer is well formed.
pub fn is_valid_artifact(bytes: &[u8]) -> bool {
    bytes.len() >= MIN_ARTIFACT_LEN && bytes[..MAGIC.len()] == MAGIC
}

/// Artifact layout version of this build.
pub fn artifact_version() -> u32 {
    ARTIFACT_FORMAT_VERSION
}

/// Compile `source` into an artifact without an existing runtime.
///
/// `optimize` compiles every function eagerly: a larger artifact that never
/// compiles lazily at run time. Syntax errors are compile errors.
///
/// Compilation happens on one shared compiler isolate that lives on its own
/// thread for the rest of the process, so concurrent callers are served one
/// at a time.
pub fn compile_source(source: &str, source_url: &str, optimize: bool) -> Result<CompiledBytecode<'static>> {
    let (reply, response) = mpsc::sync_channel(1);
    let request = CompileRequest {
        source: source.to_string(),
        source_url: source_url.to_string(),
        optimize,
        reply,
    };
    if compiler()?.send(request).is_err() {
        *COMPILER.lock() = None;
        return Err(Error::host("compiler thread is not running"));
    }
    response.recv().unwrap_or_else(|_| {
        *COMPILER.lock() = None;
        Err(Error::host("compiler thread stopped before replying"))
    })
}

struct CompileRequest {
    source: String,
    source_url: String,
    optimize: bool,
    reply: mpsc::SyncSender<Result<CompiledBytecode<'static>>>,
}

static COMPILER: Mutex<Option<mpsc::Sender<CompileRequest>>> = parking_lot::const_mutex(None);

/// Sender of the compiler thread, spawning it on first use.
fn compiler() -> Result<mpsc::Sender<CompileRequest>> {
    let mut slot = COMPILER.lock();
    if let Some(requests) = slot.as_ref() {
        return Ok(requests.clone());
    }

    platform::ensure_initialized();
    let (requests, incoming) = mpsc::channel();
    thread::Builder::new()
        .name("jsbridge-compiler".to_string())
        .spawn(move || run_compiler(incoming))?;
    *slot = Some(requests.clone());
    Ok(requests)
}

fn run_compiler(incoming: mpsc::Receiver<CompileRequest>) {
    let id = RuntimeId::next();
    let mut engine = Engine::new(id, RuntimeOptions::default());
    tracing::debug!("[{}] Compiler isolate ready", id);

    for request in incoming {
        let result = {
            let mut entered = engine.enter();
            let scope = &mut entered.handle_scope();
            let tc = &mut v8::TryCatch::new(scope);
            compile_in(tc, &request.source, &request.source_url, request.optimize)
        };
        // The caller may have given up waiting.
        let _ = request.reply.send(result);
    }
    tracing::debug!("[{}] Compiler thread exiting", id);
}

/// Compile inside an entered isolate and package the result.
pub(crate) fn compile_in(
    tc: &mut v8::TryCatch<v8::HandleScope>,
    source: &str,
    source_url: &str,
    optimize: bool,
) -> Result<CompiledBytecode<'static>> {
    let text = with_source_url(source, source_url);
    let code = new_string(tc, &text, v8::NewStringType::Normal)?;
    let mut src = v8::script_compiler::Source::new(code, None);
    let options = if optimize {
        v8::script_compiler::CompileOptions::EagerCompile
    } else {
        v8::script_compiler::CompileOptions::NoCompileOptions
    };

    let Some(unbound) = v8::script_compiler::compile_unbound_script(
        tc,
        &mut src,
        options,
        v8::script_compiler::NoCacheReason::NoReason,
    ) else {
        return Err(take_compile_error(tc));
    };

    let cache = unbound
        .create_code_cache()
        .ok_or_else(|| Error::compile(format!("engine produced no code cache for {}", source_url)))?;

    tracing::debug!(
        "Compiled {} ({} bytes of source, {} bytes of code cache, eager: {})",
        source_url,
        text.len(),
        cache.len(),
        optimize
    );

    let bytes = encode(&Sections {
        flags: if optimize { FLAG_OPTIMIZED } else { 0 },
        engine_version: platform::engine_version(),
        source_url,
        source: &text,
        cache: &cache,
    });
    Ok(CompiledBytecode::from_vec(bytes))
}

/// Run an artifact inside an entered isolate.
pub(crate) fn run_in(
    tc: &mut v8::TryCatch<v8::HandleScope>,
    owner: RuntimeId,
    artifact: &ArtifactView<'_>,
) -> Result<Value> {
    if artifact.engine_version != platform::engine_version() {
        tracing::warn!(
            "artifact {} was built by engine {}, running {}; compiling from source",
            artifact.source_url,
            artifact.engine_version,
            platform::engine_version()
        );
    }

    let code = new_string(tc, artifact.source, v8::NewStringType::Normal)?;
    let cached = v8::script_compiler::CachedData::new(artifact.cache);
    let mut src = v8::script_compiler::Source::new_with_cached_data(code, None, cached);
    let script = v8::script_compiler::compile(
        tc,
        &mut src,
        v8::script_compiler::CompileOptions::ConsumeCodeCache,
        v8::script_compiler::NoCacheReason::NoReason,
    );

    if src.get_cached_data().is_some_and(|c| c.rejected()) {
        tracing::warn!(
            "engine rejected the code cache of {}; compiled from source",
            artifact.source_url
        );
    }

    let Some(script) = script else {
        return Err(take_exception(tc));
    };
    match script.run(tc) {
        Some(result) => Ok(Value::from_local(owner, tc, result)),
        None => Err(take_exception(tc)),
    }
}

/// An immutable bytecode artifact.
///
/// Owned artifacts (`CompiledBytecode<'static>`) keep their bytes in
/// bridge-allocated storage. Borrowed artifacts read host memory in place;
/// the lifetime keeps that memory alive and unchanged while in use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledBytecode<'a> {
    bytes: Cow<'a, [u8]>,
}

impl CompiledBytecode<'static> {
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Cow::Owned(bytes),
        }
    }

    /// Copy host bytes into bridge-owned storage.
    pub fn copy_from(bytes: &[u8]) -> Self {
        Self::from_vec(bytes.to_vec())
    }

    /// Load an artifact from disk. The content is validated on execution.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| Error::host(format!("failed to read artifact {}: {}", path.display(), e)))?;
        Ok(Self::from_vec(bytes))
    }
}

impl<'a> CompiledBytecode<'a> {
    /// View host memory as an artifact without copying.
    pub fn borrowed(bytes: &'a [u8]) -> Self {
        Self {
            bytes: Cow::Borrowed(bytes),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_borrowed(&self) -> bool {
        matches!(self.bytes, Cow::Borrowed(_))
    }

    pub fn into_owned(self) -> CompiledBytecode<'static> {
        CompiledBytecode::from_vec(self.bytes.into_owned())
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes.into_owned()
    }

    pub fn is_valid(&self) -> bool {
        is_valid_artifact(&self.bytes)
    }

    /// Layout version recorded in the header, if the magic matches.
    pub fn version(&self) -> Option<u32> {
        if !self.is_valid() {
            return None;
        }
        read_u32(&self.bytes, MAGIC.len())
    }

    /// Parse the layout without copying.
    pub fn view(&self) -> Result<ArtifactView<'_>> {
        ArtifactView::parse(&self.bytes)
    }

    /// Persist the artifact.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, &self.bytes)
            .map_err(|e| Error::host(format!("failed to write artifact {}: {}", path.display(), e)))
    }
}

/// The sections of a parsed artifact, borrowed from its bytes.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactView<'a> {
    pub version: u32,
    pub flags: u32,
    pub engine_version: &'a str,
    pub source_url: &'a str,
    pub source: &'a str,
    pub cache: &'a [u8],
}

impl<'a> ArtifactView<'a> {
    /// Check the magic and version, then split the sections.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::host("bytecode buffer is empty"));
        }
        if !is_valid_artifact(bytes) {
            return Err(Error::host("buffer is not a bytecode artifact (bad magic number)"));
        }

        let mut reader = Reader::new(bytes, MAGIC.len());
        let version = reader.u32()?;
        if version != ARTIFACT_FORMAT_VERSION {
            return Err(Error::host(format!(
                "unsupported bytecode version {} (expected {})",
                version, ARTIFACT_FORMAT_VERSION
            )));
        }
        let flags = reader.u32()?;
        let engine_version = reader.str()?;
        let source_url = reader.str()?;
        let source = reader.str()?;
        let cache = reader.bytes()?;
        if !reader.is_done() {
            return Err(Error::host("trailing bytes after bytecode artifact"));
        }

        Ok(Self {
            version,
            flags,
            engine_version,
            source_url,
            source,
            cache,
        })
    }

    pub fn is_optimized(&self) -> bool {
        self.flags & FLAG_OPTIMIZED != 0
    }
}

struct Sections<'a> {
    flags: u32,
    engine_version: &'a str,
    source_url: &'a str,
    source: &'a str,
    cache: &'a [u8],
}

fn encode(sections: &Sections<'_>) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        12 + 16
            + sections.engine_version.len()
            + sections.source_url.len()
            + sections.source.len()
            + sections.cache.len(),
    );
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&ARTIFACT_FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&sections.flags.to_le_bytes());
    for section in [
        sections.engine_version.as_bytes(),
        sections.source_url.as_bytes(),
        sections.source.as_bytes(),
        sections.cache,
    ] {
        out.extend_from_slice(&(section.len() as u32).to_le_bytes());
        out.extend_from_slice(section);
    }
    out
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw = bytes.get(at..at.checked_add(4)?)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    fn u32(&mut self) -> Result<u32> {
        let value = read_u32(self.bytes, self.pos)
            .ok_or_else(|| Error::host("truncated bytecode artifact"))?;
        self.pos += 4;
        Ok(value)
    }

    fn bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.u32()? as usize;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| Error::host("truncated bytecode artifact"))?;
        let section = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(section)
    }

    fn str(&mut self) -> Result<&'a str> {
        std::str::from_utf8(self.bytes()?)
            .map_err(|_| Error::host("bytecode artifact holds invalid UTF-8"))
    }

    fn is_done(&self) -> bool {
        self.pos == self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::runtime::Runtime;

    fn artifact(source: &str, cache: &[u8]) -> Vec<u8> {
        encode(&Sections {
            flags: 0,
            engine_version: "test",
            source_url: "unit.js",
            source,
            cache,
        })
    }

    #[test]
    fn test_is_valid_artifact_length() {
        for len in 0..MIN_ARTIFACT_LEN {
            let mut bytes = vec![0u8; len];
            let prefix = len.min(4);
            bytes[..prefix].copy_from_slice(&MAGIC[..prefix]);
            assert!(!is_valid_artifact(&bytes), "length {} accepted", len);
        }
    }

    #[test]
    fn test_is_valid_artifact_magic() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        assert!(is_valid_artifact(&bytes));
        bytes.extend_from_slice(b"anything at all");
        assert!(is_valid_artifact(&bytes));

        assert!(!is_valid_artifact(&[0u8; 16]));
        assert!(!is_valid_artifact(&[0xD0, 0xC6, 0x1F, 0xC6, 0, 0, 0, 0]));
    }

    #[test]
    fn test_artifact_version() {
        assert_eq!(artifact_version(), ARTIFACT_FORMAT_VERSION);
        let bytes = artifact("1", b"");
        assert_eq!(CompiledBytecode::borrowed(&bytes).version(), Some(ARTIFACT_FORMAT_VERSION));
        assert_eq!(CompiledBytecode::borrowed(&[0u8; 16]).version(), None);
    }

    #[test]
    fn test_parse_sections() {
        let bytes = artifact("1 + 2", &[1, 2, 3]);
        let view = ArtifactView::parse(&bytes).unwrap();
        assert_eq!(view.version, ARTIFACT_FORMAT_VERSION);
        assert_eq!(view.engine_version, "test");
        assert_eq!(view.source_url, "unit.js");
        assert_eq!(view.source, "1 + 2");
        assert_eq!(view.cache, &[1, 2, 3]);
        assert!(!view.is_optimized());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let err = ArtifactView::parse(&[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Host);

        let err = ArtifactView::parse(&[0u8; 16]).unwrap_err();
        assert!(err.contains("bad magic number"));

        let mut bytes = artifact("1", b"");
        bytes[4..8].copy_from_slice(&99u32.to_le_bytes());
        let err = ArtifactView::parse(&bytes).unwrap_err();
        assert!(err.contains("unsupported bytecode version 99"));

        let bytes = artifact("1 + 2", &[9; 32]);
        let err = ArtifactView::parse(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(err.contains("truncated"));

        let mut bytes = artifact("1", b"");
        bytes.push(0);
        let err = ArtifactView::parse(&bytes).unwrap_err();
        assert!(err.contains("trailing"));
    }

    #[test]
    fn test_owned_and_borrowed() {
        let bytes = artifact("1", b"");
        let borrowed = CompiledBytecode::borrowed(&bytes);
        assert!(borrowed.is_borrowed());
        assert!(borrowed.is_valid());

        let owned = borrowed.clone().into_owned();
        assert!(!owned.is_borrowed());
        assert_eq!(owned, borrowed);
        assert_eq!(CompiledBytecode::copy_from(&bytes).into_vec(), bytes);
    }

    #[test]
    fn test_compile_source() {
        let compiled = compile_source("function f(x) { return x * 2; } f(21)", "double.js", false).unwrap();
        assert!(compiled.is_valid());
        let view = compiled.view().unwrap();
        assert_eq!(view.source_url, "double.js");
        assert!(view.source.contains("sourceURL=double.js"));
        assert!(!view.cache.is_empty());
        assert!(!view.is_optimized());

        let eager = compile_source("function f(x) { return x * 2; } f(21)", "double.js", true).unwrap();
        assert!(eager.view().unwrap().is_optimized());
    }

    #[test]
    fn test_compile_syntax_error() {
        let err = compile_source("function (", "broken.js", false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compile);
        assert!(err.contains("SyntaxError"));
    }

    #[test]
    fn test_compile_from_many_threads() {
        let workers: Vec<_> = (0..4)
            .map(|i| {
                std::thread::spawn(move || {
                    let source = format!("{} * 10", i);
                    let url = format!("worker{}.js", i);
                    let compiled = compile_source(&source, &url, i % 2 == 0).unwrap();
                    // Errors leave the shared compiler usable.
                    assert!(compile_source("function (", &url, false).is_err());
                    compiled
                })
            })
            .collect();

        let mut rt = Runtime::new().unwrap();
        for (i, worker) in workers.into_iter().enumerate() {
            let compiled = worker.join().unwrap();
            let value = rt.execute_artifact(&compiled).unwrap();
            assert_eq!(value.as_number().unwrap(), (i * 10) as f64);
        }
    }

    #[test]
    fn test_read_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answer.jsbc");
        let compiled = compile_source("40 + 2", "answer.js", false).unwrap();
        compiled.write_to(&path).unwrap();

        let loaded = CompiledBytecode::read_from(&path).unwrap();
        assert_eq!(loaded, compiled);

        let err = CompiledBytecode::read_from(dir.path().join("missing.jsbc")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Host);
    }
}
