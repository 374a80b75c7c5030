//! Call-stack capture and lazy symbol resolution.
//!
//! Capture records raw instruction pointers only: no symbol lookup, no string
//! work. Resolution happens on first access through [`Stack::frames()`] and
//! is cached on the stack itself. Presentation ([`StackPolicy`]) is applied
//! after the cache, so changing the policy never requires re-resolving.
//!
//! ```text
//! Development:  myapp::db::query  at /home/me/myapp/src/db.rs:142
//! Production:   myapp::db::query  at db.rs:142
//! Strict:       <redacted>        at <redacted>:142
//! ```

use std::ffi::c_void;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::config::{Config, ConfigError};
use crate::limits::MAX_RAW_FRAMES;
use crate::memo::Memo;

/// Placeholder used by [`StackPolicy::Strict`].
pub const REDACTED: &str = "<redacted>";

// ============================================================================
// StackPolicy
// ============================================================================

/// How resolved frames are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StackPolicy {
    /// Full file paths and full function names.
    #[default]
    Development,
    /// Base file names and full function names.
    Production,
    /// Function, package, and file replaced with [`REDACTED`]; line numbers kept.
    Strict,
}

impl FromStr for StackPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(StackPolicy::Development),
            "production" | "prod" => Ok(StackPolicy::Production),
            "strict" => Ok(StackPolicy::Strict),
            _ => Err(ConfigError::InvalidValue {
                key: "FAULTLINE_STACK_POLICY",
                value: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Frame
// ============================================================================

/// One resolved, human-readable stack frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Demangled function path without the hash suffix.
    pub function: String,
    /// Module path the function lives in.
    pub package: String,
    pub file: String,
    pub line: u32,
}

impl Frame {
    fn new(function: String, file: String, line: u32) -> Self {
        let package = package_of(&function).to_string();
        Self {
            function,
            package,
            file,
            line,
        }
    }

    /// Apply a presentation policy.
    pub fn present(&self, policy: StackPolicy) -> Frame {
        match policy {
            StackPolicy::Development => self.clone(),
            StackPolicy::Production => Frame {
                file: base_name(&self.file).to_string(),
                ..self.clone()
            },
            StackPolicy::Strict => Frame {
                function: REDACTED.to_string(),
                package: REDACTED.to_string(),
                file: REDACTED.to_string(),
                line: self.line,
            },
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}:{}", self.function, self.file, self.line)
    }
}

/// `myapp::db::query` -> `myapp::db`, `<T as myapp::Trait>::run` -> `myapp`.
fn package_of(function: &str) -> &str {
    let path = function.trim_start_matches('<');
    let path = path.split([' ', '<']).next().unwrap_or(path);
    match path.rfind("::") {
        Some(idx) => &path[..idx],
        None => "",
    }
}

fn base_name(file: &str) -> &str {
    file.rsplit(['/', '\\']).next().unwrap_or(file)
}

// ============================================================================
// Frame classification
// ============================================================================

/// Frames belonging to capture and construction machinery. Leading runs of
/// these are always dropped.
const INTERNAL_PREFIXES: &[&str] = &[
    "backtrace::",
    "faultline::stack::",
    "faultline::builder::",
    "faultline::node::",
    "faultline::error::",
    "faultline::ext::",
    "faultline::new",
    "faultline::wrap",
];

/// Frames that are not user code: language runtime, test harness, process entry.
const RUNTIME_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "test::",
    "__rust",
    "rust_begin_unwind",
    "_start",
    "__libc_start",
    "__scrt_common_main",
    "BaseThreadInitThunk",
    "RtlUserThreadStart",
];

fn matches_any(function: &str, prefixes: &[&str]) -> bool {
    let f = function.trim_start_matches('<');
    prefixes.iter().any(|p| f.starts_with(p))
}

pub(crate) fn is_internal(function: &str) -> bool {
    matches_any(function, INTERNAL_PREFIXES)
}

pub(crate) fn is_runtime(function: &str) -> bool {
    matches_any(function, RUNTIME_PREFIXES)
}

// ============================================================================
// Stack
// ============================================================================

/// Raw instruction pointers, inline for typical depths.
type IpVec = SmallVec<[usize; 32]>;

/// A captured call stack.
///
/// Holds instruction pointers as plain integers so the stack is `Send + Sync`
/// and cheap to capture. Symbols are resolved once, on first access.
pub struct Stack {
    ips: IpVec,
    resolved: Memo<Box<[Frame]>>,
}

impl Stack {
    /// Capture the current call stack, up to [`MAX_RAW_FRAMES`] pointers.
    #[inline(never)]
    pub fn capture() -> Self {
        let mut ips = IpVec::new();
        backtrace::trace(|frame| {
            ips.push(frame.ip() as usize);
            ips.len() < MAX_RAW_FRAMES
        });
        Self {
            ips,
            resolved: Memo::new(),
        }
    }

    /// A stack whose frames are already resolved, e.g. decoded from a
    /// [`Snapshot`](crate::Snapshot). Has no raw pointers.
    pub fn from_frames(frames: Vec<Frame>) -> Self {
        let resolved = Memo::new();
        resolved.get_or_compute(|| frames.into_boxed_slice());
        Self {
            ips: IpVec::new(),
            resolved,
        }
    }

    /// Number of raw pointers recorded.
    #[inline]
    pub fn raw_len(&self) -> usize {
        self.ips.len()
    }

    /// Whether symbols have been resolved yet.
    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// All resolved frames with leading capture machinery removed, unfiltered
    /// and unredacted. Resolved on first call, cached afterward.
    pub fn resolved(&self) -> &[Frame] {
        self.resolved.get_or_compute(|| resolve_all(&self.ips))
    }

    /// Frames filtered, capped, and presented according to `config`.
    pub fn frames(&self, config: &Config) -> Vec<Frame> {
        self.resolved()
            .iter()
            .filter(|fr| config.keep_runtime_frames || !is_runtime(&fr.function))
            .take(config.max_stack_frames)
            .map(|fr| fr.present(config.stack_policy))
            .collect()
    }
}

fn resolve_all(ips: &[usize]) -> Box<[Frame]> {
    let mut frames = Vec::with_capacity(ips.len());
    for &ip in ips {
        // Inlined calls produce several symbols for one pointer.
        backtrace::resolve(ip as *mut c_void, |symbol| {
            let function = match symbol.name() {
                Some(name) => format!("{:#}", name),
                None => return,
            };
            let file = symbol
                .filename()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            let line = symbol.lineno().unwrap_or(0);
            frames.push(Frame::new(function, file, line));
        });
    }
    let skip = frames
        .iter()
        .position(|fr| !is_internal(&fr.function))
        .unwrap_or(frames.len());
    frames.drain(..skip);
    frames.into_boxed_slice()
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("raw_len", &self.ips.len())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
