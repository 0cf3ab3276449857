//! Attribution of a query to the application code that issued it.
//!
//! Stack walking allocates and symbolicates, so this only runs when caller
//! attribution is enabled in [`HookConfig`](crate::HookConfig).

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

/// Upper bound on frames inspected per lookup.
const MAX_DEPTH: usize = 32;

/// Frames skipped past `resolve`: the hook that called it.
const CALLER_SKIP: usize = 1;

/// Crates whose frames only drive futures and closures along; never a caller.
const RUNTIME_CRATES: &[&str] = &[
    "core::",
    "std::",
    "alloc::",
    "tokio::",
    "tracing::",
    "tracing_core::",
    "async_trait::",
    "futures::",
    "futures_util::",
];

// Closure markers and the trailing symbol hash carry no caller information.
static SYMBOL_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(::\{\{closure\}\}|::h[0-9a-f]{16})+$").unwrap());

/// A resolved stack frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub function: String,
    pub file: String,
    pub line: u32,
}

impl Frame {
    pub fn new(function: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            function: function.into(),
            file: file.into(),
            line,
        }
    }
}

/// Finds the first stack frame outside a given library.
#[derive(Debug, Clone)]
pub struct CallerResolver {
    package: Cow<'static, str>,
}

impl CallerResolver {
    /// `package` is matched as a substring of each frame's function path.
    pub fn new(package: impl Into<Cow<'static, str>>) -> Self {
        Self {
            package: package.into(),
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// Walks the current call stack and returns the first frame that is not
    /// part of the configured package.
    pub fn resolve(&self) -> Frame {
        let frames = capture_frames();

        // Cut just past this method. Outer frames such as the std thread
        // entry also mention `backtrace::`, so match on our own symbol.
        let anchor = concat!(module_path!(), "::CallerResolver::resolve");
        let start = frames
            .iter()
            .position(|f| f.function.contains(anchor))
            .map_or(0, |idx| idx + 1);

        self.resolve_frames(frames.into_iter().skip(start + CALLER_SKIP))
    }

    /// Selects the caller from an already captured stack, innermost frame first.
    ///
    /// Stops at the first frame whose function neither contains the package
    /// nor belongs to runtime plumbing (`core`, `std`, `tokio`, boxed
    /// `async-trait` futures and the like). If no frame qualifies, the last
    /// one seen is returned.
    pub fn resolve_frames<I>(&self, frames: I) -> Frame
    where
        I: IntoIterator<Item = Frame>,
    {
        let mut caller = Frame::default();
        for frame in frames {
            let external = !frame.function.contains(self.package.as_ref())
                && !is_runtime_frame(&frame.function);
            caller = frame;
            if external {
                break;
            }
        }

        caller.function = short_function_name(&caller.function).to_owned();
        caller
    }
}

/// Frames with no symbol, or from a crate that only polls or calls through.
fn is_runtime_frame(function: &str) -> bool {
    // Trait impls demangle as `<core::pin::Pin<P> as core::future::Future>::poll`.
    let path = function.trim_start_matches('<');
    path.is_empty() || RUNTIME_CRATES.iter().any(|krate| path.starts_with(krate))
}

/// Reduces a symbol path to its last segment.
pub fn short_function_name(function: &str) -> &str {
    let function = match SYMBOL_NOISE.find(function) {
        Some(noise) => &function[..noise.start()],
        None => function,
    };
    match function.rfind("::") {
        Some(idx) => &function[idx + 2..],
        None => function,
    }
}

fn capture_frames() -> Vec<Frame> {
    let mut frames = Vec::with_capacity(MAX_DEPTH);
    backtrace::trace(|raw| {
        backtrace::resolve_frame(raw, |symbol| {
            if frames.len() >= MAX_DEPTH {
                return;
            }
            frames.push(Frame {
                function: symbol
                    .name()
                    .map(|name| format!("{name:#}"))
                    .unwrap_or_default(),
                file: symbol
                    .filename()
                    .map(|path| path.display().to_string())
                    .unwrap_or_default(),
                line: symbol.lineno().unwrap_or_default(),
            });
        });
        frames.len() < MAX_DEPTH
    });
    frames
}
