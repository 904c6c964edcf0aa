//! Process-wide platform state: debug flag, optional
//! acceleration-library discovery, and interrupt signalling for
//! interactive stop.
//!
//! Resolution checks an explicit environment variable first, falls
//! back to a sane default, and caches the result behind a one-shot
//! initializer so the discovery cost is paid at most once per process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{OnceLock, RwLock};

use libloading::Library;

/// A library the engine looked for but could not load, or chose not to
/// load because the caller disabled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryStatus {
    Loaded,
    Disabled,
    NotFound,
}

/// Process-wide singleton. Obtain with [`Platform::get`].
pub struct Platform {
    debug: AtomicBool,
    // Loaded libraries are kept alive for the process's lifetime; blocks
    // only ever observe `LibraryStatus` through `probe`.
    libraries: RwLock<HashMap<&'static str, Option<Library>>>,
    interrupted: AtomicBool,
}

static PLATFORM: OnceLock<Platform> = OnceLock::new();

impl Platform {
    /// Returns the process-wide instance, performing first-use
    /// environment parsing if this is the first call.
    pub fn get() -> &'static Platform {
        PLATFORM.get_or_init(|| {
            init_tracing();
            let debug = env_truthy("DEBUG");
            if debug {
                tracing::debug!("flowrunner debug logging enabled via DEBUG env var");
            }
            Platform {
                debug: AtomicBool::new(debug),
                libraries: RwLock::new(HashMap::new()),
                interrupted: AtomicBool::new(false),
            }
        })
    }

    /// `Graph::new` calls this with its own `debug` option; either
    /// source enables verbose logging.
    pub(crate) fn note_debug(&self, debug: bool) {
        if debug {
            self.debug.store(true, Ordering::Relaxed);
        }
    }

    pub fn debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    /// Attempt to load an optional acceleration library by its
    /// well-known filename, honoring `DISABLE_<NAME>` (name upper-cased).
    /// Caches the outcome so repeated probes from many blocks'
    /// `initialize` hooks cost one lookup.
    pub fn probe_library(&self, name: &'static str, filename: &str) -> LibraryStatus {
        if let Some(loaded) = self.libraries.read().unwrap().get(name) {
            return if loaded.is_some() {
                LibraryStatus::Loaded
            } else {
                LibraryStatus::NotFound
            };
        }
        let disable_var = format!("DISABLE_{}", name.to_uppercase());
        if env_truthy(&disable_var) {
            tracing::info!(library = name, "optional library disabled via {disable_var}");
            self.libraries.write().unwrap().insert(name, None);
            return LibraryStatus::Disabled;
        }
        let lib = unsafe { Library::new(filename) }.ok();
        let status = if lib.is_some() {
            tracing::info!(library = name, filename, "loaded optional acceleration library");
            LibraryStatus::Loaded
        } else {
            tracing::debug!(library = name, filename, "optional acceleration library not found, falling back");
            LibraryStatus::NotFound
        };
        self.libraries.write().unwrap().insert(name, lib);
        status
    }

    /// Set by a SIGINT-style utility layered on top of the engine.
    /// Shutdown here is flag-driven, not signal-driven: the engine never
    /// reads this itself; it exists for callers building an interactive
    /// `Graph::stop` trigger.
    pub fn request_interrupt(&self) {
        self.interrupted.store(true, Ordering::Relaxed);
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Relaxed)
    }
}

/// Installs a `tracing_subscriber` formatter gated by `RUST_LOG`
/// (falling back to `info`), the first time any code reaches
/// [`Platform::get`]. Uses `try_init` rather than `init`: a host
/// application may have already installed its own global subscriber,
/// and flowrunner as a library must not clobber it.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn env_truthy(name: &str) -> bool {
    match std::env::var(name) {
        Ok(v) => !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false"),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_truthy_rejects_zero_and_false() {
        assert!(!env_truthy("FLOWRUNNER_TEST_UNSET_VAR"));
    }
}
