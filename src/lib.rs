/// Graphics context abstraction, bindable handle types and backends.
pub mod gfx;

/// Client side shadow of the pipeline state bound on a `gfx::Context`, elides redundant driver calls.
pub mod state_cache;

/// Use bitmask for flags
#[macro_use]
extern crate bitflags;

/// Generic errors for modules to define their own
pub struct Error {
    pub msg: String,
}

/// Generic debug for errors
impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.msg)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.msg)
    }
}

// conversion for windows-rs win32 errors
#[cfg(target_os = "windows")]
impl From<windows::core::Error> for Error {
    fn from(err: windows::core::Error) -> Error {
        Error {
            msg: err.message().to_string(),
        }
    }
}

// std errors
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error {
            msg: err.to_string()
        }
    }
}

// config parse errors
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error {
            msg: err.to_string()
        }
    }
}

/// Commonly used types
pub mod prelude {
    pub use crate::Error;
    pub use crate::gfx;
    pub use crate::gfx::null as gfx_null;
    pub use crate::gfx::ShaderStage;
    pub use crate::gfx::StageFlags;
    pub use crate::gfx::Viewport;
    pub use crate::gfx::ScissorRect;
    pub use crate::gfx::Format;
    pub use crate::gfx::Topology;
    pub use crate::state_cache::StateCache;
    pub use crate::state_cache::StateCacheConfig;
    pub use crate::state_cache::CacheStats;
    pub use crate::state_cache::verify::VerifiedStateCache;
    pub use crate::state_cache::verify::StateMismatch;
}
