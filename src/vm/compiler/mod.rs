pub mod analyzer;
pub mod closure;
pub mod compiler;
mod emitter;

pub use compiler::{try_compile, try_compile_body, Unsupported};
