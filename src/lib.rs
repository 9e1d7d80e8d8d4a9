pub mod interp;
pub mod meta;
pub mod tree;
pub mod value;
pub mod vm;

pub use vm::compiler::{try_compile, try_compile_body};

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;
