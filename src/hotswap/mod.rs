//! Hot-swap layer
//!
//! Every module loaded while watching is handed out behind a `HotModule`
//! indirection. Consumers keep that handle forever; a reload only replaces
//! the target slot inside it.
//!
//! - `HotModule` - the indirection object, forwards every `Exports` operation
//! - `HotSwapRegistry` - path to indirection map with retarget/unload/remove

mod indirection;
mod registry;

pub use indirection::HotModule;
pub use registry::HotSwapRegistry;
