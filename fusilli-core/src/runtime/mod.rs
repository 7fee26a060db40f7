pub mod buffer;
pub mod ffi;
pub mod handle;
pub mod vm_context;

pub use buffer::Buffer;
pub use handle::{Device, Handle, RuntimeInstance};
pub use vm_context::{VmContext, WorkspaceContract};
