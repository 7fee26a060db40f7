//! Portable narrow float types.
//!
//! The reference implementation hand-rolls `Float16`/`BFloat16` bit-cast
//! structs as a fallback for platforms without a native half-precision type
//! or vendor conversion library. `half::f16`/`half::bf16` are exactly that
//! fallback, already vetted and already a dependency of this workspace, so
//! fusilli aliases them directly rather than re-deriving bit conversion.

#[cfg(feature = "half")]
pub use half::f16 as Float16;
#[cfg(feature = "bfloat")]
pub use half::bf16 as BFloat16;
