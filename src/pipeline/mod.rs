//! Per-file pipeline stages.
//!
//! Each submodule implements exactly one transformation step, so every step
//! can be tested on its own and the controller only wires them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ resample ──▶ sign ──▶ upload
//! (bytes)   (800×800)    (sha256)  (multipart POST)
//! ```
//!
//! 1. [`input`]: the dropped file with its bytes, declared type and name
//! 2. [`resample`]: decode, force to the target size, sharpen, re-encode;
//!    runs in `spawn_blocking` because it is pure CPU work
//! 3. [`sign`]: SHA-256 signature over the canonical upload parameters
//! 4. [`upload`]: the only stage with network I/O

pub mod input;
pub mod resample;
pub mod sign;
pub mod upload;
