//! Purpose: Session facade library for driving an external slicing engine.
//! Exports: `api` (session, presets, statistics) and `abi` (C surface).
//! Role: Internal modules stay private; `api` is the stable Rust boundary
//! and `abi` the stable C boundary.
//! Invariants: The engine, model decoders, and preset storage sit behind
//! collaborator traits; the core never assumes a concrete engine.

pub mod abi;
pub mod api;
mod core;
mod preset_dir;
