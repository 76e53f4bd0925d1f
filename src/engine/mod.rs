//! Engine module housing the device-facing session core.
//!
//! This module exposes trait-based collaborators (`backend`) and the
//! `EngineHandle` orchestration layer (`core`) shared by the CLI and any
//! embedding UI.

pub mod backend;
pub mod core;

#[cfg(not(target_os = "android"))]
pub use backend::{CpalCapture, CpalTonePlayer};
pub use backend::{
    AudioCapture, CaptureHandle, Clock, Collaborators, ReferenceTone, SilentTonePlayer,
    SystemClock, TonePlayer, UnavailableCapture,
};
pub use core::EngineHandle;
