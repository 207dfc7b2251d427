//! Voice capture for spoken turns
//!
//! The session owns one [`VoiceRecorder`]; it refuses overlapping
//! recordings and hands back a [`RecordedClip`] that is sent as base64
//! and deleted afterwards.

mod capture;
mod recorder;

pub use capture::WavCapture;
pub use recorder::{AudioCapture, CaptureHandle, RecordedClip, VoiceRecorder};
