//! Reference client for the tower defender server.
//!
//! Headless by design: device sampling sits behind the
//! [`input::DeviceSampler`] seam so a VR integration can drop in real
//! tracking, while the scripted stand-in keeps a session alive end to
//! end. Rendering and audio stay out of scope: the snapshot consumer
//! surfaces audio-cue edges as log events and leaves presentation to the
//! embedding application.

pub mod game;
pub mod input;
pub mod network;
