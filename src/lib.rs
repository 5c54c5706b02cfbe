//! The Grebe compositing core.
//!
//! This crate turns a tree of on-screen items and their pending
//! client-submitted buffers into damage-minimal, correctly timed screen
//! updates. It contains the scene graph ([`scene`]), the surface and
//! pixmap lifecycle ([`surface`]) and the per-output frame-pacing
//! scheduler ([`render_loop`]). Window-management policy, input, wire
//! protocols and the actual rendering backends live outside of this crate
//! and are consumed through the traits in [`backend`], [`surface`] and
//! [`scene`].
//!
//! Everything in this crate is single threaded. State is shared via `Rc`
//! and mutated through cells; the only suspension points are the render
//! timer wakeup and the presentation feedback delivered by the display
//! backend.

#[macro_use]
mod macros;

pub mod backend;
pub mod format;
pub mod rect;
pub mod render_loop;
pub mod scene;
pub mod surface;
pub mod time;
pub mod utils;
pub mod window;
