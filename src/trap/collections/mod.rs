// fptrap/src/trap/collections/mod.rs

//! # Collections Module
//!
//! Fixed-capacity containers that are filled from the fault path, so every
//! slot is allocated up front.

pub mod ring_buffer;

pub use self::ring_buffer::RingBuffer;
