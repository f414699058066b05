//! Core trait abstractions at the crawler's external seams.

pub mod browser;
pub mod content;
pub mod round;
pub mod store;
