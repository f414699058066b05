//! Rendered-page client implementations.

pub mod webdriver;

pub use webdriver::{WebDriverLauncher, WebDriverPage};
