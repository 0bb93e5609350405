//! Output for resolved license texts.
//!
//! - [`notices`] — the third-party notices document, one copy of each distinct license text.
//! - [`terminal`] — colored summary with tables of missing (and, with `--verbose`, resolved)
//!   dependencies.

pub mod notices;
pub mod terminal;
