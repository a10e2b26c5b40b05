//! Built-in stages.

pub mod regex_drop;
pub mod regex_replace;

pub use regex_drop::{RegexDropConfig, RegexDropper};
pub use regex_replace::{RegexReplaceConfig, RegexReplacer};
