#![warn(rust_2018_idioms)]

//! # Font parser, subsetter, and merger
//!
//! Fontmorph parses scalable vector fonts in the SFNT container family (TrueType and
//! CFF-flavoured OpenType) as well as the WOFF, WOFF2, and EOT web-font containers,
//! producing a normalized in-memory font model ([`Sfnt`]) that can be subset, merged,
//! and serialised back to SFNT or WOFF2.
//!
//! ## Features
//!
//! * **Parse** TrueType (`ttf`), OpenType (`otf`), WOFF, WOFF2, and EOT files.
//! * **Subset** fonts to a chosen set of glyphs, rewriting `glyf`/`loca`, CFF
//!   CharStrings and subroutines, `cmap`, metrics, and `kern` consistently.
//! * **Merge** the glyphs of one font into another of the same flavour.
//! * **Re-encode** fonts as WOFF2, applying the `glyf`/`loca` and `hmtx` transforms.
//!
//! Shaping, hinting execution, and variable font axis resolution are out of scope.

pub mod binary;
pub mod cff;
pub mod checksum;
pub mod eot;
pub mod error;
pub mod font_data;
pub mod merge;
pub mod outline;
pub mod post;
pub mod sfnt;
pub mod size;
pub mod subset;
pub mod tables;
pub mod tag;
pub mod woff;
pub mod woff2;

pub use merge::{merge, MergeOptions};
pub use sfnt::Sfnt;
pub use subset::{subset, SubsetProfile};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Ceiling on any single allocation whose size is taken from the input file.
pub const MAX_MEMORY: usize = 30 * 1024 * 1024;

/// Maximum number of cmap format 4 segments or format 12 groups.
pub const MAX_CMAP_SEGMENTS: usize = 20_000;

/// Maximum number of objects in a CFF INDEX.
pub const MAX_INDEX_COUNT: usize = 1_000_000;
