//! Classification flag lists: the `--flags` argument and flag files.

pub mod parse;
pub mod set;

pub use parse::{load_flag_file, parse_flags_arg, parse_inline, parse_lines};
pub use set::{FlagSource, LabelSet};
