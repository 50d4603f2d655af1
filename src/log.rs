use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// With --verbose, the import explains how each sheet was read.
pub fn set_verbose(verb: bool) {
    VERBOSE.store(verb, Ordering::Relaxed);
}

pub fn get_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

// Verbose output goes to stderr, so it never mixes into rendered tables or
// csv written to stdout.
#[macro_export]
macro_rules! verbose {
    ($($arg:tt)*) => {{
        if $crate::log::get_verbose() {
            eprint!($($arg)*);
        }
    }};
}

#[macro_export]
macro_rules! verboseln {
    ($($arg:tt)*) => {{
        if $crate::log::get_verbose() {
            eprintln!($($arg)*);
        }
    }};
}
