//! Provides logging facilities.
//!
//! The macros of this crate forward to whichever backend is selected at build time. Without a
//! backend they compile to nothing, but their arguments are still evaluated and type-checked, so
//! logging only `Copy` values keeps call sites identical across configurations.
//!
//! # Cargo features
#![doc = document_features::document_features!()]
#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]
#![deny(clippy::pedantic)]

#[cfg(feature = "defmt")]
pub mod defmt {
    //! Selected [`defmt`] items.

    // This module is hidden in the docs, but would still be imported by a wildcard import of this
    // crate's items.
    #[doc(hidden)]
    pub mod hidden {
        // Required so the macros can access it.
        #[doc(hidden)]
        pub use defmt;
    }

    pub use defmt::{Debug2Format, Display2Format, Format};
}

#[cfg(all(feature = "log", not(feature = "defmt")))]
#[doc(hidden)]
pub mod log {
    pub use log;
}

// One expansion per level and backend; `$d` carries a literal `$` into the generated macros.
macro_rules! define_log_macro {
    ($d:tt $level:ident, $doc:literal) => {
        #[doc = $doc]
        #[cfg(feature = "defmt")]
        #[macro_export]
        macro_rules! $level {
            ($d($d arg:tt)*) => {{
                use $d crate::defmt::hidden::defmt;
                defmt::$level!($d($d arg)*);
            }};
        }

        #[doc = $doc]
        #[cfg(all(feature = "log", not(feature = "defmt")))]
        #[macro_export]
        macro_rules! $level {
            ($d($d arg:tt)*) => {{
                $d crate::log::log::$level!($d($d arg)*);
            }};
        }

        #[doc = $doc]
        #[cfg(not(any(feature = "defmt", feature = "log")))]
        #[macro_export]
        macro_rules! $level {
            ($d($d arg:tt)*) => {{
                let _ = ($d($d arg)*);
            }};
        }
    };
}

define_log_macro!($ trace, "Logs a message at the trace level.");
define_log_macro!($ debug, "Logs a message at the debug level.");
define_log_macro!($ info, "Logs a message at the info level.");
define_log_macro!($ warn, "Logs a message at the warn level.");
define_log_macro!($ error, "Logs a message at the error level.");
