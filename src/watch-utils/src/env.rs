//! Compile-time configuration from environment variables.
//!
//! Each macro expands to a `const`-evaluable expression: the value of the
//! variable parsed as the named integer type, or the given default when the
//! variable is unset. A value that does not parse aborts the build with a
//! message naming the variable.
//!
//! ```
//! const LINE_MAX: usize = watch_utils::usize_from_env_or!("CONFIG_AT_LINE_MAX", 80);
//! ```

pub use {const_panic, konst};

macro_rules! define_env_with_default_macro {
    ($macro_name:ident, $parse_fn_name:ident, $output_type_name:literal) => {
        #[doc = concat!("Reads a build-time environment variable as ", $output_type_name, ", or falls back to a default.")]
        #[macro_export]
        macro_rules! $macro_name {
            ($env_var:literal, $default:expr) => {
                if let Some(str_value) = option_env!($env_var) {
                    if let Ok(value) = $crate::env::konst::primitive::$parse_fn_name(str_value) {
                        value
                    } else {
                        $crate::env::const_panic::concat_panic!(
                            "Could not parse environment variable `",
                            $env_var,
                            "=",
                            str_value,
                            "` as ",
                            $output_type_name,
                        );
                    }
                } else {
                    $default
                }
            };
        }
    };
}

define_env_with_default_macro!(usize_from_env_or, parse_usize, "a usize");
define_env_with_default_macro!(u32_from_env_or, parse_u32, "a u32");
define_env_with_default_macro!(u64_from_env_or, parse_u64, "a u64");

#[cfg(test)]
mod tests {
    // Nothing sets these while testing, so the defaults must come through.
    const LINE_MAX: usize = usize_from_env_or!("WATCH_UTILS_TEST_UNSET_USIZE", 80);
    const TIMEOUT_MS: u32 = u32_from_env_or!("WATCH_UTILS_TEST_UNSET_U32", 5000);
    const TICKS: u64 = u64_from_env_or!("WATCH_UTILS_TEST_UNSET_U64", 1 << 40);

    #[test]
    fn defaults_when_unset() {
        assert_eq!(LINE_MAX, 80);
        assert_eq!(TIMEOUT_MS, 5000);
        assert_eq!(TICKS, 1 << 40);
    }
}
