use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "logging")] {
        pub(crate) const LOG_CAT: nuo_logging::LogCategory = nuo_logging::LogCategory::new_with_sub("Common", "DynArr");

        /// Log through `nuo_logging` using the crate's log category, e.g. `common_log!(log_warning, "...")`.
        macro_rules! common_log {
            ($level:ident, $($arg:tt)+) => {
                nuo_logging::$level!($crate::logging::LOG_CAT, $($arg)+)
            };
        }
    } else {
        // Keeps the arguments type-checked, but never evaluates them
        macro_rules! common_log {
            ($level:ident, $($arg:tt)+) => {
                if false {
                    let _ = format_args!($($arg)+);
                }
            };
        }
    }
}
