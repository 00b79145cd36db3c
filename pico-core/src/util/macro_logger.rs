/// Return a long version of the function name.
#[macro_export]
macro_rules! function {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            core::any::type_name::<T>()
        }
        let name = type_name_of(f);
        &name[..name.len() - 3]
    }};
}

/// Return a shortened version of the function name.
#[macro_export]
macro_rules! short_function {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            core::any::type_name::<T>()
        }
        let name = type_name_of(f);

        // Find and cut the rest of the path
        match &name[..name.len() - 3].rfind(':') {
            Some(pos) => &name[pos + 1..name.len() - 3],
            None => &name[..name.len() - 3],
        }
    }};
}

/// Construct a string suitable for debugging from a list of arguments
#[macro_export]
macro_rules! vals_str {
    ( $( $x:expr ),* ) => {{
        let mut buffer = String::new();
            $(
                {
                    #[cfg(not(feature = "log_pretty_print"))]
                    {
                        if buffer.len() > 0 {
                            buffer.push_str(", ");
                        }
                        buffer.push_str(&format!("{}: {:?}", stringify!($x), $x)[..]);
                    }

                    #[cfg(feature = "log_pretty_print")]
                    {
                        if buffer.len() > 0 {
                            buffer.push_str(",");
                        }
                        buffer.push_str(&format!("\n{}: {:#?}", stringify!($x), $x)[..]);
                    }
                }
            )*
            buffer
        }};
}

/// log the channel state at the trace level
#[macro_export]
macro_rules! trace_channel_state {
    ($state: expr) => {
        tracing::trace!("{}:\n{:#?}", $crate::function!(), $state);
    };
}
