macro_rules! emit {
    ($output:expr, $($format:tt)*) => {
        $output.line(format_args!($($format)*))
    };
}
