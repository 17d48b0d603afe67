/// Builds an argument list for a proxy call
///
/// # Example
///
/// ```rust
/// use chainrpc_client::args;
/// let args = args![10, 11];
/// assert_eq!(args.len(), 2);
/// ```
#[macro_export]
macro_rules! args {
    [$($expr:expr),* $(,)?] => {
        vec![$(
            $crate::IntoValue::into_value($expr)
        ),*]
    };
}
