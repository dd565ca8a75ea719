/// Creates a `DvcManError` with `Load` kind and a source error attached to it
///
/// Shorthand for
/// ```rust
/// <dvcman::DvcManError as dvcman::DvcManErrorExt>::load(context, source)
/// ```
#[macro_export]
macro_rules! load_err {
    ( $context:expr, $source:expr $(,)? ) => {{
        <$crate::DvcManError as $crate::DvcManErrorExt>::load($context, $source)
    }};
}
