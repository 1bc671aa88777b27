//! Macros for duplication error handling.

/// Creates a [`crate::error::DupError`] from an error kind, a static description and an
/// optional dynamic detail.
#[macro_export]
macro_rules! dup_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::DupError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::DupError::from(($kind, $desc, $detail.to_string()))
    };
}

/// Creates a [`crate::error::DupError`] and returns it from the current function.
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return Err($crate::dup_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        return Err($crate::dup_error!($kind, $desc, $detail))
    };
}
