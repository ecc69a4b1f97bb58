//! Exit status handling for [`crate::run`].

use std::{convert::Infallible, fmt::Debug, process};

/// A [`process::Termination`] whose success can be inspected.
///
/// The winit event loop never returns control to `main`, so [`crate::run`] has to exit the
/// process itself and needs to know which exit code to use.
pub trait Termination: process::Termination {
    fn is_success(&self) -> bool;
}

impl Termination for () {
    fn is_success(&self) -> bool {
        true
    }
}

impl Termination for Infallible {
    fn is_success(&self) -> bool {
        match *self {}
    }
}

impl<T: Termination, E: Debug> Termination for Result<T, E> {
    fn is_success(&self) -> bool {
        matches!(self, Ok(t) if t.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results() {
        assert!(().is_success());
        assert!(Ok::<(), String>(()).is_success());
        assert!(!Err::<(), _>(anyhow::anyhow!("camera unplugged")).is_success());
    }
}
