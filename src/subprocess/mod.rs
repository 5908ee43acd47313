//! Subprocess lifecycle: templated wrapper generation, supervised launch,
//! forcible teardown.
//!
//! The user-supplied environment script is never executed directly. It is
//! spliced into a wrapper that reports fatal errors over the `$ISSUE` channel
//! instead of dying silently, and the wrapper is launched through a small
//! shell script so the interpreter's normal environment activation (and with
//! it third-party packages) applies to the child.

mod launcher;
mod template;

pub use launcher::SubprocessLauncher;
pub use template::{WrapperTemplate, TEMPLATE_VERSION};
