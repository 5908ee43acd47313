//! Wrapper script template with a named injection point.

/// Bumped whenever the wrapper layout changes incompatibly.
pub const TEMPLATE_VERSION: u32 = 1;

/// Marker line replaced by the injected user code.
const INJECT_MARKER: &str = "# @inject user_code";

/// The wrapper scaffold, version 1.
///
/// Any fatal error in the injected code is caught, formatted as a traceback,
/// reported over the `$ISSUE` channel and followed by a clean disconnect.
/// Pure-comment lines are stripped from the generated file.
const BUILTIN_TEMPLATE: &str = r#"# Wrapper template, version 1.
# The user script body replaces the injection marker below; its import
# statements are hoisted above this scaffold.
import traceback
from remote_env import SocketRegister

"""
This file is auto generated. It is left on disk after execution so fatal
crashes can be inspected postmortem; traceback line numbers refer to this
file, not the original script.
"""
try:
    # @inject user_code
except Exception as err:
    errors = traceback.TracebackException.from_exception(err).format()
    tb = ''.join(errors)
    SocketRegister.get(0).send(message=tb, channel="$ISSUE")
    SocketRegister.get(0).disconnect()
    quit()
"#;

/// Splices a user script into the error-reporting wrapper scaffold.
pub struct WrapperTemplate {
    template: &'static str,
}

impl Default for WrapperTemplate {
    fn default() -> Self {
        Self {
            template: BUILTIN_TEMPLATE,
        }
    }
}

impl WrapperTemplate {
    /// Render the wrapper source for one user script.
    ///
    /// Top-level `import`/`from` statements of the user script are hoisted to
    /// the top of the generated file (Python requires imports used by the
    /// scaffold's except-block context to resolve before the try body runs);
    /// every other line is indented under the `try:` scaffold. Comment-only
    /// template lines are dropped.
    pub fn render(&self, user_source: &str) -> String {
        let mut imports = String::new();
        let mut body = String::new();
        let mut injected_any = false;
        for line in user_source.lines() {
            if line.starts_with("import ") || line.starts_with("from ") {
                imports.push_str(line);
                imports.push('\n');
            } else if line.trim().is_empty() {
                body.push('\n');
            } else {
                body.push_str("    ");
                body.push_str(line);
                body.push('\n');
                injected_any = true;
            }
        }
        if !injected_any {
            // An empty try-body is a syntax error.
            body.push_str("    pass\n");
        }

        let mut code = String::new();
        let mut marker_seen = false;
        for line in self.template.lines() {
            let trimmed = line.trim_start();
            if trimmed == INJECT_MARKER {
                marker_seen = true;
                code.push_str(&body);
            } else if trimmed.starts_with('#') {
                // Comment-only template lines do not survive generation.
            } else {
                code.push_str(line);
                code.push('\n');
            }
        }
        assert!(marker_seen, "wrapper template is missing its injection marker");

        format!("{imports}{code}")
    }
}
