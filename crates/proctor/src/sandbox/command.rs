//! Structured command construction.
//!
//! Commands are built as argument vectors and only turned into a shell line
//! at the last moment, with every element quoted by `shlex`. Agent- or
//! user-supplied substrings (search patterns, include globs, paths) therefore
//! can never break out of their argument position. There is deliberately no
//! way to splice a raw, unquoted fragment into a [`CommandSpec`].

use crate::error::ValidationError;

/// A command to run inside a sandbox, as an argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    workdir: Option<String>,
    head_limit: Option<usize>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            workdir: None,
            head_limit: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Directory the command runs in. Defaults to the session's workspace root.
    pub fn workdir(mut self, dir: impl Into<String>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    /// Keep only the first `lines` lines of stdout, trimmed inside the sandbox.
    pub fn head_limit(mut self, lines: usize) -> Self {
        self.head_limit = Some(lines);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn working_dir(&self) -> Option<&str> {
        self.workdir.as_deref()
    }

    pub fn line_limit(&self) -> Option<usize> {
        self.head_limit
    }

    /// The full argument vector, program first.
    pub fn argv(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str))
    }

    /// Render a POSIX `sh` line with every argument quoted.
    ///
    /// With a head limit, stdout is piped through `sed -n '1,Np'` (which
    /// drains its input, so the producer never sees SIGPIPE) and the exit
    /// status of the producing command, not of the filter, becomes the
    /// status of the whole line.
    pub fn to_shell_line(&self) -> Result<String, ValidationError> {
        let joined = shlex::try_join(self.argv())
            .map_err(|e| ValidationError::Unquotable(e.to_string()))?;
        Ok(match self.head_limit {
            Some(limit) => format!(
                "exec 4>&1; status=$({{ {{ {joined}; echo $? >&3; }} | sed -n '1,{limit}p' >&4; }} 3>&1); exit $status"
            ),
            None => joined,
        })
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<&str> = self.argv().collect();
        write!(f, "{}", rendered.join(" "))
    }
}

/// Resolve an agent-supplied path to an absolute path under `root`.
///
/// `None`, empty, and `.` mean the root itself. A path that already starts
/// with the root is accepted as-is; any other leading `/` is treated as
/// workspace-relative. `..` components are rejected outright.
pub fn normalize_workspace_path(root: &str, path: Option<&str>) -> Result<String, ValidationError> {
    let root = root.trim_end_matches('/');
    let raw = path.map(str::trim).unwrap_or("");
    let relative = match raw.strip_prefix(root) {
        Some(rest) if !root.is_empty() && (rest.is_empty() || rest.starts_with('/')) => rest,
        _ => raw,
    };

    let mut parts = Vec::new();
    for component in relative.split('/') {
        match component {
            "" | "." => {}
            ".." => return Err(ValidationError::PathEscape(raw.to_string())),
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        Ok(if root.is_empty() { "/".to_string() } else { root.to_string() })
    } else {
        Ok(format!("{root}/{}", parts.join("/")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_line_round_trips_hostile_arguments() {
        let spec = CommandSpec::new("grep")
            .arg("-rn")
            .arg("-e")
            .arg("foo'; rm -rf / #")
            .arg("--include=*.js")
            .arg("$(whoami)");
        let line = spec.to_shell_line().unwrap();
        let split = shlex::split(&line).unwrap();
        let argv: Vec<String> = spec.argv().map(String::from).collect();
        assert_eq!(split, argv);
    }

    #[test]
    fn nul_bytes_are_rejected() {
        let spec = CommandSpec::new("grep").arg("a\0b");
        assert!(matches!(
            spec.to_shell_line(),
            Err(ValidationError::Unquotable(_))
        ));
    }

    #[test]
    fn head_limit_wraps_in_status_preserving_pipeline() {
        let line = CommandSpec::new("grep")
            .arg("x")
            .head_limit(50)
            .to_shell_line()
            .unwrap();
        assert!(line.starts_with("exec 4>&1;"));
        assert!(line.contains("sed -n '1,50p'"));
        assert!(line.ends_with("exit $status"));
    }

    #[test]
    fn normalize_defaults_to_root() {
        assert_eq!(normalize_workspace_path("/workspace", None).unwrap(), "/workspace");
        assert_eq!(
            normalize_workspace_path("/workspace/", Some(".")).unwrap(),
            "/workspace"
        );
    }

    #[test]
    fn normalize_relative_and_rooted_paths() {
        assert_eq!(
            normalize_workspace_path("/workspace", Some("./src//lib")).unwrap(),
            "/workspace/src/lib"
        );
        assert_eq!(
            normalize_workspace_path("/workspace", Some("/workspace/src")).unwrap(),
            "/workspace/src"
        );
        assert_eq!(
            normalize_workspace_path("/workspace", Some("/src")).unwrap(),
            "/workspace/src"
        );
        // A sibling directory sharing the root's prefix is not the root.
        assert_eq!(
            normalize_workspace_path("/workspace", Some("/workspace-old/a")).unwrap(),
            "/workspace/workspace-old/a"
        );
    }

    #[test]
    fn normalize_rejects_parent_components() {
        assert!(matches!(
            normalize_workspace_path("/workspace", Some("../etc/passwd")),
            Err(ValidationError::PathEscape(_))
        ));
        assert!(normalize_workspace_path("/workspace", Some("src/../../x")).is_err());
    }
}
