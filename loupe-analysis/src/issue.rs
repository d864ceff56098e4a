use std::collections::HashSet;
use std::fmt;

/// The kinds of issues the engine reports. These are values, not exceptions:
/// every resolver recovers locally after emitting one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueKind {
    /// Reference to an unknown class/function/method/constant/variable.
    Undefined,
    /// Assignment/argument/return type incompatible with a declared type.
    TypeMismatch,
    /// Too few or too many call arguments.
    ParameterCount,
    /// Duplicate declaration.
    Redefinition,
    /// Visibility violation on a property or method access.
    Access,
    /// Construct not available in the configured runtime version.
    Availability,
    /// Use of a deprecated element.
    Deprecated,
    /// Dead or ineffective statement.
    NoOp,
    /// Static call on an instance method or vice versa.
    StaticMisuse,
}

impl IssueKind {
    pub fn describe(self) -> &'static str {
        match self {
            IssueKind::Undefined => "Undefined",
            IssueKind::TypeMismatch => "TypeMismatch",
            IssueKind::ParameterCount => "ParameterCount",
            IssueKind::Redefinition => "Redefinition",
            IssueKind::Access => "Access",
            IssueKind::Availability => "Availability",
            IssueKind::Deprecated => "Deprecated",
            IssueKind::NoOp => "NoOp",
            IssueKind::StaticMisuse => "StaticMisuse",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

#[derive(Debug, Clone)]
pub struct Issue {
    pub kind: IssueKind,
    pub file: String,
    pub line: u32,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {} {}", self.file, self.line, self.kind, self.message)
    }
}

/// The diagnostics sink. Collects issues across the whole batch and hands
/// them back in a stable (file, line, discovery) order.
///
/// Emission is idempotent: call-site re-analysis walks function bodies more
/// than once, and findings it repeats must not show up twice.
#[derive(Debug, Default)]
pub struct IssueCollector {
    issues: Vec<Issue>,
    seen: HashSet<(IssueKind, String, u32, String)>,
}

impl IssueCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, kind: IssueKind, file: &str, line: u32, message: impl Into<String>) {
        let message = message.into();
        if !self
            .seen
            .insert((kind, file.to_string(), line, message.clone()))
        {
            return;
        }
        self.issues.push(Issue {
            kind,
            file: file.to_string(),
            line,
            message,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn count_kind(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|issue| issue.kind == kind).count()
    }

    /// Stable sort by file then line; discovery order breaks ties, keeping
    /// output reproducible and fixtures diffable.
    pub fn into_sorted(self) -> Vec<Issue> {
        let mut issues = self.issues;
        issues.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));
        issues
    }
}
