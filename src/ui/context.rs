//! Interactive vs. CI detection

use std::io::IsTerminal;

/// Environment variables set by common CI providers
const CI_VARS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "BUILDKITE",
    "JENKINS_URL",
    "TF_BUILD",
];

/// How the current invocation may talk to the user
#[derive(Debug, Clone)]
pub struct UiContext {
    interactive: bool,
    /// Answer confirmations with "yes" without asking
    auto_yes: bool,
}

impl UiContext {
    /// Inspect the terminal and environment.
    ///
    /// Interactive means both stdout and stdin are terminals, no CI
    /// variable is set, and `CWBUILD_NON_INTERACTIVE` is unset.
    pub fn detect() -> Self {
        let interactive = std::io::stdout().is_terminal()
            && std::io::stdin().is_terminal()
            && std::env::var_os("CWBUILD_NON_INTERACTIVE").is_none()
            && !CI_VARS.iter().any(|var| std::env::var_os(var).is_some());

        Self {
            interactive,
            auto_yes: false,
        }
    }

    pub fn non_interactive() -> Self {
        Self {
            interactive: false,
            auto_yes: false,
        }
    }

    pub fn with_auto_yes(mut self, yes: bool) -> Self {
        self.auto_yes = yes;
        self
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn auto_yes(&self) -> bool {
        self.auto_yes
    }

    /// Spinners, progress bars and the cliclack gutter
    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }
}
