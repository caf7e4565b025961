//! Terminal output
//!
//! Interactive terminals get cliclack's gutter and indicatif spinners;
//! CI and pipes get plain tagged lines. [`UiContext`] decides which.

mod context;
mod output;
mod progress;
mod prompts;
mod theme;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_value_status, outro_success, outro_warn, remark, section,
    step_error_detail, step_ok, step_ok_detail, step_warn_hint,
};
pub use progress::{BuildProgress, TaskSpinner};
pub use prompts::confirm;
pub use theme::{init_theme, CwbuildTheme};
