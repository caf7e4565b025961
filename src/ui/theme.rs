//! cliclack theme

use cliclack::ThemeState;
use console::Style;

/// Cyan while active, green once answered
#[derive(Debug, Clone, Default)]
pub struct CwbuildTheme;

fn state_style(state: &ThemeState, submitted: Style) -> Style {
    match state {
        ThemeState::Active => Style::new().cyan(),
        ThemeState::Error(_) => Style::new().red(),
        ThemeState::Cancel => Style::new().dim(),
        ThemeState::Submit => submitted,
    }
}

impl cliclack::Theme for CwbuildTheme {
    fn bar_color(&self, state: &ThemeState) -> Style {
        state_style(state, Style::new().cyan().dim())
    }

    fn state_symbol_color(&self, state: &ThemeState) -> Style {
        state_style(state, Style::new().green())
    }
}

/// Install [`CwbuildTheme`] for every prompt and log line
pub fn init_theme() {
    cliclack::set_theme(CwbuildTheme);
}
