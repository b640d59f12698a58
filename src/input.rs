use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    Quit,
    DismissError,
    MoveUp,
    MoveDown,
    ToggleLogs,
    NextPage,
    PrevPage,
    Refresh,
    TriggerRun,
    Configure,
    Cancel,
    None,
}

/// Which overlay (if any) is currently displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayMode {
    #[default]
    None,
    Authorize,
}

/// Captures the UI state needed to interpret a key press.
#[derive(Debug, Clone, Default)]
pub struct InputContext {
    pub has_error: bool,
    pub is_loading: bool,
    pub pagination: bool,
    pub overlay: OverlayMode,
}

pub fn map_key(key: KeyEvent, ctx: &InputContext) -> Action {
    if key.kind != KeyEventKind::Press {
        return Action::None;
    }

    // Ctrl+C always quits
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }

    if ctx.overlay == OverlayMode::Authorize {
        return match key.code {
            KeyCode::Char('y' | 'c') | KeyCode::Enter => Action::Configure,
            KeyCode::Char('n' | 'q') | KeyCode::Esc => Action::Cancel,
            _ => Action::None,
        };
    }

    match key.code {
        KeyCode::Char('q') => Action::Quit,
        KeyCode::Esc => {
            if ctx.has_error {
                Action::DismissError
            } else {
                Action::Quit
            }
        }
        KeyCode::Up | KeyCode::Char('k') => Action::MoveUp,
        KeyCode::Down | KeyCode::Char('j') => Action::MoveDown,
        KeyCode::Enter | KeyCode::Char(' ' | 'l') => Action::ToggleLogs,
        KeyCode::Right | KeyCode::Char('n') if ctx.pagination => Action::NextPage,
        KeyCode::Left | KeyCode::Char('p') if ctx.pagination => Action::PrevPage,
        KeyCode::Char('r') if !ctx.is_loading => Action::Refresh,
        KeyCode::Char('t') => Action::TriggerRun,
        _ => Action::None,
    }
}
