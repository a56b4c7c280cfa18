//! Color constants for the terminal user interface.

use ratatui::style::Color;

use crate::display::DueTone;
use crate::fields::Priority;

/// Highlight for the focused form field and the header bar.
pub const GOLD: Color = Color::Rgb(255, 215, 0);
/// Confirmation dialogs and failures.
pub const DARK_RED: Color = Color::Rgb(114, 0, 0);
/// Status bar background.
pub const DARK_GREEN: Color = Color::Rgb(0, 80, 0);
pub const MUTED: Color = Color::DarkGray;

pub fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::Low => Color::Green,
        Priority::Medium => Color::Yellow,
        Priority::High => Color::Red,
    }
}

pub fn due_color(tone: DueTone) -> Color {
    match tone {
        DueTone::Muted => MUTED,
        DueTone::Overdue => Color::Red,
        DueTone::Today => Color::Yellow,
    }
}
