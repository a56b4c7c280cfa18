//! Task form handling for the terminal user interface.
//!
//! This module provides the `TaskForm` structure used for creating and
//! editing tasks in the TUI, including field ordering and conversion to a
//! validated [`TaskDraft`].

use chrono::{DateTime, TimeZone};

use crate::dates::{format_time_input, resolve_due};
use crate::error::ValidationError;
use crate::fields::Priority;
use crate::task::{Task, TaskDraft};
use crate::tui::input::InputField;

/// Field order, top to bottom.
pub const TITLE_FIELD: usize = 0;
pub const DESCRIPTION_FIELD: usize = 1;
pub const PRIORITY_FIELD: usize = 2;
pub const DUE_FIELD: usize = 3;
pub const TIME_FIELD: usize = 4;
const FIELD_COUNT: usize = 5;

/// Task form for editing fields
#[derive(Debug, Clone)]
pub struct TaskForm {
    pub title: InputField,
    pub description: InputField,
    pub due: InputField,
    pub time: InputField,
    pub priority: usize,
    pub current_field: usize,
}

impl Default for TaskForm {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskForm {
    /// An empty form with Medium priority and the title focused.
    pub fn new() -> Self {
        let mut form = Self {
            title: InputField::new(),
            description: InputField::new(),
            due: InputField::new(),
            time: InputField::new(),
            priority: Self::priority_index(Priority::default()),
            current_field: TITLE_FIELD,
        };
        form.update_active_field();
        form
    }

    fn priority_index(priority: Priority) -> usize {
        Priority::ALL.iter().position(|&p| p == priority).unwrap_or(1)
    }

    /// A form pre-populated from `task`, with the due date split into a
    /// date and an `HH:MM` time in `tz`.
    pub fn from_task<Tz: TimeZone>(task: &Task, tz: &Tz) -> Self {
        let mut form = Self::new();
        form.title = InputField::with_value(&task.title);
        form.description = InputField::with_value(task.description.as_deref().unwrap_or_default());
        if let Some(due) = task.due_date {
            let local = due.with_timezone(tz).naive_local();
            form.due = InputField::with_value(&local.date().format("%Y-%m-%d").to_string());
            form.time = InputField::with_value(&format_time_input(local.time()));
        }
        form.priority = Self::priority_index(task.priority);
        form.update_active_field();
        form
    }

    pub fn selected_priority(&self) -> Priority {
        Priority::ALL.get(self.priority).copied().unwrap_or_default()
    }

    /// Build and validate the draft the form describes.
    pub fn to_draft<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<TaskDraft, ValidationError> {
        let due_date = resolve_due(&self.due.value, &self.time.value, now)?;
        let mut draft = TaskDraft::new(self.title.value.clone())
            .with_description(Some(self.description.value.clone()))
            .with_priority(self.selected_priority())
            .with_due_date(due_date);
        draft.validate()?;
        Ok(draft)
    }

    fn field_mut(&mut self, index: usize) -> Option<&mut InputField> {
        match index {
            TITLE_FIELD => Some(&mut self.title),
            DESCRIPTION_FIELD => Some(&mut self.description),
            DUE_FIELD => Some(&mut self.due),
            TIME_FIELD => Some(&mut self.time),
            _ => None,
        }
    }

    /// Move to the next field in the form.
    pub fn next_field(&mut self) {
        self.current_field = (self.current_field + 1) % FIELD_COUNT;
        self.update_active_field();
    }

    /// Move to the previous field in the form.
    pub fn prev_field(&mut self) {
        self.current_field = (self.current_field + FIELD_COUNT - 1) % FIELD_COUNT;
        self.update_active_field();
    }

    /// Update which field is currently active for editing.
    pub fn update_active_field(&mut self) {
        for index in 0..FIELD_COUNT {
            let active = index == self.current_field;
            if let Some(field) = self.field_mut(index) {
                field.active = active;
            }
        }
    }

    pub fn handle_char(&mut self, c: char) {
        if let Some(field) = self.field_mut(self.current_field) {
            field.handle_char(c);
        }
    }

    pub fn handle_backspace(&mut self) {
        let current = self.current_field;
        if let Some(field) = self.field_mut(current) {
            field.handle_backspace();
            // An emptied date takes the time with it.
            if current == DUE_FIELD && field.value.is_empty() {
                self.time.clear();
            }
        }
    }

    pub fn handle_delete(&mut self) {
        if let Some(field) = self.field_mut(self.current_field) {
            field.handle_delete();
        }
    }

    /// Left/right move the cursor, or cycle the priority selector.
    pub fn handle_left_right(&mut self, right: bool) {
        if self.current_field == PRIORITY_FIELD {
            let n = Priority::ALL.len();
            self.priority = if right { (self.priority + 1) % n } else { (self.priority + n - 1) % n };
            return;
        }
        if let Some(field) = self.field_mut(self.current_field) {
            if right {
                field.move_cursor_right();
            } else {
                field.move_cursor_left();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::task;
    use chrono::{FixedOffset, Utc};
    use pretty_assertions::assert_eq;

    fn tz() -> FixedOffset {
        FixedOffset::west_opt(5 * 3600).unwrap()
    }

    #[test]
    fn new_form_defaults() {
        let form = TaskForm::new();
        assert_eq!(form.selected_priority(), Priority::Medium);
        assert!(form.title.active);
        assert!(!form.due.active);
    }

    #[test]
    fn edit_form_splits_due_into_local_parts() {
        let mut t = task(3, "Report", false);
        t.description = Some("Q3 numbers".into());
        t.priority = Priority::High;
        t.due_date = Some(Utc.with_ymd_and_hms(2025, 6, 2, 3, 15, 0).unwrap());
        let form = TaskForm::from_task(&t, &tz());
        assert_eq!(form.title.value, "Report");
        assert_eq!(form.description.value, "Q3 numbers");
        assert_eq!(form.due.value, "2025-06-01");
        assert_eq!(form.time.value, "22:15");
        assert_eq!(form.selected_priority(), Priority::High);
    }

    #[test]
    fn draft_from_form() {
        let now = tz().with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let mut form = TaskForm::new();
        for c in "  Pay rent ".chars() {
            form.handle_char(c);
        }
        form.current_field = DUE_FIELD;
        for c in "tomorrow".chars() {
            form.handle_char(c);
        }
        form.next_field();
        for c in "09:30".chars() {
            form.handle_char(c);
        }
        form.current_field = PRIORITY_FIELD;
        form.handle_left_right(true);

        let draft = form.to_draft(&now).unwrap();
        assert_eq!(draft.title, "Pay rent");
        assert_eq!(draft.description, None);
        assert_eq!(draft.priority, Priority::High);
        assert_eq!(draft.due_date, Some(Utc.with_ymd_and_hms(2025, 6, 2, 14, 30, 0).unwrap()));
    }

    #[test]
    fn invalid_form_reports_first_problem() {
        let now = tz().with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let mut form = TaskForm::new();
        assert_eq!(form.to_draft(&now), Err(ValidationError::EmptyTitle));

        form.title = InputField::with_value("x");
        form.due = InputField::with_value("someday");
        assert_eq!(
            form.to_draft(&now),
            Err(ValidationError::InvalidDueDate("someday".into()))
        );
    }

    #[test]
    fn clearing_date_clears_time() {
        let mut form = TaskForm::new();
        form.due = InputField::with_value("x");
        form.time = InputField::with_value("10:00");
        form.current_field = DUE_FIELD;
        form.handle_backspace();
        assert_eq!(form.time.value, "");
    }

    #[test]
    fn priority_selector_wraps() {
        let mut form = TaskForm::new();
        form.current_field = PRIORITY_FIELD;
        form.handle_left_right(false);
        assert_eq!(form.selected_priority(), Priority::Low);
        form.handle_left_right(false);
        assert_eq!(form.selected_priority(), Priority::High);
    }
}
