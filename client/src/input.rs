//! Mouse and keyboard handling for the board screen

use macroquad::prelude::*;
use shared::{BOARD_CELLS, ROOM_ID_LEN};

/// Something the player asked for this frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    CreateRoom,
    JoinRoom(String),
    ResetGame,
    LeaveRoom,
    Move(usize),
}

/// Clickable regions of the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    Cell(usize),
    CreateButton,
    JoinButton,
    ResetButton,
    LeaveButton,
}

/// Screen geometry shared by input hit-testing and rendering
#[derive(Debug, Clone)]
pub struct Layout {
    pub board_origin: Vec2,
    pub cell_size: f32,
    pub create_button: Rect,
    pub join_button: Rect,
    pub reset_button: Rect,
    pub leave_button: Rect,
    pub code_field: Rect,
}

impl Layout {
    pub fn new(width: f32, height: f32) -> Self {
        let cell_size = (width.min(height) * 0.6 / 3.0).floor();
        let board_size = cell_size * 3.0;
        let board_origin = vec2((width - board_size) / 2.0, 80.0);

        let row_y = board_origin.y + board_size + 30.0;
        let button_w = 110.0;
        let button_h = 36.0;
        let gap = 12.0;
        let left = (width - (button_w * 4.0 + gap * 3.0)) / 2.0;

        Self {
            board_origin,
            cell_size,
            create_button: Rect::new(left, row_y, button_w, button_h),
            code_field: Rect::new(left + button_w + gap, row_y, button_w, button_h),
            join_button: Rect::new(left + (button_w + gap) * 2.0, row_y, button_w, button_h),
            reset_button: Rect::new(left + (button_w + gap) * 3.0, row_y, button_w, button_h),
            leave_button: Rect::new(left, row_y + button_h + gap, button_w, button_h),
        }
    }

    pub fn cell_rect(&self, index: usize) -> Rect {
        let col = (index % 3) as f32;
        let row = (index / 3) as f32;
        Rect::new(
            self.board_origin.x + col * self.cell_size,
            self.board_origin.y + row * self.cell_size,
            self.cell_size,
            self.cell_size,
        )
    }

    /// Board cell under a screen position, row-major from top-left
    pub fn cell_at(&self, x: f32, y: f32) -> Option<usize> {
        let dx = x - self.board_origin.x;
        let dy = y - self.board_origin.y;
        let board_size = self.cell_size * 3.0;
        if dx < 0.0 || dy < 0.0 || dx >= board_size || dy >= board_size {
            return None;
        }

        let index = (dy / self.cell_size) as usize * 3 + (dx / self.cell_size) as usize;
        (index < BOARD_CELLS).then_some(index)
    }

    pub fn hit(&self, x: f32, y: f32) -> Option<Hit> {
        let point = vec2(x, y);
        if let Some(index) = self.cell_at(x, y) {
            Some(Hit::Cell(index))
        } else if self.create_button.contains(point) {
            Some(Hit::CreateButton)
        } else if self.join_button.contains(point) {
            Some(Hit::JoinButton)
        } else if self.reset_button.contains(point) {
            Some(Hit::ResetButton)
        } else if self.leave_button.contains(point) {
            Some(Hit::LeaveButton)
        } else {
            None
        }
    }
}

/// Room code typed by the player, kept uppercase
#[derive(Debug, Clone, Default)]
pub struct JoinCode {
    code: String,
}

impl JoinCode {
    pub fn push(&mut self, c: char) {
        if c.is_ascii_alphanumeric() && self.code.len() < ROOM_ID_LEN {
            self.code.push(c.to_ascii_uppercase());
        }
    }

    pub fn pop(&mut self) {
        self.code.pop();
    }

    pub fn as_str(&self) -> &str {
        &self.code
    }

    /// Hands out the typed code, or None if nothing was typed
    pub fn take(&mut self) -> Option<String> {
        if self.code.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.code))
        }
    }
}

/// Collects per-frame input into [`UiAction`]s
#[derive(Default)]
pub struct InputManager {
    join_code: JoinCode,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join_code(&self) -> &str {
        self.join_code.as_str()
    }

    pub fn update(&mut self, layout: &Layout) -> Vec<UiAction> {
        let mut actions = Vec::new();

        while let Some(c) = get_char_pressed() {
            self.join_code.push(c);
        }
        if is_key_pressed(KeyCode::Backspace) {
            self.join_code.pop();
        }
        if is_key_pressed(KeyCode::Enter) {
            if let Some(code) = self.join_code.take() {
                actions.push(UiAction::JoinRoom(code));
            }
        }
        if is_key_pressed(KeyCode::Escape) {
            actions.push(UiAction::LeaveRoom);
        }

        if is_mouse_button_pressed(MouseButton::Left) {
            let (x, y) = mouse_position();
            match layout.hit(x, y) {
                Some(Hit::Cell(index)) => actions.push(UiAction::Move(index)),
                Some(Hit::CreateButton) => actions.push(UiAction::CreateRoom),
                Some(Hit::JoinButton) => {
                    if let Some(code) = self.join_code.take() {
                        actions.push(UiAction::JoinRoom(code));
                    }
                }
                Some(Hit::ResetButton) => actions.push(UiAction::ResetGame),
                Some(Hit::LeaveButton) => actions.push(UiAction::LeaveRoom),
                None => {}
            }
        }

        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_hit_testing() {
        let layout = Layout::new(600.0, 600.0);
        let origin = layout.board_origin;
        let size = layout.cell_size;

        assert_eq!(layout.cell_at(origin.x + 1.0, origin.y + 1.0), Some(0));
        assert_eq!(
            layout.cell_at(origin.x + size * 1.5, origin.y + size * 1.5),
            Some(4)
        );
        assert_eq!(
            layout.cell_at(origin.x + size * 2.5, origin.y + size * 2.5),
            Some(8)
        );
        assert_eq!(layout.cell_at(origin.x - 1.0, origin.y), None);
        assert_eq!(layout.cell_at(origin.x, origin.y + size * 3.0), None);
    }

    #[test]
    fn test_cell_rect_matches_hit() {
        let layout = Layout::new(800.0, 600.0);
        for index in 0..BOARD_CELLS {
            let center = layout.cell_rect(index).center();
            assert_eq!(layout.hit(center.x, center.y), Some(Hit::Cell(index)));
        }
    }

    #[test]
    fn test_button_hits() {
        let layout = Layout::new(800.0, 600.0);
        let create = layout.create_button.center();
        let reset = layout.reset_button.center();
        assert_eq!(layout.hit(create.x, create.y), Some(Hit::CreateButton));
        assert_eq!(layout.hit(reset.x, reset.y), Some(Hit::ResetButton));
        assert_eq!(layout.hit(1.0, 1.0), None);
    }

    #[test]
    fn test_join_code_filters_and_uppercases() {
        let mut code = JoinCode::default();
        for c in "ab-12 cdEF".chars() {
            code.push(c);
        }
        assert_eq!(code.as_str(), "AB12CD");

        code.pop();
        assert_eq!(code.as_str(), "AB12C");
        assert_eq!(code.take(), Some("AB12C".to_string()));
        assert_eq!(code.take(), None);
    }
}
