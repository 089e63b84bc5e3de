use crate::game::ClientGameState;
use crate::input::Layout;
use macroquad::prelude::*;
use shared::{Mark, BOARD_CELLS};

const BACKGROUND: Color = Color::new(0.1, 0.1, 0.1, 1.0);
const GRID: Color = Color::new(0.8, 0.8, 0.8, 1.0);
const BUTTON: Color = Color::new(0.27, 0.27, 0.27, 1.0);
const X_COLOR: Color = Color::new(1.0, 0.27, 0.27, 1.0);
const O_COLOR: Color = Color::new(0.27, 0.6, 1.0, 1.0);

pub struct Renderer {
    layout: Layout,
}

impl Renderer {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            layout: Layout::new(width, height),
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn render(&self, state: &ClientGameState, join_code: &str) {
        clear_background(BACKGROUND);

        self.draw_header(state);
        self.draw_board(state);
        self.draw_buttons(join_code);
        self.draw_status(state);
    }

    fn draw_header(&self, state: &ClientGameState) {
        let connection_color = if state.connected { GREEN } else { RED };
        draw_rectangle(10.0, 10.0, 8.0, 8.0, connection_color);
        draw_text("CON", 22.0, 18.0, 14.0, WHITE);

        if let Some(room_id) = &state.room_id {
            let mark = state.mark.map(Mark::as_str).unwrap_or("-");
            let text = format!(
                "Room {}  |  You: {}  |  Players: {}",
                room_id, mark, state.players_count
            );
            draw_text(&text, 10.0, 45.0, 24.0, WHITE);
        }
    }

    fn draw_board(&self, state: &ClientGameState) {
        let origin = self.layout.board_origin;
        let size = self.layout.cell_size * 3.0;

        for i in 1..3 {
            let offset = self.layout.cell_size * i as f32;
            draw_line(
                origin.x + offset,
                origin.y,
                origin.x + offset,
                origin.y + size,
                3.0,
                GRID,
            );
            draw_line(
                origin.x,
                origin.y + offset,
                origin.x + size,
                origin.y + offset,
                3.0,
                GRID,
            );
        }

        for index in 0..BOARD_CELLS {
            let rect = self.layout.cell_rect(index);
            match state.board[index] {
                Some(Mark::X) => self.draw_x(rect),
                Some(Mark::O) => self.draw_o(rect),
                None if state.can_move(index) && rect.contains(mouse_position().into()) => {
                    draw_rectangle(
                        rect.x,
                        rect.y,
                        rect.w,
                        rect.h,
                        Color::new(1.0, 1.0, 1.0, 0.08),
                    );
                }
                None => {}
            }
        }
    }

    fn draw_x(&self, rect: Rect) {
        let pad = rect.w * 0.2;
        draw_line(
            rect.x + pad,
            rect.y + pad,
            rect.right() - pad,
            rect.bottom() - pad,
            6.0,
            X_COLOR,
        );
        draw_line(
            rect.right() - pad,
            rect.y + pad,
            rect.x + pad,
            rect.bottom() - pad,
            6.0,
            X_COLOR,
        );
    }

    fn draw_o(&self, rect: Rect) {
        let center = rect.center();
        draw_circle_lines(center.x, center.y, rect.w * 0.3, 6.0, O_COLOR);
    }

    fn draw_buttons(&self, join_code: &str) {
        draw_button(self.layout.create_button, "Create");
        draw_button(self.layout.join_button, "Join");
        draw_button(self.layout.reset_button, "Reset");
        draw_button(self.layout.leave_button, "Leave");

        let field = self.layout.code_field;
        draw_rectangle_lines(field.x, field.y, field.w, field.h, 2.0, GRID);
        let text = if join_code.is_empty() {
            "code..."
        } else {
            join_code
        };
        let color = if join_code.is_empty() { GRAY } else { WHITE };
        draw_centered_text(text, field, 22, color);
    }

    fn draw_status(&self, state: &ClientGameState) {
        let y = self.layout.leave_button.bottom() + 40.0;
        draw_text(&state.status, 10.0, y, 24.0, WHITE);
    }
}

fn draw_button(rect: Rect, label: &str) {
    let hovered = rect.contains(mouse_position().into());
    let color = if hovered { GRAY } else { BUTTON };
    draw_rectangle(rect.x, rect.y, rect.w, rect.h, color);
    draw_rectangle_lines(rect.x, rect.y, rect.w, rect.h, 1.0, WHITE);
    draw_centered_text(label, rect, 22, WHITE);
}

fn draw_centered_text(text: &str, rect: Rect, font_size: u16, color: Color) {
    let dims = measure_text(text, None, font_size, 1.0);
    let x = rect.x + (rect.w - dims.width) / 2.0;
    let y = rect.y + (rect.h + dims.offset_y) / 2.0;
    draw_text(text, x, y, font_size as f32, color);
}
