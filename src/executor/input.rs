// Physical input simulation via enigo.
use async_trait::async_trait;

use crate::errors::{PilotError, PilotResult};

/// Raw synthetic-input capability.
#[async_trait]
pub trait InputSimulator: Send + Sync {
    /// One key-down/key-up pair per character.
    async fn type_text(&self, text: &str) -> PilotResult<()>;

    /// Move the pointer to `(x, y)` and press/release the left button.
    async fn click_at(&self, x: i32, y: i32) -> PilotResult<()>;
}

#[derive(Debug, Default)]
pub struct EnigoInput;

#[cfg(target_os = "windows")]
mod platform {
    use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};

    use crate::errors::{PilotError, PilotResult};

    fn connect() -> PilotResult<Enigo> {
        Enigo::new(&Settings::default())
            .map_err(|e| PilotError::Executor(format!("input init: {e}")))
    }

    pub fn type_text(text: &str) -> PilotResult<()> {
        let mut enigo = connect()?;
        for ch in text.chars() {
            enigo
                .key(Key::Unicode(ch), Direction::Click)
                .map_err(|e| PilotError::Executor(format!("key {ch:?}: {e}")))?;
        }
        Ok(())
    }

    pub fn click_at(x: i32, y: i32) -> PilotResult<()> {
        let mut enigo = connect()?;
        enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| PilotError::Executor(format!("move to ({x},{y}): {e}")))?;
        enigo
            .button(Button::Left, Direction::Press)
            .map_err(|e| PilotError::Executor(format!("button down: {e}")))?;
        enigo
            .button(Button::Left, Direction::Release)
            .map_err(|e| PilotError::Executor(format!("button up: {e}")))
    }
}

#[cfg(not(target_os = "windows"))]
mod platform {
    use crate::errors::{PilotError, PilotResult};

    pub fn type_text(_text: &str) -> PilotResult<()> {
        Err(PilotError::Executor("synthetic input is only available on Windows".into()))
    }

    pub fn click_at(_x: i32, _y: i32) -> PilotResult<()> {
        Err(PilotError::Executor("synthetic input is only available on Windows".into()))
    }
}

#[async_trait]
impl InputSimulator for EnigoInput {
    async fn type_text(&self, text: &str) -> PilotResult<()> {
        if text.is_empty() {
            return Ok(());
        }
        let text = text.to_string();
        tokio::task::spawn_blocking(move || platform::type_text(&text))
            .await
            .map_err(|e| PilotError::Executor(format!("join: {e}")))?
    }

    async fn click_at(&self, x: i32, y: i32) -> PilotResult<()> {
        tokio::task::spawn_blocking(move || platform::click_at(x, y))
            .await
            .map_err(|e| PilotError::Executor(format!("join: {e}")))?
    }
}
