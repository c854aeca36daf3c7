use std::sync::{Arc, Mutex};

use crate::error::SurfaceError;
use crate::structure::ImageData;

use super::{Surface, SurfaceResult};

/// A single call observed by [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    Clear {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    DrawRect {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    DrawImage {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    DrawString {
        text: String,
        x: i32,
        y: i32,
    },
    Present,
    SetTitle(String),
    SetSize(i32, i32),
    SetResizable(bool),
    SetVisible(bool),
}

impl SurfaceCall {
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            SurfaceCall::DrawRect { .. }
                | SurfaceCall::DrawImage { .. }
                | SurfaceCall::DrawString { .. }
        )
    }
}

#[derive(Default)]
struct RecordingState {
    calls: Vec<SurfaceCall>,
    reject_text: bool,
}

/// Headless surface that records every call. Clones share the same log.
#[derive(Clone)]
pub struct RecordingSurface {
    width: i32,
    height: i32,
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingSurface {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            state: Arc::new(Mutex::new(RecordingState::default())),
        }
    }

    /// Make every `draw_string` fail, simulating a surface without text support.
    pub fn reject_text(self, reject: bool) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.reject_text = reject;
        }
        self
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.state
            .lock()
            .map(|state| state.calls.clone())
            .unwrap_or_default()
    }

    /// Only the draw calls, without clears, presents or frame calls.
    pub fn draw_calls(&self) -> Vec<SurfaceCall> {
        self.calls().into_iter().filter(SurfaceCall::is_draw).collect()
    }

    pub fn reset(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.calls.clear();
        }
    }

    fn push(&self, call: SurfaceCall) {
        if let Ok(mut state) = self.state.lock() {
            state.calls.push(call);
        }
    }
}

impl Surface for RecordingSurface {
    fn draw_rect(&mut self, x: i32, y: i32, width: i32, height: i32) -> SurfaceResult<()> {
        self.push(SurfaceCall::DrawRect {
            x,
            y,
            width,
            height,
        });
        Ok(())
    }

    fn draw_image(&mut self, image: &ImageData, x: i32, y: i32) -> SurfaceResult<()> {
        self.push(SurfaceCall::DrawImage {
            x,
            y,
            width: image.width() as i32,
            height: image.height() as i32,
        });
        Ok(())
    }

    fn draw_image_scaled(
        &mut self,
        _image: &ImageData,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> SurfaceResult<()> {
        self.push(SurfaceCall::DrawImage {
            x,
            y,
            width,
            height,
        });
        Ok(())
    }

    fn draw_string(&mut self, text: &str, x: i32, y: i32) -> SurfaceResult<()> {
        let rejected = self
            .state
            .lock()
            .map(|state| state.reject_text)
            .unwrap_or(false);
        if rejected {
            return Err(SurfaceError::Rejected(format!("text at ({x}, {y})")));
        }
        self.push(SurfaceCall::DrawString {
            text: text.to_string(),
            x,
            y,
        });
        Ok(())
    }

    fn clear(&mut self, x: i32, y: i32, width: i32, height: i32) -> SurfaceResult<()> {
        self.push(SurfaceCall::Clear {
            x,
            y,
            width,
            height,
        });
        Ok(())
    }

    fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    fn present(&mut self) -> SurfaceResult<()> {
        self.push(SurfaceCall::Present);
        Ok(())
    }

    fn set_title(&mut self, title: &str) -> SurfaceResult<()> {
        self.push(SurfaceCall::SetTitle(title.to_string()));
        Ok(())
    }

    fn set_size(&mut self, width: i32, height: i32) -> SurfaceResult<()> {
        self.width = width;
        self.height = height;
        self.push(SurfaceCall::SetSize(width, height));
        Ok(())
    }

    fn set_resizable(&mut self, resizable: bool) -> SurfaceResult<()> {
        self.push(SurfaceCall::SetResizable(resizable));
        Ok(())
    }

    fn set_visible(&mut self, visible: bool) -> SurfaceResult<()> {
        self.push(SurfaceCall::SetVisible(visible));
        Ok(())
    }
}
