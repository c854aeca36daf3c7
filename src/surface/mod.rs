//! Drawable surface capability plus the one-shot slot a host publishes it into.
//!
//! The window core never draws pixels itself. A platform binding implements
//! [`Surface`] and hands it to the window through [`SurfaceSlot::publish`];
//! anything that needs the handle (frame mutators, the render pass) goes
//! through the slot.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{Result, SurfaceError, WindowError};
use crate::structure::ImageData;

mod ansi;
mod recording;

pub use ansi::AnsiSurface;
pub use recording::{RecordingSurface, SurfaceCall};

pub type SurfaceResult<T> = std::result::Result<T, SurfaceError>;

/// Drawing and frame capabilities supplied by the host toolkit.
pub trait Surface: Send {
    fn draw_rect(&mut self, x: i32, y: i32, width: i32, height: i32) -> SurfaceResult<()>;

    /// Draw at the image's native resolution.
    fn draw_image(&mut self, image: &ImageData, x: i32, y: i32) -> SurfaceResult<()>;

    fn draw_image_scaled(
        &mut self,
        image: &ImageData,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> SurfaceResult<()>;

    fn draw_string(&mut self, text: &str, x: i32, y: i32) -> SurfaceResult<()>;

    fn clear(&mut self, x: i32, y: i32, width: i32, height: i32) -> SurfaceResult<()>;

    /// Current drawable extent as `(width, height)`.
    fn size(&self) -> (i32, i32);

    /// Flush a finished pass to the screen.
    fn present(&mut self) -> SurfaceResult<()> {
        Ok(())
    }

    fn set_title(&mut self, _title: &str) -> SurfaceResult<()> {
        Ok(())
    }

    fn set_size(&mut self, _width: i32, _height: i32) -> SurfaceResult<()> {
        Ok(())
    }

    fn set_resizable(&mut self, _resizable: bool) -> SurfaceResult<()> {
        Ok(())
    }

    fn set_visible(&mut self, _visible: bool) -> SurfaceResult<()> {
        Ok(())
    }
}

/// One-shot publication point for a window's surface.
///
/// The surface is published at most once per open cycle and keeps its
/// identity until [`SurfaceSlot::take`] clears it on close. Callers that need
/// the handle block on a condition variable until it appears.
#[derive(Default)]
pub struct SurfaceSlot {
    surface: Mutex<Option<Box<dyn Surface>>>,
    published: Condvar,
}

impl SurfaceSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, surface: Box<dyn Surface>) -> Result<()> {
        let mut guard = self.lock();
        if guard.is_some() {
            return Err(WindowError::SurfaceAlreadyPublished);
        }
        *guard = Some(surface);
        self.published.notify_all();
        Ok(())
    }

    pub fn is_published(&self) -> bool {
        self.lock().is_some()
    }

    /// Wait up to `timeout` for the surface, then run `f` against it.
    pub fn with_published<R>(
        &self,
        timeout: Duration,
        f: impl FnOnce(&mut dyn Surface) -> R,
    ) -> Result<R> {
        let guard = self.lock();
        let (mut guard, _) = self
            .published
            .wait_timeout_while(guard, timeout, |surface| surface.is_none())
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match guard.as_mut() {
            Some(surface) => Ok(f(surface.as_mut())),
            None => Err(WindowError::SurfaceUnavailable),
        }
    }

    /// Run `f` only if a surface is already published. Never blocks on publication.
    pub fn try_with<R>(&self, f: impl FnOnce(&mut dyn Surface) -> R) -> Option<R> {
        let mut guard = self.lock();
        guard.as_mut().map(|surface| f(surface.as_mut()))
    }

    /// Clear the slot, returning the previously published surface.
    pub fn take(&self) -> Option<Box<dyn Surface>> {
        self.lock().take()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn Surface>>> {
        self.surface
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn publish_is_one_shot() {
        let slot = SurfaceSlot::new();
        slot.publish(Box::new(RecordingSurface::new(10, 10))).unwrap();
        let err = slot
            .publish(Box::new(RecordingSurface::new(10, 10)))
            .unwrap_err();
        assert!(matches!(err, WindowError::SurfaceAlreadyPublished));

        assert!(slot.take().is_some());
        assert!(!slot.is_published());
        slot.publish(Box::new(RecordingSurface::new(1, 1))).unwrap();
    }

    #[test]
    fn waiters_wake_when_surface_is_published() {
        let slot = Arc::new(SurfaceSlot::new());
        let surface = RecordingSurface::new(80, 24);
        let calls = surface.clone();

        let waiter = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                slot.with_published(Duration::from_secs(5), |surface| {
                    surface.set_title("Wow").unwrap();
                    surface.size()
                })
            })
        };

        thread::sleep(Duration::from_millis(20));
        slot.publish(Box::new(surface)).unwrap();

        let size = waiter.join().unwrap().unwrap();
        assert_eq!(size, (80, 24));
        assert_eq!(calls.calls(), vec![SurfaceCall::SetTitle("Wow".into())]);
    }

    #[test]
    fn waiting_times_out_without_publication() {
        let slot = SurfaceSlot::new();
        let err = slot
            .with_published(Duration::from_millis(5), |surface| surface.size())
            .unwrap_err();
        assert!(matches!(err, WindowError::SurfaceUnavailable));
        assert!(slot.try_with(|surface| surface.size()).is_none());
    }
}
