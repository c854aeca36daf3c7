use std::io::Write;

use crossterm::queue;
use crossterm::terminal::SetTitle;

use crate::cursor::move_to;
use crate::structure::ImageData;
use crate::width::truncate_to_width;

use super::{Surface, SurfaceResult};

const BLOCK: char = '█';

/// Terminal surface: one surface unit is one character cell.
///
/// Rectangles are drawn as box outlines, images as solid blocks and text as
/// plain runs clipped to the visible columns.
pub struct AnsiSurface<W: Write + Send> {
    writer: W,
    width: u16,
    height: u16,
}

impl<W: Write + Send> AnsiSurface<W> {
    pub fn new(writer: W, width: u16, height: u16) -> Self {
        Self {
            writer,
            width,
            height,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn row_visible(&self, y: i32) -> bool {
        y >= 0 && y < self.height as i32
    }

    /// Write `text` starting at column `x` of row `y`, clipped to the surface.
    fn put(&mut self, x: i32, y: i32, text: &str) -> SurfaceResult<()> {
        if !self.row_visible(y) || x >= self.width as i32 {
            return Ok(());
        }
        let (start_col, text) = if x < 0 {
            let skip = x.unsigned_abs() as usize;
            let Some((offset, _)) = text.char_indices().nth(skip) else {
                return Ok(());
            };
            (0u16, &text[offset..])
        } else {
            (x as u16, text)
        };
        let available = (self.width - start_col) as usize;
        let clipped = truncate_to_width(text, available);
        if clipped.is_empty() {
            return Ok(());
        }
        write!(self.writer, "{}{}", move_to(y as u16 + 1, start_col + 1), clipped)?;
        Ok(())
    }

    fn fill(&mut self, x: i32, y: i32, width: i32, height: i32, ch: char) -> SurfaceResult<()> {
        if width <= 0 || height <= 0 {
            return Ok(());
        }
        let line: String = std::iter::repeat_n(ch, width as usize).collect();
        for row in y..y.saturating_add(height) {
            self.put(x, row, &line)?;
        }
        Ok(())
    }
}

impl<W: Write + Send> Surface for AnsiSurface<W> {
    fn draw_rect(&mut self, x: i32, y: i32, width: i32, height: i32) -> SurfaceResult<()> {
        if width <= 0 || height <= 0 {
            return Ok(());
        }
        if width == 1 || height == 1 {
            return self.fill(x, y, width, height, BLOCK);
        }

        let inner: String = std::iter::repeat_n('─', (width - 2) as usize).collect();
        self.put(x, y, &format!("┌{inner}┐"))?;
        for row in (y + 1)..(y + height - 1) {
            self.put(x, row, "│")?;
            self.put(x + width - 1, row, "│")?;
        }
        self.put(x, y + height - 1, &format!("└{inner}┘"))
    }

    fn draw_image(&mut self, image: &ImageData, x: i32, y: i32) -> SurfaceResult<()> {
        self.fill(x, y, image.width() as i32, image.height() as i32, BLOCK)
    }

    fn draw_image_scaled(
        &mut self,
        _image: &ImageData,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> SurfaceResult<()> {
        self.fill(x, y, width, height, BLOCK)
    }

    fn draw_string(&mut self, text: &str, x: i32, y: i32) -> SurfaceResult<()> {
        for (offset, line) in text.lines().enumerate() {
            self.put(x, y + offset as i32, line)?;
        }
        Ok(())
    }

    fn clear(&mut self, x: i32, y: i32, width: i32, height: i32) -> SurfaceResult<()> {
        self.fill(x, y, width, height, ' ')
    }

    fn size(&self) -> (i32, i32) {
        (self.width as i32, self.height as i32)
    }

    fn present(&mut self) -> SurfaceResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn set_title(&mut self, title: &str) -> SurfaceResult<()> {
        queue!(self.writer, SetTitle(title))?;
        Ok(())
    }

    fn set_size(&mut self, width: i32, height: i32) -> SurfaceResult<()> {
        self.width = width.clamp(0, u16::MAX as i32) as u16;
        self.height = height.clamp(0, u16::MAX as i32) as u16;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(surface: AnsiSurface<Vec<u8>>) -> String {
        String::from_utf8(surface.into_inner()).unwrap()
    }

    #[test]
    fn rect_outline_uses_box_characters() {
        let mut surface = AnsiSurface::new(Vec::new(), 20, 10);
        surface.draw_rect(2, 3, 4, 3).unwrap();
        let out = rendered(surface);
        assert!(out.contains("\u{1b}[4;3H┌──┐"));
        assert!(out.contains("\u{1b}[5;3H│"));
        assert!(out.contains("\u{1b}[5;6H│"));
        assert!(out.contains("\u{1b}[6;3H└──┘"));
    }

    #[test]
    fn text_is_clipped_to_the_surface() {
        let mut surface = AnsiSurface::new(Vec::new(), 5, 2);
        surface.draw_string("hello world", 2, 0).unwrap();
        surface.draw_string("hidden", 0, 7).unwrap();
        let out = rendered(surface);
        assert!(out.contains("\u{1b}[1;3Hhel"));
        assert!(!out.contains("hell"));
        assert!(!out.contains("hidden"));
    }

    #[test]
    fn negative_columns_skip_leading_characters() {
        let mut surface = AnsiSurface::new(Vec::new(), 10, 2);
        surface.draw_string("abcdef", -2, 1).unwrap();
        assert!(rendered(surface).contains("\u{1b}[2;1Hcdef"));
    }
}
