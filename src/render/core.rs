use crate::error::{DiagnosticCode, SurfaceError};
use crate::structure::Structure;
use crate::surface::{Surface, SurfaceResult};

/// Renderer runtime parameters.
#[derive(Debug, Clone)]
pub struct RendererSettings {
    /// Clear the whole surface before drawing the structure list.
    pub clear_before_pass: bool,
    /// Call [`Surface::present`] after the last structure.
    pub present_after_pass: bool,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            clear_before_pass: true,
            present_after_pass: true,
        }
    }
}

/// One structure (or pass step) that could not be drawn.
#[derive(Debug)]
pub struct RenderFailure {
    /// Position in the structure list, `None` for clear/present failures.
    pub index: Option<usize>,
    pub kind: String,
    pub error: SurfaceError,
}

impl RenderFailure {
    pub fn code(&self) -> DiagnosticCode {
        match self.error {
            SurfaceError::Unsupported(_) => DiagnosticCode::UNSUPPORTED_STRUCTURE,
            _ => DiagnosticCode::RENDER_FAILED,
        }
    }
}

/// Outcome of a single render pass.
#[derive(Debug, Default)]
pub struct RenderReport {
    pub drawn: usize,
    pub failures: Vec<RenderFailure>,
}

impl RenderReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Draws a structure list onto a surface in list order.
///
/// A failing structure is recorded in the report and the pass moves on to the
/// next one; later structures paint over earlier ones.
pub struct StructureRenderer {
    settings: RendererSettings,
}

impl StructureRenderer {
    pub fn new(settings: RendererSettings) -> Self {
        Self { settings }
    }

    pub fn with_default() -> Self {
        Self::new(RendererSettings::default())
    }

    pub fn settings_mut(&mut self) -> &mut RendererSettings {
        &mut self.settings
    }

    pub fn render(&mut self, surface: &mut dyn Surface, structures: &[Structure]) -> RenderReport {
        let mut report = RenderReport::default();

        if self.settings.clear_before_pass {
            let (width, height) = surface.size();
            if let Err(error) = surface.clear(0, 0, width, height) {
                report.failures.push(RenderFailure {
                    index: None,
                    kind: "clear".to_string(),
                    error,
                });
            }
        }

        for (index, structure) in structures.iter().enumerate() {
            match draw_structure(surface, structure) {
                Ok(()) => report.drawn += 1,
                Err(error) => report.failures.push(RenderFailure {
                    index: Some(index),
                    kind: structure.kind().to_string(),
                    error,
                }),
            }
        }

        if self.settings.present_after_pass {
            if let Err(error) = surface.present() {
                report.failures.push(RenderFailure {
                    index: None,
                    kind: "present".to_string(),
                    error,
                });
            }
        }

        report
    }
}

fn draw_structure(surface: &mut dyn Surface, structure: &Structure) -> SurfaceResult<()> {
    match structure {
        Structure::Square(square) => {
            surface.draw_rect(square.x(), square.y(), square.width(), square.height())
        }
        Structure::Image(image) if image.is_auto_sized() => {
            surface.draw_image(image.image(), image.x(), image.y())
        }
        Structure::Image(image) => surface.draw_image_scaled(
            image.image(),
            image.x(),
            image.y(),
            image.width(),
            image.height(),
        ),
        Structure::Text(text) => surface.draw_string(text.content(), text.x(), text.y()),
        Structure::Custom(custom) => custom.draw(surface),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::structure::{
        CustomStructure, ImageData, ImageStructure, SquareStructure, TextStructure,
    };
    use crate::surface::{RecordingSurface, SurfaceCall};

    #[derive(Debug)]
    struct Hexagon;

    impl CustomStructure for Hexagon {
        fn kind(&self) -> &str {
            "hexagon"
        }
    }

    #[test]
    fn square_then_text_in_list_order() {
        let structures = vec![
            Structure::from(SquareStructure::new(0, 0, 10, 10)),
            Structure::from(TextStructure::new(5, 5, "hi")),
        ];
        let recorder = RecordingSurface::new(100, 100);
        let mut surface = recorder.clone();

        let report = StructureRenderer::with_default().render(&mut surface, &structures);

        assert!(report.is_clean());
        assert_eq!(report.drawn, 2);
        assert_eq!(
            recorder.draw_calls(),
            vec![
                SurfaceCall::DrawRect {
                    x: 0,
                    y: 0,
                    width: 10,
                    height: 10
                },
                SurfaceCall::DrawString {
                    text: "hi".into(),
                    x: 5,
                    y: 5
                },
            ]
        );
        let calls = recorder.calls();
        assert!(matches!(calls.first(), Some(SurfaceCall::Clear { .. })));
        assert_eq!(calls.last(), Some(&SurfaceCall::Present));
    }

    #[test]
    fn images_use_native_size_unless_boxed() {
        let image = ImageData::filled(4, 2, 0xFFFF_FFFF);
        let structures = vec![
            Structure::from(ImageStructure::new(1, 1, image.clone())),
            Structure::from(ImageStructure::scaled(3, 3, 8, 8, image)),
        ];
        let recorder = RecordingSurface::new(100, 100);
        let mut surface = recorder.clone();

        StructureRenderer::with_default().render(&mut surface, &structures);

        assert_eq!(
            recorder.draw_calls(),
            vec![
                SurfaceCall::DrawImage {
                    x: 1,
                    y: 1,
                    width: 4,
                    height: 2
                },
                SurfaceCall::DrawImage {
                    x: 3,
                    y: 3,
                    width: 8,
                    height: 8
                },
            ]
        );
    }

    #[test]
    fn failing_text_does_not_abort_the_pass() {
        let structures = vec![
            Structure::from(TextStructure::new(0, 0, "lost")),
            Structure::from(SquareStructure::new(1, 2, 3, 4)),
        ];
        let recorder = RecordingSurface::new(50, 50).reject_text(true);
        let mut surface = recorder.clone();

        let report = StructureRenderer::with_default().render(&mut surface, &structures);

        assert_eq!(report.drawn, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, Some(0));
        assert_eq!(report.failures[0].code(), DiagnosticCode::RENDER_FAILED);
        assert_eq!(recorder.draw_calls().len(), 1);
    }

    #[test]
    fn unsupported_kinds_are_reported_and_skipped() {
        let structures = vec![
            Structure::Custom(Arc::new(Hexagon)),
            Structure::from(SquareStructure::new(0, 0, 1, 1)),
        ];
        let mut surface = RecordingSurface::new(10, 10);

        let report = StructureRenderer::with_default().render(&mut surface, &structures);

        assert_eq!(report.drawn, 1);
        assert_eq!(report.failures[0].kind, "hexagon");
        assert_eq!(
            report.failures[0].code(),
            DiagnosticCode::UNSUPPORTED_STRUCTURE
        );
    }
}
