mod core;

pub use self::core::{RenderFailure, RenderReport, RendererSettings, StructureRenderer};
