use std::fmt;
use std::sync::Arc;

use crate::error::SurfaceError;
use crate::surface::Surface;

/// Size sentinel asking the render pass to draw an image at its native resolution.
pub const AUTO_SIZE: i32 = -1;

/// Handle to a structure added to a window. Never reused, so a handle kept
/// across [`StructureList::clear`] refers to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructureId(pub(crate) u64);

impl StructureId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Structures in draw order, each tagged with its handle.
#[derive(Debug, Clone, Default)]
pub struct StructureList {
    ids: Vec<StructureId>,
    items: Vec<Structure>,
    next_id: u64,
}

impl StructureList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, structure: Structure) -> StructureId {
        let id = StructureId(self.next_id);
        self.next_id += 1;
        self.ids.push(id);
        self.items.push(structure);
        id
    }

    pub fn get(&self, id: StructureId) -> Option<&Structure> {
        self.position(id).map(|index| &self.items[index])
    }

    pub fn square_mut(&mut self, id: StructureId) -> Option<&mut SquareStructure> {
        let index = self.position(id)?;
        self.items[index].as_square_mut()
    }

    pub fn remove(&mut self, id: StructureId) -> Option<Structure> {
        let index = self.position(id)?;
        self.ids.remove(index);
        Some(self.items.remove(index))
    }

    /// Drops every structure. Handle numbering carries on.
    pub fn clear(&mut self) {
        self.ids.clear();
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[Structure] {
        &self.items
    }

    fn position(&self, id: StructureId) -> Option<usize> {
        // ids are pushed in increasing order
        self.ids.binary_search(&id).ok()
    }
}

/// Outlined rectangle. The only structure with mutators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquareStructure {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

impl SquareStructure {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn move_to(&mut self, x: i32, y: i32) {
        self.x = x;
        self.y = y;
    }

    pub fn resize(&mut self, width: i32, height: i32) {
        self.width = width;
        self.height = height;
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }
}

/// Decoded image pixels (packed `0xAARRGGBB`). Cheap to clone.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    width: u32,
    height: u32,
    pixels: Arc<[u32]>,
}

impl ImageData {
    /// Returns `None` when the pixel count does not match `width * height`.
    pub fn new(width: u32, height: u32, pixels: Vec<u32>) -> Option<Self> {
        if pixels.len() != (width as usize) * (height as usize) {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels: pixels.into(),
        })
    }

    /// Uniformly filled image, handy for placeholders.
    pub fn filled(width: u32, height: u32, argb: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![argb; (width as usize) * (height as usize)].into(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageStructure {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    image: ImageData,
}

impl ImageStructure {
    /// Image drawn at its native resolution.
    pub fn new(x: i32, y: i32, image: ImageData) -> Self {
        Self::scaled(x, y, AUTO_SIZE, AUTO_SIZE, image)
    }

    /// Image scaled into the `width` x `height` box.
    pub fn scaled(x: i32, y: i32, width: i32, height: i32, image: ImageData) -> Self {
        Self {
            x,
            y,
            width,
            height,
            image,
        }
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn image(&self) -> &ImageData {
        &self.image
    }

    pub fn is_auto_sized(&self) -> bool {
        self.width == AUTO_SIZE && self.height == AUTO_SIZE
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextStructure {
    x: i32,
    y: i32,
    content: String,
}

impl TextStructure {
    pub fn new(x: i32, y: i32, content: impl Into<String>) -> Self {
        Self {
            x,
            y,
            content: content.into(),
        }
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

impl fmt::Display for TextStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TextStructure{{x={}, y={}, content='{}'}}",
            self.x, self.y, self.content
        )
    }
}

/// Extension point for structure kinds the core does not know how to draw.
///
/// The default `draw` reports the kind as unsupported, which the render pass
/// logs and skips.
pub trait CustomStructure: fmt::Debug + Send + Sync {
    fn kind(&self) -> &str;

    fn draw(&self, _surface: &mut dyn Surface) -> std::result::Result<(), SurfaceError> {
        Err(SurfaceError::Unsupported(self.kind().to_string()))
    }
}

/// Declarative renderable drawn every tick in list order.
#[derive(Debug, Clone)]
pub enum Structure {
    Square(SquareStructure),
    Image(ImageStructure),
    Text(TextStructure),
    Custom(Arc<dyn CustomStructure>),
}

impl Structure {
    pub fn kind(&self) -> &str {
        match self {
            Structure::Square(_) => "square",
            Structure::Image(_) => "image",
            Structure::Text(_) => "text",
            Structure::Custom(custom) => custom.kind(),
        }
    }

    pub fn as_square_mut(&mut self) -> Option<&mut SquareStructure> {
        match self {
            Structure::Square(square) => Some(square),
            _ => None,
        }
    }
}

impl From<SquareStructure> for Structure {
    fn from(value: SquareStructure) -> Self {
        Structure::Square(value)
    }
}

impl From<ImageStructure> for Structure {
    fn from(value: ImageStructure) -> Self {
        Structure::Image(value)
    }
}

impl From<TextStructure> for Structure {
    fn from(value: TextStructure) -> Self {
        Structure::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleared_handles_are_never_reused() {
        let mut list = StructureList::new();
        let old = list.push(SquareStructure::new(0, 0, 4, 4).into());
        list.clear();
        let fresh = list.push(SquareStructure::new(9, 9, 2, 2).into());

        assert_ne!(old, fresh);
        assert!(list.square_mut(old).is_none());
        assert!(list.get(old).is_none());
        let square = list.square_mut(fresh).unwrap();
        assert_eq!((square.x(), square.y()), (9, 9));
    }

    #[test]
    fn removal_keeps_draw_order_and_other_handles() {
        let mut list = StructureList::new();
        let first = list.push(TextStructure::new(0, 0, "a").into());
        let second = list.push(SquareStructure::new(1, 1, 1, 1).into());
        let third = list.push(TextStructure::new(2, 2, "c").into());

        assert!(list.remove(second).is_some());
        assert!(list.remove(second).is_none());
        assert_eq!(list.len(), 2);
        assert!(matches!(list.get(first), Some(Structure::Text(_))));
        assert!(matches!(list.get(third), Some(Structure::Text(_))));
        assert!(matches!(list.as_slice()[1], Structure::Text(_)));
        assert!(list.square_mut(first).is_none());
    }

    #[test]
    fn square_mutators_update_geometry() {
        let mut square = SquareStructure::new(50, 50, 50, 50);
        square.move_to(10, 20);
        square.resize(5, 6);
        assert_eq!(
            (square.x(), square.y(), square.width(), square.height()),
            (10, 20, 5, 6)
        );
    }

    #[test]
    fn image_without_size_is_auto_sized() {
        let image = ImageData::filled(2, 3, 0xFF00_00FF);
        let native = ImageStructure::new(1, 1, image.clone());
        assert!(native.is_auto_sized());
        assert_eq!((native.width(), native.height()), (AUTO_SIZE, AUTO_SIZE));

        let scaled = ImageStructure::scaled(1, 1, 10, 10, image);
        assert!(!scaled.is_auto_sized());
    }

    #[test]
    fn image_data_rejects_mismatched_buffers() {
        assert!(ImageData::new(2, 2, vec![0; 3]).is_none());
        assert!(ImageData::new(2, 2, vec![0; 4]).is_some());
    }

    #[test]
    fn text_display_form() {
        let text = TextStructure::new(5, 5, "hi");
        assert_eq!(text.to_string(), "TextStructure{x=5, y=5, content='hi'}");
    }
}
