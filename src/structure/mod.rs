mod core;

pub use self::core::{
    AUTO_SIZE, CustomStructure, ImageData, ImageStructure, SquareStructure, Structure,
    StructureId, StructureList, TextStructure,
};
