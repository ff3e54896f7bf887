pub mod assets;
pub mod css;
pub mod headers;
pub mod html;

pub use assets::AssetPrefixSet;
