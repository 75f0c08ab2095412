pub mod publish;
pub mod services;
mod thumbnail;

pub use services::{AssetLinks, AssetSlot, AssetStore, Upload};
