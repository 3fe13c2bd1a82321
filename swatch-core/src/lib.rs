//! Swatch core library — setting types, the data-file store, locations, errors.
//!
//! Public API surface:
//! - [`types`] — [`Settings`], [`SettingValue`], [`OsName`]
//! - [`store`] — [`ConfigStore`] (read-only view of the data file)
//! - [`manifest`] — [`SourceManifest`], optional per-source-tree settings
//! - [`locations`] — [`Locations`], the explicit set of directories a cycle uses
//! - [`error`] — [`StoreError`]

pub mod error;
pub mod locations;
pub mod manifest;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use locations::Locations;
pub use manifest::{SourceManifest, MANIFEST_FILE_NAME};
pub use store::{ConfigStore, DATA_FILE_NAME};
pub use types::{OsName, SettingValue, Settings};
