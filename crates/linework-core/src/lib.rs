//! Linework Core Library
//!
//! Document model, editing commands, snapping, hit-testing and persistence
//! for the Linework track diagram editor.

pub mod assets;
pub mod command;
pub mod config;
pub mod document;
pub mod entities;
pub mod geometry;
pub mod history;
pub mod icons;
pub mod selection;
pub mod session;
pub mod snap;
pub mod storage;
pub mod viewport;

pub use assets::{AssetError, AssetProvider, FsAssetProvider, IconArt, MemoryAssetProvider, PictureFormat};
pub use command::{Command, CommandError, CommandKind, CommandResult};
pub use config::{ConfigError, EditorDefaults};
pub use document::{CanvasConfig, Document, GridConfig};
pub use entities::{Entity, EntityId, EntityMeta, GroupEntity, IconEntity, IconRef, LabelEntity, LineEntity};
pub use history::{DirtyState, History};
pub use icons::BuiltinIcon;
pub use selection::{Handle, HandleKind, Selection};
pub use session::{Session, SessionError, SessionEvent};
pub use snap::{SnapConfig, SnapKind, SnapResult};
pub use storage::{FileStorage, LoadError, LoadWarning, LoadedProject, MemoryStorage, Storage, StorageError};
pub use viewport::Viewport;
