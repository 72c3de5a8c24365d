pub mod clipboard;
pub mod commands;
pub mod config;
pub mod editor;
pub mod error;
pub mod hit;
pub mod input;
pub mod interaction;
pub mod persist;
pub mod shortcuts;
pub mod snap;
pub mod sync;
pub mod viewport;

pub use clipboard::{Clipboard, ClipboardItem};
pub use commands::{EdgeShape, History, HistoryEntry};
pub use config::EditorConfig;
pub use editor::{EditRequest, WorkflowEditor};
pub use error::EditError;
pub use hit::{HitTarget, ResizeHandle};
pub use input::{InputEvent, Modifiers, PointerButton};
pub use interaction::{ConnectMode, DragMode, Selection};
pub use persist::{CosmeticStore, GraphStore, NotificationSink, StoreError, WriteReport, write_through};
pub use shortcuts::{ShortcutAction, ShortcutMap};
pub use sync::{GraphMutation, PersistOp, SyncEngine};
pub use viewport::Viewport;
