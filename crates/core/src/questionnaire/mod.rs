pub mod navigator;
pub mod renderer;
pub mod table;

pub use navigator::{percent, NavigatorError, PhaseNavigator, SectionProgress};
pub use renderer::{EditError, EditingSurface, QuestionRenderer, RenderedQuestion};
pub use table::{TableControls, TableEditor, TableError};
