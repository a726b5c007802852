pub mod workspace;

pub use workspace::TempWorkspace;
