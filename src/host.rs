//! Services the surrounding application provides to the controller.
//!
//! The engine never opens windows, shows dialogs or rasterizes on its own; it
//! calls through these traits. [`StdFileSystem`] is the only implementation
//! shipped here, everything else comes from the shell (or from tests).

use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};
use crate::model::Diagram;

/// Text and byte file access.
pub trait FileSystem {
    /// Reads a whole UTF-8 file.
    fn read_text(&self, path: &Path) -> Result<String>;

    /// Replaces the file contents with `content`.
    fn write_text(&self, path: &Path, content: &str) -> Result<()>;

    /// Replaces the file contents with raw bytes.
    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn read_text(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path)
            .map_err(|err| EngineError::Io(format!("{}: {err}", path.display())))
    }

    fn write_text(&self, path: &Path, content: &str) -> Result<()> {
        self.write_bytes(path, content.as_bytes())
    }

    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        std::fs::write(path, bytes)
            .map_err(|err| EngineError::Io(format!("{}: {err}", path.display())))
    }
}

/// A named group of extensions offered by a file dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    pub name: String,
    pub extensions: Vec<String>,
}

impl FileFilter {
    pub fn new(name: &str, extensions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            extensions: extensions.iter().map(|ext| ext.to_string()).collect(),
        }
    }

    pub fn diagrams() -> Vec<FileFilter> {
        vec![
            Self::new("Diagram Files", &["json", "xml"]),
            Self::new("JSON", &["json"]),
            Self::new("XML", &["xml"]),
        ]
    }

    pub fn for_extension(extension: &str) -> Vec<FileFilter> {
        vec![Self::new(&extension.to_ascii_uppercase(), &[extension])]
    }
}

/// Native open/save pickers. `None` means the user dismissed the dialog.
pub trait FileDialogs {
    fn pick_open(&mut self, filters: &[FileFilter]) -> Option<PathBuf>;

    fn pick_save(&mut self, default_name: &str, filters: &[FileFilter]) -> Option<PathBuf>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Svg,
    Pdf,
}

impl ImageFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Svg => "svg",
            Self::Pdf => "pdf",
        }
    }
}

/// Turns the diagram into image bytes. Must not assume it may keep the
/// diagram; it only borrows it for the call.
pub trait Rasterizer {
    fn rasterize(&self, diagram: &Diagram, format: ImageFormat) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
}

/// Modal confirmation and notification.
pub trait Prompt {
    fn confirm(&mut self, title: &str, message: &str) -> bool;

    fn alert(&mut self, title: &str, message: &str, level: AlertLevel);
}

/// Borrowed bundle of collaborators for one file operation.
pub struct Host<'a> {
    pub fs: &'a dyn FileSystem,
    pub dialogs: &'a mut dyn FileDialogs,
    pub prompt: &'a mut dyn Prompt,
    pub rasterizer: &'a dyn Rasterizer,
}

/// How a file command ended. Dismissing a dialog is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Opened(PathBuf),
    Saved(PathBuf),
    Exported(PathBuf),
    /// The user backed out; nothing was read or written.
    Cancelled,
}

impl FileOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Opened(path) | Self::Saved(path) | Self::Exported(path) => Some(path),
            Self::Cancelled => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn std_file_system_round_trips_text() {
        let dir = std::env::temp_dir().join(format!("archgraph-host-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("note.txt");
        let fs = StdFileSystem;
        fs.write_text(&path, "hello").unwrap();
        assert_eq!(fs.read_text(&path).unwrap(), "hello");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = StdFileSystem
            .read_text(Path::new("/definitely/not/here.json"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Io(message) if message.contains("here.json")));
    }

    #[test]
    fn outcome_exposes_path() {
        let outcome = FileOutcome::Saved(PathBuf::from("a.json"));
        assert_eq!(outcome.path(), Some(Path::new("a.json")));
        assert!(FileOutcome::Cancelled.is_cancelled());
    }
}
