use std::fs::{DirBuilder, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::{Config, MarkdownConfig};
use crate::markdown::{Markdown, MarkdownError, MarkdownRenderer};
use crate::path::{HTML_EXT, is_markdown, set_extension};

#[cfg(unix)]
const FILE_MODE: u32 = 0o644;
#[cfg(unix)]
const DIR_MODE: u32 = 0o755;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Source directory not specified")]
    MissingSourceDir,
    #[error("Failed to set up the Markdown renderer")]
    Renderer(#[source] MarkdownError),
    #[error("Failed to walk the source tree")]
    Walk(#[from] walkdir::Error),
    #[error("Path {} is not inside {}", .path.display(), .root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },
    #[error("Error creating directory {}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Error reading Markdown file {}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Error rendering Markdown {}", .path.display())]
    Render {
        path: PathBuf,
        source: MarkdownError,
    },
    #[error("Error writing {}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Error copying {} to {}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

impl BuildError {
    /// The source or destination path the failure is about, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            BuildError::Walk(e) => e.path(),
            BuildError::OutsideRoot { path, .. }
            | BuildError::CreateDir { path, .. }
            | BuildError::Read { path, .. }
            | BuildError::Render { path, .. }
            | BuildError::Write { path, .. } => Some(path.as_path()),
            BuildError::Copy { from, .. } => Some(from.as_path()),
            BuildError::MissingSourceDir | BuildError::Renderer(_) => None,
        }
    }
}

/// What a successful render produced.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    pub directories: usize,
    pub pages: usize,
    pub assets: usize,
}

pub struct SiteBuilder {
    source_dir: Option<PathBuf>,
    output_dir: PathBuf,
    renderer: Option<Box<dyn MarkdownRenderer>>,
}

impl Default for SiteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteBuilder {
    pub fn new() -> Self {
        Self {
            source_dir: None,
            output_dir: PathBuf::from("public"),
            renderer: None,
        }
    }

    // Required configuration
    pub fn source_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.source_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn output_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output_dir = path.as_ref().to_path_buf();
        self
    }

    /// Replace the default [`Markdown`] renderer.
    pub fn renderer<R: MarkdownRenderer + 'static>(mut self, renderer: R) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    pub fn build(self) -> Result<Site, BuildError> {
        let source_dir = self.source_dir.ok_or(BuildError::MissingSourceDir)?;

        let renderer: Box<dyn MarkdownRenderer> = match self.renderer {
            Some(renderer) => renderer,
            None => Box::new(
                Markdown::new(&MarkdownConfig::default()).map_err(BuildError::Renderer)?,
            ),
        };

        Ok(Site {
            source_dir,
            output_dir: self.output_dir,
            renderer,
        })
    }
}

/// A source tree bound to an output location and a renderer.
pub struct Site {
    source_dir: PathBuf,
    output_dir: PathBuf,
    renderer: Box<dyn MarkdownRenderer>,
}

impl Site {
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Mirrors the source tree into the output directory, converting
    /// Markdown pages to HTML and copying everything else as-is.
    ///
    /// Stops at the first error. Whatever was written before the failure
    /// stays on disk. The output directory itself is created here, so it
    /// must not exist yet.
    pub fn render_all(&self) -> Result<BuildReport, BuildError> {
        info!(
            source = %self.source_dir.display(),
            output = %self.output_dir.display(),
            "Rendering site"
        );

        let mut report = BuildReport::default();

        for entry in WalkDir::new(&self.source_dir).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();
            let to = self.out_path(path)?;

            if entry.file_type().is_dir() {
                create_dir(&to)?;
                debug!(path = %to.display(), "Created directory");
                report.directories += 1;
            } else if is_markdown(path) {
                let to = set_extension(&to, HTML_EXT);
                self.render_page(path, &to)?;
                debug!(from = %path.display(), to = %to.display(), "Rendered page");
                report.pages += 1;
            } else {
                copy_asset(path, &to)?;
                debug!(from = %path.display(), to = %to.display(), "Copied asset");
                report.assets += 1;
            }
        }

        info!(
            directories = report.directories,
            pages = report.pages,
            assets = report.assets,
            "Site rendered"
        );

        Ok(report)
    }

    fn out_path(&self, path: &Path) -> Result<PathBuf, BuildError> {
        let relative = path
            .strip_prefix(&self.source_dir)
            .map_err(|_| BuildError::OutsideRoot {
                path: path.to_path_buf(),
                root: self.source_dir.clone(),
            })?;

        // The walk root maps onto the output root itself
        if relative.as_os_str().is_empty() {
            Ok(self.output_dir.clone())
        } else {
            Ok(self.output_dir.join(relative))
        }
    }

    fn render_page(&self, src: &Path, dest: &Path) -> Result<(), BuildError> {
        let markdown = std::fs::read(src).map_err(|source| BuildError::Read {
            path: src.to_path_buf(),
            source,
        })?;

        let html = self
            .renderer
            .render(&markdown)
            .map_err(|source| BuildError::Render {
                path: src.to_path_buf(),
                source,
            })?;

        write_file(dest, &html).map_err(|source| BuildError::Write {
            path: dest.to_path_buf(),
            source,
        })
    }
}

/// Renders `source` into `output` with the renderer described by `config`.
pub fn build_site<P: AsRef<Path>, Q: AsRef<Path>>(
    config: &Config,
    source: P,
    output: Q,
) -> Result<BuildReport, BuildError> {
    let markdown = Markdown::new(&config.markdown).map_err(BuildError::Renderer)?;

    SiteBuilder::new()
        .source_dir(source)
        .output_dir(output)
        .renderer(markdown)
        .build()?
        .render_all()
}

// Parents are created by the walk before their children, so this is never recursive.
fn create_dir(path: &Path) -> Result<(), BuildError> {
    let mut builder = DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }

    builder.create(path).map_err(|source| BuildError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(FILE_MODE);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)
}

fn copy_asset(from: &Path, to: &Path) -> Result<(), BuildError> {
    std::fs::copy(from, to)
        .map(|_| ())
        .map_err(|source| BuildError::Copy {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        })
}
