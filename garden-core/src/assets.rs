use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to compile stylesheet {}: {message}", .path.display())]
    Stylesheet { path: PathBuf, message: String },
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to copy {}: {source}", .path.display())]
    Copy {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Turns one stylesheet source file into CSS.
pub trait StyleCompiler {
    fn compile(&self, path: &Path) -> Result<String, AssetError>;
}

/// Sass/SCSS compiler producing compressed CSS.
#[derive(Debug, Default, Clone, Copy)]
pub struct SassCompiler;

impl StyleCompiler for SassCompiler {
    fn compile(&self, path: &Path) -> Result<String, AssetError> {
        let options = grass::Options::default().style(grass::OutputStyle::Compressed);
        grass::from_path(path, &options).map_err(|e| AssetError::Stylesheet {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// A compiled stylesheet, not yet written.
#[derive(Debug, Clone)]
pub struct Stylesheet {
    pub source: PathBuf,
    /// Relative to the output directory.
    pub out_path: PathBuf,
    pub css: String,
}

/// Compile every stylesheet directly inside `sass_dir`.
///
/// Files starting with `_` are partials and only reachable through imports.
pub fn compile_stylesheets(
    sass_dir: &Path,
    compiler: &dyn StyleCompiler,
) -> Result<Vec<Stylesheet>, AssetError> {
    if !sass_dir.is_dir() {
        debug!("No stylesheet directory at {}", sass_dir.display());
        return Ok(Vec::new());
    }

    let read_err = |source| AssetError::Read {
        path: sass_dir.to_path_buf(),
        source,
    };
    let mut sources = Vec::new();
    for entry in std::fs::read_dir(sass_dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if path.is_file() && is_stylesheet(&path) {
            sources.push(path);
        }
    }
    sources.sort();

    let mut sheets = Vec::with_capacity(sources.len());
    for source in sources {
        let Some(stem) = source.file_stem() else {
            continue;
        };
        let out_path = PathBuf::from("css").join(stem).with_extension("css");
        let css = compiler.compile(&source)?;
        info!("Compiled {} -> {}", source.display(), out_path.display());
        sheets.push(Stylesheet {
            source,
            out_path,
            css,
        });
    }

    Ok(sheets)
}

fn is_stylesheet(path: &Path) -> bool {
    let partial = path
        .file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with('_'));
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    !partial && (ext == "scss" || ext == "sass")
}

/// Copy `static_dir` into `dest`, skipping hidden entries and `skip` subtrees.
pub fn copy_static(static_dir: &Path, dest: &Path, skip: &[&str]) -> Result<Vec<PathBuf>, AssetError> {
    if !static_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut copied = Vec::new();
    let walker = WalkDir::new(static_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            let skipped = e.depth() == 1 && skip.iter().any(|s| *s == name);
            !name.starts_with('.') && !skipped
        });

    for entry in walker {
        let entry = entry.map_err(|e| AssetError::Read {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| static_dir.to_path_buf()),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(static_dir)
            .unwrap_or(entry.path());
        let target = dest.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|source| AssetError::Copy {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::copy(entry.path(), &target).map_err(|source| AssetError::Copy {
            path: target.clone(),
            source,
        })?;
        debug!("Copied {}", relative.display());
        copied.push(target);
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct Upper;

    impl StyleCompiler for Upper {
        fn compile(&self, path: &Path) -> Result<String, AssetError> {
            fs::read_to_string(path)
                .map(|s| s.to_uppercase())
                .map_err(|source| AssetError::Read {
                    path: path.to_path_buf(),
                    source,
                })
        }
    }

    #[test]
    fn test_compile_skips_partials() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.scss"), "body{}").unwrap();
        fs::write(dir.path().join("_vars.scss"), "$x: 1;").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let sheets = compile_stylesheets(dir.path(), &Upper).unwrap();
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].out_path, PathBuf::from("css/main.css"));
        assert_eq!(sheets[0].css, "BODY{}");
    }

    #[test]
    fn test_sass_compiler() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("_colors.scss"), "$accent: #ff0000;").unwrap();
        fs::write(
            dir.path().join("site.scss"),
            "@import 'colors';\na { color: $accent; span { margin: 0; } }",
        )
        .unwrap();

        let sheets = compile_stylesheets(dir.path(), &SassCompiler).unwrap();
        let css = sheets[0].css.trim();
        assert!(css.starts_with("a{color:"));
        assert!(css.ends_with("a span{margin:0}"));
        assert!(!css.contains('\n'));
    }

    #[test]
    fn test_sass_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.scss"), "a { color: ").unwrap();

        let err = compile_stylesheets(dir.path(), &SassCompiler).unwrap_err();
        assert!(matches!(err, AssetError::Stylesheet { path, .. } if path.ends_with("bad.scss")));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_sass_dir_is_an_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let sass = dir.path().join("sass");
        fs::create_dir(&sass).unwrap();
        fs::write(sass.join("main.scss"), "").unwrap();
        fs::set_permissions(&sass, fs::Permissions::from_mode(0o000)).unwrap();

        // Permission bits do not apply to root
        let readable = fs::read_dir(&sass).is_ok();
        let result = compile_stylesheets(&sass, &Upper);
        fs::set_permissions(&sass, fs::Permissions::from_mode(0o755)).unwrap();
        if readable {
            return;
        }

        assert!(matches!(result, Err(AssetError::Read { path, .. }) if path == sass));
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(compile_stylesheets(&dir.path().join("sass"), &Upper).unwrap().is_empty());
        assert!(copy_static(&dir.path().join("static"), dir.path(), &[]).unwrap().is_empty());
    }

    #[test]
    fn test_copy_static() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("img")).unwrap();
        fs::create_dir_all(src.path().join("sass")).unwrap();
        fs::write(src.path().join("img/logo.svg"), "<svg/>").unwrap();
        fs::write(src.path().join("sass/main.scss"), "").unwrap();
        fs::write(src.path().join(".DS_Store"), "").unwrap();

        let copied = copy_static(src.path(), out.path(), &["sass"]).unwrap();
        assert_eq!(copied, vec![out.path().join("img/logo.svg")]);
        assert_eq!(fs::read_to_string(out.path().join("img/logo.svg")).unwrap(), "<svg/>");
    }
}
