//! Package metadata (`package.xml`) discovery and version rewriting.
//!
//! Only the top-level directories of a repository are searched. The
//! `components` tree and the `.git` directory never hold package metadata.
//! The rewrite is a text substitution on the first `<version>` element that
//! is not inside a comment, so indentation, attribute order and comments
//! survive untouched. The XML declaration is dropped.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use regex::Regex;

use crate::defaults::{COMPONENTS_DIR, PACKAGE_FILENAME};
use crate::error::{Error, Result};

/// A comment, or a `<version>` element with its open and close tags captured.
fn version_element() -> Result<Regex> {
    Ok(Regex::new(
        r"(?s)<!--.*?-->|(<version(?:\s[^>]*)?>)\s*[^<]*?\s*(</version>)",
    )?)
}

fn xml_declaration() -> Result<Regex> {
    Ok(Regex::new(r"^\s*<\?xml\s[^>]*\?>[ \t]*\r?\n?")?)
}

/// A package file and the content it will be written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRewrite {
    pub path: PathBuf,
    pub content: String,
}

/// Every `<dir>/package.xml` directly below `repo_path`, sorted.
pub fn find_package_files(repo_path: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(repo_path)? {
        let entry = entry?;
        let name = entry.file_name();
        if name == ".git" || name == COMPONENTS_DIR || !entry.file_type()?.is_dir() {
            continue;
        }
        let candidate = entry.path().join(PACKAGE_FILENAME);
        if candidate.is_file() {
            files.push(candidate);
        }
    }
    files.sort();
    Ok(files)
}

/// Replaces the value of the first `<version>` element outside comments.
///
/// Returns `None` when there is no such element.
pub fn rewrite_version(content: &str, version: &str) -> Result<Option<String>> {
    let re = version_element()?;
    let Some(caps) = re.captures_iter(content).find(|caps| caps.get(1).is_some()) else {
        return Ok(None);
    };
    let (Some(element), Some(open), Some(close)) = (caps.get(0), caps.get(1), caps.get(2)) else {
        return Ok(None);
    };
    let replaced = format!(
        "{}{}{}{}{}",
        &content[..element.start()],
        open.as_str(),
        version,
        close.as_str(),
        &content[element.end()..]
    );
    Ok(Some(xml_declaration()?.replace(&replaced, "").into_owned()))
}

/// The new content of one package file.
pub fn plan_package_file(path: &Path, version: &str) -> Result<PackageRewrite> {
    let content = fs::read_to_string(path)?;
    let content = rewrite_version(&content, version)?.ok_or_else(|| Error::PackageVersionMissing {
        path: path.to_path_buf(),
    })?;
    Ok(PackageRewrite {
        path: path.to_path_buf(),
        content,
    })
}

/// Rewrites every top-level package file of the repository in memory.
///
/// Fails on the first file without a `<version>`, before anything is written.
pub fn plan_package_versions(repo_path: &Path, version: &str) -> Result<Vec<PackageRewrite>> {
    find_package_files(repo_path)?
        .iter()
        .map(|file| plan_package_file(file, version))
        .collect()
}

pub fn write_package_files(rewrites: &[PackageRewrite]) -> Result<()> {
    for rewrite in rewrites {
        info!("Writing '{}'", rewrite.path.display());
        fs::write(&rewrite.path, &rewrite.content)?;
    }
    Ok(())
}

/// Rewrites every top-level package file of the repository.
///
/// Returns the files that were updated. Either all files are written or,
/// when one has no `<version>`, none.
pub fn update_package_versions(repo_path: &Path, version: &str) -> Result<Vec<PathBuf>> {
    let rewrites = plan_package_versions(repo_path, version)?;
    write_package_files(&rewrites)?;
    Ok(rewrites.into_iter().map(|rewrite| rewrite.path).collect())
}
