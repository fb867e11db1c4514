//! Dependency discovery for a repository.
//!
//! A repository depends on every repository that one of its components
//! mounts through the descriptor's `src` list. The repository itself is
//! never part of its own dependency set.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use log::debug;

use crate::component::{descriptor_path, ComponentSpec};
use crate::defaults::COMPONENTS_DIR;
use crate::error::Result;

/// Component directory names under `<repo_path>/components`, sorted.
///
/// A repository without a `components` directory has no components.
pub fn component_dirs(repo_path: &Path) -> Result<Vec<String>> {
    let components = repo_path.join(COMPONENTS_DIR);
    if !components.is_dir() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(&components)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Union of the `src` lists of every component of the repository, minus
/// `repo_name`.
pub fn resolve_dependencies(repo_path: &Path, repo_name: &str) -> Result<BTreeSet<String>> {
    let mut dependencies = BTreeSet::new();

    for name in component_dirs(repo_path)? {
        let folder = repo_path.join(COMPONENTS_DIR).join(&name);
        if !descriptor_path(&folder, &name).is_file() {
            debug!("Skipping '{}': no component descriptor", folder.display());
            continue;
        }
        let spec = ComponentSpec::load(&folder, &name)?;
        dependencies.extend(spec.src);
    }

    dependencies.remove(repo_name);
    Ok(dependencies)
}
