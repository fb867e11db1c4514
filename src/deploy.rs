//! # Deploy Workflow
//!
//! Releasing a repository is a strictly ordered sequence of stages. Each
//! stage is a hard gate: the first failure stops the workflow, and nothing
//! is written to the repository until every check has passed and the
//! operator has chosen the new version.
//!
//! ```text
//!  1 LoadManifest            manifest.yaml exists and declares a version
//!  2 FetchRepository         git fetch --tags origin
//!  3 CheckRepositoryState    on the deploy branch, clean, up to date
//!  4 CheckUnreleasedWork     branch tip is past the last tag
//!  5 CheckTagMatchesManifest last tag == manifest version
//!  6 CheckDependencies       every dependency clean and released
//!  7 AskVersion              operator picks the next version
//!  8 ValidateVersion         one of the three successors, major confirmed
//!  9 UpdateManifest          version + pinned dependency tags
//! 10 UpdatePackages          <version> of every top-level package.xml
//! 11 Publish                 commit, tag, push
//! 12 Build                   dev then prod image of every component
//! 13 Push                    dev images, prod images with their own recipe
//! ```
//!
//! With `skip_repo_steps`, stages 2 to 11 are skipped and the images are
//! built from the current manifest version without touching git.
//!
//! Image failures in stages 12 and 13 are collected per component: the
//! remaining components are still processed and the run ends with
//! [`Error::ImageOperationsFailed`]. A published release is never rolled
//! back.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;

use log::{debug, error, info, warn};

use crate::component::{descriptor_path, BuildType, ComponentDescriptor, Resolver};
use crate::config::Environment;
use crate::defaults::COMPONENTS_DIR;
use crate::dependencies::{component_dirs, resolve_dependencies};
use crate::docker::{image_metadata, BuildOrchestrator};
use crate::error::{Error, Result};
use crate::git::{RepositoryHandle, RepositoryProvider};
use crate::manifest::ManifestFile;
use crate::package::{plan_package_versions, write_package_files};
use crate::version::{package_version, parse_version, validate_next_version, ReleaseVersion};

/// Asks the operator for decisions - allows scripting in tests
pub trait Prompter {
    /// The version to release after `last`. `suggestions` are the valid
    /// successors, in the order they should be offered.
    fn ask_version(&self, last: &ReleaseVersion, suggestions: &[ReleaseVersion]) -> Result<String>;

    /// Confirms a major version bump from `last` to `next`.
    fn confirm_major_bump(&self, last: &ReleaseVersion, next: &ReleaseVersion) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOptions {
    pub deploy_branch: String,
    /// Platform the images are built for.
    pub platform: String,
    pub skip_repo_steps: bool,
}

/// The stages of a deploy, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeployStage {
    LoadManifest,
    FetchRepository,
    CheckRepositoryState,
    CheckUnreleasedWork,
    CheckTagMatchesManifest,
    CheckDependencies,
    AskVersion,
    ValidateVersion,
    UpdateManifest,
    UpdatePackages,
    Publish,
    Build,
    Push,
    Done,
}

impl DeployStage {
    /// Whether the stage touches or queries git, and is skipped by
    /// `skip_repo_steps`.
    pub fn is_repo_step(self) -> bool {
        self >= DeployStage::FetchRepository && self <= DeployStage::Publish
    }
}

impl fmt::Display for DeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeployStage::LoadManifest => "load manifest",
            DeployStage::FetchRepository => "fetch repository",
            DeployStage::CheckRepositoryState => "check repository state",
            DeployStage::CheckUnreleasedWork => "check unreleased work",
            DeployStage::CheckTagMatchesManifest => "check tag matches manifest",
            DeployStage::CheckDependencies => "check dependencies",
            DeployStage::AskVersion => "ask version",
            DeployStage::ValidateVersion => "validate version",
            DeployStage::UpdateManifest => "update manifest",
            DeployStage::UpdatePackages => "update packages",
            DeployStage::Publish => "publish",
            DeployStage::Build => "build images",
            DeployStage::Push => "push images",
            DeployStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// What a deploy did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployReport {
    pub repository: String,
    /// The released version, or the current one with `skip_repo_steps`.
    pub version: String,
    /// Dependency repository to the tag it was released against.
    pub dependencies: BTreeMap<String, String>,
    /// Images built, dev and prod.
    pub built: Vec<String>,
    /// Registry references pushed.
    pub pushed: Vec<String>,
    /// Components without a recipe for the platform.
    pub skipped: Vec<String>,
    /// Components with a failed build or push.
    pub failed: Vec<String>,
}

impl DeployReport {
    fn record_failure(&mut self, component: &str, err: &Error) {
        error!("Component '{}' failed: {}", component, err);
        println!("❌ {}: {}", component, err);
        if !self.failed.iter().any(|c| c == component) {
            self.failed.push(component.to_string());
        }
    }
}

/// The deploy state machine for one repository.
pub struct DeployWorkflow<'a> {
    repo: &'a dyn RepositoryHandle,
    provider: &'a dyn RepositoryProvider,
    prompter: &'a dyn Prompter,
    orchestrator: &'a BuildOrchestrator<'a>,
    resolver: Resolver,
    options: DeployOptions,
    stage: DeployStage,
}

impl<'a> DeployWorkflow<'a> {
    pub fn new(
        env: &Environment,
        repo: &'a dyn RepositoryHandle,
        provider: &'a dyn RepositoryProvider,
        prompter: &'a dyn Prompter,
        orchestrator: &'a BuildOrchestrator<'a>,
        options: DeployOptions,
    ) -> Self {
        Self {
            resolver: Resolver::new(env, &options.platform),
            repo,
            provider,
            prompter,
            orchestrator,
            options,
            stage: DeployStage::LoadManifest,
        }
    }

    /// The stage the workflow is in, or failed in.
    pub fn stage(&self) -> DeployStage {
        self.stage
    }

    fn enter(&mut self, stage: DeployStage) {
        debug!("Deploy stage: {}", stage);
        self.stage = stage;
    }

    fn branch(&self) -> &str {
        &self.options.deploy_branch
    }

    /// Runs every stage in order.
    pub fn run(&mut self) -> Result<DeployReport> {
        self.enter(DeployStage::LoadManifest);
        let mut manifest = ManifestFile::load(self.repo.path())?;
        let current = manifest.release_version()?;

        let mut report = DeployReport {
            repository: self.repo.name().to_string(),
            version: current.to_string(),
            ..DeployReport::default()
        };

        if self.options.skip_repo_steps {
            println!("⏭  Skipping repository steps, building version {}", current);
        } else {
            let (version, dependencies) = self.release(&mut manifest)?;
            report.version = version.to_string();
            report.dependencies = dependencies;
        }

        self.build_and_push(&manifest, &mut report)?;

        self.enter(DeployStage::Done);
        if !report.failed.is_empty() {
            return Err(Error::ImageOperationsFailed {
                components: report.failed.clone(),
            });
        }
        println!("✅ Deployed '{}' version {}", report.repository, report.version);
        Ok(report)
    }

    /// Stages 2 to 11.
    fn release(&mut self, manifest: &mut ManifestFile) -> Result<(ReleaseVersion, BTreeMap<String, String>)> {
        let repo = self.repo;
        let branch = self.branch().to_string();

        self.enter(DeployStage::FetchRepository);
        println!("🔍 Checking repository '{}'", repo.name());
        repo.fetch()?;

        self.enter(DeployStage::CheckRepositoryState);
        repo.assert_on_deploy_branch(&branch)?;
        repo.assert_no_local_changes()?;
        repo.assert_branch_up_to_date(&branch)?;

        self.enter(DeployStage::CheckUnreleasedWork);
        repo.assert_not_pointing_at_tag(&branch)?;

        self.enter(DeployStage::CheckTagMatchesManifest);
        let last_tag = repo.last_tag(&branch)?;
        let manifest_version = manifest.version()?.to_string();
        if last_tag.name != manifest_version {
            return Err(Error::TagManifestMismatch {
                repo: repo.name().to_string(),
                manifest: manifest_version,
                tag: last_tag.name,
            });
        }
        let last = parse_version(&last_tag.name)?;

        self.enter(DeployStage::CheckDependencies);
        let dependencies = self.check_dependencies()?;

        self.enter(DeployStage::AskVersion);
        let candidate = self.prompter.ask_version(&last, &last.successors())?;

        self.enter(DeployStage::ValidateVersion);
        let next = validate_next_version(&last, candidate.trim())?;
        if last.is_major_bump_to(&next) && !self.prompter.confirm_major_bump(&last, &next)? {
            return Err(Error::DeployAborted {
                reason: format!("major version bump from {} to {} declined", last, next),
            });
        }

        // Nothing is written until the manifest and every package file have
        // been rewritten in memory.
        self.enter(DeployStage::UpdateManifest);
        let mut released = manifest.clone();
        released.set_release(&next, dependencies.clone());
        let manifest_content = released.render()?;

        self.enter(DeployStage::UpdatePackages);
        let pkg_version = package_version(&next.to_string());
        let packages = plan_package_versions(repo.path(), &pkg_version)?;

        println!("📝 Updating manifest to version {}", next);
        fs::write(&released.path, manifest_content)?;
        write_package_files(&packages)?;
        if !packages.is_empty() {
            println!("📦 Set version {} in {} package file(s)", pkg_version, packages.len());
        }
        *manifest = released;

        self.enter(DeployStage::Publish);
        let name = next.to_string();
        repo.create_commit(&name)?;
        repo.create_tag(&name)?;
        repo.push(&branch)?;

        Ok((next, dependencies))
    }

    /// Opens every dependency and records the tag it is released at.
    fn check_dependencies(&self) -> Result<BTreeMap<String, String>> {
        let branch = self.branch();
        let names = resolve_dependencies(self.repo.path(), self.repo.name())?;
        let mut versions = BTreeMap::new();

        for name in names {
            println!("🔗 Checking dependency '{}'", name);
            let dependency = self.provider.open(&name)?;
            dependency.fetch()?;
            dependency.assert_no_local_changes()?;
            dependency.assert_pointing_at_tag(branch)?;
            let tag = dependency.last_tag(branch)?;
            debug!("Dependency '{}' released at {}", name, tag.name);
            versions.insert(name, tag.name);
        }
        Ok(versions)
    }

    /// Components of the repository that can be built for the platform.
    fn buildable_components(&self, report: &mut DeployReport) -> Result<Vec<ComponentDescriptor>> {
        let repo_path = self.repo.path();
        let mut descriptors = Vec::new();

        for name in component_dirs(repo_path)? {
            let folder = repo_path.join(COMPONENTS_DIR).join(&name);
            if !descriptor_path(&folder, &name).is_file() {
                debug!("Skipping '{}': no component descriptor", folder.display());
                continue;
            }
            let full_name = format!("{}/{}", self.repo.name(), name);
            match self.resolver.resolve_in_repo(repo_path, &name) {
                Ok(descriptor) => descriptors.push(descriptor),
                Err(err @ Error::UnsupportedPlatform { .. }) => {
                    warn!("Skipping component: {}", err);
                    println!("⚠️  Skipping '{}': no recipe for '{}'", full_name, self.resolver.platform());
                    report.skipped.push(full_name);
                }
                Err(err) => report.record_failure(&full_name, &err),
            }
        }
        Ok(descriptors)
    }

    /// Stages 12 and 13.
    fn build_and_push(&mut self, manifest: &ManifestFile, report: &mut DeployReport) -> Result<()> {
        self.enter(DeployStage::Build);
        let manifest_json = manifest.to_json()?;
        let mut built = Vec::new();

        for descriptor in self.buildable_components(report)? {
            let full_name = descriptor.full_name();
            match self.build_component(&descriptor, &manifest_json) {
                Ok(images) => {
                    report.built.extend(images);
                    built.push(descriptor);
                }
                Err(err) => report.record_failure(&full_name, &err),
            }
        }

        self.enter(DeployStage::Push);
        for descriptor in &built {
            let full_name = descriptor.full_name();
            let mut variants = vec![BuildType::Dev];
            if descriptor.has_prod_recipe() {
                variants.push(BuildType::Prod);
            }
            for build_type in variants {
                match self.orchestrator.push_image(descriptor, build_type) {
                    Ok(pushed) => report.pushed.push(pushed),
                    Err(err) => {
                        report.record_failure(&full_name, &err);
                        break;
                    }
                }
            }
        }

        info!(
            "Built {} image(s), pushed {}, skipped {} component(s)",
            report.built.len(),
            report.pushed.len(),
            report.skipped.len()
        );
        Ok(())
    }

    fn build_component(&self, descriptor: &ComponentDescriptor, manifest_json: &str) -> Result<Vec<String>> {
        let dev = self.orchestrator.build_image(descriptor, BuildType::Dev, &[])?;
        let metadata = image_metadata(manifest_json, descriptor)?;
        let prod = self.orchestrator.build_image(descriptor, BuildType::Prod, &metadata)?;
        Ok(vec![dev, prod])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::fixtures::{write_component, write_manifest};
    use crate::config::Settings;
    use crate::defaults::PACKAGE_FILENAME;
    use crate::docker::testing::RecordingEngine;
    use crate::git::Tag;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;
    use tempfile::TempDir;

    type Log = Rc<RefCell<Vec<String>>>;

    #[derive(Clone)]
    struct MockRepo {
        name: String,
        path: PathBuf,
        dirty: bool,
        tip: String,
        tags: Vec<Tag>,
        log: Log,
    }

    impl MockRepo {
        fn new(name: &str, path: &Path, tip: &str, tags: &[(&str, &str)], log: &Log) -> Self {
            Self {
                name: name.to_string(),
                path: path.to_path_buf(),
                dirty: false,
                tip: tip.to_string(),
                tags: tags
                    .iter()
                    .enumerate()
                    .map(|(i, (name, commit))| Tag {
                        name: name.to_string(),
                        commit: commit.to_string(),
                        timestamp: i as i64,
                    })
                    .collect(),
                log: log.clone(),
            }
        }

        fn record(&self, event: &str) {
            self.log.borrow_mut().push(format!("{} {}", self.name, event));
        }
    }

    impl RepositoryHandle for MockRepo {
        fn name(&self) -> &str {
            &self.name
        }
        fn remote_url(&self) -> &str {
            "git@example.com:repo.git"
        }
        fn path(&self) -> &Path {
            &self.path
        }
        fn fetch(&self) -> Result<()> {
            self.record("fetch");
            Ok(())
        }
        fn current_branch(&self) -> Result<Option<String>> {
            Ok(Some("main".to_string()))
        }
        fn has_local_changes(&self) -> Result<bool> {
            Ok(self.dirty)
        }
        fn branch_tip(&self, _branch: &str) -> Result<String> {
            Ok(self.tip.clone())
        }
        fn remote_branch_tip(&self, _branch: &str) -> Result<Option<String>> {
            Ok(Some(self.tip.clone()))
        }
        fn all_tags(&self) -> Result<Vec<String>> {
            Ok(self.tags.iter().map(|t| t.name.clone()).collect())
        }
        fn tags_merged_into(&self, _branch: &str) -> Result<Vec<Tag>> {
            Ok(self.tags.clone())
        }
        fn create_commit(&self, message: &str) -> Result<()> {
            self.record(&format!("commit {}", message));
            Ok(())
        }
        fn create_tag(&self, name: &str) -> Result<()> {
            self.record(&format!("tag {}", name));
            Ok(())
        }
        fn push(&self, branch: &str) -> Result<()> {
            self.record(&format!("push {}", branch));
            Ok(())
        }
    }

    struct MockProvider {
        repos: HashMap<String, MockRepo>,
    }

    impl RepositoryProvider for MockProvider {
        fn open(&self, name: &str) -> Result<Box<dyn RepositoryHandle>> {
            self.repos
                .get(name)
                .cloned()
                .map(|r| Box::new(r) as Box<dyn RepositoryHandle>)
                .ok_or_else(|| Error::RepositoryNotFound {
                    repo: name.to_string(),
                    message: "not in src".to_string(),
                })
        }
    }

    struct ScriptedPrompter {
        version: String,
        confirm: bool,
        log: Log,
    }

    impl Prompter for ScriptedPrompter {
        fn ask_version(&self, last: &ReleaseVersion, suggestions: &[ReleaseVersion]) -> Result<String> {
            self.log.borrow_mut().push(format!("ask after {}", last));
            assert_eq!(suggestions, last.successors());
            Ok(self.version.clone())
        }

        fn confirm_major_bump(&self, last: &ReleaseVersion, next: &ReleaseVersion) -> Result<bool> {
            self.log.borrow_mut().push(format!("confirm {} -> {}", last, next));
            Ok(self.confirm)
        }
    }

    /// An environment with repository `nav` (planner needs `common_msgs`,
    /// mapper has no jetson recipe) and its dependency `common_msgs`.
    struct Fixture {
        _temp: TempDir,
        env: Environment,
        log: Log,
        nav: MockRepo,
        provider: MockProvider,
    }

    impl Fixture {
        fn new(manifest_version: &str) -> Self {
            let temp = TempDir::new().unwrap();
            let env = Environment {
                root: temp.path().to_path_buf(),
                settings: Settings::default(),
            };
            let log: Log = Rc::new(RefCell::new(Vec::new()));

            let nav_path = temp.path().join("src").join("nav");
            write_manifest(&nav_path, manifest_version);
            write_component(&nav_path, "planner", "src: [nav, common_msgs]\n", &["x86_64", "jetsonorinagx"]);
            write_component(&nav_path, "mapper", "", &["x86_64"]);
            fs::write(
                nav_path.join("components/planner/dockerfiles/prod.dockerfile"),
                "ARG FROM\nFROM ${FROM}\n",
            )
            .unwrap();
            fs::create_dir_all(nav_path.join("planner_core")).unwrap();
            fs::write(
                nav_path.join("planner_core").join(PACKAGE_FILENAME),
                "<?xml version=\"1.0\"?>\n<package>\n  <version>1.1.0</version>\n</package>\n",
            )
            .unwrap();

            let nav = MockRepo::new("nav", &nav_path, "c3", &[("1.0", "c1"), ("1.1", "c2")], &log);
            let msgs_path = temp.path().join("src").join("common_msgs");
            let msgs = MockRepo::new("common_msgs", &msgs_path, "m2", &[("2.0", "m1"), ("2.1", "m2")], &log);

            let mut repos = HashMap::new();
            repos.insert("common_msgs".to_string(), msgs);

            Self {
                _temp: temp,
                env,
                log,
                nav,
                provider: MockProvider { repos },
            }
        }

        fn prompter(&self, version: &str, confirm: bool) -> ScriptedPrompter {
            ScriptedPrompter {
                version: version.to_string(),
                confirm,
                log: self.log.clone(),
            }
        }

        fn options(skip_repo_steps: bool, platform: &str) -> DeployOptions {
            DeployOptions {
                deploy_branch: "main".to_string(),
                platform: platform.to_string(),
                skip_repo_steps,
            }
        }

        fn run(
            &self,
            prompter: &ScriptedPrompter,
            engine: &RecordingEngine,
            options: DeployOptions,
        ) -> (Result<DeployReport>, DeployStage) {
            let orchestrator = BuildOrchestrator::new(engine, "reg:5000");
            let mut workflow =
                DeployWorkflow::new(&self.env, &self.nav, &self.provider, prompter, &orchestrator, options);
            let result = workflow.run();
            (result, workflow.stage())
        }

        fn events(&self) -> Vec<String> {
            self.log.borrow().clone()
        }

        fn manifest(&self) -> ManifestFile {
            ManifestFile::load(&self.nav.path).unwrap()
        }
    }

    #[test]
    fn test_full_deploy() {
        let fixture = Fixture::new("1.1");
        let engine = RecordingEngine::default();
        let prompter = fixture.prompter("1.2", true);

        let (result, stage) = fixture.run(&prompter, &engine, Fixture::options(false, "x86_64"));
        let report = result.unwrap();
        assert_eq!(stage, DeployStage::Done);

        assert_eq!(report.version, "1.2");
        assert_eq!(report.dependencies.get("common_msgs").map(String::as_str), Some("2.1"));
        assert_eq!(
            fixture.events(),
            vec![
                "nav fetch",
                "common_msgs fetch",
                "ask after 1.1",
                "nav commit 1.2",
                "nav tag 1.2",
                "nav push main",
            ]
        );

        let manifest = fixture.manifest();
        assert_eq!(manifest.version().unwrap(), "1.2");
        assert_eq!(
            manifest.manifest.dependencies.get("common_msgs").map(String::as_str),
            Some("2.1")
        );
        let package = fs::read_to_string(fixture.nav.path.join("planner_core").join(PACKAGE_FILENAME)).unwrap();
        assert_eq!(package, "<package>\n  <version>1.2.0</version>\n</package>\n");

        assert_eq!(
            report.built,
            vec![
                "robotdev/nav.mapper:x86_64.1.2.dev",
                "robotdev/nav.mapper:x86_64.1.2",
                "robotdev/nav.planner:x86_64.1.2.dev",
                "robotdev/nav.planner:x86_64.1.2",
            ]
        );
        // Only planner has its own production recipe.
        assert_eq!(
            report.pushed,
            vec![
                "reg:5000/robotdev/nav.mapper:x86_64.1.2.dev",
                "reg:5000/robotdev/nav.planner:x86_64.1.2.dev",
                "reg:5000/robotdev/nav.planner:x86_64.1.2",
            ]
        );

        let builds = engine.builds.borrow();
        let prod = &builds[3];
        let keys: Vec<&str> = prod.build_args.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["REGISTRY", "SRC", "ROS_PKGS", "REPO_MANIFEST", "COMPONENT_DESCRIPTOR", "FROM"]
        );
        assert!(prod.build_args[3].1.contains("\"version\":\"1.2\""));
        assert_eq!(prod.context, fixture.env.src_dir());
        assert_eq!(builds[2].context, fixture.nav.path.join("components").join("planner"));
    }

    #[test]
    fn test_manifest_tag_mismatch_aborts_before_dependencies() {
        let fixture = Fixture::new("2.0");
        let engine = RecordingEngine::default();
        let prompter = fixture.prompter("2.1", true);

        let (result, stage) = fixture.run(&prompter, &engine, Fixture::options(false, "x86_64"));
        match result {
            Err(Error::TagManifestMismatch { manifest, tag, .. }) => {
                assert_eq!(manifest, "2.0");
                assert_eq!(tag, "1.1");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(stage, DeployStage::CheckTagMatchesManifest);
        assert_eq!(fixture.events(), vec!["nav fetch"]);
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_dirty_dependency_aborts_before_prompt() {
        let mut fixture = Fixture::new("1.1");
        fixture.provider.repos.get_mut("common_msgs").unwrap().dirty = true;
        let engine = RecordingEngine::default();
        let prompter = fixture.prompter("1.2", true);

        let (result, stage) = fixture.run(&prompter, &engine, Fixture::options(false, "x86_64"));
        assert!(matches!(result, Err(Error::UncommittedChanges { ref repo }) if repo == "common_msgs"));
        assert_eq!(stage, DeployStage::CheckDependencies);
        assert_eq!(fixture.events(), vec!["nav fetch", "common_msgs fetch"]);
        assert_eq!(fixture.manifest().version().unwrap(), "1.1");
    }

    #[test]
    fn test_unreleased_dependency_aborts() {
        let mut fixture = Fixture::new("1.1");
        fixture.provider.repos.get_mut("common_msgs").unwrap().tip = "m3".to_string();
        let engine = RecordingEngine::default();
        let prompter = fixture.prompter("1.2", true);

        let (result, _) = fixture.run(&prompter, &engine, Fixture::options(false, "x86_64"));
        assert!(matches!(result, Err(Error::NotPointingAtTag { .. })));
    }

    #[test]
    fn test_missing_dependency_repository() {
        let mut fixture = Fixture::new("1.1");
        fixture.provider.repos.clear();
        let engine = RecordingEngine::default();
        let prompter = fixture.prompter("1.2", true);

        let (result, _) = fixture.run(&prompter, &engine, Fixture::options(false, "x86_64"));
        assert!(matches!(result, Err(Error::RepositoryNotFound { .. })));
    }

    #[test]
    fn test_main_repository_already_released() {
        let mut fixture = Fixture::new("1.1");
        fixture.nav.tip = "c2".to_string();
        let engine = RecordingEngine::default();
        let prompter = fixture.prompter("1.2", true);

        let (result, stage) = fixture.run(&prompter, &engine, Fixture::options(false, "x86_64"));
        assert!(matches!(result, Err(Error::PointingAtTag { .. })));
        assert_eq!(stage, DeployStage::CheckUnreleasedWork);
    }

    #[test]
    fn test_declined_major_bump_aborts_without_changes() {
        let fixture = Fixture::new("1.1");
        let engine = RecordingEngine::default();
        let prompter = fixture.prompter("2.0.beta", false);

        let (result, stage) = fixture.run(&prompter, &engine, Fixture::options(false, "x86_64"));
        assert!(matches!(result, Err(Error::DeployAborted { .. })));
        assert_eq!(stage, DeployStage::ValidateVersion);
        assert_eq!(
            fixture.events(),
            vec!["nav fetch", "common_msgs fetch", "ask after 1.1", "confirm 1.1 -> 2.0.beta"]
        );
        assert_eq!(fixture.manifest().version().unwrap(), "1.1");
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_package_without_version_leaves_tree_untouched() {
        let fixture = Fixture::new("1.1");
        let planner_core = fixture.nav.path.join("planner_core").join(PACKAGE_FILENAME);
        let original = fs::read_to_string(&planner_core).unwrap();
        fs::create_dir_all(fixture.nav.path.join("zz_pkg")).unwrap();
        fs::write(fixture.nav.path.join("zz_pkg").join(PACKAGE_FILENAME), "<package/>").unwrap();
        let engine = RecordingEngine::default();
        let prompter = fixture.prompter("1.2", true);

        let (result, stage) = fixture.run(&prompter, &engine, Fixture::options(false, "x86_64"));
        match result {
            Err(Error::PackageVersionMissing { path }) => assert!(path.ends_with("zz_pkg/package.xml")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(stage, DeployStage::UpdatePackages);
        assert_eq!(fixture.manifest().version().unwrap(), "1.1");
        assert_eq!(fs::read_to_string(&planner_core).unwrap(), original);
        assert!(!fixture.events().iter().any(|e| e.starts_with("nav commit")));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_confirmed_major_bump_releases() {
        let fixture = Fixture::new("1.1");
        let engine = RecordingEngine::default();
        let prompter = fixture.prompter("2.0.beta", true);

        let (result, _) = fixture.run(&prompter, &engine, Fixture::options(false, "x86_64"));
        assert_eq!(result.unwrap().version, "2.0.beta");
        assert!(fixture.events().contains(&"nav tag 2.0.beta".to_string()));
        let package = fs::read_to_string(fixture.nav.path.join("planner_core").join(PACKAGE_FILENAME)).unwrap();
        assert!(package.contains("<version>2.0.0</version>"));
    }

    #[test]
    fn test_invalid_and_out_of_order_versions() {
        for (candidate, invalid) in [("1.x", true), ("1.5", false), ("1.1", false)] {
            let fixture = Fixture::new("1.1");
            let engine = RecordingEngine::default();
            let prompter = fixture.prompter(candidate, true);
            let (result, _) = fixture.run(&prompter, &engine, Fixture::options(false, "x86_64"));
            if invalid {
                assert!(matches!(result, Err(Error::InvalidVersion { .. })), "{}", candidate);
            } else {
                assert!(matches!(result, Err(Error::VersionOrder { .. })), "{}", candidate);
            }
            assert!(!fixture.events().iter().any(|e| e.contains("commit")));
        }
    }

    #[test]
    fn test_skip_repo_steps_builds_current_version_without_git() {
        let fixture = Fixture::new("1.1");
        let engine = RecordingEngine::default();
        let prompter = fixture.prompter("1.2", true);

        let (result, _) = fixture.run(&prompter, &engine, Fixture::options(true, "x86_64"));
        let report = result.unwrap();
        assert_eq!(report.version, "1.1");
        assert!(report.dependencies.is_empty());
        assert!(fixture.events().is_empty());
        assert_eq!(fixture.manifest().version().unwrap(), "1.1");
        assert_eq!(report.built.len(), 4);
        assert!(report.built.contains(&"robotdev/nav.planner:x86_64.1.1.dev".to_string()));
    }

    #[test]
    fn test_unsupported_platform_components_are_skipped() {
        let fixture = Fixture::new("1.1");
        let engine = RecordingEngine::default();
        let prompter = fixture.prompter("1.2", true);

        let (result, _) = fixture.run(&prompter, &engine, Fixture::options(true, "jetsonorinagx"));
        let report = result.unwrap();
        assert_eq!(report.skipped, vec!["nav/mapper"]);
        assert_eq!(
            report.built,
            vec![
                "robotdev/nav.planner:jetsonorinagx.1.1.dev",
                "robotdev/nav.planner:jetsonorinagx.1.1",
            ]
        );
    }

    #[test]
    fn test_build_failure_continues_with_other_components() {
        let fixture = Fixture::new("1.1");
        let engine = RecordingEngine::failing_for(&["nav.mapper:x86_64.1.1.dev"]);
        let prompter = fixture.prompter("1.2", true);

        let (result, stage) = fixture.run(&prompter, &engine, Fixture::options(true, "x86_64"));
        match result {
            Err(Error::ImageOperationsFailed { components }) => {
                assert_eq!(components, vec!["nav/mapper"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(stage, DeployStage::Done);
        let calls = engine.calls();
        assert!(calls.contains(&"build robotdev/nav.planner:x86_64.1.1".to_string()));
        assert!(calls.contains(&"push reg:5000/robotdev/nav.planner:x86_64.1.1.dev".to_string()));
        assert!(!calls.iter().any(|c| c.starts_with("push") && c.contains("mapper")));
    }

    #[test]
    fn test_stage_order_and_repo_steps() {
        assert!(DeployStage::LoadManifest < DeployStage::FetchRepository);
        assert!(!DeployStage::LoadManifest.is_repo_step());
        assert!(DeployStage::FetchRepository.is_repo_step());
        assert!(DeployStage::Publish.is_repo_step());
        assert!(!DeployStage::Build.is_repo_step());
    }
}
