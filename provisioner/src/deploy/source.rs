//! Application source deployment

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::record::SourceLocation;
use crate::errors::ProvisionError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::host::exec::{CommandRunner, CommandSpec};
use crate::storage::target::{
    DeploymentTarget, CREDENTIALS_FILE_NAME, REQUIREMENTS_FILE_NAME,
};

/// What a local deploy picks up from the working directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyPattern {
    /// Every top-level file with this extension
    Extension(&'static str),
    /// A single top-level file
    File(&'static str),
    /// A directory tree
    Tree(&'static str),
}

pub const LOCAL_PATTERNS: &[CopyPattern] = &[
    CopyPattern::Extension("py"),
    CopyPattern::File(REQUIREMENTS_FILE_NAME),
    CopyPattern::File(CREDENTIALS_FILE_NAME),
    CopyPattern::File(".env.example"),
    CopyPattern::Tree("tests"),
];

/// Untracked paths a remote re-sync keeps besides the venv: operator-supplied
/// credentials and the bot's own state
pub const PRESERVED_PATHS: &[&str] = &[CREDENTIALS_FILE_NAME, "data/", "logs/"];

pub struct SourceDeployer {
    target: DeploymentTarget,
    runner: Arc<dyn CommandRunner>,
    working_dir: PathBuf,
}

impl SourceDeployer {
    pub fn new(
        target: DeploymentTarget,
        runner: Arc<dyn CommandRunner>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            target,
            runner,
            working_dir: working_dir.into(),
        }
    }

    /// Checks that can fail before the host is touched.
    ///
    /// A local deploy without the entry file must abort before packages are
    /// installed.
    pub async fn preflight(&self, source: &SourceLocation) -> Result<(), ProvisionError> {
        if *source == SourceLocation::Local {
            let entry = File::new(self.working_dir.join(&self.target.entry_file));
            if !entry.exists().await {
                return Err(ProvisionError::PreconditionError(format!(
                    "{} not found in {}",
                    self.target.entry_file,
                    self.working_dir.display()
                )));
            }
            self.check_outside_install_root().await?;
        }
        Ok(())
    }

    /// A local deploy replaces the install root, so it cannot copy from it
    async fn check_outside_install_root(&self) -> Result<(), ProvisionError> {
        let working_dir = tokio::fs::canonicalize(&self.working_dir).await?;
        let install_root = match tokio::fs::canonicalize(&self.target.install_root).await {
            Ok(path) => path,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => self.target.install_root.clone(),
            Err(e) => return Err(e.into()),
        };
        if working_dir.starts_with(&install_root) {
            return Err(ProvisionError::PreconditionError(format!(
                "Run from a directory outside {}: a local deploy replaces it",
                install_root.display()
            )));
        }
        Ok(())
    }

    pub async fn deploy(&self, source: &SourceLocation) -> Result<(), ProvisionError> {
        match source {
            SourceLocation::Remote { url, branch } => self.sync_remote(url, branch).await?,
            SourceLocation::Local => self.copy_local().await?,
            SourceLocation::Installed => {
                debug!("Reusing installed source tree");
                return Ok(());
            }
        }

        if !self.target.entry_point().exists().await {
            return Err(ProvisionError::ProvisioningError(format!(
                "Deployed tree has no {}",
                self.target.entry_file
            )));
        }
        Ok(())
    }

    /// Bring the tree to the tip of `branch`, discarding local divergence
    async fn sync_remote(&self, url: &str, branch: &str) -> Result<(), ProvisionError> {
        let root = self.target.install_dir();

        if self.target.git_dir().exists().await {
            info!("Updating checkout in {} to origin/{}", root.path().display(), branch);
            self.git(&["remote", "set-url", "origin", url]).await?;
            // Clones are single-branch, so the tracking ref needs an explicit refspec
            let refspec = format!("+refs/heads/{0}:refs/remotes/origin/{0}", branch);
            self.git(&["fetch", "--prune", "origin", &refspec]).await?;
            self.git(&["checkout", "-B", branch, &format!("origin/{}", branch)])
                .await?;
            self.git(&["reset", "--hard", &format!("origin/{}", branch)])
                .await?;

            let venv = format!("{}/", self.target.venv_dir);
            let mut clean = vec!["clean", "-fdx", "-e", venv.as_str()];
            for path in PRESERVED_PATHS.iter().copied() {
                clean.push("-e");
                clean.push(path);
            }
            self.git(&clean).await?;
            return Ok(());
        }

        info!("Cloning {} ({}) into {}", url, branch, root.path().display());
        root.delete().await?;
        if let Some(parent) = root.path().parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let cmd = CommandSpec::new("git")
            .args(["clone", "--branch", branch, "--single-branch", url])
            .arg(root.path().to_string_lossy());
        self.runner.run(&cmd).await?;
        Ok(())
    }

    async fn git(&self, args: &[&str]) -> Result<(), ProvisionError> {
        let cmd = CommandSpec::new("git")
            .args(args.iter().copied())
            .current_dir(&self.target.install_root);
        self.runner.run(&cmd).await?;
        Ok(())
    }

    /// Replace the tree with the expected files from the working directory
    async fn copy_local(&self) -> Result<(), ProvisionError> {
        let source = Dir::new(&self.working_dir);
        let root = self.target.install_dir();
        info!(
            "Copying application files from {} to {}",
            source.path().display(),
            root.path().display()
        );

        // A previous remote checkout must not leak into a local deploy
        root.delete().await?;
        root.create().await?;

        for pattern in LOCAL_PATTERNS {
            let copied = copy_pattern(&source, root.path(), *pattern).await?;
            if copied == 0 {
                warn!("Nothing matched {:?}, skipping", pattern);
            }
        }
        Ok(())
    }
}

async fn copy_pattern(
    source: &Dir,
    dest: &Path,
    pattern: CopyPattern,
) -> Result<usize, ProvisionError> {
    match pattern {
        CopyPattern::Extension(ext) => {
            let mut copied = 0;
            for path in source.list_files().await? {
                if path.extension().and_then(|e| e.to_str()) == Some(ext) {
                    if let Some(name) = path.file_name() {
                        File::new(&path).copy_to(&dest.join(name)).await?;
                        copied += 1;
                    }
                }
            }
            Ok(copied)
        }
        CopyPattern::File(name) => {
            let file = source.file(name);
            if !file.exists().await {
                return Ok(0);
            }
            file.copy_to(&dest.join(name)).await?;
            Ok(1)
        }
        CopyPattern::Tree(name) => {
            let dir = source.subdir(name);
            if !dir.exists().await {
                return Ok(0);
            }
            dir.copy_into(&dest.join(name)).await?;
            Ok(1)
        }
    }
}
