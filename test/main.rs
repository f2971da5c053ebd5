// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::{bail, Result};
use git2::{Repository, RepositoryInitOptions};
use std::{
    fs::write,
    path::{Path, PathBuf},
    process::Command,
};
use tempfile::TempDir;

/// Bare remote plus any number of working copies cloned from it.
pub(crate) struct RepoFixture {
    root: TempDir,
    remote: Repository,
}

impl RepoFixture {
    /// Construct bare remote holding one initial commit on "main".
    pub(crate) fn new() -> Result<Self> {
        let root = TempDir::new()?;

        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        opts.bare(true);
        let remote = Repository::init_opts(root.path().join("remote.git"), &opts)?;

        let fixture = Self { root, remote };
        let seed = fixture.seed_copy()?;
        seed.commit_file("README.md", "shared schedule\n")?;
        git(seed.path(), &["push", "--set-upstream", "origin", "main"])?;

        Ok(fixture)
    }

    /// Clone remote into new working copy.
    pub(crate) fn working_copy(&self, name: &str) -> Result<WorkingCopy> {
        let path = self.root.path().join(name);
        let repo = Repository::clone(&self.remote_url(), &path)?;
        WorkingCopy::with_identity(path, repo)
    }

    /// Fresh working copy pointing at the still empty remote.
    fn seed_copy(&self) -> Result<WorkingCopy> {
        let path = self.root.path().join("seed");
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(&path, &opts)?;
        repo.remote("origin", &self.remote_url())?;
        WorkingCopy::with_identity(path, repo)
    }

    /// Message and canonical file contents of remote "main" tip.
    pub(crate) fn remote_tip(&self, filename: &str) -> Result<(String, Option<String>)> {
        let commit = self
            .remote
            .find_reference("refs/heads/main")?
            .peel_to_commit()?;
        let message = commit.message().unwrap_or_default().to_string();

        let contents = match commit.tree()?.get_name(filename) {
            Some(entry) => {
                let blob = self.remote.find_blob(entry.id())?;
                Some(String::from_utf8_lossy(blob.content()).into_owned())
            }
            None => None,
        };

        Ok((message, contents))
    }

    /// Number of commits reachable from remote "main".
    pub(crate) fn remote_depth(&self) -> Result<usize> {
        let mut walk = self.remote.revwalk()?;
        walk.push_ref("refs/heads/main")?;
        Ok(walk.count())
    }

    fn remote_url(&self) -> String {
        self.root.path().join("remote.git").to_string_lossy().into_owned()
    }
}

/// Working copy cloned from fixture remote.
pub(crate) struct WorkingCopy {
    path: PathBuf,
    repo: Repository,
}

impl WorkingCopy {
    fn with_identity(path: PathBuf, repo: Repository) -> Result<Self> {
        // INVARIANT: Always provide valid name and email.
        //   - Git will complain if this is not set in CI/CD environments.
        let mut config = repo.config()?;
        config.set_str("user.name", "John Doe")?;
        config.set_str("user.email", "john@doe.com")?;
        config.set_bool("commit.gpgsign", false)?;
        drop(config);

        Ok(Self { path, repo })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Write file to work tree, then stage and commit it to HEAD.
    pub(crate) fn commit_file(&self, filename: &str, contents: &str) -> Result<()> {
        write(self.path.join(filename), contents)?;

        // INVARIANT: Always use new tree produced by index after staging new entry.
        let mut index = self.repo.index()?;
        index.add_path(Path::new(filename))?;
        index.write()?;
        let tree = self.repo.find_tree(index.write_tree()?)?;

        // INVARIANT: Always determine latest parent commits to append to.
        let signature = self.repo.signature()?;
        let mut parents = Vec::new();
        if let Some(parent) = self.repo.head().ok().and_then(|head| head.target()) {
            parents.push(self.repo.find_commit(parent)?);
        }
        let parents = parents.iter().collect::<Vec<_>>();

        self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            format!("chore: add {filename:?}").as_ref(),
            &tree,
            &parents,
        )?;

        Ok(())
    }
}

/// Run git binary in working copy, failing on non-zero exit.
pub(crate) fn git(repo: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git").arg("-C").arg(repo).args(args).output()?;
    if !output.status.success() {
        bail!(
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Git binary is callable on this host.
pub(crate) fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
