// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2021 Profian, Inc.

use super::checkout::Checkout;
use super::Command;
use crate::api::Repository;
use crate::formats::{Manifest, Reference};

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use indicatif::ProgressBar;
use log::warn;
use structopt::StructOpt;

/// Promotes a new image tag into the deployment repository
///
/// Pulls the checkout, rewrites the manifest, commits the change and
/// optionally pushes it for the reconciler to pick up. Re-running a
/// promotion that already landed is a no-op, not a failure.
#[derive(StructOpt, Debug)]
pub struct Promote {
    /// The deployment repository checkout
    #[structopt(short = "C", long, default_value = ".")]
    checkout: PathBuf,

    /// Refuse tags the registry does not serve
    #[structopt(long)]
    verify: bool,

    /// Push the commit to the upstream remote
    #[structopt(long)]
    push: bool,

    /// The commit message (derived from the tag when absent)
    #[structopt(short, long)]
    message: Option<String>,

    /// Don't display progress
    #[structopt(short, long)]
    quiet: bool,

    /// The manifest path inside the checkout
    manifest: PathBuf,

    /// The image repository to retag (format: [registry/]name)
    repository: String,

    /// The new tag
    tag: String,
}

impl Command for Promote {
    fn execute(self) -> Result<()> {
        let repo = Checkout::open(&self.checkout)?;
        let path = repo.root().join(&self.manifest);

        let progress = if self.quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new_spinner()
        };
        progress.enable_steady_tick(100);

        if self.verify {
            let reference: Reference = self.repository.parse()?;
            let target = reference.with_tag(&self.tag)?;

            progress.set_message(format!("checking {}", target));
            if !Repository::new(&reference).has_tag(&self.tag)? {
                progress.finish_and_clear();
                return Err(anyhow!("registry has no tag {}", target));
            }
        }

        progress.set_message("pulling");
        repo.pull()?;

        let text = fs::read_to_string(&path)?;
        let patched = Manifest::new(text).retag(&self.repository, &self.tag)?;
        fs::write(&path, patched.as_str())?;

        let message = self
            .message
            .unwrap_or_else(|| format!("deploy: {} to {}", self.repository, self.tag));

        if !repo.commit(&path, &message)? {
            progress.finish_and_clear();
            warn!("manifest already at {}:{}", self.repository, self.tag);
            return Ok(());
        }

        if self.push {
            progress.set_message("pushing");
            repo.push()?;
        }

        progress.finish_and_clear();
        Ok(())
    }
}
