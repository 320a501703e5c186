// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2021 Profian, Inc.

use super::Command;
use crate::formats::Manifest;

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use structopt::StructOpt;

/// Rewrites the image tag inside a deployment manifest
#[derive(StructOpt, Debug)]
pub struct Patch {
    /// Rewrite the manifest in place instead of printing it
    #[structopt(short, long)]
    in_place: bool,

    /// The manifest file (use `-` for stdin)
    manifest: PathBuf,

    /// The image repository to retag (format: [registry/]name)
    repository: String,

    /// The new tag
    tag: String,
}

impl Command for Patch {
    fn execute(self) -> Result<()> {
        let stdin = self.manifest.as_os_str() == "-";

        let text = if stdin {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        } else {
            fs::read_to_string(&self.manifest)?
        };

        let patched = Manifest::new(text).retag(&self.repository, &self.tag)?;

        if self.in_place {
            if stdin {
                return Err(anyhow!("--in-place requires a file"));
            }

            fs::write(&self.manifest, patched.as_str())?;
        } else {
            print!("{}", patched.as_str());
        }

        Ok(())
    }
}
