// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2021 Profian, Inc.

use super::Command;
use crate::formats::Manifest;

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use structopt::StructOpt;

/// Lists the image references found in a manifest
#[derive(StructOpt, Debug)]
pub struct Check {
    /// The manifest file
    manifest: PathBuf,
}

impl Command for Check {
    fn execute(self) -> Result<()> {
        let manifest = Manifest::new(fs::read_to_string(&self.manifest)?);

        manifest.validate()?;

        let images = manifest.images();
        if images.is_empty() {
            return Err(anyhow!("no image fields in {:?}", self.manifest));
        }

        for (line, image) in images {
            println!("{}: {}", line, image);
        }

        Ok(())
    }
}
