// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2021 Profian, Inc.

use crate::api::Repository;
use crate::formats::Reference;

use super::Command;

use structopt::StructOpt;

/// List all tags for a given repository
#[derive(StructOpt, Debug)]
pub struct Tags {
    /// The repository name (format: [registry/]name)
    name: String,
}

impl Command for Tags {
    fn execute(self) -> anyhow::Result<()> {
        let reference: Reference = self.name.parse()?;

        for tag in Repository::new(&reference).tags()? {
            println!("{}", tag);
        }

        Ok(())
    }
}
