// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2021 Profian, Inc.

use structopt::StructOpt;

mod check;
mod checkout;
mod patch;
mod promote;
mod tags;

pub trait Command {
    fn execute(self) -> anyhow::Result<()>;
}

#[derive(StructOpt, Debug)]
#[structopt(about = "the gitops manifest retagger")]
pub enum Main {
    Patch(patch::Patch),
    Check(check::Check),
    Tags(tags::Tags),
    Promote(promote::Promote),
}

impl Command for Main {
    fn execute(self) -> anyhow::Result<()> {
        match self {
            Self::Patch(cmd) => cmd.execute(),
            Self::Check(cmd) => cmd.execute(),
            Self::Tags(cmd) => cmd.execute(),
            Self::Promote(cmd) => cmd.execute(),
        }
    }
}
