// SPDX-License-Identifier: Apache-2.0
// Copyright vchassis Authors

//! Ordered command-line accumulator.
//!
//! Option ordering is significant for the target processes (qemu treats
//! the first assigned drive as bootable, for example), so the accumulator
//! is strictly append-only.  Re-adding an option identical to one already
//! present is a no-op with a warning rather than a duplicate; that is what
//! makes element rendering idempotent.

use tracing::warn;

/// One argv fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// A lone flag, e.g. `-enable-kvm`.
    Flag(String),
    /// A flag with a value, e.g. `-m 2048`.
    Pair(String, String),
    /// A bare positional token, e.g. a wrapped program name.
    Raw(String),
}

/// A fully resolved process invocation under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdLine {
    program: String,
    args: Vec<Arg>,
}

impl CmdLine {
    #[must_use]
    pub fn new(program: impl Into<String>) -> CmdLine {
        CmdLine {
            program: program.into(),
            args: Vec::new(),
        }
    }

    fn push(&mut self, arg: Arg) {
        if self.args.contains(&arg) {
            warn!("option {arg:?} already present on '{}'; skipping", self.program);
            return;
        }
        self.args.push(arg);
    }

    pub fn flag(&mut self, flag: impl Into<String>) {
        self.push(Arg::Flag(flag.into()));
    }

    pub fn opt(&mut self, flag: impl Into<String>, value: impl Into<String>) {
        self.push(Arg::Pair(flag.into(), value.into()));
    }

    pub fn raw(&mut self, token: impl Into<String>) {
        self.push(Arg::Raw(token.into()));
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The argument vector, without the program itself.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() * 2);
        for arg in &self.args {
            match arg {
                Arg::Flag(flag) | Arg::Raw(flag) => argv.push(flag.clone()),
                Arg::Pair(flag, value) => {
                    argv.push(flag.clone());
                    argv.push(value.clone());
                }
            }
        }
        argv
    }

    /// The literal flat invocation string.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = self.program.clone();
        for token in self.args() {
            out.push(' ');
            out.push_str(&token);
        }
        out
    }
}
