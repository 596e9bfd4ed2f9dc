//! Ordered pre-phase steps
//!
//! Later steps run commands that earlier steps put on PATH or into the
//! interpreter's import roots, so the order below is part of the contract.

use std::fmt;

/// One step of the pre phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    /// Yarn cache + `yarn install`. Requires: nothing.
    YarnCache,
    /// Register the C++ compiler alternative. Requires: nothing, but must
    /// precede anything that compiles native code (pip wheels, libs sync).
    CompilerAlternative,
    /// pip cache + `pip install -r requirements.txt`. Requires: the compiler
    /// alternative for source builds.
    PipCache,
    /// Bootstrap emsdk and restore its system cache. Requires: python
    /// packages installed by `PipCache`. Skipped without an SDK version.
    EmsdkSysCache,
    /// Prebuilt libraries cache + `./sync-libs`. Requires: python packages
    /// and, for wasm targets, an activated SDK.
    LibsCache,
}

/// The pre phase, in execution order
pub const PRE_SEQUENCE: [SetupStep; 5] = [
    SetupStep::YarnCache,
    SetupStep::CompilerAlternative,
    SetupStep::PipCache,
    SetupStep::EmsdkSysCache,
    SetupStep::LibsCache,
];

impl SetupStep {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::YarnCache => "yarn",
            Self::CompilerAlternative => "compiler-alternative",
            Self::PipCache => "pip",
            Self::EmsdkSysCache => "emsdk",
            Self::LibsCache => "libs",
        }
    }
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
