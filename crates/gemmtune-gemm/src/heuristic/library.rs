use std::sync::Arc;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::components::{GemmElems, GemmProblem, Transpose};

/// The part of a problem that decides which kernels can solve it, ignoring sizes.
#[derive(new, Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemTypeKey {
    pub trans_a: Transpose,
    pub trans_b: Transpose,
    pub elems: GemmElems,
}

impl From<&GemmProblem> for ProblemTypeKey {
    fn from(problem: &GemmProblem) -> Self {
        Self::new(problem.trans_a, problem.trans_b, problem.elems)
    }
}

/// Exact problem size `[m, n, batch, k]`.
pub type ExactSize = [usize; 4];

/// The best kernel measured for exact problem sizes, usually loaded from a solution library.
#[derive(Clone, Debug, Default)]
pub struct ExactSolutionTable {
    entries: HashMap<(ProblemTypeKey, ExactSize), String>,
}

static INSTALLED: spin::RwLock<Option<Arc<ExactSolutionTable>>> = spin::RwLock::new(None);

impl ExactSolutionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the kernel for a size, replacing any previous entry.
    pub fn insert(&mut self, problem_type: ProblemTypeKey, size: ExactSize, kernel: String) {
        self.entries.insert((problem_type, size), kernel);
    }

    /// The kernel recorded for the exact size of the problem.
    pub fn lookup(&self, problem: &GemmProblem) -> Option<&str> {
        let size = [problem.m, problem.n, problem.batch, problem.k];
        self.entries
            .get(&(ProblemTypeKey::from(problem), size))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Use the table for every selection that isn't given one explicitly.
    pub fn install(table: ExactSolutionTable) {
        *INSTALLED.write() = Some(Arc::new(table));
    }

    /// Remove the installed table.
    pub fn uninstall() {
        *INSTALLED.write() = None;
    }

    /// The installed table, if any.
    pub fn installed() -> Option<Arc<ExactSolutionTable>> {
        INSTALLED.read().clone()
    }
}
