use std::collections::{BTreeMap, BTreeSet};

use gemmtune_gemm::heuristic::{ExactSolutionTable, ProblemTypeKey};
use serde::{Deserialize, Serialize};

use super::{ExactEntry, LibraryError, LogicFile};

/// Solutions of one or more logic files, with globally unique indices.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MasterLibrary {
    #[serde(default)]
    pub version: String,
    /// Kernel name of every solution index.
    #[serde(default)]
    pub solutions: BTreeMap<usize, String>,
    #[serde(default)]
    pub problems: Vec<ProblemLibrary>,
    /// Libraries written to their own file and loaded when their problem type is needed.
    #[serde(skip)]
    pub lazy_libraries: BTreeMap<String, MasterLibrary>,
}

/// The exact-size table of one problem type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProblemLibrary {
    pub problem_type: ProblemTypeKey,
    /// Name of the lazy library holding the table, which is then empty here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exact: Vec<ExactEntry>,
}

impl ProblemLibrary {
    /// A short name of the problem type, such as `HHHS_NT`.
    pub fn type_name(&self) -> String {
        let key = &self.problem_type;
        let elems = &key.elems;
        format!(
            "{}{}{}{}_{}{}",
            elems.a,
            elems.b,
            elems.d,
            elems.compute.data_type(),
            key.trans_a,
            key.trans_b
        )
    }
}

impl MasterLibrary {
    /// The library of a logic file, with solutions numbered from zero.
    pub fn from_logic(logic: &LogicFile, source: &str) -> Result<Self, LibraryError> {
        let problem_type = logic.problem_type_key(source)?;

        if let Some(entry) = logic
            .exact_logic
            .iter()
            .find(|entry| entry.solution() >= logic.solutions.len())
        {
            return Err(LibraryError::InvalidSolution {
                source_name: source.to_string(),
                reason: format!(
                    "size {:?} refers to solution {}, only {} are listed",
                    entry.size(),
                    entry.solution(),
                    logic.solutions.len()
                ),
            });
        }

        Ok(Self {
            version: String::new(),
            solutions: logic.solutions.iter().cloned().enumerate().collect(),
            problems: vec![ProblemLibrary {
                problem_type,
                placeholder: None,
                exact: logic.exact_logic.clone(),
            }],
            lazy_libraries: BTreeMap::new(),
        })
    }

    /// Number of solutions, lazy libraries included.
    pub fn num_solutions(&self) -> usize {
        self.solutions.len()
            + self
                .lazy_libraries
                .values()
                .map(MasterLibrary::num_solutions)
                .sum::<usize>()
    }

    /// Merge another library, renumbering its solutions from `start` in index order.
    ///
    /// Sizes already in a table keep their solution. Returns the next free index.
    pub fn merge(&mut self, other: MasterLibrary, start: usize) -> usize {
        let renumbered: BTreeMap<usize, usize> = other
            .solutions
            .keys()
            .enumerate()
            .map(|(offset, index)| (*index, start + offset))
            .collect();
        let next = start + renumbered.len();

        for (index, name) in other.solutions {
            if let Some(new_index) = renumbered.get(&index) {
                self.solutions.insert(*new_index, name);
            }
        }

        for problem in other.problems {
            let exact = problem.exact.into_iter().filter_map(|entry| {
                let ExactEntry(size, (index, gflops)) = entry;
                renumbered
                    .get(&index)
                    .map(|index| ExactEntry(size, (*index, gflops)))
            });

            match self
                .problems
                .iter_mut()
                .find(|existing| existing.problem_type == problem.problem_type)
            {
                Some(existing) => {
                    let sizes: BTreeSet<_> = existing.exact.iter().map(ExactEntry::size).collect();
                    existing
                        .exact
                        .extend(exact.filter(|entry| !sizes.contains(&entry.size())));
                }
                None => self.problems.push(ProblemLibrary {
                    problem_type: problem.problem_type,
                    placeholder: problem.placeholder,
                    exact: exact.collect(),
                }),
            }
        }

        next
    }

    /// Move every problem type to its own lazy library named after it and `arch`.
    ///
    /// The library keeps a placeholder for each problem type and no solution.
    pub fn into_lazy(mut self, arch: &str) -> Self {
        let solutions = core::mem::take(&mut self.solutions);

        for problem in self.problems.iter_mut() {
            let name = format!("TensileLibrary_Type_{}_{arch}", problem.type_name());
            let exact = core::mem::take(&mut problem.exact);
            let used: BTreeSet<usize> = exact.iter().map(ExactEntry::solution).collect();

            let lazy = MasterLibrary {
                version: self.version.clone(),
                solutions: solutions
                    .iter()
                    .filter(|(index, _)| used.contains(index))
                    .map(|(index, name)| (*index, name.clone()))
                    .collect(),
                problems: vec![ProblemLibrary {
                    problem_type: problem.problem_type,
                    placeholder: None,
                    exact,
                }],
                lazy_libraries: BTreeMap::new(),
            };

            problem.placeholder = Some(name.clone());
            self.lazy_libraries.insert(name, lazy);
        }

        self
    }

    /// Every kernel name of the library and its lazy libraries.
    pub fn kernel_names(&self) -> impl Iterator<Item = &str> {
        self.solutions.values().map(String::as_str).chain(
            self.lazy_libraries
                .values()
                .flat_map(|lazy| lazy.solutions.values().map(String::as_str)),
        )
    }

    /// The exact-size tables of the library, with solutions resolved to kernel names.
    ///
    /// Lazy libraries must have been loaded into `lazy_libraries`.
    pub fn solution_table(&self) -> Result<ExactSolutionTable, LibraryError> {
        let mut table = ExactSolutionTable::new();
        self.fill_table(&mut table)?;
        Ok(table)
    }

    fn fill_table(&self, table: &mut ExactSolutionTable) -> Result<(), LibraryError> {
        for problem in &self.problems {
            if let Some(name) = &problem.placeholder {
                let lazy = self.lazy_libraries.get(name).ok_or_else(|| {
                    LibraryError::InvalidSolution {
                        source_name: name.clone(),
                        reason: "lazy library isn't loaded".to_string(),
                    }
                })?;
                lazy.fill_table(table)?;
                continue;
            }

            for entry in &problem.exact {
                let kernel = self.solutions.get(&entry.solution()).ok_or_else(|| {
                    LibraryError::InvalidSolution {
                        source_name: problem.type_name(),
                        reason: format!("unknown solution {}", entry.solution()),
                    }
                })?;
                table.insert(problem.problem_type, entry.size(), kernel.clone());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemmtune_gemm::components::{DataType, GemmElems, Transpose};
    use pretty_assertions::assert_eq;

    fn library(trans_b: Transpose, names: &[&str], exact: Vec<ExactEntry>) -> MasterLibrary {
        MasterLibrary {
            version: String::new(),
            solutions: names.iter().map(|name| name.to_string()).enumerate().collect(),
            problems: vec![ProblemLibrary {
                problem_type: ProblemTypeKey::new(
                    Transpose::N,
                    trans_b,
                    GemmElems::uniform(DataType::F32),
                ),
                placeholder: None,
                exact,
            }],
            lazy_libraries: BTreeMap::new(),
        }
    }

    #[test]
    fn merge_renumbers_and_keeps_existing_sizes() {
        let mut master = MasterLibrary::default();
        let next = master.merge(
            library(
                Transpose::N,
                &["a", "b"],
                vec![ExactEntry([64, 64, 1, 64], (1, 10.0))],
            ),
            0,
        );
        assert_eq!(next, 2);

        let next = master.merge(
            library(
                Transpose::N,
                &["c"],
                vec![
                    ExactEntry([64, 64, 1, 64], (0, 99.0)),
                    ExactEntry([32, 32, 1, 32], (0, 5.0)),
                ],
            ),
            next,
        );
        assert_eq!(next, 3);
        assert_eq!(master.solutions.get(&2).map(String::as_str), Some("c"));

        let exact = &master.problems[0].exact;
        assert_eq!(
            exact,
            &vec![
                ExactEntry([64, 64, 1, 64], (1, 10.0)),
                ExactEntry([32, 32, 1, 32], (2, 5.0)),
            ]
        );
    }

    #[test]
    fn merge_adds_new_problem_types() {
        let mut master = library(Transpose::N, &["a"], vec![ExactEntry([8, 8, 1, 8], (0, 1.0))]);
        master.merge(
            library(Transpose::T, &["b"], vec![ExactEntry([8, 8, 1, 8], (0, 1.0))]),
            1,
        );

        let table = master.solution_table().unwrap();
        assert_eq!(master.problems.len(), 2);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn lazy_libraries_hold_the_tables() {
        let mut master = library(Transpose::N, &["a", "b"], vec![ExactEntry([8, 8, 1, 8], (1, 1.0))]);
        master.merge(
            library(Transpose::T, &["c"], vec![ExactEntry([8, 8, 1, 8], (0, 1.0))]),
            2,
        );
        let lazy = master.into_lazy("gfx90a");

        assert!(lazy.solutions.is_empty());
        assert_eq!(
            lazy.lazy_libraries.keys().cloned().collect::<Vec<_>>(),
            vec![
                "TensileLibrary_Type_SSSS_NN_gfx90a".to_string(),
                "TensileLibrary_Type_SSSS_NT_gfx90a".to_string(),
            ]
        );
        assert_eq!(lazy.num_solutions(), 2);
        assert_eq!(lazy.solution_table().unwrap().len(), 2);
    }
}
