use std::path::{Path, PathBuf};

use gemmtune_gemm::components::Transpose;
use gemmtune_gemm::heuristic::{ExactSize, ProblemTypeKey};
use serde::{Deserialize, Serialize};

use super::{LibraryError, LibraryFormat};
use crate::bench::BenchmarkReport;
use crate::config::{BenchmarkConfig, LibraryLogic, ProblemType};

/// The best solution measured for one size: `[[m, n, batch, k], [solution, gflops]]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExactEntry(pub ExactSize, pub (usize, f64));

impl ExactEntry {
    pub fn size(&self) -> ExactSize {
        self.0
    }

    pub fn solution(&self) -> usize {
        self.1.0
    }
}

/// The solutions selected for one problem type on one device.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogicFile {
    #[serde(default)]
    pub schedule_name: String,
    #[serde(default)]
    pub architecture_name: String,
    #[serde(default)]
    pub device_names: Vec<String>,
    pub problem_type: ProblemType,
    /// Kernel names, referred to by their position.
    #[serde(default)]
    pub solutions: Vec<String>,
    #[serde(default)]
    pub exact_logic: Vec<ExactEntry>,
}

impl LogicFile {
    /// Read a logic file, in the format of its extension.
    pub fn from_path(path: &Path) -> Result<Self, LibraryError> {
        let format = LibraryFormat::of(path).ok_or_else(|| LibraryError::Parse {
            path: path.to_path_buf(),
            reason: "unknown logic file extension".to_string(),
        })?;

        format.read(path)
    }

    /// The types and transposes the solutions are selected for.
    pub fn problem_type_key(&self, source: &str) -> Result<ProblemTypeKey, LibraryError> {
        let elems = self
            .problem_type
            .elems()
            .map_err(|field| LibraryError::InvalidSolution {
                source_name: source.to_string(),
                reason: format!("problem type without {field}"),
            })?;

        Ok(ProblemTypeKey::new(
            self.problem_type.trans_a(),
            self.problem_type.trans_b(),
            elems,
        ))
    }

    /// Write the logic to `dir`, in a file named after its schedule and problem type.
    pub fn write_to(&self, dir: &Path, format: LibraryFormat) -> Result<PathBuf, LibraryError> {
        let path = dir.join(format!("{}.{}", self.file_stem(), format.extension()));
        format.write(&path, self)?;
        Ok(path)
    }

    /// `<schedule>_Cijk_<A>_<B>_<types>`, such as `aldebaran_Cijk_Ailk_Bjlk_HHHS`.
    fn file_stem(&self) -> String {
        let schedule = match self.schedule_name.is_empty() {
            true => self.architecture_name.as_str(),
            false => self.schedule_name.as_str(),
        };
        let a = match self.problem_type.trans_a() {
            Transpose::N => "Ailk",
            Transpose::T => "Alik",
        };
        let b = match self.problem_type.trans_b() {
            Transpose::N => "Bljk",
            Transpose::T => "Bjlk",
        };
        let types = match self.problem_type.elems() {
            Ok(elems) => format!("{}{}{}{}", elems.a, elems.b, elems.d, elems.compute.data_type()),
            Err(_) => "unknown".to_string(),
        };

        format!("{schedule}_Cijk_{a}_{b}_{types}")
    }

    /// One logic per problem of the configuration, selecting the fastest kernel of every size.
    ///
    /// Problems without any measured kernel produce no logic.
    pub fn from_report(config: &BenchmarkConfig, report: &BenchmarkReport, arch: &str) -> Vec<Self> {
        let logic = config.library_logic.clone().unwrap_or_default();

        config
            .benchmark_problems
            .iter()
            .enumerate()
            .filter_map(|(index, problem)| {
                let mut file = Self::new(&logic, arch, problem.problem_type.clone());

                for result in report.problems.iter().filter(|result| result.problem == index) {
                    if let Some((kernel, measurement)) = result.fastest() {
                        file.record(result.size, kernel, measurement.gflops);
                    }
                }

                (!file.exact_logic.is_empty()).then_some(file)
            })
            .collect()
    }

    fn new(logic: &LibraryLogic, arch: &str, problem_type: ProblemType) -> Self {
        Self {
            schedule_name: logic.schedule_name.clone().unwrap_or_default(),
            architecture_name: logic
                .architecture_name
                .clone()
                .unwrap_or_else(|| arch.to_string()),
            device_names: logic.device_names.clone(),
            problem_type,
            solutions: Vec::new(),
            exact_logic: Vec::new(),
        }
    }

    /// Keep the kernel for the size if it is faster than the one recorded.
    fn record(&mut self, size: ExactSize, kernel: &str, gflops: f64) {
        let solution = match self.solutions.iter().position(|name| name == kernel) {
            Some(index) => index,
            None => {
                self.solutions.push(kernel.to_string());
                self.solutions.len() - 1
            }
        };

        match self.exact_logic.iter_mut().find(|entry| entry.size() == size) {
            Some(entry) if entry.1.1 < gflops => entry.1 = (solution, gflops),
            Some(_) => {}
            None => self.exact_logic.push(ExactEntry(size, (solution, gflops))),
        }
    }
}
