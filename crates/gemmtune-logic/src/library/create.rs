use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use gemmtune_gemm::catalog::KernelCatalog;
use gemmtune_runtime::config::Logger;
use rayon::prelude::*;
use walkdir::WalkDir;

use super::{LibraryError, LibraryFormat, LogicFile, MasterLibrary};

/// Architecture whose solutions are added to every other architecture.
pub const FALLBACK_ARCH: &str = "fallback";

const MANIFEST: &str = "TensileManifest.txt";

/// Options of [create_library].
#[derive(Clone, Debug)]
pub struct CreateLibraryArgs {
    /// Directory searched recursively for logic files.
    pub logic_path: PathBuf,
    /// Libraries are written to its `library` directory.
    pub output_path: PathBuf,
    /// `all`, or a `;` or `_` separated list of architectures.
    pub architecture: String,
    pub logic_format: LibraryFormat,
    pub library_format: LibraryFormat,
    /// Logic files are matched with `**/<filter>.<ext>`.
    pub logic_filter: String,
    pub merge_files: bool,
    /// Write one library per architecture instead of a single one.
    pub separate_architectures: bool,
    /// Write the tables of every problem type to their own library.
    pub lazy_library_loading: bool,
    /// Include logic files under an `experimental` directory.
    pub experimental: bool,
    /// Write `MatchTable`, mapping solution indices to their logic file.
    pub generate_solution_table: bool,
    /// Check that every solution is a kernel of the catalog.
    pub validate_library: bool,
    pub generate_manifest_and_exit: bool,
    pub print_timing: bool,
    /// Threads parsing the logic files, all cores when unset.
    pub jobs: Option<usize>,
    pub version: String,
}

impl Default for CreateLibraryArgs {
    fn default() -> Self {
        Self {
            logic_path: PathBuf::from("."),
            output_path: PathBuf::from("."),
            architecture: "all".to_string(),
            logic_format: LibraryFormat::Yaml,
            library_format: LibraryFormat::Yaml,
            logic_filter: "*".to_string(),
            merge_files: true,
            separate_architectures: false,
            lazy_library_loading: false,
            experimental: false,
            generate_solution_table: true,
            validate_library: false,
            generate_manifest_and_exit: false,
            print_timing: false,
            jobs: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// What [create_library] produced.
#[derive(Clone, Debug, Default)]
pub struct LibrarySummary {
    /// Logic files merged into the libraries.
    pub logic_files: Vec<PathBuf>,
    /// Every library file listed in the manifest.
    pub manifest: Vec<PathBuf>,
    /// Libraries by architecture, or a single one under `all` when architectures are merged.
    pub libraries: BTreeMap<String, MasterLibrary>,
}

/// Solution index to `[logic file, index in the file]`.
pub type MatchTable = BTreeMap<usize, (String, usize)>;

/// Merge the logic files under `logic_path` into solution libraries.
pub fn create_library(
    args: &CreateLibraryArgs,
    catalog: &KernelCatalog,
) -> Result<LibrarySummary, LibraryError> {
    let mut timer = StageTimer::new(args.print_timing);
    let archs = requested_archs(args)?;

    if !args.logic_path.exists() {
        return Err(LibraryError::MissingLogicPath(args.logic_path.clone()));
    }

    let files = find_logic_files(args)?;
    timer.stage("Find logic files");

    // Fallback logic is only kept when every architecture is requested.
    let mut logics = parse_logic_files(&files, args.jobs)?;
    logics.retain(|(_, logic)| match &archs {
        None => true,
        Some(archs) => arch_matches(&logic.architecture_name, archs),
    });
    timer.stage("Parse logic files");

    let (libraries, match_table) = merge_logic(args, &logics)?;
    timer.stage("Merge libraries");

    let library_dir = args.output_path.join("library");
    std::fs::create_dir_all(&library_dir).map_err(|source| LibraryError::Io {
        path: library_dir.clone(),
        source,
    })?;

    if args.generate_solution_table {
        let path = library_dir.join(format!("MatchTable.{}", args.library_format.extension()));
        args.library_format.write(&path, &match_table)?;
    }

    if args.validate_library {
        validate_libraries(&libraries, catalog)?;
        timer.stage("Validate libraries");
    }

    let library_files = library_files(args, &libraries);
    let manifest: Vec<PathBuf> = library_files.iter().map(|(path, _)| path.clone()).collect();
    write_manifest(&library_dir, &manifest)?;
    timer.stage("Write manifest");

    if !args.generate_manifest_and_exit {
        for (path, library) in &library_files {
            args.library_format.write(path, *library)?;
        }

        let missing: Vec<PathBuf> = manifest
            .iter()
            .filter(|path| !path.exists())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(LibraryError::MissingFiles(missing));
        }
        timer.stage("Write libraries");
    }

    Ok(LibrarySummary {
        logic_files: logics.into_iter().map(|(path, _)| path).collect(),
        manifest,
        libraries,
    })
}

/// The requested architectures, `None` meaning all of them.
fn requested_archs(args: &CreateLibraryArgs) -> Result<Option<Vec<String>>, LibraryError> {
    if args.lazy_library_loading && !(args.merge_files && args.separate_architectures) {
        return Err(LibraryError::InvalidArguments(
            "lazy library loading requires merge files and separate architectures".to_string(),
        ));
    }

    let separator = match args.architecture.contains(';') {
        true => ';',
        false => '_',
    };
    let archs: Vec<String> = args
        .architecture
        .split(separator)
        .map(|arch| arch.trim().to_string())
        .collect();

    if archs.iter().any(|arch| arch == "all") {
        return Ok(None);
    }
    if let Some(arch) = archs.iter().find(|arch| !arch.starts_with("gfx")) {
        return Err(LibraryError::UnsupportedArchitecture(arch.clone()));
    }

    Ok(Some(archs))
}

/// Whether logic written for `arch` is built for one of the requested architectures.
///
/// A requested architecture with feature suffixes, such as `gfx90a:xnack+`, matches its base.
fn arch_matches(arch: &str, archs: &[String]) -> bool {
    !arch.is_empty() && archs.iter().any(|requested| requested.starts_with(arch))
}

fn find_logic_files(args: &CreateLibraryArgs) -> Result<Vec<PathBuf>, LibraryError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(&args.logic_path).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(args.logic_format.extension()) {
            continue;
        }
        let matches = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| wildcard_match(&args.logic_filter, stem));
        if !matches {
            continue;
        }

        let relative = path.strip_prefix(&args.logic_path).unwrap_or(path);
        let experimental = relative
            .components()
            .any(|part| part.as_os_str().to_string_lossy().eq_ignore_ascii_case("experimental"));
        if experimental && !args.experimental {
            log::debug!("Skipping experimental logic {}", path.display());
            continue;
        }

        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

fn parse_logic_files(
    files: &[PathBuf],
    jobs: Option<usize>,
) -> Result<Vec<(PathBuf, LogicFile)>, LibraryError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.unwrap_or(0))
        .build()?;
    let logics = pool.install(|| {
        files
            .par_iter()
            .map(|path| LogicFile::from_path(path).map(|logic| (path.clone(), logic)))
            .collect::<Result<Vec<_>, _>>()
    })?;

    Ok(logics
        .into_iter()
        .filter(|(path, logic)| {
            let keep = !logic.architecture_name.is_empty();
            if !keep {
                log::debug!("Skipping {} without architecture", path.display());
            }
            keep
        })
        .collect())
}

fn merge_logic(
    args: &CreateLibraryArgs,
    logics: &[(PathBuf, LogicFile)],
) -> Result<(BTreeMap<String, MasterLibrary>, MatchTable), LibraryError> {
    let separate = args.separate_architectures || args.lazy_library_loading;
    let mut libraries: BTreeMap<String, MasterLibrary> = BTreeMap::new();
    let mut match_table = MatchTable::new();
    let mut next = 0;

    for (path, logic) in logics {
        let source = path.display().to_string();
        let library = MasterLibrary::from_logic(logic, &source)?;
        let key = match separate {
            true => logic.architecture_name.clone(),
            false => "all".to_string(),
        };

        let start = next;
        for local in 0..library.solutions.len() {
            match_table.insert(start + local, (source.clone(), local));
        }

        let master = libraries.entry(key).or_insert_with(|| MasterLibrary {
            version: args.version.clone(),
            ..Default::default()
        });
        next = master.merge(library, start);
    }

    let fallback = match separate {
        true => libraries.remove(FALLBACK_ARCH),
        false => None,
    };
    if let Some(fallback) = fallback {
        for library in libraries.values_mut() {
            for (offset, index) in fallback.solutions.keys().enumerate() {
                if let Some(source) = match_table.get(index).cloned() {
                    match_table.insert(next + offset, source);
                }
            }
            next = library.merge(fallback.clone(), next);
        }
    }

    if args.lazy_library_loading {
        libraries = libraries
            .into_iter()
            .map(|(arch, library)| {
                let lazy = library.into_lazy(&arch);
                (arch, lazy)
            })
            .collect();
    }

    Ok((libraries, match_table))
}

fn validate_libraries(
    libraries: &BTreeMap<String, MasterLibrary>,
    catalog: &KernelCatalog,
) -> Result<(), LibraryError> {
    for (arch, library) in libraries {
        for name in library.kernel_names() {
            let kernel = catalog
                .get(name)
                .ok_or_else(|| LibraryError::InvalidSolution {
                    source_name: arch.clone(),
                    reason: format!("kernel {name} is not in the catalog"),
                })?;

            if arch != "all" && !kernel.matches_arch(arch) {
                return Err(LibraryError::InvalidSolution {
                    source_name: arch.clone(),
                    reason: format!("kernel {name} targets {}", kernel.arch),
                });
            }
        }
    }

    Ok(())
}

/// Every library file to write, with its content.
fn library_files<'a>(
    args: &CreateLibraryArgs,
    libraries: &'a BTreeMap<String, MasterLibrary>,
) -> Vec<(PathBuf, &'a MasterLibrary)> {
    let dir = args.output_path.join("library");
    let ext = args.library_format.extension();
    let mut files = Vec::new();

    for (arch, library) in libraries {
        let name = if args.lazy_library_loading {
            format!("TensileLibrary_lazy_{arch}")
        } else if args.separate_architectures {
            format!("TensileLibrary_{arch}")
        } else {
            "TensileLibrary".to_string()
        };
        files.push((dir.join(format!("{name}.{ext}")), library));

        for (name, lazy) in &library.lazy_libraries {
            files.push((dir.join(format!("{name}.{ext}")), lazy));
        }
    }

    files
}

fn write_manifest(library_dir: &Path, files: &[PathBuf]) -> Result<(), LibraryError> {
    let path = library_dir.join(MANIFEST);
    let content: String = files
        .iter()
        .map(|file| format!("{}\n", file.display()))
        .collect();

    std::fs::write(&path, content).map_err(|source| LibraryError::Io { path, source })
}

/// Read the files listed in the manifest of an output directory.
pub fn read_manifest(output_path: &Path) -> Result<Vec<PathBuf>, LibraryError> {
    let path = output_path.join("library").join(MANIFEST);
    let content = std::fs::read_to_string(&path).map_err(|source| LibraryError::Io { path, source })?;

    Ok(content.lines().filter(|line| !line.is_empty()).map(PathBuf::from).collect())
}

/// Match `name` against a pattern where `*` is any sequence and `?` any character.
fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    let (mut p, mut n) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, n));
                p += 1;
            }
            Some(c) if *c == '?' || *c == name[n] => {
                p += 1;
                n += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    n = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

/// Logs the duration of every stage to the library logger.
struct StageTimer {
    logger: Option<Logger>,
    start: Instant,
}

impl StageTimer {
    fn new(enabled: bool) -> Self {
        Self {
            logger: enabled.then(Logger::new),
            start: Instant::now(),
        }
    }

    fn stage(&mut self, name: &str) {
        if let Some(logger) = self.logger.as_mut() {
            logger.log_library(&format!("{name}: {:.3?}", self.start.elapsed()));
        }
        self.start = Instant::now();
    }
}
