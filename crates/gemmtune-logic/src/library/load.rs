use std::path::Path;

use gemmtune_gemm::heuristic::ExactSolutionTable;
use gemmtune_runtime::config::library::LibraryLogLevel;
use gemmtune_runtime::config::{GlobalConfig, Logger};

use super::{LibraryError, LibraryFormat, MasterLibrary};

/// Read a library written by [create_library](super::create_library), loading the lazy libraries
/// it refers to from the same directory.
pub fn load_library(path: &Path) -> Result<MasterLibrary, LibraryError> {
    let format = LibraryFormat::of(path).ok_or_else(|| LibraryError::Parse {
        path: path.to_path_buf(),
        reason: "unknown library extension".to_string(),
    })?;
    let mut library: MasterLibrary = format.read(path)?;
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut logger = Logger::new();

    let placeholders: Vec<String> = library
        .problems
        .iter()
        .filter_map(|problem| problem.placeholder.clone())
        .collect();
    for name in placeholders {
        let lazy_path = dir.join(format!("{name}.{}", format.extension()));
        let lazy: MasterLibrary = format.read(&lazy_path)?;
        if logger.log_level_library() == LibraryLogLevel::Full {
            logger.log_library(&format!(
                "Loaded {} with {} solutions",
                lazy_path.display(),
                lazy.num_solutions()
            ));
        }
        library.lazy_libraries.insert(name, lazy);
    }

    logger.log_library(&format!(
        "Loaded {} with {} solutions",
        path.display(),
        library.num_solutions()
    ));

    Ok(library)
}

/// Install the library of the global configuration as the table of exact solutions.
///
/// Returns the number of exact sizes installed, or `None` when no library is configured.
pub fn install_configured_library() -> Result<Option<usize>, LibraryError> {
    let Some(path) = GlobalConfig::get().library.path.clone() else {
        return Ok(None);
    };

    let table: ExactSolutionTable = load_library(&path)?.solution_table()?;
    let len = table.len();
    ExactSolutionTable::install(table);

    Ok(Some(len))
}
