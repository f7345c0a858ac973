use std::path::{Path, PathBuf};

use gemmtune_gemm::catalog::KernelCatalog;
use gemmtune_gemm::components::{DataType, GemmElems, GemmProblem, Transpose};
use gemmtune_gemm::heuristic::ExactSolutionTable;
use gemmtune_logic::library::{
    CreateLibraryArgs, LibraryError, LibraryFormat, create_library, load_library, read_manifest,
};
use pretty_assertions::assert_eq;

fn demo_logic() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos/logic")
}

fn args(output: &Path) -> CreateLibraryArgs {
    CreateLibraryArgs {
        logic_path: demo_logic(),
        output_path: output.to_path_buf(),
        ..Default::default()
    }
}

fn f32_problem(m: usize, n: usize, k: usize, trans_b: Transpose) -> GemmProblem {
    GemmProblem::new(
        m,
        n,
        k,
        1,
        Transpose::N,
        trans_b,
        GemmElems::uniform(DataType::F32),
    )
}

fn lookup(table: &ExactSolutionTable, problem: GemmProblem) -> Option<String> {
    table.lookup(&problem).map(str::to_string)
}

#[test_log::test]
fn merged_library_numbers_every_solution() {
    let output = tempfile::tempdir().unwrap();
    let summary = create_library(&args(output.path()), &KernelCatalog::builtin()).unwrap();

    assert_eq!(summary.logic_files.len(), 3);
    assert_eq!(
        summary.manifest,
        vec![output.path().join("library/TensileLibrary.yaml")]
    );
    assert_eq!(read_manifest(output.path()).unwrap(), summary.manifest);

    let library = &summary.libraries["all"];
    assert_eq!(library.num_solutions(), 4);
    assert_eq!(
        library.solutions.keys().copied().collect::<Vec<_>>(),
        vec![0, 1, 2, 3]
    );

    let table = load_library(&summary.manifest[0])
        .unwrap()
        .solution_table()
        .unwrap();
    // gfx90a comes before gfx942, so its solution wins the shared size.
    assert_eq!(
        lookup(&table, f32_problem(128, 128, 64, Transpose::N)).as_deref(),
        Some("Cijk_Ailk_Bljk_SSS_B_BiasS_Act_SAV_MT128x64x32_MI16x16x4_GSU1_WGM4_ISAgfx90a")
    );
    assert!(lookup(&table, f32_problem(64, 64, 64, Transpose::T)).is_some());
    assert!(lookup(&table, f32_problem(64, 64, 4096, Transpose::N)).is_none());
}

#[test_log::test]
fn match_table_points_to_logic_files() {
    let output = tempfile::tempdir().unwrap();
    create_library(&args(output.path()), &KernelCatalog::builtin()).unwrap();

    let match_table: std::collections::BTreeMap<usize, (String, usize)> = LibraryFormat::Yaml
        .read(&output.path().join("library/MatchTable.yaml"))
        .unwrap();

    assert_eq!(match_table.len(), 4);
    assert!(match_table[&0].0.ends_with("fallback_Cijk_Ailk_Bjlk_SSS_B.yaml"));
    assert_eq!(match_table[&2].1, 1);
    assert!(match_table[&3].0.ends_with("aquavanjaram_Cijk_Ailk_Bljk_SSS_B.yaml"));
}

#[test_log::test]
fn separate_architectures_receive_the_fallback() {
    let output = tempfile::tempdir().unwrap();
    let args = CreateLibraryArgs {
        separate_architectures: true,
        ..args(output.path())
    };
    let summary = create_library(&args, &KernelCatalog::builtin()).unwrap();

    assert_eq!(
        summary.libraries.keys().cloned().collect::<Vec<_>>(),
        vec!["gfx90a".to_string(), "gfx942".to_string()]
    );
    assert_eq!(
        summary.manifest,
        vec![
            output.path().join("library/TensileLibrary_gfx90a.yaml"),
            output.path().join("library/TensileLibrary_gfx942.yaml"),
        ]
    );

    let gfx90a = &summary.libraries["gfx90a"];
    let gfx942 = &summary.libraries["gfx942"];
    assert_eq!(gfx90a.solutions.keys().copied().collect::<Vec<_>>(), vec![1, 2, 4]);
    assert_eq!(gfx942.solutions.keys().copied().collect::<Vec<_>>(), vec![3, 5]);
    assert_eq!(gfx942.problems.len(), 2);
}

#[test_log::test]
fn architecture_filter() {
    let output = tempfile::tempdir().unwrap();
    let args = CreateLibraryArgs {
        architecture: "gfx942".to_string(),
        separate_architectures: true,
        ..args(output.path())
    };
    let summary = create_library(&args, &KernelCatalog::builtin()).unwrap();

    assert_eq!(summary.logic_files.len(), 1);
    assert_eq!(
        summary.libraries.keys().cloned().collect::<Vec<_>>(),
        vec!["gfx942".to_string()]
    );
    assert_eq!(summary.libraries["gfx942"].num_solutions(), 1);
}

#[test_log::test]
fn experimental_logic_is_opt_in() {
    let output = tempfile::tempdir().unwrap();
    let args = CreateLibraryArgs {
        experimental: true,
        ..args(output.path())
    };
    let summary = create_library(&args, &KernelCatalog::builtin()).unwrap();

    assert_eq!(summary.logic_files.len(), 4);
    let table = summary.libraries["all"].solution_table().unwrap();
    assert!(table.lookup(&f32_problem(64, 64, 4096, Transpose::N)).is_some());
}

#[test_log::test]
fn logic_filter_selects_files() {
    let output = tempfile::tempdir().unwrap();
    let args = CreateLibraryArgs {
        logic_filter: "aldebaran*".to_string(),
        ..args(output.path())
    };
    let summary = create_library(&args, &KernelCatalog::builtin()).unwrap();

    assert_eq!(summary.logic_files.len(), 1);
    assert_eq!(summary.libraries["all"].num_solutions(), 2);
}

#[test_log::test]
fn lazy_libraries_load_back() {
    let output = tempfile::tempdir().unwrap();
    let args = CreateLibraryArgs {
        separate_architectures: true,
        lazy_library_loading: true,
        library_format: LibraryFormat::Json,
        ..args(output.path())
    };
    let summary = create_library(&args, &KernelCatalog::builtin()).unwrap();

    let dir = output.path().join("library");
    assert!(summary.manifest.contains(&dir.join("TensileLibrary_lazy_gfx90a.json")));
    assert!(
        summary
            .manifest
            .contains(&dir.join("TensileLibrary_Type_SSSS_NT_gfx942.json"))
    );
    assert!(summary.manifest.iter().all(|path| path.exists()));

    let table = load_library(&dir.join("TensileLibrary_lazy_gfx942.json"))
        .unwrap()
        .solution_table()
        .unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(
        lookup(&table, f32_problem(128, 128, 64, Transpose::N)).as_deref(),
        Some("Cijk_Ailk_Bljk_SSS_B_BiasS_Act_SAV_MT128x128x64_MI32x32x2_GSU1_WGM8_ISAgfx942")
    );
}

#[test_log::test]
fn lazy_loading_needs_separate_architectures() {
    let output = tempfile::tempdir().unwrap();
    let args = CreateLibraryArgs {
        lazy_library_loading: true,
        ..args(output.path())
    };

    assert!(matches!(
        create_library(&args, &KernelCatalog::builtin()),
        Err(LibraryError::InvalidArguments(_))
    ));
}

#[test_log::test]
fn manifest_only() {
    let output = tempfile::tempdir().unwrap();
    let args = CreateLibraryArgs {
        generate_manifest_and_exit: true,
        ..args(output.path())
    };
    let summary = create_library(&args, &KernelCatalog::builtin()).unwrap();

    assert_eq!(read_manifest(output.path()).unwrap(), summary.manifest);
    assert!(!summary.manifest[0].exists());
}

#[test_log::test]
fn validation_rejects_kernels_of_other_architectures() {
    let output = tempfile::tempdir().unwrap();
    let args = CreateLibraryArgs {
        separate_architectures: true,
        validate_library: true,
        ..args(output.path())
    };

    // The fallback kernel targets gfx90a but is merged into gfx942.
    assert!(matches!(
        create_library(&args, &KernelCatalog::builtin()),
        Err(LibraryError::InvalidSolution { .. })
    ));
}

#[test_log::test]
fn missing_logic_path() {
    let output = tempfile::tempdir().unwrap();
    let args = CreateLibraryArgs {
        logic_path: output.path().join("missing"),
        ..args(output.path())
    };

    assert!(matches!(
        create_library(&args, &KernelCatalog::builtin()),
        Err(LibraryError::MissingLogicPath(_))
    ));
}

#[test_log::test]
fn unsupported_architecture() {
    let output = tempfile::tempdir().unwrap();
    let args = CreateLibraryArgs {
        architecture: "sm_90".to_string(),
        ..args(output.path())
    };

    assert!(matches!(
        create_library(&args, &KernelCatalog::builtin()),
        Err(LibraryError::UnsupportedArchitecture(_))
    ));
}
