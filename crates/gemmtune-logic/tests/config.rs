use gemmtune_gemm::catalog::KernelCatalog;
use gemmtune_logic::config::{BenchmarkConfig, ConfigError};
use pretty_assertions::assert_eq;

fn demo(name: &str) -> String {
    format!("{}/../../demos/{name}", env!("CARGO_MANIFEST_DIR"))
}

#[test_log::test]
fn demo_configs_are_valid() {
    let catalog = KernelCatalog::builtin();

    for name in ["gemm_f32.yaml", "gemm_hhs_bias.yaml"] {
        let config = BenchmarkConfig::from_file(demo(name)).unwrap();
        let groups = config.validate(&catalog).unwrap();
        assert!(groups.iter().all(|group| !group.problems.is_empty()), "{name}");
    }
}

#[test_log::test]
fn demo_sizes_expand_ranges() {
    let config = BenchmarkConfig::from_file(demo("gemm_f32.yaml")).unwrap();
    let groups = config.expand().unwrap();

    let sizes: Vec<_> = groups
        .iter()
        .flat_map(|group| group.problems.iter())
        .map(|problem| [problem.m, problem.n, problem.batch, problem.k])
        .collect();
    assert_eq!(
        sizes,
        vec![
            [128, 128, 1, 64],
            [64, 64, 1, 32],
            [128, 64, 1, 32],
            [96, 80, 2, 48],
        ]
    );
}

#[test_log::test]
fn saved_config_reads_back() {
    let config = BenchmarkConfig::from_file(demo("gemm_hhs_bias.yaml")).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, config.to_yaml().unwrap()).unwrap();

    assert_eq!(BenchmarkConfig::from_file(&path).unwrap(), config);
}

#[test_log::test]
fn unknown_kernels_are_reported() {
    let yaml = std::fs::read_to_string(demo("gemm_f32.yaml"))
        .unwrap()
        .replace("MT128x64x32", "MT512x64x32");
    let config = BenchmarkConfig::from_yaml(&yaml).unwrap();

    match config.validate(&KernelCatalog::builtin()) {
        Err(ConfigError::UnknownKernel { kernel }) => assert!(kernel.contains("MT512x64x32")),
        other => panic!("Expected an unknown kernel, got {other:?}"),
    }
}

#[test_log::test]
fn kernels_are_checked_on_the_logic_architecture() {
    let yaml = std::fs::read_to_string(demo("gemm_f32.yaml"))
        .unwrap()
        .replace("ArchitectureName: gfx90a", "ArchitectureName: gfx942");
    let config = BenchmarkConfig::from_yaml(&yaml).unwrap();

    assert!(matches!(
        config.validate(&KernelCatalog::builtin()),
        Err(ConfigError::KernelRejected { .. })
    ));
}

#[test_log::test]
fn negative_sizes_are_rejected() {
    let yaml = std::fs::read_to_string(demo("gemm_f32.yaml"))
        .unwrap()
        .replace("Exact: [96, 80, 2, 48]", "Exact: [96, -80, 2, 48]");
    let config = BenchmarkConfig::from_yaml(&yaml).unwrap();

    match config.expand() {
        Err(ConfigError::InvalidSize { reason, .. }) => assert!(reason.contains("non-negative")),
        other => panic!("Expected an invalid size, got {other:?}"),
    }
}

#[test_log::test]
fn oversized_sizes_are_rejected() {
    let yaml = std::fs::read_to_string(demo("gemm_f32.yaml"))
        .unwrap()
        .replace("Exact: [96, 80, 2, 48]", "Exact: [8589934592, 8589934592, 2, 64]");
    let config = BenchmarkConfig::from_yaml(&yaml).unwrap();

    match config.validate(&KernelCatalog::builtin()) {
        Err(ConfigError::InvalidSize { reason, .. }) => {
            assert!(reason.contains("address space"), "{reason}")
        }
        other => panic!("Expected an invalid size, got {other:?}"),
    }
}
