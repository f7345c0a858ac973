use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use gemmtune::gemm::catalog::KernelCatalog;
use gemmtune::logic::bench::run_benchmarks;
use gemmtune::logic::config::BenchmarkConfig;
use gemmtune::logic::library::{
    CreateLibraryArgs, LibraryFormat, LogicFile, create_library, install_configured_library,
};
use gemmtune::runtime::client::ComputeClient;
use gemmtune::runtime::config::GlobalConfig;
use gemmtune::sample::{SampleArgs, run_sample};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error>;

#[derive(Parser, Debug)]
#[command(name = "gemmtune", version, about = "Tune, benchmark and select GEMM kernels")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a benchmark configuration against the kernel catalog.
    Validate {
        config: PathBuf,
    },
    /// Benchmark the problems of a configuration on the host device.
    Bench {
        config: PathBuf,
        /// Write the fastest kernel of every size as logic files to this directory.
        #[arg(long)]
        logic_out: Option<PathBuf>,
        #[arg(long, default_value = "yaml")]
        logic_format: LibraryFormat,
    },
    /// Merge logic files into solution libraries.
    CreateLibrary(CreateLibraryCli),
    /// Run a float8 times f16 GEMM with the amax scaling of B.
    Sample {
        #[arg(short, default_value_t = 2048)]
        m: usize,
        #[arg(short, default_value_t = 2048)]
        n: usize,
        #[arg(short, default_value_t = 2048)]
        k: usize,
        #[arg(long, default_value_t = 1)]
        batch: usize,
    },
    /// Manage the global configuration.
    Config {
        /// Write the current configuration to this file.
        #[arg(long)]
        save: PathBuf,
    },
}

#[derive(Args, Debug)]
struct CreateLibraryCli {
    logic_path: PathBuf,
    output_path: PathBuf,
    /// `all`, or architectures separated by `;` or `_`.
    #[arg(long, default_value = "all")]
    architecture: String,
    #[arg(long, default_value = "yaml")]
    logic_format: LibraryFormat,
    #[arg(long, default_value = "yaml")]
    library_format: LibraryFormat,
    #[arg(long, default_value = "*")]
    logic_filter: String,
    #[arg(long)]
    no_merge_files: bool,
    #[arg(long)]
    separate_architectures: bool,
    #[arg(long)]
    lazy_library_loading: bool,
    #[arg(long)]
    experimental: bool,
    #[arg(long)]
    no_solution_table: bool,
    #[arg(long)]
    validate_library: bool,
    #[arg(long)]
    generate_manifest_and_exit: bool,
    #[arg(long)]
    print_timing: bool,
    #[arg(long)]
    jobs: Option<usize>,
}

impl From<CreateLibraryCli> for CreateLibraryArgs {
    fn from(cli: CreateLibraryCli) -> Self {
        Self {
            logic_path: cli.logic_path,
            output_path: cli.output_path,
            architecture: cli.architecture,
            logic_format: cli.logic_format,
            library_format: cli.library_format,
            logic_filter: cli.logic_filter,
            merge_files: !cli.no_merge_files,
            separate_architectures: cli.separate_architectures,
            lazy_library_loading: cli.lazy_library_loading,
            experimental: cli.experimental,
            generate_solution_table: !cli.no_solution_table,
            validate_library: cli.validate_library,
            generate_manifest_and_exit: cli.generate_manifest_and_exit,
            print_timing: cli.print_timing,
            jobs: cli.jobs,
            ..Default::default()
        }
    }
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(Cli::parse().command) {
        Ok(code) => code,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<ExitCode, BoxError> {
    match command {
        Command::Validate { config } => {
            let config = BenchmarkConfig::from_file(&config)?;
            let groups = config.validate(&KernelCatalog::builtin())?;
            let problems: usize = groups.iter().map(|group| group.problems.len()).sum();
            println!("{} groups, {problems} problems", groups.len());
        }
        Command::Bench {
            config,
            logic_out,
            logic_format,
        } => {
            let config = BenchmarkConfig::from_file(&config)?;
            if let Some(sizes) = install_configured_library()? {
                log::info!("Installed a solution library of {sizes} sizes");
            }

            let client = ComputeClient::host(0)?;
            let report = run_benchmarks(&config, KernelCatalog::shared_builtin(), &client)?;
            print!("{report}");

            if let Some(dir) = logic_out {
                std::fs::create_dir_all(&dir)?;
                for logic in LogicFile::from_report(&config, &report, &client.properties().arch) {
                    let path = logic.write_to(&dir, logic_format)?;
                    println!("Wrote {}", path.display());
                }
            }

            if !report.passed() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::CreateLibrary(cli) => {
            let args = CreateLibraryArgs::from(cli);
            let summary = create_library(&args, &KernelCatalog::builtin())?;
            for path in &summary.manifest {
                println!("{}", path.display());
            }
        }
        Command::Sample { m, n, k, batch } => {
            install_configured_library()?;
            let client = ComputeClient::host(0)?;
            let args = SampleArgs {
                m,
                n,
                k,
                batch,
                ..Default::default()
            };
            println!("{}", run_sample(&client, &args)?);
        }
        Command::Config { save } => {
            GlobalConfig::save_default(&save)?;
            println!("Saved {}", save.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}
