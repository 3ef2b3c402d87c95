use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, ExitCode};

use clap::{Parser, Subcommand, ValueEnum};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const LAMBDA_PACKAGE: &str = "asg_dns_lambda";
const LAMBDA_BINARY: &str = "lifecycle_lambda";

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the scaling group DNS workspace",
    long_about = "Runs CI checks and packages the lifecycle Lambda\n\
                  for deployment on the provided.al2023 runtime."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Build and package the lifecycle Lambda as a bootstrap zip
    LambdaPackage {
        /// Compilation target triple for the Lambda binary
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for the binary
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
        /// Directory receiving the zip artifact
        #[arg(long, env = "LAMBDA_DIST_DIR", default_value = "dist")]
        dist_dir: String,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting and clippy
    Lint,
    /// Unit tests for every crate
    Test,
    /// Lint and test
    Check,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

type TaskResult = Result<(), String>;

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn run_cargo(args: &[&str]) -> TaskResult {
    eprintln!("+ cargo {}", args.join(" "));
    let status = Command::new("cargo")
        .args(args)
        .status()
        .map_err(|error| format!("failed to execute cargo: {error}"))?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("`cargo {}` exited with {status}", args.join(" ")))
    }
}

fn package_lambda(target: &str, profile: BuildProfile, dist_dir: &Path) -> TaskResult {
    ensure_rust_target_installed(target)?;

    step("Build lifecycle lambda binary");

    let mut cargo_args = vec![
        "build",
        "-p",
        LAMBDA_PACKAGE,
        "--target",
        target,
        "--bin",
        LAMBDA_BINARY,
    ];
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args)?;

    step("Package lambda zip artifact");
    let target_dir = Path::new("target").join(target).join(profile.dir_name());
    fs::create_dir_all(dist_dir).map_err(|error| {
        format!("failed to create '{}': {error}", dist_dir.display())
    })?;

    let zip_path = dist_dir.join(format!("{LAMBDA_BINARY}.zip"));
    package_lambda_zip(&target_dir.join(LAMBDA_BINARY), &zip_path)?;

    eprintln!("\nPackaged artifact:\n- {}", zip_path.display());
    Ok(())
}

/// Missing `rustup` only warns; a missing target is an error.
fn ensure_rust_target_installed(target: &str) -> TaskResult {
    let output = match Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output()
    {
        Ok(output) => output,
        Err(error) => {
            eprintln!("warning: rustup unavailable ({error}); skipping target check");
            return Ok(());
        }
    };

    if !output.status.success() {
        return Err(format!(
            "`rustup target list --installed` failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    let installed = String::from_utf8_lossy(&output.stdout);
    if installed.lines().any(|line| line.trim() == target) {
        Ok(())
    } else {
        Err(format!(
            "rust target `{target}` is not installed; run `rustup target add {target}`"
        ))
    }
}

fn package_lambda_zip(binary_path: &Path, zip_path: &Path) -> TaskResult {
    let binary = fs::read(binary_path)
        .map_err(|error| format!("cannot read '{}': {error}", binary_path.display()))?;
    let file = fs::File::create(zip_path)
        .map_err(|error| format!("cannot create '{}': {error}", zip_path.display()))?;

    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file("bootstrap", options)
        .map_err(|error| format!("cannot add bootstrap entry: {error}"))?;
    zip.write_all(&binary)
        .map_err(|error| format!("cannot write bootstrap entry: {error}"))?;
    zip.finish()
        .map_err(|error| format!("cannot finish '{}': {error}", zip_path.display()))?;
    Ok(())
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_lint() -> TaskResult {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"])?;

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ])
}

fn ci_test() -> TaskResult {
    step("Test asg_dns_core");
    run_cargo(&["test", "-p", "asg_dns_core"])?;

    step("Test asg_dns_lambda");
    run_cargo(&["test", "-p", LAMBDA_PACKAGE])
}

// ── main ───────────────────────────────────────────────────────────

fn run(command: Commands) -> TaskResult {
    match command {
        Commands::Ci { job } => {
            match job {
                CiJob::Lint => ci_lint()?,
                CiJob::Test => ci_test()?,
                CiJob::Check => {
                    ci_lint()?;
                    ci_test()?;
                }
            }
            eprintln!("\nCI job passed.");
            Ok(())
        }
        Commands::LambdaPackage {
            target,
            profile,
            dist_dir,
        } => package_lambda(&target, profile, Path::new(&dist_dir)),
    }
}

fn main() -> ExitCode {
    match run(Cli::parse().command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packaging_a_missing_binary_reports_an_error() {
        let dir = std::env::temp_dir().join("xtask-missing-binary");
        let result = package_lambda_zip(&dir.join(LAMBDA_BINARY), &dir.join("out.zip"));

        let message = result.expect_err("missing binary should fail");
        assert!(message.contains(LAMBDA_BINARY));
    }
}
