use std::path::{Path, PathBuf};

use anyhow::Context;
use ard_log::{warn, LevelFilter, LogConfig};
use ard_shader_compiler::prelude::GlslcBackend;
use ard_shader_core::prelude::{ShaderStage, StageFlags};
use ard_shaders::prelude::*;
use clap::Parser;
use rayon::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Folder of shaders to build. Searched recursively.
    #[arg(short, long)]
    path: PathBuf,
    /// Shader system config to start from.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Overrides the cache folder of the config.
    #[arg(long)]
    cache_dir: Option<PathBuf>,
    /// Include folder. Searched after the ones in the config.
    #[arg(short = 'I', long = "include")]
    include_dirs: Vec<PathBuf>,
    /// Global macro, as `NAME` or `NAME=VALUE`.
    #[arg(short = 'D', long = "define")]
    defines: Vec<String>,
    /// Recompile every stage even if it is unchanged.
    #[arg(long, default_value_t = false)]
    force: bool,
    /// Skip optimized binaries.
    #[arg(long, default_value_t = false)]
    no_release: bool,
    /// Log debug output.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    ard_log::init_with(LogConfig {
        filter: if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        },
        log_dir: None,
        console: true,
    })
    .context("unable to initialize logging")?;

    let mut config = match &args.config {
        Some(path) => ShaderSystemConfig::load(path)
            .with_context(|| format!("unable to load config `{}`", path.display()))?,
        None => ShaderSystemConfig::default(),
    };
    if let Some(cache_dir) = &args.cache_dir {
        config.cache_dir = cache_dir.clone();
    }
    config.include_dirs.extend(args.include_dirs.iter().cloned());
    for define in &args.defines {
        let (name, value) = match define.split_once('=') {
            Some((name, value)) => (name, Some(value.to_owned())),
            None => (define.as_str(), None),
        };
        config.global_macros.insert(name.to_owned(), value);
    }
    if args.no_release {
        config.release_binaries = false;
    }

    if !GlslcBackend::new(config.glslc.clone()).is_available() {
        warn!(
            "`{}` could not be launched, only cached binaries can be used",
            config.glslc.executable.display()
        );
    }

    let mut shaders = Vec::default();
    collect_shaders(&args.path, &config.include_dirs, &mut shaders)
        .with_context(|| format!("unable to search `{}`", args.path.display()))?;
    shaders.sort();

    let library = ShaderLibrary::new(config);
    let results: Vec<_> = shaders
        .par_iter()
        .map(|path| (path, library.reload(path, args.force)))
        .collect();

    let mut failed = 0;
    for (path, result) in results {
        match result {
            Ok(report) => {
                println!("ok    {} [{}]", path.display(), stage_list(report.changed));
                for warning in report.warnings {
                    println!("      warning: {warning}");
                }
            }
            Err(err) => {
                failed += 1;
                println!("FAIL  {}: {err}", path.display());
            }
        }
    }

    println!(
        "built {} of {} shader(s)",
        shaders.len() - failed,
        shaders.len()
    );
    if failed > 0 {
        anyhow::bail!("{failed} shader(s) failed to build");
    }

    Ok(())
}

/// Finds shader files under `dir`. Include folders only hold headers and are skipped.
fn collect_shaders(
    dir: &Path,
    include_dirs: &[PathBuf],
    out: &mut Vec<PathBuf>,
) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if include_dirs.iter().any(|include| path.starts_with(include)) {
            continue;
        }

        if path.is_dir() {
            collect_shaders(&path, include_dirs, out)?;
            continue;
        }

        let is_shader = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| {
                ext == "glsl" || ShaderStage::from_extension(ext).is_some()
            });
        if is_shader {
            out.push(path);
        }
    }

    Ok(())
}

fn stage_list(stages: StageFlags) -> String {
    if stages.is_empty() {
        return "up to date".into();
    }
    stages
        .stages()
        .map(ShaderStage::short_name)
        .collect::<Vec<_>>()
        .join(", ")
}
