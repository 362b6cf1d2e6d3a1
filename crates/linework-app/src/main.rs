//! `linework` command-line tool.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use linework_core::storage::{self, autosave_path};
use linework_core::{Entity, FileStorage, FsAssetProvider, LoadedProject, Storage};
use linework_render::{CancelToken, ExportArea, ExportFormat, ExportOptions};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "linework", version, about = "Track diagram export and project tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a project to SVG, PNG, JPEG, BMP or WebP.
    Export(ExportArgs),
    /// Print a summary of a project file.
    Info { project: PathBuf },
    /// Replace a project with its autosave snapshot.
    Recover {
        project: PathBuf,
        /// Write the recovered project here instead of over the original.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct ExportArgs {
    project: PathBuf,
    output: PathBuf,
    /// Output format; inferred from the output extension when omitted.
    #[arg(long)]
    format: Option<String>,
    /// Output pixels per document unit.
    #[arg(long, conflicts_with = "dpi")]
    scale: Option<f64>,
    /// Output resolution, 96 being 1:1.
    #[arg(long)]
    dpi: Option<f64>,
    /// Export the content bounds instead of the canvas.
    #[arg(long)]
    content: bool,
    #[arg(long)]
    no_grid: bool,
    /// JPEG quality from 1 to 100.
    #[arg(long)]
    quality: Option<u8>,
}

impl ExportArgs {
    fn options(&self) -> Result<ExportOptions> {
        let format = match &self.format {
            Some(name) => ExportFormat::from_extension(name)
                .with_context(|| format!("unknown export format '{name}'"))?,
            None => ExportFormat::from_path(&self.output).with_context(|| {
                format!(
                    "cannot infer a format from {}; pass --format",
                    self.output.display()
                )
            })?,
        };
        let mut options = ExportOptions::new(format);
        if let Some(dpi) = self.dpi {
            options = options.with_dpi(dpi);
        }
        if let Some(scale) = self.scale {
            options = options.with_scale(scale);
        }
        if let Some(quality) = self.quality {
            options.jpeg_quality = quality;
        }
        if self.content {
            options.scene.area = ExportArea::Content;
        }
        options.scene.grid = !self.no_grid;
        Ok(options)
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let files = FileStorage::new();
    match cli.command {
        Command::Export(args) => {
            let options = args.options()?;
            let loaded = load(&files, &args.project)?;
            let assets = FsAssetProvider::for_project(&args.project);
            let bytes = linework_render::export_to_path(
                &loaded.document,
                &assets,
                &options,
                &args.output,
                &CancelToken::new(),
            )
            .with_context(|| format!("failed to export {}", args.output.display()))?;
            println!("Wrote {} ({bytes} bytes)", args.output.display());
        }
        Command::Info { project } => {
            let loaded = load(&files, &project)?;
            let has_autosave = files.exists(&autosave_path(&project));
            print!("{}", describe(&project, &loaded, has_autosave));
        }
        Command::Recover { project, output } => {
            let assets = FsAssetProvider::for_project(&project);
            let Some(loaded) = storage::recover(&files, &project, Some(&assets))
                .with_context(|| format!("failed to read the autosave of {}", project.display()))?
            else {
                bail!("{} has no autosave", project.display());
            };
            report_warnings(&loaded);
            let target = output.as_deref().unwrap_or(&project);
            storage::save_project(&files, target, &loaded.document)
                .with_context(|| format!("failed to write {}", target.display()))?;
            files
                .remove(&autosave_path(&project))
                .with_context(|| format!("failed to remove the autosave of {}", project.display()))?;
            println!("Recovered {} entities into {}", loaded.document.len(), target.display());
        }
    }
    Ok(())
}

fn load(files: &dyn Storage, project: &Path) -> Result<LoadedProject> {
    let assets = FsAssetProvider::for_project(project);
    let loaded = storage::load_project(files, project, Some(&assets))
        .with_context(|| format!("failed to open {}", project.display()))?;
    report_warnings(&loaded);
    Ok(loaded)
}

fn report_warnings(loaded: &LoadedProject) {
    for warning in &loaded.warnings {
        log::warn!("{warning}");
    }
}

fn describe(project: &Path, loaded: &LoadedProject, has_autosave: bool) -> String {
    let doc = &loaded.document;
    let mut counts: BTreeMap<&str, usize> = Entity::KINDS.iter().map(|k| (*k, 0)).collect();
    for entity in doc.all() {
        *counts.entry(entity.kind()).or_default() += 1;
    }

    let mut out = format!("{}\n", project.display());
    if let Some(version) = &loaded.app_version {
        out.push_str(&format!("  written by: linework {version}\n"));
    }
    out.push_str(&format!("  entities:   {}\n", doc.len()));
    for (kind, count) in &counts {
        out.push_str(&format!("    {kind:<8}{count}\n"));
    }
    let canvas = doc.canvas();
    out.push_str(&format!("  canvas:     {} x {}\n", canvas.width, canvas.height));
    let grid = doc.grid();
    out.push_str(&format!(
        "  grid:       {} ({})\n",
        grid.spacing,
        if grid.visible { "shown" } else { "hidden" }
    ));
    if let Some(bounds) = doc.content_bounds() {
        out.push_str(&format!(
            "  content:    ({}, {}) to ({}, {})\n",
            bounds.x0, bounds.y0, bounds.x1, bounds.y1
        ));
    }
    for warning in &loaded.warnings {
        out.push_str(&format!("  warning:    {warning}\n"));
    }
    if has_autosave {
        out.push_str("  autosave:   present (run `linework recover`)\n");
    }
    out
}
