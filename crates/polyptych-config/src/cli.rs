//! Command-line argument parsing for polyptych.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, OutputFormat};

/// polyptych command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(
    name = "polyptych",
    about = "Unfold polyhedra into nets and project panoramas onto them"
)]
pub struct CliArgs {
    /// Project file to open.
    pub project: Option<PathBuf>,

    /// Polyhedron file (idat, OFF or OBJ).
    #[arg(short, long)]
    pub polyhedron: Option<PathBuf>,

    /// Equirectangular image to project onto the net.
    #[arg(short, long)]
    pub image: Option<PathBuf>,

    /// Assembled layout format.
    #[arg(long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Pixel width of the first rendered face.
    #[arg(long)]
    pub max_width: Option<u32>,

    /// Sub-samples per pixel along each axis.
    #[arg(long)]
    pub oversample: Option<u32>,

    /// Base name for rendered files.
    #[arg(long)]
    pub file_base: Option<String>,

    /// Write only the layout, not the face rasters.
    #[arg(long)]
    pub layout_only: bool,

    /// Mesh face to seed the net at when no project is given.
    #[arg(long)]
    pub seed: Option<usize>,

    /// Convert the polyhedron to this file (format from extension) and exit.
    #[arg(long)]
    pub convert: Option<PathBuf>,

    /// Allow overwriting an existing file with --convert.
    #[arg(short, long)]
    pub clobber: bool,

    /// Save the resulting project here.
    #[arg(long)]
    pub save_project: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(output) = args.output {
            self.render.output = output;
        }
        if let Some(w) = args.max_width {
            self.render.max_width = w;
        }
        if let Some(k) = args.oversample {
            self.render.oversample = k;
        }
        if let Some(ref base) = args.file_base {
            self.render.file_base = base.clone();
        }
        if args.layout_only {
            self.render.generate_images = false;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            max_width: Some(800),
            output: Some(OutputFormat::Laidout),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.render.max_width, 800);
        assert_eq!(config.render.output, OutputFormat::Laidout);
        assert_eq!(config.debug.log_level, "debug");
        // Non-overridden fields retain defaults
        assert_eq!(config.render.oversample, 3);
        assert!(config.render.generate_images);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = CliArgs::try_parse_from([
            "polyptych",
            "-p",
            "cube.off",
            "--output",
            "image",
            "--layout-only",
            "project.polyp",
        ])
        .unwrap();
        assert_eq!(args.polyhedron, Some(PathBuf::from("cube.off")));
        assert_eq!(args.output, Some(OutputFormat::Image));
        assert_eq!(args.project, Some(PathBuf::from("project.polyp")));
        assert!(args.layout_only);
    }
}
