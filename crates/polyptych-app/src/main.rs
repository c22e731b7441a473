//! `polyptych`: unfold a polyhedron into a net and project a panorama onto it.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//!
//! ```text
//! polyptych -p cube.off --convert cube.glb        # convert and exit
//! polyptych -p cube.off -i sky.jpg --output svg   # unwrap at face 0 and render
//! polyptych cube.polyptych -i sky.jpg             # render the nets of a project
//! ```

use std::error::Error as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use polyptych_config::{CliArgs, Config, default_config_dir};
use polyptych_hedron::{HedronError, io};
use polyptych_math::Basis;
use polyptych_net::{NetError, Project, Unfolding};
use polyptych_render::{
    CancelToken, RenderError, RenderOutput, RenderSettings, Severity, SphereMap, render_net,
};
use tracing::info;

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error("no polyhedron or project given")]
    NoInput,

    #[error(transparent)]
    Hedron(#[from] HedronError),

    #[error(transparent)]
    Net(#[from] NetError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("render of {net} failed, {failures} faces with errors")]
    RenderFailed { net: String, failures: usize },
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    polyptych_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    match run(&args, &config, Path::new(".")) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            let mut source = err.source();
            while let Some(cause) = source {
                tracing::error!("caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

/// Everything after the config and logging bootstrap. Rendered files go to
/// `out_dir`.
fn run(args: &CliArgs, config: &Config, out_dir: &Path) -> Result<(), AppError> {
    let mut project = open(args, config)?;

    if let Some(target) = &args.convert {
        let format = io::save(project.unfolding.hedron(), target, None, args.clobber)?;
        info!(path = %target.display(), %format, "converted polyhedron");
        return Ok(());
    }

    if project.unfolding.nets().is_empty() {
        let seed = args.seed.unwrap_or(0);
        let id = project.unfolding.establish_net(seed)?;
        let placed = project.unfolding.total_unwrap(id)?;
        info!(%id, seed, faces = placed.len(), "unwrapped net");
    }

    if let Some(image) = &args.image {
        project.sphere_file = Some(image.clone());
        render(&project, image, config, out_dir)?;
    }

    if let Some(path) = &args.save_project {
        project.save(path)?;
    }
    Ok(())
}

/// Open the project or polyhedron named on the command line.
fn open(args: &CliArgs, config: &Config) -> Result<Project, AppError> {
    if let Some(path) = &args.project {
        let mut project = match &args.polyhedron {
            Some(mesh) => Project::load_with(path, io::load(mesh)?)?,
            None => Project::load(path)?,
        };
        project
            .unfolding
            .set_orthonormal_epsilon(config.unwrap.orthonormal_epsilon);
        info!(path = %path.display(), nets = project.unfolding.nets().len(), "opened project");
        return Ok(project);
    }

    let path = args.polyhedron.as_ref().ok_or(AppError::NoInput)?;
    let mut hedron = io::load(path)?;
    if config.unwrap.collapse_epsilon > 0.0 {
        let removed = hedron.collapse_vertices(config.unwrap.collapse_epsilon);
        if removed > 0 {
            info!(removed, "merged coincident vertices");
        }
        hedron.finalize()?;
    }
    info!(
        path = %path.display(),
        vertices = hedron.vertices.len(),
        faces = hedron.faces.len(),
        "loaded polyhedron"
    );
    let unfolding =
        Unfolding::new(hedron)?.with_orthonormal_epsilon(config.unwrap.orthonormal_epsilon);
    let mut project = Project::new(unfolding);
    project.polyhedron_file = Some(path.clone());
    Ok(project)
}

/// Render every net of the project. With several nets, each gets its own
/// file base suffixed with the net number.
fn render(
    project: &Project,
    image: &Path,
    config: &Config,
    out_dir: &Path,
) -> Result<(), AppError> {
    let sphere = if config.render.generate_images {
        Some(SphereMap::open(image)?)
    } else {
        None
    };
    let mut settings = RenderSettings::from(&config.render);
    if project.basis != Basis::IDENTITY {
        settings.extra_basis = Some(project.basis);
    }

    let nets = project.unfolding.nets();
    let cancel = CancelToken::new();
    for net in nets {
        let base = if nets.len() > 1 {
            format!("{}-{}", config.render.file_base, net.id().0)
        } else {
            config.render.file_base.clone()
        };
        let output = RenderOutput {
            dir: out_dir,
            base: &base,
            template: None,
            format: config.render.output,
        };
        let report = render_net(
            project.unfolding.hedron(),
            net,
            sphere.as_ref(),
            settings.clone(),
            &output,
            &cancel,
        )?;
        for entry in report.log.iter().filter(|e| e.severity != Severity::Info) {
            tracing::warn!("{entry}");
        }
        if report.log.is_failed() {
            return Err(AppError::RenderFailed {
                net: net.id().to_string(),
                failures: report.log.count(Severity::Fail),
            });
        }
        info!(
            %base,
            rasters = report.files.len(),
            layout = ?report.layout.as_ref().map(PathBuf::as_path),
            "rendered net"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyptych_config::OutputFormat;
    use polyptych_hedron::shapes;

    fn write_cube(dir: &Path) -> PathBuf {
        let path = dir.join("cube.off");
        io::save(&shapes::cube(), &path, None, false).unwrap();
        path
    }

    #[test]
    fn test_convert_respects_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let cube = write_cube(dir.path());
        let target = dir.path().join("cube.obj");
        let mut args = CliArgs {
            polyhedron: Some(cube),
            convert: Some(target.clone()),
            ..Default::default()
        };
        let config = Config::default();
        run(&args, &config, dir.path()).unwrap();
        assert!(target.exists());
        assert!(matches!(
            run(&args, &config, dir.path()),
            Err(AppError::Hedron(HedronError::FileExists(_)))
        ));
        args.clobber = true;
        run(&args, &config, dir.path()).unwrap();
    }

    #[test]
    fn test_unwrap_and_save_project() {
        let dir = tempfile::tempdir().unwrap();
        let cube = write_cube(dir.path());
        let project_path = dir.path().join("cube.polyptych");
        let args = CliArgs {
            polyhedron: Some(cube),
            seed: Some(3),
            save_project: Some(project_path.clone()),
            ..Default::default()
        };
        run(&args, &Config::default(), dir.path()).unwrap();

        let project = Project::load(&project_path).unwrap();
        let net = &project.unfolding.nets()[0];
        assert_eq!(net.seed(), Some(3));
        assert_eq!(net.num_actual(), 6);
    }

    #[test]
    fn test_render_layout_only() {
        let dir = tempfile::tempdir().unwrap();
        let cube = write_cube(dir.path());
        let args = CliArgs {
            polyhedron: Some(cube),
            image: Some(dir.path().join("missing.jpg")),
            ..Default::default()
        };
        let mut config = Config::default();
        config.render.generate_images = false;
        config.render.output = OutputFormat::Laidout;
        config.render.file_base = "net".into();
        run(&args, &config, dir.path()).unwrap();
        assert!(dir.path().join("net.laidout").exists());
        assert!(!dir.path().join("net-000.png").exists());
    }

    #[test]
    fn test_project_gets_configured_epsilon() {
        let dir = tempfile::tempdir().unwrap();
        let cube = write_cube(dir.path());
        let project_path = dir.path().join("cube.polyptych");
        let save = CliArgs {
            polyhedron: Some(cube),
            save_project: Some(project_path.clone()),
            ..Default::default()
        };
        run(&save, &Config::default(), dir.path()).unwrap();

        let mut config = Config::default();
        config.unwrap.orthonormal_epsilon = 0.25;
        let reopen = CliArgs {
            project: Some(project_path),
            ..Default::default()
        };
        let project = open(&reopen, &config).unwrap();
        assert_eq!(project.unfolding.orthonormal_epsilon(), 0.25);
        assert_eq!(project.unfolding.nets()[0].num_actual(), 6);
    }

    #[test]
    fn test_no_input() {
        assert!(matches!(
            run(&CliArgs::default(), &Config::default(), Path::new(".")),
            Err(AppError::NoInput)
        ));
    }
}
