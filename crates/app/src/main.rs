//! Entry point for meshview.
//! CLI + config + logging, then hand over to the platform loop.

mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use platform::ViewerSettings;
use renderer::RenderSettings;

use crate::config::{Config, Source};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum GpuBackend {
    Auto,
    #[value(alias = "vk")]
    Vulkan,
    #[value(alias = "d3d12")]
    Dx12,
    #[value(alias = "mtl")]
    Metal,
    #[value(alias = "opengl", alias = "gles")]
    Gl,
}

impl GpuBackend {
    fn backends(self) -> wgpu::Backends {
        match self {
            GpuBackend::Auto => wgpu::Backends::all(),
            GpuBackend::Vulkan => wgpu::Backends::VULKAN,
            GpuBackend::Dx12 => wgpu::Backends::DX12,
            GpuBackend::Metal => wgpu::Backends::METAL,
            GpuBackend::Gl => wgpu::Backends::GL,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct WindowSize {
    width: u32,
    height: u32,
}

fn parse_size(value: &str) -> Result<WindowSize, String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let parse = |s: &str| match s.trim().parse::<u32>() {
        Ok(0) | Err(_) => Err(format!("invalid dimension '{s}' in '{value}'")),
        Ok(n) => Ok(n),
    };
    Ok(WindowSize {
        width: parse(w)?,
        height: parse(h)?,
    })
}

/// Load a 3D model with its textures and fly around it.
#[derive(Debug, Parser)]
#[command(name = "meshview", version)]
struct Cli {
    /// JSON config file [default: resources/config.json]
    config: Option<PathBuf>,

    /// Graphics API to use.
    #[arg(long, value_enum, default_value_t = GpuBackend::Auto)]
    gpu_backend: GpuBackend,

    /// Show frames per second in the window title.
    #[arg(long)]
    show_fps: bool,

    /// Initial window size.
    #[arg(long, value_name = "WxH", value_parser = parse_size, default_value = "1280x720")]
    size: WindowSize,
}

fn settings(cli: &Cli, config: Config) -> ViewerSettings {
    ViewerSettings {
        model_path: config.model,
        render: RenderSettings {
            backends: cli.gpu_backend.backends(),
            vertex_shader: config.vertex_shader,
            fragment_shader: config.fragment_shader,
        },
        width: cli.size.width,
        height: cli.size.height,
        show_fps: cli.show_fps,
        terrain_size: config.terrain_size,
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, source) = Config::load(cli.config.as_deref())?;

    env_logger::Builder::new()
        .filter_level(config.log_level())
        .parse_default_env()
        .init();

    match &source {
        Source::File(path) => log::info!("Config: {}", path.display()),
        Source::Defaults(path) => {
            log::warn!("No config at {}, using defaults", path.display())
        }
    }

    let settings = settings(&cli, config);
    log::info!(
        "Starting meshview. Model: {}, backend: {:?}, show_fps={}, window_size={}x{}",
        settings.model_path.display(),
        cli.gpu_backend,
        settings.show_fps,
        settings.width,
        settings.height
    );

    platform::run_viewer(settings)?;

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["meshview"]).unwrap();
        assert_eq!(cli.config, None);
        assert_eq!(cli.gpu_backend, GpuBackend::Auto);
        assert!(!cli.show_fps);
        assert_eq!(cli.size, WindowSize { width: 1280, height: 720 });
    }

    #[test]
    fn all_flags() {
        let cli = Cli::try_parse_from([
            "meshview",
            "scenes/tree.json",
            "--gpu-backend",
            "vk",
            "--show-fps",
            "--size",
            "800X600",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("scenes/tree.json")));
        assert_eq!(cli.gpu_backend.backends(), wgpu::Backends::VULKAN);
        assert!(cli.show_fps);
        assert_eq!(cli.size, WindowSize { width: 800, height: 600 });
    }

    #[test]
    fn bad_sizes_are_rejected() {
        assert!(parse_size("800").is_err());
        assert!(parse_size("0x600").is_err());
        assert!(parse_size("wide x tall").is_err());
        assert!(Cli::try_parse_from(["meshview", "--gpu-backend", "glide"]).is_err());
    }

    #[test]
    fn config_flows_into_settings() {
        let cli = Cli::try_parse_from(["meshview", "--size", "640x480"]).unwrap();
        let config = Config {
            terrain_size: 32,
            vertex_shader: Some(PathBuf::from("v.wgsl")),
            ..Config::default()
        };
        let settings = settings(&cli, config);
        assert_eq!((settings.width, settings.height), (640, 480));
        assert_eq!(settings.terrain_size, 32);
        assert_eq!(settings.render.vertex_shader, Some(PathBuf::from("v.wgsl")));
        assert_eq!(settings.render.backends, wgpu::Backends::all());
    }
}
