//! WGSL sources for the mesh pipeline: user files or the built-in pair.

use std::borrow::Cow;
use std::path::Path;

use anyhow::{Context, Result, bail};

pub const DEFAULT_VERTEX: &str = include_str!("shaders/mesh_vert.wgsl");
pub const DEFAULT_FRAGMENT: &str = include_str!("shaders/mesh_frag.wgsl");

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Read the shader at `path`, or fall back to `builtin`. The source must
/// define `entry`.
pub fn load_source(
    path: Option<&Path>,
    builtin: &'static str,
    entry: &str,
) -> Result<Cow<'static, str>> {
    let source = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read shader {}", path.display()))?;
            log::info!("Using shader {}", path.display());
            Cow::Owned(text)
        }
        None => Cow::Borrowed(builtin),
    };
    if !defines_entry(&source, entry) {
        bail!(
            "Shader {} has no entry point `{entry}`",
            path.map_or_else(|| "<built-in>".into(), |p| p.display().to_string())
        );
    }
    Ok(source)
}

fn defines_entry(source: &str, entry: &str) -> bool {
    source.lines().any(|line| {
        line.trim_start()
            .strip_prefix("fn ")
            .and_then(|rest| rest.trim_start().strip_prefix(entry))
            .is_some_and(|rest| rest.trim_start().starts_with('('))
    })
}
