use std::path::PathBuf;

use clap::Parser;
use surface::{SurfaceConfig, SurfaceSize, UniformValue};

#[derive(Parser, Debug)]
#[command(
    name = "backdrop",
    author,
    version,
    about = "Windowed preview for animated fragment-shader backdrops",
    arg_required_else_help = false
)]
pub struct Args {
    /// Fragment shader to render; a built-in scene is used when omitted.
    #[arg(value_name = "SHADER")]
    pub shader: Option<PathBuf>,

    /// Window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<SurfaceSize>,

    /// Allow the backing store to follow high-DPI displays (cap 2x).
    #[arg(long)]
    pub hd: bool,

    /// Log the rendered frame rate once per second.
    #[arg(long)]
    pub fps: bool,

    /// Start with the animation paused (space toggles).
    #[arg(long)]
    pub paused: bool,

    /// Halve the render resolution.
    #[arg(long)]
    pub reduce_quality: bool,

    /// Override the device pixel ratio reported by the window system.
    #[arg(long, value_name = "RATIO")]
    pub pixel_ratio: Option<f32>,

    /// Extra float uniform passed to the shader, repeatable (`name=value`).
    #[arg(long = "uniform", value_name = "NAME=VALUE", value_parser = parse_uniform)]
    pub uniforms: Vec<(String, UniformValue)>,
}

impl Args {
    pub fn surface_config(&self, pixel_ratio: f32) -> SurfaceConfig {
        SurfaceConfig {
            is_hd_enabled: self.hd,
            is_fps_enabled: self.fps,
            is_playing: !self.paused,
            should_reduce_quality: self.reduce_quality,
            pixel_ratio: self.pixel_ratio.unwrap_or(pixel_ratio),
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}

fn parse_size(value: &str) -> Result<SurfaceSize, String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{value}`"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in `{value}`"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in `{value}`"))?;
    if width == 0 || height == 0 {
        return Err("size must be non-zero".into());
    }
    Ok(SurfaceSize::new(width, height))
}

fn parse_uniform(value: &str) -> Result<(String, UniformValue), String> {
    let (name, raw) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{value}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("uniform name is empty".into());
    }
    let parsed: f32 = raw
        .trim()
        .parse()
        .map_err(|_| format!("invalid float value for uniform `{name}`"))?;
    Ok((name.to_owned(), UniformValue::Float(parsed)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_size() {
        assert_eq!(parse_size("1280x720"), Ok(SurfaceSize::new(1280, 720)));
        assert_eq!(parse_size("640X480"), Ok(SurfaceSize::new(640, 480)));
        assert!(parse_size("1280").is_err());
        assert!(parse_size("0x720").is_err());
    }

    #[test]
    fn parses_uniform() {
        let (name, value) = parse_uniform("uSpeed=1.5").unwrap();
        assert_eq!(name, "uSpeed");
        assert_eq!(value, UniformValue::Float(1.5));
        assert!(parse_uniform("uSpeed").is_err());
        assert!(parse_uniform("=1.0").is_err());
    }
}
