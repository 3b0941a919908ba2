use crate::config::{Config, load_config};
use crate::ir::Direction;
use crate::layout::compute_layout;
use crate::layout_dump::write_layout_dump;
use crate::normalize::normalize_value;
use crate::payload::extract_workflow;
use crate::render::{render_svg, write_output_svg};
use crate::theme::Theme;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::Value;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "cfgr", version, about = "Code-flow graph renderer for analysis workflow payloads")]
pub struct Args {
    /// Input JSON file or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file (svg/png). Defaults to stdout for SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file (theme, themeVariables, layout, view, export)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Named theme, overrides the config file
    #[arg(short = 't', long = "theme")]
    pub theme: Option<String>,

    /// Layout direction (TD or LR), overrides the config file
    #[arg(short = 'd', long = "direction")]
    pub direction: Option<String>,

    /// Write the computed layout as JSON to this path
    #[arg(long = "dumpLayout")]
    pub dump_layout: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    let input = read_input(args.input.as_deref())?;
    let value: Value = serde_json::from_str(&input).context("input is not valid JSON")?;

    let Some(workflow) = extract_workflow(&value) else {
        warn!("payload carries no workflow, nothing written");
        return Ok(());
    };
    let graph = normalize_value(workflow);
    if graph.is_empty() {
        warn!("workflow has no recognizable steps, nothing written");
        return Ok(());
    }

    let layout = compute_layout(&graph, &config.theme, &config.layout);
    info!(
        nodes = graph.nodes().len(),
        edges = graph.edges().len(),
        optimizable = graph.optimizable_count(),
        width = layout.width,
        height = layout.height,
        "laid out code flow"
    );
    if let Some(path) = args.dump_layout.as_deref() {
        write_layout_dump(path, &layout, &graph)?;
    }

    match args.output_format {
        OutputFormat::Svg => {
            let svg = render_svg(&layout, &graph, &config.theme);
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            write_output_png(graph, &config, &output)?;
        }
    }
    Ok(())
}

fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(name) = args.theme.as_deref() {
        let theme =
            Theme::from_name(name).ok_or_else(|| anyhow::anyhow!("unknown theme '{name}'"))?;
        config.theme = theme;
    }
    if let Some(token) = args.direction.as_deref() {
        config.layout.direction = Direction::from_token(token)
            .ok_or_else(|| anyhow::anyhow!("unknown direction '{token}'"))?;
    }
    Ok(config)
}

#[cfg(feature = "png")]
fn write_output_png(graph: crate::ir::CanonicalGraph, config: &Config, output: &Path) -> Result<()> {
    use crate::export::rasterize;
    use crate::surface::Surface;
    use crate::viewport::Viewport;

    let surface = Surface::new(
        graph,
        config.theme.clone(),
        &config.layout,
        Viewport::from_config(&config.view),
        &config.view,
    );
    let image = rasterize(&surface, config)?;
    std::fs::write(output, &image.png)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!(
        width = image.width,
        height = image.height,
        path = %output.display(),
        "wrote png"
    );
    Ok(())
}

#[cfg(not(feature = "png"))]
fn write_output_png(_graph: crate::ir::CanonicalGraph, _config: &Config, _output: &Path) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the 'png' feature"))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()));
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["cfgr"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn parses_flags() {
        let args = args(&["-i", "flow.json", "-e", "png", "-o", "flow.png", "--dumpLayout", "l.json"]);
        assert_eq!(args.output_format, OutputFormat::Png);
        assert_eq!(args.input.as_deref(), Some(Path::new("flow.json")));
        assert_eq!(args.dump_layout.as_deref(), Some(Path::new("l.json")));
    }

    #[test]
    fn theme_flag_overrides_config() {
        let config = resolve_config(&args(&["-t", "dark", "-d", "LR"])).expect("config");
        assert_eq!(config.theme.background, Theme::dark().background);
        assert_eq!(config.layout.direction, Direction::LeftRight);
    }

    #[test]
    fn unknown_theme_is_rejected() {
        assert!(resolve_config(&args(&["--theme", "neon"])).is_err());
    }

    #[test]
    fn png_requires_output_path() {
        assert!(ensure_output(&None, "png").is_err());
        assert!(ensure_output(&Some(PathBuf::from("a.png")), "png").is_ok());
    }
}
