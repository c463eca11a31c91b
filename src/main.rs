use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::Parser;
use glob::glob;
use indicatif::ProgressStyle;
use kurbo::Point;
use miette::{IntoDiagnostic, Result, WrapErr, miette};
use rayon::prelude::*;
use rubify_text::{
    Annotator, GlossTable, Highlight, Paint, Rgba, RubyAlign, RubyStyle, RubyText, annotate_text,
    renderer::{font::FontMeasurer, outline::OutlineCanvas},
};
use rustc_hash::FxHashSet;
use tracing::{info, info_span};
use tracing_indicatif::{IndicatifLayer, span_ext::IndicatifSpanExt};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Family name the gloss font is registered under.
const GLOSS_FAMILY: &str = "gloss";

/// Render ruby markup files to SVG.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Input paths or glob patterns (can be repeated), e.g. 'texts/*.html'
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Output directory
    #[arg(short, long)]
    out_dir: PathBuf,

    /// Font file for the base text
    #[arg(long)]
    font: PathBuf,

    /// Optional font file for glosses; the base font is used otherwise
    #[arg(long)]
    gloss_font: Option<PathBuf>,

    /// Base font size in pixels
    #[arg(long, default_value_t = 32.0)]
    size: f64,

    /// Gloss size as a fraction of the base size, clamped to 0.3..=1.0
    #[arg(long, default_value_t = rubify_text::layout::DEFAULT_RATIO)]
    ratio: f64,

    /// Gap in pixels between the base text and its gloss
    #[arg(long, default_value_t = 0.0)]
    spacing: f64,

    /// Gloss alignment: start, center, end or distribute
    #[arg(long, default_value = "center")]
    align: RubyAlign,

    /// Gloss color, e.g. '#c00' or 'navy'
    #[arg(long)]
    gloss_color: Option<String>,

    /// Draw a highlight behind annotated text
    #[arg(long)]
    highlight: bool,

    #[arg(long, default_value = "#fff3b0")]
    highlight_color: String,

    #[arg(long, default_value_t = 4.0)]
    highlight_radius: f64,

    /// Place each gloss directly above its own base instead of on a
    /// baseline shared by the line
    #[arg(long)]
    tight: bool,

    /// Annotate plain text before rendering: 'pinyin', 'romaji', or the path
    /// of a gloss table ('<char> <gloss>' per line)
    #[arg(long)]
    annotate: Option<String>,
}

impl Cli {
    fn style(&self) -> Result<RubyStyle> {
        let color = |value: &str| {
            Rgba::parse(value).ok_or_else(|| miette!("Invalid color: {value:?}"))
        };

        let mut style = RubyStyle::default()
            .with_ratio(self.ratio)
            .with_spacing(self.spacing)
            .with_align(self.align);

        style.color = self.gloss_color.as_deref().map(color).transpose()?;
        style.tight = self.tight;

        if self.highlight {
            style.highlight = Some(Highlight {
                color: color(&self.highlight_color)?,
                radius: self.highlight_radius,
            });
        }

        if self.gloss_font.is_some() {
            style.font = Some(GLOSS_FAMILY.to_string());
        }

        Ok(style)
    }
}

fn annotator(name: &str) -> Result<Box<dyn Annotator>> {
    match name {
        #[cfg(feature = "pinyin")]
        "pinyin" => Ok(Box::new(rubify_text::annotate::pinyin::PinyinAnnotator::new())),
        #[cfg(feature = "romaji")]
        "romaji" => Ok(Box::new(rubify_text::annotate::romaji::RomajiAnnotator)),
        path => {
            let source = fs::read_to_string(path)
                .into_diagnostic()
                .wrap_err_with(|| miette!("Failed to read gloss table: {path:?}"))?;

            Ok(Box::new(GlossTable::parse(&source)))
        }
    }
}

fn main() -> Result<()> {
    let indicatif_layer = IndicatifLayer::new();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rubify_text=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stderr_writer()))
        .with(indicatif_layer)
        .init();

    let cli = Cli::parse();
    let style = cli.style()?;

    let annotator = cli.annotate.as_deref().map(annotator).transpose()?;

    let mut input_paths: FxHashSet<PathBuf> = FxHashSet::default();

    for pattern in &cli.inputs {
        let entries = glob(pattern)
            .into_diagnostic()
            .wrap_err_with(|| miette!("Failed to expand glob pattern: {pattern:?}"))?;

        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => {
                    input_paths.insert(path);
                }
                _ => {}
            }
        }
    }

    if input_paths.is_empty() {
        return Err(miette!("No input files found"));
    }

    if !cli.out_dir.exists() {
        fs::create_dir_all(&cli.out_dir)
            .into_diagnostic()
            .wrap_err_with(|| miette!("Failed to create out-dir: {:?}", cli.out_dir))?;
    }

    let font_data = fs::read(&cli.font)
        .into_diagnostic()
        .wrap_err_with(|| miette!("Failed to read font file: {:?}", cli.font))?;

    let gloss_font_data = match &cli.gloss_font {
        Some(path) => Some(
            fs::read(path)
                .into_diagnostic()
                .wrap_err_with(|| miette!("Failed to read gloss font file: {:?}", path))?,
        ),
        None => None,
    };

    let mut fonts = FontMeasurer::new(&font_data).map_err(|e| miette!("{e:#}"))?;

    if let Some(data) = &gloss_font_data {
        fonts = fonts
            .with_family(GLOSS_FAMILY, data)
            .map_err(|e| miette!("{e:#}"))?;
    }

    info!(
        "Rendering {} inputs -> {:?}...",
        input_paths.len(),
        cli.out_dir
    );

    let inputs_span = info_span!("render_inputs");
    inputs_span.pb_set_style(
        &ProgressStyle::with_template(
            "{msg} [{wide_bar:.cyan/blue}] {pos}/{len} [{elapsed_precise}]",
        )
        .into_diagnostic()?,
    );
    inputs_span.pb_set_length(input_paths.len() as u64);
    inputs_span.pb_set_message("Rendering inputs");

    let inputs_span_enter = inputs_span.enter();

    let job = Job {
        cli: &cli,
        style: &style,
        fonts: &fonts,
        annotator: annotator.as_deref(),
    };

    input_paths
        .par_iter()
        .try_for_each(|in_path| -> Result<()> {
            let out_path = out_path(&cli.out_dir, in_path)?;

            job.render(in_path, &out_path)?;
            inputs_span.pb_inc(1);
            inputs_span.pb_set_message(&format!("Rendered {}", in_path.display()));

            Ok(())
        })?;

    drop(inputs_span_enter);
    drop(inputs_span);

    info!("Done rendering inputs.");

    Ok(())
}

fn out_path(out_dir: &Path, in_path: &Path) -> Result<PathBuf> {
    let stem = in_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| miette!("Invalid file name: {:?}", in_path))?;

    Ok(out_dir.join(format!("{stem}.svg")))
}

/// Shared state for rendering one input file.
struct Job<'j> {
    cli: &'j Cli,
    style: &'j RubyStyle,
    fonts: &'j FontMeasurer<'j>,
    annotator: Option<&'j dyn Annotator>,
}

impl Job<'_> {
    fn render(&self, in_path: &Path, out_path: &Path) -> Result<()> {
        let mut markup = fs::read_to_string(in_path)
            .into_diagnostic()
            .wrap_err_with(|| miette!("Failed to read input file: {:?}", in_path))?;

        if let Some(annotator) = self.annotator {
            markup = annotate_text(&markup, annotator);
        }

        let margin = self.cli.size / 2.0;
        let mut text = RubyText::new(self.style.clone(), Paint::new(self.cli.size));
        text.set_markup(&markup);

        let mut canvas = OutlineCanvas::new(self.fonts);
        let text_box = text.render(Point::new(margin, margin), self.fonts, &mut canvas);

        let svg = canvas.to_svg(text_box.width + 2.0 * margin, text_box.height + 2.0 * margin);

        fs::write(out_path, svg)
            .into_diagnostic()
            .wrap_err_with(|| miette!("Failed to write output file: {:?}", out_path))?;

        info!("Wrote {:?}", out_path);

        Ok(())
    }
}
