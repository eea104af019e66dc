use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use watermark_studio::{
    Config,
    export::{self, BatchExporter, NamingMode, OutputFormat},
    import, startup_checks,
    templates::{Template, TemplateStore},
    watermark::{Anchor, Color, EditCommand, FontLibrary, Point, WatermarkEditor},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Global options that apply to all commands
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Overrides `app.log_level` from the config file
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watermark a single image and write the result
    Render {
        image: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Start from this template instead of the last used one
        #[arg(long)]
        template: Option<String>,

        #[command(flatten)]
        style: StyleArgs,
    },

    /// Watermark the active image and write it once per input
    Export {
        /// Image files or folders (scanned one level deep)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(short, long)]
        output_dir: PathBuf,

        /// Index of the imported image the watermark is rendered on
        #[arg(long, default_value_t = 0)]
        active: usize,

        #[arg(long)]
        naming: Option<NamingMode>,

        /// Custom prefix or suffix; empty means the naming mode's default
        #[arg(long)]
        affix: Option<String>,

        #[arg(long)]
        format: Option<OutputFormat>,

        #[arg(long)]
        template: Option<String>,

        /// Store the resulting settings under this name before exporting
        #[arg(long)]
        save_template: Option<String>,

        #[command(flatten)]
        style: StyleArgs,
    },

    /// Manage saved templates
    #[command(subcommand)]
    Template(TemplateCommands),
}

#[derive(Subcommand, Debug)]
enum TemplateCommands {
    /// List saved templates
    List,
    /// Print the settings stored in a template
    Show { name: String },
    /// Save the last used settings, modified by any style flags, under a name
    Save {
        name: String,

        /// Start from this template instead of the last used one
        #[arg(long)]
        from: Option<String>,

        #[command(flatten)]
        style: StyleArgs,
    },
    /// Delete a template
    Delete { name: String },
    /// Print the most recently saved template
    Last,
}

#[derive(Args, Debug)]
struct StyleArgs {
    #[arg(long)]
    text: Option<String>,

    /// Font family, e.g. "DejaVu Sans"
    #[arg(long)]
    font: Option<String>,

    /// Font size in points (8-120)
    #[arg(long)]
    size: Option<u32>,

    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    bold: Option<bool>,

    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    italic: Option<bool>,

    /// Text color as #RGB or #RRGGBB
    #[arg(long, value_parser = parse_color)]
    color: Option<Color>,

    /// 0 (invisible) to 255 (opaque)
    #[arg(long, allow_negative_numbers = true)]
    opacity: Option<i32>,

    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    shadow: Option<bool>,

    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    outline: Option<bool>,

    /// top-left, top-center, ..., bottom-right
    #[arg(long, conflicts_with = "position")]
    anchor: Option<Anchor>,

    /// Center of the text in image pixels, as X,Y
    #[arg(long, allow_hyphen_values = true)]
    position: Option<Point>,

    /// Degrees, clockwise (-180 to 180)
    #[arg(long, allow_negative_numbers = true)]
    rotation: Option<i32>,
}

fn parse_color(value: &str) -> Result<Color, String> {
    Color::parse_hex(value).map_err(|e| e.to_string())
}

impl StyleArgs {
    fn commands(&self, current_point: Option<Point>) -> Vec<EditCommand> {
        let mut commands = Vec::new();
        if let Some(text) = &self.text {
            commands.push(EditCommand::SetText(text.clone()));
        }
        if let Some(font) = &self.font {
            commands.push(EditCommand::SetFontFamily(font.clone()));
        }
        if let Some(size) = self.size {
            commands.push(EditCommand::SetFontSize(size));
        }
        if let Some(bold) = self.bold {
            commands.push(EditCommand::SetBold(bold));
        }
        if let Some(italic) = self.italic {
            commands.push(EditCommand::SetItalic(italic));
        }
        if let Some(color) = self.color {
            commands.push(EditCommand::SetColor(color));
        }
        if let Some(opacity) = self.opacity {
            commands.push(EditCommand::SetOpacity(opacity));
        }
        if let Some(shadow) = self.shadow {
            commands.push(EditCommand::SetShadow(shadow));
        }
        if let Some(outline) = self.outline {
            commands.push(EditCommand::SetOutline(outline));
        }
        if let Some(anchor) = self.anchor {
            commands.push(EditCommand::SetAnchor(anchor));
        }
        if let Some(target) = self.position {
            // Grab the watermark where it is and drop it on the target.
            commands.push(EditCommand::DragStart(current_point.unwrap_or(target)));
            commands.push(EditCommand::DragMove(target));
            commands.push(EditCommand::DragEnd);
        }
        if let Some(rotation) = self.rotation {
            commands.push(EditCommand::SetRotation(rotation));
        }
        commands
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    // Set up logging first
    let log_level = cli.log_level.as_deref().unwrap_or(&config.app.log_level);
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Configuration loaded from: {:?}", cli.config);
    let store = TemplateStore::new(&config.templates.directory);

    match cli.command {
        Commands::Template(cmd) => handle_template_command(cmd, &store),
        Commands::Render {
            image,
            output,
            template,
            style,
        } => {
            run_startup_checks(&config).await?;
            let mut editor = create_editor(&config, &store, template.as_deref())?;
            apply_style_args(&mut editor, &style);
            render_one(&config, &mut editor, image, &output)
        }
        Commands::Export {
            inputs,
            output_dir,
            active,
            naming,
            affix,
            format,
            template,
            save_template,
            style,
        } => {
            run_startup_checks(&config).await?;
            let mut editor = create_editor(&config, &store, template.as_deref())?;
            apply_style_args(&mut editor, &style);

            if let Some(name) = save_template {
                let (style, placement) = editor.snapshot();
                store.save(&name, &style, &placement)?;
                println!("Saved template '{}'", name);
            }

            let mut rule = config.export.rule(Some(output_dir));
            if let Some(naming) = naming {
                rule.naming_mode = naming;
            }
            if let Some(affix) = affix {
                rule.affix_text = affix;
            }
            if let Some(format) = format {
                rule.output_format = format;
            }

            run_export(&config, &mut editor, &inputs, active, &rule).await
        }
    }
}

fn load_config(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    if path.exists() {
        let config_content = std::fs::read_to_string(path)?;
        Ok(toml_edit::de::from_str::<Config>(&config_content)?)
    } else {
        Ok(Config::default())
    }
}

async fn run_startup_checks(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    match startup_checks::perform_startup_checks(config).await {
        Ok(()) => Ok(()),
        Err(errors) => {
            for error in &errors {
                tracing::error!("Startup check failed: {}", error);
            }
            if errors.iter().any(startup_checks::StartupCheckError::is_critical) {
                tracing::error!("Critical startup check failed, exiting");
                return Err("Critical startup check failed".into());
            }
            warn!("Non-critical startup checks failed, continuing");
            Ok(())
        }
    }
}

/// Editor seeded from `template`, else from the last used template, else defaults.
fn create_editor(
    config: &Config,
    store: &TemplateStore,
    template: Option<&str>,
) -> Result<WatermarkEditor, Box<dyn std::error::Error>> {
    let fonts = FontLibrary::load_directory(&config.fonts.directory, &config.fonts.default_family)?;
    info!("Loaded font families: {:?}", fonts.family_names());
    let mut editor = WatermarkEditor::new(Arc::new(fonts));
    seed_editor(&mut editor, store, template)?;
    Ok(editor)
}

fn seed_editor(
    editor: &mut WatermarkEditor,
    store: &TemplateStore,
    template: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let base = match template {
        Some(name) => Some(store.load(name)?),
        None => store.load_last()?,
    };
    if let Some(base) = base {
        editor.load_template(&base);
    }
    Ok(())
}

fn apply_style_args(editor: &mut WatermarkEditor, style: &StyleArgs) {
    for command in style.commands(editor.placement().custom_point()) {
        editor.apply(command);
    }
}

fn render_one(
    config: &Config,
    editor: &mut WatermarkEditor,
    image: PathBuf,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = output
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| ext.parse::<OutputFormat>().ok())
        .unwrap_or_default();

    editor.set_sources(vec![image.clone()])?;
    let rendered = editor.apply_watermark()?;

    let icc_profile = match format {
        OutputFormat::Jpeg if config.export.preserve_icc_profile => {
            export::formats::jpeg::extract_icc_profile(&image)
        }
        _ => None,
    };
    export::formats::save(
        &rendered,
        output,
        format,
        config.export.jpeg_quality.unwrap_or(90),
        icc_profile.as_deref(),
    )?;

    println!("Wrote {}", output.display());
    Ok(())
}

async fn run_export(
    config: &Config,
    editor: &mut WatermarkEditor,
    inputs: &[PathBuf],
    active: usize,
    rule: &export::ExportRule,
) -> Result<(), Box<dyn std::error::Error>> {
    let sources = import::collect_image_paths(inputs)?;
    if sources.is_empty() {
        return Err("No images found in the given inputs".into());
    }
    for path in &sources {
        match import::probe(path) {
            Ok(source) => info!(
                "Imported {:?} ({}x{})",
                source.path, source.width, source.height
            ),
            Err(e) => warn!("Cannot read dimensions of {:?}: {}", path, e),
        }
    }

    editor.set_sources(sources)?;
    if active != 0 {
        editor.select(active)?;
    }
    editor.apply_watermark()?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing files in progress");
            on_interrupt.cancel();
        }
    });

    let exporter = BatchExporter::from_config(&config.export);
    let report = editor.export(&exporter, rule, &cancel).await?;

    for path in &report.written {
        println!("Wrote {}", path.display());
    }
    for failure in &report.failed {
        eprintln!(
            "Failed {}: {}",
            failure.source.display(),
            failure.error
        );
    }
    println!("Export finished: {}", report.summary());

    if report.is_complete() {
        Ok(())
    } else {
        Err(format!("Export incomplete: {}", report.summary()).into())
    }
}

fn handle_template_command(
    cmd: TemplateCommands,
    store: &TemplateStore,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        TemplateCommands::List => {
            let names = store.list()?;
            if names.is_empty() {
                println!("No templates in {}", store.directory().display());
            } else {
                let last = store.last_used()?;
                for name in names {
                    let marker = if last.as_deref() == Some(name.as_str()) {
                        " (last used)"
                    } else {
                        ""
                    };
                    println!("  {}{}", name, marker);
                }
            }
        }
        TemplateCommands::Show { name } => {
            print_template(&store.load(&name)?);
        }
        TemplateCommands::Save { name, from, style } => {
            // Saving never renders, so no fonts are loaded.
            let mut editor = WatermarkEditor::new(Arc::new(FontLibrary::new("")));
            seed_editor(&mut editor, store, from.as_deref())?;
            apply_style_args(&mut editor, &style);
            let (style, placement) = editor.snapshot();
            store.save(&name, &style, &placement)?;
            println!("Saved template '{}'", name);
        }
        TemplateCommands::Delete { name } => {
            store.delete(&name)?;
            println!("Deleted template '{}'", name);
        }
        TemplateCommands::Last => match store.load_last()? {
            Some(template) => print_template(&template),
            None => println!("No last used template"),
        },
    }

    Ok(())
}

fn print_template(template: &Template) {
    let style = &template.style;
    let placement = &template.placement;
    println!("{}", template.name);
    println!("  text:      {:?}", style.text);
    println!(
        "  font:      {} {}pt{}{}",
        style.font_family,
        style.font_size_pt,
        if style.bold { " bold" } else { "" },
        if style.italic { " italic" } else { "" }
    );
    println!("  color:     {} (opacity {})", style.color, style.opacity);
    println!(
        "  effects:   shadow={} outline={}",
        style.shadow_enabled, style.outline_enabled
    );
    match (placement.anchor(), placement.custom_point()) {
        (Some(anchor), _) => println!("  placement: {}", anchor),
        (None, Some(point)) => println!("  placement: custom at {},{}", point.x, point.y),
        (None, None) => {}
    }
    println!("  rotation:  {}°", placement.rotation_degrees);
}
