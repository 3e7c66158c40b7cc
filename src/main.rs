use clap::{Parser, Subcommand};
use dialoguer::Input;
use filmstrip::collection::{CollectionDocument, DescriptorGenerator, format_photo_id};
use filmstrip::config::{self, PipelineConfig};
use filmstrip::imaging::{
    ChromaSubsampling, Effort, EncodeSettings, ImageConverter, OutputFormat, Quality, SizePlan,
    file_stem,
};
use filmstrip::metadata::{self, MetadataSidecar, PhotoMetadata, sidecar_path};
use filmstrip::{output, scan};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

type CliResult = Result<ExitCode, Box<dyn Error>>;

fn version_string() -> &'static str {
    let hash = env!("FILMSTRIP_GIT_HASH");
    if hash.is_empty() {
        env!("CARGO_PKG_VERSION")
    } else {
        // Leaked once at startup
        Box::leak(format!("{} ({hash})", env!("CARGO_PKG_VERSION")).into_boxed_str())
    }
}

#[derive(Parser)]
#[command(name = "filmstrip")]
#[command(about = "Photo pipeline: raw files in, web variants and collection YAML out")]
#[command(long_about = "\
Photo pipeline: raw files in, web variants and collection YAML out

Working layout (configurable in pipeline.toml):

  pipeline_artifacts/
  ├── raw/                          # Camera originals: DNG, CR2, NEF, JPEG, ...
  └── converted/
      ├── R0012110-thumbnail.avif   # 350px
      ├── R0012110-collection.avif  # 700px
      ├── R0012110-display.avif     # 1400px
      └── R0012110-metadata.json    # EXIF fields for collection entries
  src/data/collections/
  └── tokyo.yaml                    # Collection descriptor

A source counts as converted once its -thumbnail.avif exists.

Run 'filmstrip gen-config' to generate a documented pipeline.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Pipeline config file (missing file = stock defaults)
    #[arg(long, default_value = config::CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Encoder overrides for commands that convert images.
#[derive(clap::Args, Clone, Default)]
struct EncodeArgs {
    /// Lossy quality (1-100)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=100))]
    quality: Option<u32>,

    /// Encoder effort (0 = fastest, 9 = smallest)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=9))]
    effort: Option<u8>,
}

#[derive(clap::Args)]
struct ProcessArgs {
    /// Source image (raw or regular)
    input: PathBuf,

    /// Output directory [default: paths.converted_dir]
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[command(flatten)]
    encode: EncodeArgs,

    /// Thumbnail width in pixels
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    thumbnail_width: Option<u32>,

    /// Collection preview width in pixels
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    collection_width: Option<u32>,

    /// Display width in pixels
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    display_width: Option<u32>,

    /// Also generate 400w, 800w, 1600w variants
    #[arg(long)]
    responsive: bool,

    /// Chroma subsampling mode
    #[arg(long, value_enum, ignore_case = true)]
    subsample_mode: Option<ChromaSubsampling>,

    /// Embed the source's descriptive EXIF in outputs
    #[arg(long)]
    keep_metadata: bool,

    /// Skip the post-resize unsharp mask
    #[arg(long)]
    no_sharpen: bool,

    /// Output format
    #[arg(long, value_enum, ignore_case = true)]
    format: Option<OutputFormat>,
}

#[derive(clap::Args)]
struct GenerateYamlArgs {
    /// Directory holding *-thumbnail.avif files
    input_dir: PathBuf,

    /// Collection name (prompted when absent)
    #[arg(long)]
    collection_name: Option<String>,

    /// Collection description (prompted when absent)
    #[arg(long)]
    description: Option<String>,

    /// Output YAML path [default: {collections_dir}/{name}.yaml]
    #[arg(long)]
    output_file: Option<PathBuf>,

    /// Base URL of the variants, e.g. a CDN bucket
    #[arg(long)]
    base_url: Option<String>,

    /// Accept default titles without prompting
    #[arg(short, long)]
    yes: bool,
}

#[derive(clap::Args)]
struct QuickAddArgs {
    /// Source image (raw or regular)
    image: PathBuf,

    /// Photo title (prompted when absent)
    #[arg(long)]
    title: Option<String>,

    /// Append to {collections_dir}/{NAME}.yaml
    #[arg(long, value_name = "NAME")]
    collection: Option<String>,

    /// Accept the default title without prompting
    #[arg(short, long)]
    yes: bool,
}

#[derive(clap::Args)]
struct AddToCollectionArgs {
    /// Collection file name without extension, e.g. 'tokyo'
    #[arg(long, value_name = "NAME")]
    collection: String,

    /// Base URL of the variants
    #[arg(long)]
    base_url: Option<String>,

    #[command(flatten)]
    encode: EncodeArgs,

    /// Accept default titles without prompting
    #[arg(short, long)]
    yes: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Extract metadata and generate web variants for one image
    Process(ProcessArgs),
    /// Build a collection YAML from a directory of converted images
    GenerateYaml(GenerateYamlArgs),
    /// Convert one image and build its collection entry
    QuickAdd(QuickAddArgs),
    /// Convert new raw images and append them to a collection
    AddToCollection(AddToCollectionArgs),
    /// Print a stock pipeline.toml with all options documented
    GenConfig,
}

fn main() -> CliResult {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if matches!(cli.command, Command::GenConfig) {
        print!("{}", config::stock_config_toml());
        return Ok(ExitCode::SUCCESS);
    }

    let config = config::load_config(&cli.config)?;
    match cli.command {
        Command::Process(args) => run_process(&config, args),
        Command::GenerateYaml(args) => run_generate_yaml(&config, args),
        Command::QuickAdd(args) => run_quick_add(&config, args),
        Command::AddToCollection(args) => run_add_to_collection(&config, args),
        Command::GenConfig => Ok(ExitCode::SUCCESS),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn fail(message: impl std::fmt::Display) -> CliResult {
    eprintln!("Error: {message}");
    Ok(ExitCode::FAILURE)
}

/// Ask for a value, or take `default` straight away when `assume_yes`.
fn prompt(label: &str, default: &str, assume_yes: bool) -> Result<String, dialoguer::Error> {
    if assume_yes {
        return Ok(default.to_string());
    }
    Input::<String>::new()
        .with_prompt(label)
        .default(default.to_string())
        .allow_empty(true)
        .interact_text()
}

fn encode_settings(config: &PipelineConfig, overrides: &EncodeArgs) -> EncodeSettings {
    let mut settings = config.encoding.settings();
    if let Some(q) = overrides.quality {
        settings.quality = Quality::new(q);
    }
    if let Some(e) = overrides.effort {
        settings.effort = Effort::new(e);
    }
    settings
}

fn generator(config: &PipelineConfig, base_url: Option<&str>) -> DescriptorGenerator {
    DescriptorGenerator::new(base_url.unwrap_or(&config.collection.base_url))
        .with_collections_dir(&config.paths.collections_dir)
}

/// Extract, convert, report, and write the sidecar for one source.
fn convert_one(
    converter: &ImageConverter,
    source: &Path,
    output_dir: &Path,
    plan: &SizePlan,
    responsive: bool,
    format: OutputFormat,
) -> Result<PhotoMetadata, Box<dyn Error>> {
    let stem = file_stem(source);
    let dims = converter.identify(source)?;
    let metadata = metadata::extract(source)?;
    output::print_metadata_summary(&stem, dims, &metadata);

    let outputs =
        converter.generate_responsive_sizes(source, output_dir, format, Some(plan), responsive)?;
    let reports: Vec<_> = outputs
        .iter()
        .map(output::VariantReport::from_variant)
        .collect();
    output::print_variants(&reports);

    let sidecar = sidecar_path(output_dir, &stem);
    MetadataSidecar::from_metadata(&metadata).write(&sidecar)?;
    println!("{}", output::format_sidecar_written(&sidecar));
    log::info!("Converted {} into {} variants", source.display(), outputs.len());
    Ok(metadata)
}

/// Metadata for an already converted stem, from its sidecar when one exists.
/// An unreadable sidecar is reported and skipped.
fn sidecar_metadata(converted_dir: &Path, stem: &str) -> PhotoMetadata {
    let mut metadata = PhotoMetadata::default();
    match MetadataSidecar::read_if_exists(&sidecar_path(converted_dir, stem)) {
        Ok(Some(sidecar)) => sidecar.apply_to(&mut metadata),
        Ok(None) => log::debug!("No metadata sidecar for {stem}"),
        Err(e) => eprintln!("Warning: could not load metadata for {stem}: {e}"),
    }
    metadata
}

fn run_process(config: &PipelineConfig, args: ProcessArgs) -> CliResult {
    if !args.input.exists() {
        return fail(format!("File not found: {}", args.input.display()));
    }

    let mut settings = encode_settings(config, &args.encode);
    if let Some(mode) = args.subsample_mode {
        settings.subsampling = mode;
    }
    if args.keep_metadata {
        settings.strip_metadata = false;
    }
    if args.no_sharpen {
        settings.sharpen = false;
    }

    let mut plan = config.sizes.plan();
    for (label, width) in [
        ("thumbnail", args.thumbnail_width),
        ("collection", args.collection_width),
        ("display", args.display_width),
    ] {
        if let Some(w) = width {
            plan.set(label, w);
        }
    }

    let output_dir = args
        .output_dir
        .unwrap_or_else(|| config.paths.converted_dir.clone());
    let converter = ImageConverter::new(settings);
    convert_one(
        &converter,
        &args.input,
        &output_dir,
        &plan,
        args.responsive || config.sizes.responsive,
        args.format.unwrap_or(config.encoding.format),
    )?;
    Ok(ExitCode::SUCCESS)
}

fn run_generate_yaml(config: &PipelineConfig, args: GenerateYamlArgs) -> CliResult {
    if !args.input_dir.is_dir() {
        return fail(format!("Directory not found: {}", args.input_dir.display()));
    }
    let stems = scan::converted_stems(&args.input_dir)?;
    if stems.is_empty() {
        return fail(format!("No images found in {}", args.input_dir.display()));
    }
    println!("Found {} images", stems.len());

    let default_name = args
        .input_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match args.collection_name {
        Some(name) => name,
        None => prompt("Collection name", &default_name, args.yes)?,
    };
    let description = match args.description {
        Some(description) => description,
        None => prompt("Collection description", "", args.yes)?,
    };

    let generator = generator(config, args.base_url.as_deref());
    let mut document = CollectionDocument::new(name, description);
    for (i, stem) in stems.iter().enumerate() {
        let metadata = sidecar_metadata(&args.input_dir, stem);
        let title = prompt(&format!("Title for {stem}"), stem, args.yes)?;
        let entry = generator.create_photo_entry(&format_photo_id(i as u64 + 1), &title, &metadata, stem);
        output::print_entry_summary(&entry);
        document.push(entry);
    }

    let path = generator.generate_collection(
        &document.collection,
        &document.description,
        document.photos.clone(),
        args.output_file.as_deref(),
    )?;
    output::print_collection_summary(&document, document.len(), &path);
    Ok(ExitCode::SUCCESS)
}

fn run_quick_add(config: &PipelineConfig, args: QuickAddArgs) -> CliResult {
    if !args.image.exists() {
        return fail(format!("File not found: {}", args.image.display()));
    }
    let generator = generator(config, None);
    let collection_path = args
        .collection
        .as_deref()
        .map(|name| generator.named_collection_path(name));
    if let Some(path) = collection_path.as_deref().filter(|p| !p.exists()) {
        return fail(format!("Collection file not found: {}", path.display()));
    }

    let stem = file_stem(&args.image);
    let converter = ImageConverter::new(config.encoding.settings());
    let metadata = convert_one(
        &converter,
        &args.image,
        &config.paths.converted_dir,
        &config.sizes.plan(),
        config.sizes.responsive,
        OutputFormat::Avif,
    )?;

    let title = match args.title {
        Some(title) => title,
        None => prompt("Photo title", &stem, args.yes)?,
    };

    let Some(path) = collection_path else {
        let entry = generator.create_photo_entry(&format!("photo-{stem}"), &title, &metadata, &stem);
        output::print_entry_summary(&entry);
        return Ok(ExitCode::SUCCESS);
    };

    let mut document = CollectionDocument::load(&path)?;
    if document.contains_stem(&stem) {
        println!("{stem} is already in {}", document.collection);
        return Ok(ExitCode::SUCCESS);
    }
    let entry = generator.create_photo_entry(&document.next_photo_id(), &title, &metadata, &stem);
    output::print_entry_summary(&entry);
    document.push(entry);
    document.save(&path)?;
    output::print_collection_summary(&document, 1, &path);
    Ok(ExitCode::SUCCESS)
}

fn run_add_to_collection(config: &PipelineConfig, args: AddToCollectionArgs) -> CliResult {
    let generator = generator(config, args.base_url.as_deref());
    let path = generator.named_collection_path(&args.collection);
    if !path.exists() {
        return fail(format!("Collection file not found: {}", path.display()));
    }

    let raw_dir = &config.paths.raw_dir;
    let converted_dir = &config.paths.converted_dir;
    if !raw_dir.is_dir() || scan::source_images(raw_dir)?.is_empty() {
        return fail(format!("No raw images found in {}", raw_dir.display()));
    }

    let pending = scan::unconverted_sources(raw_dir, converted_dir)?;
    if pending.is_empty() {
        println!("No new images to process");
    } else {
        println!("Found {} new image(s) to process", pending.len());
        let converter = ImageConverter::new(encode_settings(config, &args.encode));
        let plan = config.sizes.plan();
        for source in &pending {
            convert_one(
                &converter,
                source,
                converted_dir,
                &plan,
                config.sizes.responsive,
                OutputFormat::Avif,
            )?;
        }
    }

    let stems = scan::converted_stems(converted_dir)?;
    if stems.is_empty() {
        return fail(format!("No images found in {}", converted_dir.display()));
    }

    let mut document = CollectionDocument::load(&path)?;
    println!("Collection has {} photos", document.len());
    let new_stems: Vec<&String> = stems.iter().filter(|s| !document.contains_stem(s)).collect();
    if new_stems.is_empty() {
        println!("No new images to add");
        return Ok(ExitCode::SUCCESS);
    }
    println!("Found {} new image(s) to add", new_stems.len());

    for stem in &new_stems {
        let metadata = sidecar_metadata(converted_dir, stem);
        let title = prompt(&format!("Title for {stem}"), stem, args.yes)?;
        let entry = generator.create_photo_entry(&document.next_photo_id(), &title, &metadata, stem);
        output::print_entry_summary(&entry);
        document.push(entry);
    }

    document.save(&path)?;
    output::print_collection_summary(&document, new_stems.len(), &path);
    Ok(ExitCode::SUCCESS)
}
