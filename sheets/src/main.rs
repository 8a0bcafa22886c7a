//! biohub-sheets CLI - Validate and transform field-data spreadsheets
//!
//! # Main Commands
//!
//! ```bash
//! biohub-sheets validate moose.xlsx --schema validation.json
//! biohub-sheets transform moose.xlsx --schema transform.json --output-dir out/
//! biohub-sheets transform moose.xlsx --template "Moose SRB" --version 1.0 --format xlsx
//! biohub-sheets template list              # Manage stored schema templates
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! biohub-sheets parse moose.xlsx           # Dump worksheets as JSON rows
//! ```

use biohub_sheets::{
    transform, validate, MediaFile, TemplateRegistry, TransformOptions,
    TransformationSchemaParser, ValidationSchemaParser, Workbook,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "biohub-sheets")]
#[command(about = "Validate and transform field-data spreadsheets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a spreadsheet and output its worksheets as JSON
    Parse {
        /// Input CSV/XLSX file
        input: PathBuf,

        /// Only output this worksheet
        #[arg(short, long)]
        sheet: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a spreadsheet against a validation schema
    Validate {
        /// Input CSV/XLSX file
        input: PathBuf,

        #[command(flatten)]
        schema: SchemaArgs,

        /// Output file for the report (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Flatten, transform and partition a spreadsheet
    Transform {
        /// Input CSV/XLSX file
        input: PathBuf,

        #[command(flatten)]
        schema: SchemaArgs,

        /// Directory for output files (default: stdout, JSON only)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "csv")]
        format: OutputFormat,

        /// Upper bound on flattened row groups
        #[arg(long)]
        max_row_groups: Option<usize>,
    },

    /// Manage schema templates
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },
}

/// Where the schema comes from: a file, or a stored template.
#[derive(Args)]
struct SchemaArgs {
    /// Schema JSON file
    #[arg(long, conflicts_with = "template")]
    schema: Option<PathBuf>,

    /// Stored template name
    #[arg(short, long, requires = "version")]
    template: Option<String>,

    /// Template version
    #[arg(long)]
    version: Option<String>,

    /// Taxon-specific template variant
    #[arg(long)]
    taxon: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Xlsx,
    Json,
}

#[derive(Subcommand)]
enum TemplateAction {
    /// List all stored templates
    List,

    /// Import a template bundle JSON file
    Import {
        /// Bundle file: { name, version, taxon?, validationSchema?, transformSchema? }
        file: PathBuf,
    },

    /// Show details of a template
    Show {
        /// Template ID
        id: String,
    },

    /// Delete a template
    Delete {
        /// Template ID
        id: String,
    },
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse { input, sheet, output } => {
            cmd_parse(&input, sheet.as_deref(), output.as_deref())
        }

        Commands::Validate { input, schema, output } => {
            cmd_validate(&input, &schema, output.as_deref())
        }

        Commands::Transform {
            input,
            schema,
            output_dir,
            format,
            max_row_groups,
        } => cmd_transform(&input, &schema, output_dir.as_deref(), format, max_row_groups),

        Commands::Template { action } => cmd_template(action),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn mime_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("csv") => "text/csv",
        Some("txt") => "text/plain",
        Some("xlsx") | Some("xlsm") => {
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        }
        Some("xls") => "application/vnd.ms-excel",
        Some("ods") => "application/vnd.oasis.opendocument.spreadsheet",
        _ => "application/octet-stream",
    }
}

fn load_workbook(input: &Path) -> CliResult<Workbook> {
    eprintln!("📄 Reading: {}", input.display());
    let file_name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    let media = MediaFile::new(file_name, mime_type_for(input), fs::read(input)?);
    let workbook = Workbook::from_media(&media)?;

    for sheet in workbook.worksheets() {
        eprintln!("   {}: {} columns, {} rows", sheet.name(), sheet.headers().len(), sheet.row_count());
    }
    Ok(workbook)
}

/// Load the raw schema JSON named by `args`. `pick` selects the schema from
/// a stored template.
fn load_schema(
    args: &SchemaArgs,
    pick: fn(&biohub_sheets::StoredTemplate) -> Option<&serde_json::Value>,
) -> CliResult<serde_json::Value> {
    if let Some(path) = &args.schema {
        return Ok(serde_json::from_str(&fs::read_to_string(path)?)?);
    }

    let (Some(name), Some(version)) = (&args.template, &args.version) else {
        return Err("either --schema or --template with --version is required".into());
    };

    let mut registry = TemplateRegistry::new();
    let template = registry
        .find(name, version, args.taxon.as_deref())
        .ok_or_else(|| format!("Template not found: {} v{}", name, version))?;
    eprintln!("📋 Using template: {} ({})", template.name, template.id);

    let schema = pick(template)
        .cloned()
        .ok_or_else(|| format!("Template {} does not carry this schema", template.id))?;
    let id = template.id.clone();
    registry.record_use(&id)?;
    Ok(schema)
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

fn cmd_parse(input: &Path, sheet: Option<&str>, output: Option<&Path>) -> CliResult {
    let workbook = load_workbook(input)?;

    let mut sheets = IndexMap::new();
    for ws in workbook.worksheets() {
        if sheet.map_or(true, |name| name == ws.name()) {
            sheets.insert(ws.name().to_string(), ws.get_row_objects());
        }
    }
    if let Some(name) = sheet {
        if sheets.is_empty() {
            return Err(format!("Worksheet not found: {}", name).into());
        }
    }

    write_output(&serde_json::to_string_pretty(&sheets)?, output)
}

fn cmd_validate(input: &Path, schema: &SchemaArgs, output: Option<&Path>) -> CliResult {
    let parser = ValidationSchemaParser::from_value(load_schema(schema, |t| t.validation_schema.as_ref())?)?;
    let workbook = load_workbook(input)?;

    let report = validate(&workbook, &parser)?;
    write_output(&serde_json::to_string_pretty(&report)?, output)?;

    if !report.is_valid() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_transform(
    input: &Path,
    schema: &SchemaArgs,
    output_dir: Option<&Path>,
    format: OutputFormat,
    max_row_groups: Option<usize>,
) -> CliResult {
    let parser =
        TransformationSchemaParser::from_value(load_schema(schema, |t| t.transform_schema.as_ref())?)?;
    let workbook = load_workbook(input)?;

    let options = TransformOptions { max_row_groups };
    let output = transform(&parser, &workbook, &options)?;

    let Some(dir) = output_dir else {
        return write_output(&serde_json::to_string_pretty(&output.to_json())?, None);
    };
    fs::create_dir_all(dir)?;

    match format {
        OutputFormat::Csv => {
            for (entity, buffer) in output.to_csv_buffers()? {
                let path = dir.join(format!("{}.csv", entity));
                fs::write(&path, buffer)?;
                eprintln!("💾 {}", path.display());
            }
        }
        OutputFormat::Xlsx => {
            let path = dir.join("output.xlsx");
            fs::write(&path, output.to_xlsx_buffer()?)?;
            eprintln!("💾 {}", path.display());
        }
        OutputFormat::Json => {
            write_output(
                &serde_json::to_string_pretty(&output.to_json())?,
                Some(&dir.join("output.json")),
            )?;
        }
    }

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_template(action: TemplateAction) -> CliResult {
    let mut registry = TemplateRegistry::new();

    match action {
        TemplateAction::List => {
            let templates = registry.list();
            if templates.is_empty() {
                eprintln!("📋 No templates stored yet.");
                eprintln!("   Use 'biohub-sheets template import <file>' to add one.");
                return Ok(());
            }

            eprintln!("📋 Stored templates ({}):\n", templates.len());
            for t in templates {
                println!("  📄 {} v{} ({})", t.name, t.version, t.id);
                if let Some(ref taxon) = t.taxon {
                    println!("     Taxon: {}", taxon);
                }
                println!("     Uses: {}", t.use_count);
                if let Some(ref last) = t.last_used {
                    println!("     Last used: {}", last);
                }
                println!();
            }
        }

        TemplateAction::Import { file } => {
            eprintln!("📥 Importing template from: {}", file.display());
            let id = registry.import(&file)?;
            eprintln!("✅ Template saved with ID: {}", id);
        }

        TemplateAction::Show { id } => {
            let t = registry
                .get(&id)
                .ok_or_else(|| format!("Template not found: {}", id))?;
            println!("📄 Template: {} v{} ({})\n", t.name, t.version, t.id);
            println!("Taxon: {}", t.taxon.as_deref().unwrap_or("(any)"));
            println!("Created: {}", t.created_at);
            println!("Uses: {}", t.use_count);
            println!("\n{}", serde_json::to_string_pretty(t)?);
        }

        TemplateAction::Delete { id } => {
            registry.delete(&id)?;
            eprintln!("🗑️  Template deleted: {}", id);
        }
    }

    Ok(())
}
