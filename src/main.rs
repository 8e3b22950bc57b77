//! Atlantis samconfig generator CLI
//!
//! Entry point for the `atlantis-config` command-line tool.

use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process;

use atlantis_config::workflow::{self, Request};
use atlantis_config::{logging, FileStackSource, Layout, ShellError};
use atlantis_core::reconcile::{Conflict, ConflictResolver, Resolution};
use atlantis_core::{DiffReport, InfraType, Tag, TagSet};

#[derive(Parser)]
#[command(name = "atlantis-config")]
#[command(about = "Generate and reconcile samconfig files for Atlantis stacks", version)]
struct Cli {
    /// Working directory holding defaults/, local-templates/ and samconfigs/
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Defaults directory (default: <root>/defaults)
    #[arg(long, global = true)]
    defaults_dir: Option<PathBuf>,

    /// Templates directory (default: <root>/local-templates)
    #[arg(long, global = true)]
    templates_dir: Option<PathBuf>,

    /// samconfig output directory (default: <root>/samconfigs)
    #[arg(long, global = true)]
    samconfig_dir: Option<PathBuf>,

    /// Deployed stack observations (default: <root>/stacks)
    #[arg(long, global = true)]
    stacks_dir: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Stack identity shared by the stack-scoped subcommands
#[derive(clap::Args)]
struct StackArgs {
    /// Infrastructure type
    #[arg(value_parser = parse_infra_type)]
    infra_type: InfraType,

    /// Application prefix
    prefix: String,

    /// Project id (for service-role: the infrastructure type it serves)
    project_id: String,

    /// Stage id (optional for service-role and storage)
    stage_id: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Prefer {
    Local,
    Remote,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate or update the samconfig for a stack
    Generate {
        #[command(flatten)]
        stack: StackArgs,

        /// AWS profile written into deploy commands
        #[arg(long, default_value = "default")]
        profile: String,

        /// Compare against the deployed stack first
        #[arg(long)]
        check_stack: bool,

        /// Template file in local-templates/<infra_type>/
        #[arg(long, short = 't')]
        template: Option<String>,

        /// Template parameter value
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        values: Vec<(String, String)>,

        /// Deploy parameter (s3_bucket, region, confirm_changeset, role_arn)
        #[arg(long = "deploy", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        deploy: Vec<(String, String)>,

        /// Additional tag
        #[arg(long = "tag", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        tags: Vec<(String, String)>,

        /// Copy deploy parameters into every existing stage
        #[arg(long)]
        apply_to_all: bool,

        /// How to settle differences with the deployed stack
        #[arg(long, value_enum)]
        prefer: Option<Prefer>,
    },

    /// Compare the local samconfig with the deployed stack
    Diff {
        #[command(flatten)]
        stack: StackArgs,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show resolved defaults and the files they came from
    Defaults {
        #[command(flatten)]
        stack: StackArgs,
    },

    /// Validate values against a template's parameters
    Validate {
        /// Template file
        #[arg(long, short = 't')]
        template: PathBuf,

        /// Value to check
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        values: Vec<(String, String)>,
    },
}

fn parse_infra_type(s: &str) -> Result<InfraType, String> {
    s.parse().map_err(|e: atlantis_core::ConfigError| e.to_string())
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

/// Settles conflicts from `--prefer`, printing the field report.
struct CliResolver {
    prefer: Option<Prefer>,
}

impl ConflictResolver for CliResolver {
    fn resolve(&mut self, conflict: Conflict, report: &DiffReport) -> Resolution {
        match conflict {
            Conflict::Differs => {
                eprintln!("Local configuration differs from the deployed stack:");
                eprintln!("{}", report);
            }
            Conflict::RemoteOnly => {
                eprintln!(
                    "No local samconfig, but a deployed stack exists for stage {}",
                    report.stage
                );
            }
        }
        match self.prefer {
            Some(Prefer::Local) => Resolution::UseLocal,
            Some(Prefer::Remote) => Resolution::UseRemote,
            None => {
                eprintln!("Re-run with --prefer local or --prefer remote");
                Resolution::Cancel
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let layout = layout(&cli);

    match cli.command {
        Commands::Generate {
            stack,
            profile,
            check_stack,
            template,
            values,
            deploy,
            tags,
            apply_to_all,
            prefer,
        } => {
            let mut request = request(stack);
            request.profile = profile;
            request.check_stack = check_stack;
            request.template = template;
            request.values = values.into_iter().collect();
            request.deploy = deploy.into_iter().collect();
            request.tags = tags.into_iter().map(|(k, v)| Tag::new(k, v)).collect::<TagSet>();
            request.apply_to_all = apply_to_all;
            run_generate(&layout, &request, prefer);
        }
        Commands::Diff { stack, json } => {
            run_diff(&layout, &request(stack), json);
        }
        Commands::Defaults { stack } => {
            run_defaults(&layout, &request(stack));
        }
        Commands::Validate { template, values } => {
            run_validate(&template, values.into_iter().collect());
        }
    }
}

fn layout(cli: &Cli) -> Layout {
    let mut layout = Layout::new(&cli.root);
    if let Some(ref dir) = cli.defaults_dir {
        layout = layout.with_defaults_dir(dir);
    }
    if let Some(ref dir) = cli.templates_dir {
        layout = layout.with_templates_dir(dir);
    }
    if let Some(ref dir) = cli.samconfig_dir {
        layout = layout.with_samconfig_dir(dir);
    }
    if let Some(ref dir) = cli.stacks_dir {
        layout = layout.with_stacks_dir(dir);
    }
    layout
}

fn request(stack: StackArgs) -> Request {
    let mut request = Request::new(stack.infra_type, stack.prefix);
    request.project_id = Some(stack.project_id);
    request.stage_id = stack.stage_id;
    request
}

fn fail(e: ShellError) -> ! {
    if e.is_cancelled() {
        eprintln!("Cancelled, nothing was written");
    } else {
        eprintln!("Error: {}", e);
    }
    process::exit(1);
}

fn run_generate(layout: &Layout, request: &Request, prefer: Option<Prefer>) {
    let remote = FileStackSource::new(&layout.stacks_dir);
    let mut resolver = CliResolver { prefer };

    match workflow::generate(layout, request, &remote, &mut resolver) {
        Ok(generated) => {
            println!("Configuration saved to {}", generated.path.display());
            println!();
            println!("  Stack: {}", generated.context.stack_name());
            println!(
                "  Stages: {}",
                generated
                    .snapshot
                    .deployments
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            if !generated.defaults.sources.is_empty() {
                println!("  Defaults: {} file(s)", generated.defaults.sources.len());
            }
        }
        Err(e) => fail(e),
    }
}

fn run_diff(layout: &Layout, request: &Request, json: bool) {
    let remote = FileStackSource::new(&layout.stacks_dir);

    let report = match workflow::diff(layout, request, &remote) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(2);
            }
        }
    } else {
        print!("{}", report);
    }

    // Exit with appropriate code
    if report.has_differences {
        process::exit(1);
    }
}

fn run_defaults(layout: &Layout, request: &Request) {
    let defaults = match workflow::defaults(layout, request) {
        Ok(defaults) => defaults,
        Err(e) => fail(e),
    };
    match defaults.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn run_validate(template: &Path, values: BTreeMap<String, String>) {
    match workflow::validate_values(template, &values) {
        Ok(violations) if violations.is_empty() => {
            println!("All {} value(s) valid", values.len());
        }
        Ok(violations) => {
            for violation in &violations {
                eprintln!("{}", violation);
            }
            process::exit(1);
        }
        Err(e) => fail(e),
    }
}
