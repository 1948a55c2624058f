use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use log::debug;

use stratus_core::config::Document;
use stratus_core::effect::Effect;
use stratus_core::interpreter::{EffectOutcome, Interpreter};
use stratus_core::plan::Plan;
use stratus_core::provider::Provider;
use stratus_core::resource::{ResourceAddress, State, StateMap, Value};
use stratus_core::schema::ResourceSchema;
use stratus_provider_azurerm::{AzureRmProvider, ProviderConfig, schemas};
use stratus_state::{LocalBackend, LockInfo, StateBackend, StateFile};

#[derive(Parser)]
#[command(name = "stratus")]
#[command(about = "Declarative Azure Resource Manager provisioning", long_about = None)]
struct Cli {
    /// Path to the state file
    #[arg(long, global = true, default_value = LocalBackend::DEFAULT_STATE_FILE)]
    state: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    credentials: Credentials,

    #[command(subcommand)]
    command: Commands,
}

/// Settings used when the document's provider block leaves them out
#[derive(clap::Args, Clone)]
struct Credentials {
    /// Azure subscription ID
    #[arg(long, global = true, env = "ARM_SUBSCRIPTION_ID")]
    subscription_id: Option<String>,

    /// Bearer token for the management endpoint
    #[arg(long, global = true, env = "ARM_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Management endpoint URL
    #[arg(long, global = true, env = "ARM_ENDPOINT")]
    endpoint: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration file
    Validate {
        #[arg(default_value = "main.json")]
        file: PathBuf,
    },
    /// Show execution plan without applying changes
    Plan {
        #[arg(default_value = "main.json")]
        file: PathBuf,
    },
    /// Apply changes to reach the desired state
    Apply {
        #[arg(default_value = "main.json")]
        file: PathBuf,
    },
    /// Destroy every resource in the state
    Destroy {
        #[arg(default_value = "main.json")]
        file: PathBuf,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Adopt an existing remote object under ADDRESS
    Import {
        /// Resource address, e.g. azurerm_resource_group.main
        address: String,
        /// ARM resource ID of the remote object
        id: String,
        /// Configuration file holding the provider block
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Re-read every resource in the state from Azure
    Refresh {
        /// Configuration file holding the provider block
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Inspect the state file
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
}

#[derive(Subcommand)]
enum StateCommands {
    /// List resource addresses in the state
    List,
    /// Show the stored attributes of one resource
    Show { address: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let backend = LocalBackend::with_path(cli.state);
    let credentials = cli.credentials;

    let result = match cli.command {
        Commands::Validate { file } => run_validate(&file),
        Commands::Plan { file } => run_plan(&file, &credentials, &backend).await,
        Commands::Apply { file } => run_apply(&file, &credentials, &backend).await,
        Commands::Destroy { file, auto_approve } => {
            run_destroy(&file, auto_approve, &credentials, &backend).await
        }
        Commands::Import { address, id, file } => {
            run_import(&address, &id, file.as_deref(), &credentials, &backend).await
        }
        Commands::Refresh { file } => run_refresh(file.as_deref(), &credentials, &backend).await,
        Commands::State { command } => run_state_command(command, &backend).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::new().filter_or("STRATUS_LOG", "warn"));
    let level = match verbose {
        0 => None,
        1 => Some(log::LevelFilter::Info),
        2 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    };
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.init();
}

fn get_schemas() -> HashMap<String, ResourceSchema> {
    schemas::all_schemas()
        .into_iter()
        .map(|schema| (schema.resource_type.clone(), schema))
        .collect()
}

fn load_document(file: &Path) -> Result<Document, String> {
    let content = fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
    Document::parse(&content).map_err(|e| format!("{}: {}", file.display(), e))
}

fn validate_document(
    document: &Document,
    schemas: &HashMap<String, ResourceSchema>,
) -> Result<(), String> {
    let errors = document.validate(schemas);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

fn get_provider(
    document: Option<&Document>,
    credentials: &Credentials,
) -> Result<AzureRmProvider, String> {
    let block = document.and_then(|d| d.provider_config("azurerm"));
    let config = ProviderConfig::from_value(block)
        .map_err(|e| e.to_string())?
        .with_fallbacks(
            credentials.subscription_id.clone(),
            credentials.access_token.clone(),
            credentials.endpoint.clone(),
        );
    AzureRmProvider::from_config(&config).map_err(|e| e.to_string())
}

async fn load_state(backend: &LocalBackend) -> Result<(StateFile, StateMap), String> {
    let file = backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_default();
    let states = file.to_state_map().map_err(|e| e.to_string())?;
    debug!(
        "Loaded {} resources from {} (serial {})",
        states.len(),
        backend.state_path().display(),
        file.serial
    );
    Ok((file, states))
}

async fn save_state(
    backend: &LocalBackend,
    mut file: StateFile,
    states: &StateMap,
) -> Result<(), String> {
    file.replace_resources(states);
    file.increment_serial();
    backend
        .write_state(&file)
        .await
        .map_err(|e| format!("Failed to write state: {}", e))
}

async fn acquire_lock(backend: &LocalBackend, operation: &str) -> Result<LockInfo, String> {
    backend
        .acquire_lock(operation)
        .await
        .map_err(|e| format!("Failed to lock state: {}", e))
}

/// Release the lock and keep the command's own error first
async fn release_lock<T>(
    backend: &LocalBackend,
    lock: &LockInfo,
    result: Result<T, String>,
) -> Result<T, String> {
    let released = backend
        .release_lock(lock)
        .await
        .map_err(|e| format!("Failed to release state lock: {}", e));
    match (result, released) {
        (Err(e), Err(release_err)) => Err(format!("{}\n{}", e, release_err)),
        (Err(e), Ok(())) => Err(e),
        (Ok(_), Err(release_err)) => Err(release_err),
        (Ok(value), Ok(())) => Ok(value),
    }
}

/// Re-read stored states and report resources deleted outside of Stratus
async fn refresh_states(
    interpreter: &Interpreter<AzureRmProvider>,
    states: &mut StateMap,
) -> Result<(), String> {
    let removed = interpreter
        .refresh(states)
        .await
        .map_err(|e| format!("Failed to refresh state: {}", e))?;
    for address in removed {
        println!(
            "  {} {} was deleted outside of Stratus",
            "!".yellow(),
            address
        );
    }
    Ok(())
}

fn run_validate(file: &Path) -> Result<(), String> {
    let document = load_document(file)?;
    validate_document(&document, &get_schemas())?;
    ProviderConfig::from_value(document.provider_config("azurerm"))
        .map_err(|e| e.to_string())?
        .timeouts()
        .map_err(|e| e.to_string())?;

    println!(
        "{}",
        format!(
            "Configuration is valid ({} resources).",
            document.resources.len()
        )
        .green()
    );
    Ok(())
}

async fn run_plan(
    file: &Path,
    credentials: &Credentials,
    backend: &LocalBackend,
) -> Result<(), String> {
    let document = load_document(file)?;
    let schemas = get_schemas();
    validate_document(&document, &schemas)?;

    let interpreter = Interpreter::new(get_provider(Some(&document), credentials)?);
    let (_, mut states) = load_state(backend).await?;
    refresh_states(&interpreter, &mut states).await?;

    let plan = document.plan(&states, &schemas);
    print_plan(&plan, &schemas);
    Ok(())
}

async fn run_apply(
    file: &Path,
    credentials: &Credentials,
    backend: &LocalBackend,
) -> Result<(), String> {
    let document = load_document(file)?;
    let schemas = get_schemas();
    validate_document(&document, &schemas)?;
    let interpreter = Interpreter::new(get_provider(Some(&document), credentials)?);

    let lock = acquire_lock(backend, "apply").await?;
    let result: Result<(), String> = async {
        let (state_file, mut states) = load_state(backend).await?;
        refresh_states(&interpreter, &mut states).await?;

        let plan = document.plan(&states, &schemas);
        if plan.is_empty() {
            println!("{}", "No changes needed.".green());
            return save_state(backend, state_file, &states).await;
        }

        print_plan(&plan, &schemas);
        println!();
        println!("{}", "Applying changes...".cyan().bold());
        println!();

        let outcome = execute(&interpreter, &plan, &mut states).await;
        // Progress made before a failure is kept
        save_state(backend, state_file, &states).await?;

        let (success_count, failure_count) = outcome;
        println!();
        if failure_count == 0 {
            println!(
                "{}",
                format!("Apply complete! {} changes applied.", success_count)
                    .green()
                    .bold()
            );
            Ok(())
        } else {
            Err(format!(
                "Apply failed. {} succeeded, {} failed.",
                success_count, failure_count
            ))
        }
    }
    .await;
    release_lock(backend, &lock, result).await
}

async fn run_destroy(
    file: &Path,
    auto_approve: bool,
    credentials: &Credentials,
    backend: &LocalBackend,
) -> Result<(), String> {
    let document = load_document(file)?;
    let interpreter = Interpreter::new(get_provider(Some(&document), credentials)?);

    let lock = acquire_lock(backend, "destroy").await?;
    let result: Result<(), String> = async {
        let (state_file, mut states) = load_state(backend).await?;
        refresh_states(&interpreter, &mut states).await?;

        let plan = document.destroy_plan(&states);
        if plan.is_empty() {
            println!("{}", "No resources to destroy.".yellow());
            return save_state(backend, state_file, &states).await;
        }

        print_plan(&plan, &get_schemas());
        println!();

        if !auto_approve && !confirm_destroy()? {
            println!();
            println!("{}", "Destroy cancelled.".yellow());
            return Ok(());
        }

        println!("{}", "Destroying resources...".red().bold());
        println!();

        let (success_count, failure_count) = execute(&interpreter, &plan, &mut states).await;
        save_state(backend, state_file, &states).await?;

        println!();
        if failure_count == 0 {
            println!(
                "{}",
                format!("Destroy complete! {} resources destroyed.", success_count)
                    .green()
                    .bold()
            );
            Ok(())
        } else {
            Err(format!(
                "Destroy failed. {} succeeded, {} failed.",
                success_count, failure_count
            ))
        }
    }
    .await;
    release_lock(backend, &lock, result).await
}

fn confirm_destroy() -> Result<bool, String> {
    println!(
        "{}",
        "Do you really want to destroy all resources?".yellow().bold()
    );
    println!(
        "  {}",
        "This action cannot be undone. Type 'yes' to confirm.".yellow()
    );
    print!("\n  Enter a value: ");
    std::io::Write::flush(&mut std::io::stdout()).map_err(|e| e.to_string())?;

    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .map_err(|e| e.to_string())?;
    Ok(input.trim() == "yes")
}

async fn run_import(
    address: &str,
    id: &str,
    file: Option<&Path>,
    credentials: &Credentials,
    backend: &LocalBackend,
) -> Result<(), String> {
    let address: ResourceAddress = address.parse().map_err(|e| format!("{}", e))?;
    let document = file.map(load_document).transpose()?;
    if let Some(document) = &document
        && document.resource(&address).is_none()
    {
        println!(
            "  {} {} is not declared in the configuration; the next plan will delete it",
            "!".yellow(),
            address
        );
    }

    let provider = get_provider(document.as_ref(), credentials)?;
    if provider.schema(&address.resource_type).is_none() {
        return Err(format!("Unknown resource type '{}'", address.resource_type));
    }

    let lock = acquire_lock(backend, "import").await?;
    let result: Result<(), String> = async {
        let (state_file, mut states) = load_state(backend).await?;
        if let Some(existing) = states.get(&address) {
            return Err(format!(
                "{} is already managed as {}",
                address,
                existing.identifier.as_deref().unwrap_or("(unknown)")
            ));
        }

        let state = provider
            .import(&address, id)
            .await
            .map_err(|e| format!("Import failed: {}", e))?;
        states.insert(address.clone(), state);
        save_state(backend, state_file, &states).await?;

        println!("{}", format!("Imported {}.", address).green().bold());
        Ok(())
    }
    .await;
    release_lock(backend, &lock, result).await
}

async fn run_refresh(
    file: Option<&Path>,
    credentials: &Credentials,
    backend: &LocalBackend,
) -> Result<(), String> {
    let document = file.map(load_document).transpose()?;
    let interpreter = Interpreter::new(get_provider(document.as_ref(), credentials)?);

    let lock = acquire_lock(backend, "refresh").await?;
    let result: Result<(), String> = async {
        let (state_file, mut states) = load_state(backend).await?;
        refresh_states(&interpreter, &mut states).await?;
        let count = states.len();
        save_state(backend, state_file, &states).await?;

        println!(
            "{}",
            format!("Refresh complete! {} resources in state.", count).green()
        );
        Ok(())
    }
    .await;
    release_lock(backend, &lock, result).await
}

async fn run_state_command(command: StateCommands, backend: &LocalBackend) -> Result<(), String> {
    let (_, states) = load_state(backend).await?;

    match command {
        StateCommands::List => {
            for address in states.keys() {
                println!("{}", address);
            }
            Ok(())
        }
        StateCommands::Show { address } => {
            let address: ResourceAddress = address.parse().map_err(|e| format!("{}", e))?;
            let state = states
                .get(&address)
                .ok_or_else(|| format!("{} is not in the state", address))?;
            print_state(state, get_schemas().get(&address.resource_type));
            Ok(())
        }
    }
}

/// Execute a plan and print one line per effect. Returns (succeeded, failed).
async fn execute(
    interpreter: &Interpreter<AzureRmProvider>,
    plan: &Plan,
    states: &mut StateMap,
) -> (usize, usize) {
    let result = interpreter.apply(plan, states).await;

    for (effect, outcome) in plan.effects().iter().zip(&result.outcomes) {
        match outcome {
            Ok(EffectOutcome::Skipped { reason, .. }) => {
                println!("  {} {} ({})", "-".dimmed(), format_effect(effect), reason);
            }
            Ok(_) => println!("  {} {}", "✓".green(), format_effect(effect)),
            Err(e) => println!("  {} {} - {}", "✗".red(), format_effect(effect), e),
        }
    }
    let skipped = plan.effects().len() - result.outcomes.len();
    if skipped > 0 {
        println!(
            "  {}",
            format!("{} remaining changes were not attempted.", skipped).dimmed()
        );
    }

    (result.success_count, result.failure_count)
}

fn print_plan(plan: &Plan, schemas: &HashMap<String, ResourceSchema>) {
    if plan.is_empty() {
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();

    for effect in plan.effects() {
        let schema = schemas.get(&effect.address().resource_type);
        match effect {
            Effect::Create(resource) => {
                println!("  {} {}", "+".green().bold(), resource.address);
                let mut keys: Vec<&String> = resource.attributes.keys().collect();
                keys.sort();
                for key in keys {
                    println!(
                        "      {}: {}",
                        key,
                        format_value(schema, key, &resource.attributes[key])
                    );
                }
            }
            Effect::Update {
                from,
                to,
                changed_attributes,
            } => {
                println!("  {} {}", "~".yellow().bold(), to.address);
                for key in changed_attributes {
                    println!(
                        "      {}: {} → {}",
                        key,
                        format_optional(schema, key, from.attributes.get(key)),
                        format_optional(schema, key, to.attributes.get(key)).yellow()
                    );
                }
            }
            Effect::Replace {
                from,
                to,
                forced_by,
            } => {
                println!("  {} {}", "-/+".magenta().bold(), to.address);
                for key in forced_by {
                    println!(
                        "      {}: {} → {} {}",
                        key,
                        format_optional(schema, key, from.attributes.get(key)),
                        format_optional(schema, key, to.attributes.get(key)).magenta(),
                        "(forces replacement)".dimmed()
                    );
                }
            }
            Effect::Delete(state) => {
                println!("  {} {}", "-".red().bold(), state.address);
                if let Some(id) = &state.identifier {
                    println!("      {}", id.dimmed());
                }
            }
        }
    }

    println!();
    println!("{}", plan.summary().to_string().bold());
}

fn print_state(state: &State, schema: Option<&ResourceSchema>) {
    println!("{}", state.address.to_string().cyan().bold());
    println!(
        "  id: {}",
        state.identifier.as_deref().unwrap_or("(unknown)")
    );
    let mut keys: Vec<&String> = state.attributes.keys().collect();
    keys.sort();
    for key in keys {
        println!(
            "  {}: {}",
            key,
            format_value(schema, key, &state.attributes[key])
        );
    }
}

fn format_effect(effect: &Effect) -> String {
    let verb = match effect {
        Effect::Create(_) => "Create",
        Effect::Update { .. } => "Update",
        Effect::Replace { .. } => "Replace",
        Effect::Delete(_) => "Delete",
    };
    format!("{} {}", verb, effect.address())
}

fn is_sensitive(schema: Option<&ResourceSchema>, key: &str) -> bool {
    schema
        .and_then(|s| s.get(key))
        .is_some_and(|attr| attr.sensitive)
}

fn format_value(schema: Option<&ResourceSchema>, key: &str, value: &Value) -> String {
    if is_sensitive(schema, key) {
        "(sensitive)".to_string()
    } else {
        value.render()
    }
}

fn format_optional(schema: Option<&ResourceSchema>, key: &str, value: Option<&Value>) -> String {
    match value {
        Some(value) => format_value(schema, key, value),
        None => "(none)".to_string(),
    }
}
