use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use log::{LevelFilter, debug};
use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};
use tokio_util::sync::CancellationToken;

use armada_core::differ::Diff;
use armada_core::lifecycle::Lifecycle;
use armada_core::provider::Provider;
use armada_core::resource::{Resource, ResourceAddress, State, Value};
use armada_core::resource_id::ArmResourceId;
use armada_core::schema::ResourceSchema;
use armada_provider_azurerm::{Environment, Features, ProviderConfig, ProviderContext};

/// Placeholder subscription for commands that never reach Azure
const OFFLINE_SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";

#[derive(Parser)]
#[command(name = "armada")]
#[command(about = "Manage AzureRM resources through Resource Manager", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct GlobalArgs {
    /// Subscription resources are managed in
    #[arg(long, env = "ARM_SUBSCRIPTION_ID", global = true)]
    subscription_id: Option<String>,

    /// Bearer token for Resource Manager
    #[arg(long, env = "ARM_ACCESS_TOKEN", hide_env_values = true, global = true)]
    access_token: Option<String>,

    #[arg(long, env = "ARM_TENANT_ID", global = true)]
    tenant_id: Option<String>,

    #[arg(long, env = "ARM_CLIENT_ID", global = true)]
    client_id: Option<String>,

    /// Azure cloud: public, usgovernment or china
    #[arg(long, env = "ARM_ENVIRONMENT", default_value = "public", global = true)]
    environment: Environment,

    /// Override the Resource Manager endpoint
    #[arg(long, env = "ARM_ENDPOINT", global = true)]
    endpoint: Option<String>,

    /// Adopt existing resources on create instead of asking for an import
    #[arg(long, env = "ARM_IMPORT_EXISTING_ON_CREATE", global = true)]
    import_existing_on_create: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a resource document against its schema
    Validate {
        /// Path to resource document (JSON)
        file: PathBuf,
    },
    /// Show what apply would change
    Plan {
        /// Path to resource document (JSON)
        file: PathBuf,
    },
    /// Create or update the resource to match the document
    Apply {
        /// Path to resource document (JSON)
        file: PathBuf,
    },
    /// Print the remote state of the resource
    Read {
        /// Path to resource document (JSON)
        file: PathBuf,
    },
    /// Adopt an existing resource by its ID
    Import {
        /// Resource type, e.g. azurerm_resource_group
        resource_type: String,
        /// Local name for the resource
        name: String,
        /// ARM resource ID
        id: String,
    },
    /// Delete the resource the document points at
    Destroy {
        /// Path to resource document (JSON)
        file: PathBuf,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Break an ARM resource ID into its parts
    ParseId {
        id: String,
    },
    /// List resource types, or show the attributes of one
    Schema {
        resource_type: Option<String>,
    },
}

/// A single resource as read from and written to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Document {
    #[serde(rename = "type")]
    resource_type: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    /// Read through the data source instead of managing the resource
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    data: bool,
    #[serde(default)]
    attributes: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn save(&self, path: &Path) -> Result<()> {
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    fn address(&self) -> ResourceAddress {
        ResourceAddress::new(&self.resource_type, &self.name)
    }

    fn to_resource(&self) -> Resource {
        let mut resource =
            Resource::new(&self.resource_type, &self.name).with_read_only(self.data);
        for (key, value) in &self.attributes {
            if let Some(value) = Value::from_json(value) {
                resource.attributes.insert(key.clone(), value);
            }
        }
        resource
    }

    fn require_id(&self) -> Result<&str> {
        self.id
            .as_deref()
            .ok_or_else(|| anyhow!("{} has no id; apply or import it first", self.address()))
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted, cancelling in-flight operations...".yellow());
            on_signal.cancel();
        }
    });

    let result = run(cli, cancel).await;
    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(LevelFilter::Trace);
        }
    }
    builder.init();
}

async fn run(cli: Cli, cancel: CancellationToken) -> Result<()> {
    let global = cli.global;
    match cli.command {
        Commands::Validate { file } => run_validate(&offline_provider(&global, cancel)?, &file),
        Commands::Plan { file } => run_plan(&connect(&global, cancel)?, &file).await,
        Commands::Apply { file } => run_apply(&connect(&global, cancel)?, &file).await,
        Commands::Read { file } => run_read(&connect(&global, cancel)?, &file).await,
        Commands::Import {
            resource_type,
            name,
            id,
        } => run_import(&connect(&global, cancel)?, &resource_type, &name, &id).await,
        Commands::Destroy { file, auto_approve } => {
            run_destroy(&connect(&global, cancel)?, &file, auto_approve).await
        }
        Commands::ParseId { id } => run_parse_id(&id),
        Commands::Schema { resource_type } => {
            run_schema(&offline_provider(&global, cancel)?, resource_type.as_deref())
        }
    }
}

fn provider_config(global: &GlobalArgs, subscription_id: &str, access_token: &str) -> ProviderConfig {
    let mut config = ProviderConfig::new(subscription_id, access_token)
        .with_environment(global.environment)
        .with_features(Features {
            import_existing_on_create: global.import_existing_on_create,
        });
    if let Some(tenant_id) = &global.tenant_id {
        config = config.with_tenant_id(tenant_id);
    }
    if let Some(client_id) = &global.client_id {
        config = config.with_client_id(client_id);
    }
    if let Some(endpoint) = &global.endpoint {
        config = config.with_endpoint(endpoint);
    }
    config
}

/// Provider wired to Resource Manager with the caller's credentials
fn connect(global: &GlobalArgs, cancel: CancellationToken) -> Result<Lifecycle<ProviderContext>> {
    let subscription_id = global
        .subscription_id
        .as_deref()
        .ok_or_else(|| anyhow!("--subscription-id or ARM_SUBSCRIPTION_ID must be set"))?;
    let access_token = global
        .access_token
        .as_deref()
        .ok_or_else(|| anyhow!("--access-token or ARM_ACCESS_TOKEN must be set"))?;

    let config = provider_config(global, subscription_id, access_token);
    debug!("connecting with {:?}", config);
    Ok(armada_provider_azurerm::from_config(&config, cancel)?)
}

/// Provider for schema-only commands; no request is ever sent
fn offline_provider(
    global: &GlobalArgs,
    cancel: CancellationToken,
) -> Result<Lifecycle<ProviderContext>> {
    let subscription_id = global.subscription_id.as_deref().unwrap_or(OFFLINE_SUBSCRIPTION);
    let config = provider_config(global, subscription_id, "");
    Ok(armada_provider_azurerm::from_config(&config, cancel)?)
}

fn run_validate(provider: &dyn Provider, file: &Path) -> Result<()> {
    println!("{}", "Validating...".cyan());
    let document = Document::load(file)?;
    provider.validate(&document.to_resource())?;
    println!(
        "{}",
        format!("✓ {} validated successfully.", document.address())
            .green()
            .bold()
    );
    Ok(())
}

/// Current remote state of the document's resource
async fn current_state(provider: &dyn Provider, document: &Document) -> Result<State> {
    let address = document.address();
    match &document.id {
        Some(id) => Ok(provider.read(&address, id).await?),
        None => Ok(State::not_found(address)),
    }
}

fn schema_for(provider: &dyn Provider, resource_type: &str) -> Result<ResourceSchema> {
    provider
        .schema(resource_type)
        .ok_or_else(|| anyhow!("Unknown resource type: {}", resource_type))
}

/// Configured attributes laid over the current state, for display
fn desired_json(resource: &Resource, current: &State) -> serde_json::Value {
    let mut attributes = current.attributes.clone();
    attributes.extend(resource.attributes.clone());
    Value::Map(attributes).to_json()
}

/// Diff the document against the remote state; defaults and normalizers
/// are applied by the provider before comparing
fn compute_plan(
    provider: &dyn Provider,
    resource: &Resource,
    current: &State,
) -> Result<Diff> {
    Ok(provider.plan(resource, current)?)
}

async fn run_plan(provider: &dyn Provider, file: &Path) -> Result<()> {
    let document = Document::load(file)?;
    if document.data {
        bail!("{} is a data source and has no plan", document.address());
    }
    let resource = document.to_resource();
    println!("{}", "Refreshing state...".cyan());
    let current = current_state(provider, &document).await?;
    let plan = compute_plan(provider, &resource, &current)?;
    print_plan(&resource, &current, &plan);
    Ok(())
}

fn print_plan(resource: &Resource, current: &State, plan: &Diff) {
    let address = &resource.address;
    match plan {
        Diff::NoChange => {
            println!("{}", "No changes. Infrastructure is up-to-date.".green());
            return;
        }
        Diff::Create => println!("{} {} will be created", "+".green().bold(), address),
        Diff::Update { changed } => println!(
            "{} {} will be updated in-place ({})",
            "~".yellow().bold(),
            address,
            changed.join(", ")
        ),
        Diff::Replace { changed } => println!(
            "{} {} must be replaced ({})",
            "-/+".red().bold(),
            address,
            changed.join(", ")
        ),
    }

    println!("\n{}", "Execution Plan:".cyan().bold());
    let before = if current.exists {
        pretty(&Value::Map(current.attributes.clone()).to_json())
    } else {
        String::new()
    };
    let after = pretty(&desired_json(resource, current));
    print_diff(&before, &after);
}

fn pretty(json: &serde_json::Value) -> String {
    let mut out = serde_json::to_string_pretty(json).unwrap_or_default();
    out.push('\n');
    out
}

fn print_diff(before: &str, after: &str) {
    let diff = TextDiff::from_lines(before, after);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-".red(),
            ChangeTag::Insert => "+".green(),
            ChangeTag::Equal => " ".normal(),
        };
        print!("{}{}", sign, change);
    }
}

async fn run_apply(provider: &dyn Provider, file: &Path) -> Result<()> {
    let mut document = Document::load(file)?;
    if document.data {
        bail!("{} is a data source and cannot be applied", document.address());
    }
    let resource = document.to_resource();
    let current = current_state(provider, &document).await?;
    let plan = compute_plan(provider, &resource, &current)?;
    print_plan(&resource, &current, &plan);

    let state = match &plan {
        Diff::NoChange => return Ok(()),
        Diff::Create => {
            println!("\n{}", "Creating...".cyan());
            provider.create(&resource).await?
        }
        Diff::Update { .. } => {
            println!("\n{}", "Updating...".cyan());
            let id = document.require_id()?;
            provider.update(id, &current, &resource).await?
        }
        Diff::Replace { .. } => {
            println!("\n{}", "Replacing...".cyan());
            let id = document.require_id()?;
            provider.delete(&resource.address, id).await?;
            provider.create(&resource).await?
        }
    };

    if state.id != document.id {
        document.id = state.id.clone();
        document.save(file)?;
        debug!("recorded id of {} in {}", document.address(), file.display());
    }
    println!(
        "{}",
        format!("✓ {} applied.", document.address()).green().bold()
    );
    println!("{}", serde_json::to_string_pretty(&state.to_json())?);
    Ok(())
}

async fn run_read(provider: &dyn Provider, file: &Path) -> Result<()> {
    let document = Document::load(file)?;
    let state = if document.data {
        provider.read_data_source(&document.to_resource()).await?
    } else {
        provider.read(&document.address(), document.require_id()?).await?
    };
    if !state.exists {
        println!(
            "{}",
            format!("{} no longer exists.", document.address()).yellow()
        );
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&state.to_json())?);
    Ok(())
}

async fn run_import(
    provider: &dyn Provider,
    resource_type: &str,
    name: &str,
    id: &str,
) -> Result<()> {
    let address = ResourceAddress::new(resource_type, name);
    println!("{}", format!("Importing {}...", address).cyan());
    let state = provider.import(&address, id).await?;
    println!("{}", serde_json::to_string_pretty(&state.to_json())?);
    Ok(())
}

async fn run_destroy(provider: &dyn Provider, file: &Path, auto_approve: bool) -> Result<()> {
    let mut document = Document::load(file)?;
    if document.data {
        bail!("{} is a data source and cannot be destroyed", document.address());
    }
    let id = document.require_id()?.to_string();
    println!("{} {} will be destroyed", "-".red().bold(), document.address());
    println!("  {}", id);
    println!();

    if !auto_approve {
        println!(
            "{}",
            "Do you really want to destroy this resource?".yellow().bold()
        );
        println!(
            "  {}",
            "This action cannot be undone. Type 'yes' to confirm.".yellow()
        );
        print!("\n  Enter a value: ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !confirmed(&input) {
            println!();
            println!("{}", "Destroy cancelled.".yellow());
            return Ok(());
        }
        println!();
    }

    println!("{}", "Destroying...".red().bold());
    provider.delete(&document.address(), &id).await?;
    document.id = None;
    document.save(file)?;
    println!(
        "{}",
        format!("✓ {} destroyed.", document.address()).green().bold()
    );
    Ok(())
}

fn confirmed(input: &str) -> bool {
    input.trim() == "yes"
}

fn run_parse_id(id: &str) -> Result<()> {
    let parsed: ArmResourceId = id.parse()?;
    println!("{}", serde_json::to_string_pretty(&describe_id(&parsed))?);
    Ok(())
}

fn describe_id(id: &ArmResourceId) -> serde_json::Value {
    let path: serde_json::Map<String, serde_json::Value> = id
        .path
        .iter()
        .map(|(kind, name)| (kind.clone(), serde_json::Value::String(name.clone())))
        .collect();
    serde_json::json!({
        "subscription_id": id.subscription_id,
        "resource_group": id.resource_group,
        "provider": id.provider,
        "resource_type": id.resource_type(),
        "name": id.name(),
        "path": path,
    })
}

fn run_schema(provider: &dyn Provider, resource_type: Option<&str>) -> Result<()> {
    let Some(resource_type) = resource_type else {
        let mut types: Vec<(String, &str)> = provider
            .schemas()
            .into_iter()
            .map(|s| (s.resource_type, "resource"))
            .chain(
                provider
                    .data_source_schemas()
                    .into_iter()
                    .map(|s| (s.resource_type, "data source")),
            )
            .collect();
        types.sort();
        for (name, kind) in types {
            println!("{} {}", name.bold(), format!("({})", kind).dimmed());
        }
        return Ok(());
    };

    let schema = schema_for(provider, resource_type)?;
    print!("{}", format_schema(&schema));
    Ok(())
}

fn format_schema(schema: &ResourceSchema) -> String {
    let mut out = format!("{}\n", schema.resource_type);
    if let Some(description) = &schema.description {
        out.push_str(&format!("  {}\n", description));
    }
    let mut attributes: Vec<_> = schema.attributes.values().collect();
    attributes.sort_by(|a, b| a.name.cmp(&b.name));
    for attr in attributes {
        let mut flags = Vec::new();
        if attr.required {
            flags.push("required");
        } else if attr.read_only {
            flags.push("read-only");
        } else {
            flags.push("optional");
        }
        if attr.computed && !attr.read_only {
            flags.push("computed");
        }
        if attr.force_new {
            flags.push("forces new");
        }
        if attr.sensitive {
            flags.push("sensitive");
        }
        out.push_str(&format!("  {}: {} [{}]", attr.name, attr.attr_type, flags.join(", ")));
        if let Some(default) = &attr.default {
            out.push_str(&format!(" = {}", default.to_json()));
        }
        out.push('\n');
    }
    out
}
