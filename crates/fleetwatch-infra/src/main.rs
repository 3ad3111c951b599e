//! FleetWatch infrastructure command line.
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use fleetwatch_infra::{
    assets,
    config::{Config, ContextInputs, CONFIG_FILE},
    publish, stacks,
};
use synth::{Action, Plan};

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the verbosity level
    #[clap(short, global = true, action = clap::ArgAction::Count)]
    verbosity: u8,

    /// Overrides the branch derived stack name.
    #[clap(long, global = true, env = "FLEETWATCH_STACK_NAME")]
    stack_name: Option<String>,

    /// The AWS account to deploy to.
    #[clap(long, global = true, env = "FLEETWATCH_ACCOUNT")]
    account: Option<String>,

    /// The AWS region to deploy the app stack to.
    #[clap(long, global = true, env = "FLEETWATCH_REGION")]
    region: Option<String>,

    /// Project configuration file.
    #[clap(long, global = true, env = "FLEETWATCH_CONFIG", default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Where templates, the manifest and packaged assets are written.
    #[clap(long, global = true, env = "FLEETWATCH_OUT_DIR", default_value = "cdk.out")]
    out_dir: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Writes every stack's template, the manifest and the asset zips.
    Synth,
    /// Shows what deploying would change, compared to the last synth.
    Plan,
    /// Prints each stack's resource creation order.
    Schedule,
    /// Uploads the asset zips to the asset bucket.
    PublishAssets,
    /// Writes the web app's config, uploads it and invalidates the CDN.
    PublishSite,
}

fn print_plan(plan: &Plan) {
    println!("{}", format!("stack '{}'", plan.stack).bold());
    if !plan.has_changes() {
        println!("  {}", "no changes".dimmed());
        return;
    }
    for action in plan.actions.iter() {
        let label = match action.action {
            Action::Create => "+ create".green(),
            Action::Update => "~ update".yellow(),
            Action::Destroy => "- destroy".red(),
            Action::Unchanged => continue,
        };
        let orphan = if action.is_orphan { " (orphan)" } else { "" };
        println!("  {label} {} [{}]{orphan}", action.id, action.resource_type);
    }
    for (id, diff) in plan.changes.iter() {
        println!("{}\n{diff}", format!("  {id}:").yellow());
    }
    println!(
        "  {} to create, {} to update, {} to destroy",
        plan.count(Action::Create),
        plan.count(Action::Update),
        plan.count(Action::Destroy)
    );
}

async fn sdk_config(config: &Config) -> aws_config::SdkConfig {
    aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.region.clone()))
        .load()
        .await
}

#[::tokio::main]
async fn main() -> anyhow::Result<()> {
    let Cli {
        verbosity,
        stack_name,
        account,
        region,
        config,
        out_dir,
        command,
    } = Cli::parse();

    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::default()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("synth", level)
        .filter_module("fleetwatch_infra", level)
        .filter_module("infra", level)
        .init();

    let inputs = ContextInputs::from_environment(stack_name, account, region, &config)?;
    let config = Config::resolve(&inputs)?;
    let asset_dir = out_dir.join(assets::KEY_PREFIX);

    match command {
        Command::Synth => {
            let catalog = assets::catalog(&config)?;
            let app = stacks::app_with_assets(&config, &catalog)?;
            let manifest = app.synth(&out_dir).await?;
            let zips = catalog.package(&asset_dir)?;
            for stack in manifest.stacks.iter() {
                println!("{} {}", "synthesized".green(), out_dir.join(&stack.template_file).display());
            }
            println!("{} {} assets into {}", "packaged".green(), zips.len(), asset_dir.display());
        }
        Command::Plan => {
            let app = stacks::app(&config)?;
            for plan in app.plan(&out_dir)?.iter() {
                print_plan(plan);
            }
        }
        Command::Schedule => {
            let app = stacks::app(&config)?;
            for stack in app.deploy_order()? {
                println!("{}", format!("stack '{}'", stack.name()).bold());
                println!("{}", stack.get_schedule_string()?);
            }
        }
        Command::PublishAssets => {
            let catalog = assets::catalog(&config)?;
            catalog.package(&asset_dir)?;
            let sdk_config = sdk_config(&config).await;
            let client = aws_sdk_s3::Client::new(&sdk_config);
            let report = catalog
                .publish(&client, &asset_dir)
                .await
                .with_context(|| format!("publishing assets to '{}'", catalog.bucket()))?;
            println!(
                "{} {} assets, {} already published",
                "uploaded".green(),
                report.uploaded.len(),
                report.skipped.len()
            );
        }
        Command::PublishSite => {
            let sdk_config = sdk_config(&config).await;
            let report = publish::publish_site(&config, &sdk_config).await?;
            println!(
                "{} {} files to '{}'",
                "uploaded".green(),
                report.uploaded.len(),
                report.bucket
            );
            if let Some(id) = report.invalidation_id {
                println!("{} invalidation '{id}'", "created".green());
            }
        }
    }

    Ok(())
}
