use anyhow::{Context, Result};
use datapipe::cli::commands::{OpsCommand, RunCommand, ValidateCommand};
use datapipe::cli::output::*;
use datapipe::cli::{Cli, Command};
use datapipe::core::config::PipelineConfig;
use datapipe::{Data, DataStore, OperationRegistry, PipelineRunner, RunEvent};
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd)?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::Ops(cmd) => list_operations(cmd)?,
    }

    Ok(())
}

fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let config =
        PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;

    println!("{} Loaded pipeline: {}", INFO, style(&config.name).bold());

    let pipeline = config.to_pipeline()?;

    let initial = match &cmd.input {
        Some(text) if cmd.input_json => {
            Data::parse_json(text).context("Failed to parse --input as JSON")?
        }
        Some(text) => Data::from(text.as_str()),
        None => Data::Null,
    };

    let store = build_store(cmd)?;
    let mut runner = PipelineRunner::new(OperationRegistry::with_builtins(), store);

    // Set up console reporting
    let progress = if cmd.no_progress || pipeline.is_empty() {
        None
    } else {
        Some(create_progress_bar(pipeline.len()))
    };
    let bar = progress.clone();
    runner.add_event_handler(move |event| {
        if let RunEvent::StepCompleted { .. } = event {
            if let Some(bar) = &bar {
                bar.inc(1);
            }
        }
        let line = format_run_event(event);
        match &bar {
            Some(bar) => bar.println(line),
            None => println!("{}", line),
        }
    });

    println!();
    let result = match &cmd.output {
        Some(path) => runner.run_to_file(&pipeline, initial, path),
        None => runner.run(&pipeline, initial),
    };
    if let Some(bar) = &progress {
        bar.finish_and_clear();
    }

    let output = match result {
        Ok(output) => output,
        Err(e) => {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&pipeline.name).bold(),
                style("failed").red()
            );
            error!("{}", e);
            std::process::exit(1);
        }
    };

    if let Some(state) = runner.last_run() {
        println!("\n{} {}", INFO, format_run_summary(state));
    }

    match &cmd.output {
        Some(path) => println!(
            "{} Output written to {}",
            INFO,
            style(path.display()).cyan()
        ),
        None => match output.to_json_pretty() {
            Ok(text) => println!("\n{}", format_output(&text, 20)),
            Err(_) => println!(
                "{} Final output is binary; persist it with output storage to inspect it",
                INFO
            ),
        },
    }

    println!(
        "\n{} {} completed {}",
        CHECK,
        style(&pipeline.name).bold(),
        style("successfully").green()
    );

    Ok(())
}

#[cfg(feature = "sqlite")]
fn build_store(cmd: &RunCommand) -> Result<DataStore> {
    use datapipe::storage::SqliteDatabase;

    let database = match &cmd.database {
        Some(path) => SqliteDatabase::open(path)?,
        None => SqliteDatabase::with_default_path()?,
    };
    Ok(DataStore::new(&cmd.data_dir).with_database(Box::new(database)))
}

#[cfg(not(feature = "sqlite"))]
fn build_store(cmd: &RunCommand) -> Result<DataStore> {
    Ok(DataStore::new(&cmd.data_dir))
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => {
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Steps: {}", style(config.steps.len()).cyan());
            if let Some(max) = config.max_iterations {
                println!("  Max iterations: {}", style(max).cyan());
            }

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    }
}

fn list_operations(cmd: &OpsCommand) -> Result<()> {
    let registry = OperationRegistry::with_builtins();
    let ops = registry.list();

    if cmd.json {
        let entries: Vec<_> = ops
            .iter()
            .map(|(module, function)| {
                serde_json::json!({ "module": module, "function": function })
            })
            .collect();
        let data = serde_json::json!({ "operations": entries });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    println!("{} Registered operations:", INFO);
    let mut current = "";
    for (module, function) in &ops {
        if module.as_str() != current {
            println!("  {}", style(module).bold());
            current = module.as_str();
        }
        println!("    {}", style(function).cyan());
    }

    Ok(())
}
