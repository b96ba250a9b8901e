//! SettingsIO CLI - Inspect and edit a settings folder
//!
//! Every command loads the folder, applies its change and saves again, so
//! the folder can be shared with a running application.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use settingsio_codec::{AnySerializer, SettingType};
use settingsio_common::{Config, SerializerFormat, SettingKey};
use settingsio_folder::FsFolder;
use settingsio_settings::{Settings, SettingsEvent};
use std::any::type_name;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "settingsio-cli")]
#[command(about = "SettingsIO settings folder CLI")]
#[command(version)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "settingsio.toml")]
    config: PathBuf,

    /// Settings directory (overrides config)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Value encoding (overrides config)
    #[arg(short, long)]
    format: Option<SerializerFormat>,

    /// Log level (overrides config)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every setting
    List,
    /// Show one setting
    Get {
        /// Setting key
        key: SettingKey,
    },
    /// Set a setting and save it
    Set {
        /// Setting key
        key: SettingKey,
        /// New value
        value: String,
        /// How to interpret the value
        #[arg(short, long, value_enum, default_value_t = ValueKind::String)]
        kind: ValueKind,
    },
    /// Remove a setting
    Reset {
        /// Setting key
        key: SettingKey,
    },
    /// Remove every setting
    ResetAll,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ValueKind {
    String,
    Int,
    Float,
    Bool,
    Json,
}

type CliSettings = Settings<AnySerializer>;

/// Store `raw` under `key` as the Rust type `kind` maps to
fn set_value(settings: &CliSettings, key: &str, raw: &str, kind: ValueKind) -> Result<()> {
    match kind {
        ValueKind::String => settings.set_setting(key, Some(raw.to_string()))?,
        ValueKind::Int => {
            let value: i64 = raw.parse().with_context(|| format!("not an integer: {raw}"))?;
            settings.set_setting(key, Some(value))?;
        }
        ValueKind::Float => {
            let value: f64 = raw.parse().with_context(|| format!("not a number: {raw}"))?;
            settings.set_setting(key, Some(value))?;
        }
        ValueKind::Bool => {
            let value: bool = raw.parse().with_context(|| format!("not a boolean: {raw}"))?;
            settings.set_setting(key, Some(value))?;
        }
        ValueKind::Json => {
            let value: serde_json::Value =
                serde_json::from_str(raw).with_context(|| format!("not valid JSON: {raw}"))?;
            settings.set_setting(key, Some(value))?;
        }
    }
    Ok(())
}

fn to_json<T: SettingType>(settings: &CliSettings, key: &str) -> Result<Option<serde_json::Value>> {
    let value = settings.get_setting::<T, _>(key, || None)?;
    value
        .map(|v| serde_json::to_value(v).context("value is not representable as JSON"))
        .transpose()
}

/// Render `key` as JSON by dispatching on its type tag
///
/// Only the registry's builtin types are known to the CLI.
fn render(settings: &CliSettings, key: &str) -> Result<serde_json::Value> {
    let Some(tag) = settings.type_of(key) else {
        bail!("setting {key} not found");
    };

    let tag = tag.as_ref();
    let value = if tag == type_name::<String>() {
        to_json::<String>(settings, key)?
    } else if tag == type_name::<bool>() {
        to_json::<bool>(settings, key)?
    } else if tag == type_name::<char>() {
        to_json::<char>(settings, key)?
    } else if tag == type_name::<i8>() {
        to_json::<i8>(settings, key)?
    } else if tag == type_name::<i16>() {
        to_json::<i16>(settings, key)?
    } else if tag == type_name::<i32>() {
        to_json::<i32>(settings, key)?
    } else if tag == type_name::<i64>() {
        to_json::<i64>(settings, key)?
    } else if tag == type_name::<u8>() {
        to_json::<u8>(settings, key)?
    } else if tag == type_name::<u16>() {
        to_json::<u16>(settings, key)?
    } else if tag == type_name::<u32>() {
        to_json::<u32>(settings, key)?
    } else if tag == type_name::<u64>() {
        to_json::<u64>(settings, key)?
    } else if tag == type_name::<f32>() {
        to_json::<f32>(settings, key)?
    } else if tag == type_name::<f64>() {
        to_json::<f64>(settings, key)?
    } else if tag == type_name::<Vec<String>>() {
        to_json::<Vec<String>>(settings, key)?
    } else if tag == type_name::<Vec<u8>>() {
        to_json::<Vec<u8>>(settings, key)?
    } else if tag == type_name::<serde_json::Value>() {
        to_json::<serde_json::Value>(settings, key)?
    } else {
        bail!("setting {key} has type {tag}, which the CLI cannot display");
    };
    value.with_context(|| format!("setting {key} not found"))
}

/// Print per-key failures reported since the last call
fn report_failures(rx: &mut broadcast::Receiver<SettingsEvent>) -> usize {
    let mut failures = 0;
    while let Ok(event) = rx.try_recv() {
        match event {
            SettingsEvent::LoadFailed { key, error } => {
                eprintln!("Warning: could not load {key}: {error}");
                failures += 1;
            }
            SettingsEvent::SaveFailed { key, error } => {
                eprintln!("Warning: could not save {key}: {error}");
                failures += 1;
            }
            SettingsEvent::Changed { name } => debug!("Changed: {name}"),
        }
    }
    failures
}

async fn run(settings: &CliSettings, command: Commands) -> Result<()> {
    match command {
        Commands::List => {
            let keys = settings.keys();
            if keys.is_empty() {
                println!("No settings found");
            }
            for key in keys {
                let tag = settings.type_of(&key).unwrap_or_else(|| "?".into());
                match render(settings, &key) {
                    Ok(value) => println!("{key} ({tag}) = {value}"),
                    Err(e) => println!("{key} ({tag}) = <{e}>"),
                }
            }
        }
        Commands::Get { key } => {
            let value = render(settings, key.as_str())?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Set { key, value, kind } => {
            set_value(settings, key.as_str(), &value, kind)?;
            settings.save().await?;
            println!("Set {key}");
        }
        Commands::Reset { key } => {
            if !settings.contains_key(key.as_str()) {
                bail!("setting {key} not found");
            }
            settings.reset_setting(key.as_str());
            settings.save().await?;
            println!("Reset {key}");
        }
        Commands::ResetAll => {
            let count = settings.len();
            settings.reset_all_settings();
            settings.save().await?;
            println!("Reset {count} settings");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load config file if it exists
    let mut config = Config::load_or_default(&args.config)
        .with_context(|| format!("failed to read config {}", args.config.display()))?;

    // Merge CLI args with config file (CLI takes precedence)
    if let Some(dir) = args.dir {
        config.storage.dir = dir;
    }
    if let Some(format) = args.format {
        config.storage.format = format;
    }
    let log_level = args.log_level.unwrap_or(config.logging.level);
    // Removals made here have to reach the folder
    config.settings.prune_removed_keys = true;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "Opening settings in {} ({:?})",
        config.storage.dir.display(),
        config.storage.format
    );
    let folder = FsFolder::open(&config.storage.dir)
        .await
        .with_context(|| format!("failed to open {}", config.storage.dir.display()))?;
    let settings = Settings::with_config(
        Arc::new(folder),
        AnySerializer::from_format(config.storage.format),
        config.settings,
    );

    let mut events = settings.subscribe();
    settings.load().await?;
    report_failures(&mut events);

    let result = run(&settings, args.command).await;
    report_failures(&mut events);
    settings.close().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use settingsio_codec::JsonSerializer;
    use settingsio_folder::MemoryFolder;

    fn memory_settings() -> CliSettings {
        Settings::new(
            Arc::new(MemoryFolder::new()),
            AnySerializer::Json(JsonSerializer::new()),
        )
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "settingsio-cli",
            "--dir",
            "/tmp/s",
            "--format",
            "bincode",
            "set",
            "volume",
            "11",
            "--kind",
            "int",
        ])
        .unwrap();
        assert_eq!(args.dir, Some(PathBuf::from("/tmp/s")));
        assert_eq!(args.format, Some(SerializerFormat::Bincode));
        assert!(matches!(
            args.command,
            Commands::Set { ref key, kind: ValueKind::Int, .. } if key.as_str() == "volume"
        ));

        assert!(Args::try_parse_from(["settingsio-cli", "--format", "yaml", "list"]).is_err());
        // Keys that would collide with a type file or escape the folder
        assert!(Args::try_parse_from(["settingsio-cli", "get", "volume.Type"]).is_err());
        assert!(Args::try_parse_from(["settingsio-cli", "reset", "a/b"]).is_err());
    }

    #[test]
    fn test_set_value_by_kind() {
        let settings = memory_settings();
        set_value(&settings, "name", "ada", ValueKind::String).unwrap();
        set_value(&settings, "count", "-3", ValueKind::Int).unwrap();
        set_value(&settings, "ratio", "0.5", ValueKind::Float).unwrap();
        set_value(&settings, "enabled", "true", ValueKind::Bool).unwrap();
        set_value(&settings, "layout", r#"{"cols": 2}"#, ValueKind::Json).unwrap();

        assert_eq!(render(&settings, "name").unwrap(), serde_json::json!("ada"));
        assert_eq!(render(&settings, "count").unwrap(), serde_json::json!(-3));
        assert_eq!(render(&settings, "ratio").unwrap(), serde_json::json!(0.5));
        assert_eq!(render(&settings, "enabled").unwrap(), serde_json::json!(true));
        assert_eq!(render(&settings, "layout").unwrap(), serde_json::json!({"cols": 2}));
    }

    #[test]
    fn test_render_builtin_types() {
        let settings = memory_settings();
        settings.set_setting("i8", Some(-8_i8)).unwrap();
        settings.set_setting("i16", Some(-16_i16)).unwrap();
        settings.set_setting("u8", Some(8_u8)).unwrap();
        settings.set_setting("u16", Some(16_u16)).unwrap();
        settings.set_setting("f32", Some(1.5_f32)).unwrap();
        settings.set_setting("char", Some('x')).unwrap();
        settings.set_setting("bytes", Some(vec![1_u8, 2, 3])).unwrap();

        assert_eq!(render(&settings, "i8").unwrap(), serde_json::json!(-8));
        assert_eq!(render(&settings, "i16").unwrap(), serde_json::json!(-16));
        assert_eq!(render(&settings, "u8").unwrap(), serde_json::json!(8));
        assert_eq!(render(&settings, "u16").unwrap(), serde_json::json!(16));
        assert_eq!(render(&settings, "f32").unwrap(), serde_json::json!(1.5));
        assert_eq!(render(&settings, "char").unwrap(), serde_json::json!("x"));
        assert_eq!(render(&settings, "bytes").unwrap(), serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn test_set_value_rejects_bad_input() {
        let settings = memory_settings();
        assert!(set_value(&settings, "count", "three", ValueKind::Int).is_err());
        assert!(set_value(&settings, "enabled", "yes", ValueKind::Bool).is_err());
        assert!(set_value(&settings, "layout", "{", ValueKind::Json).is_err());
        assert!(settings.is_empty());
    }

    #[test]
    fn test_render_missing_and_unknown() {
        #[derive(Clone, serde::Serialize, serde::Deserialize)]
        struct Opaque(u8);

        let settings = memory_settings();
        assert!(render(&settings, "missing").is_err());

        settings.set_setting("opaque", Some(Opaque(1))).unwrap();
        let err = render(&settings, "opaque").unwrap_err();
        assert!(err.to_string().contains("cannot display"));
    }

    #[tokio::test]
    async fn test_failures_are_counted() {
        let folder = MemoryFolder::new();
        folder.insert_file("orphan", "1");
        let settings = Settings::new(
            Arc::new(folder),
            AnySerializer::Json(JsonSerializer::new()),
        );

        let mut events = settings.subscribe();
        settings.load().await.unwrap();
        assert_eq!(report_failures(&mut events), 1);
        assert_eq!(report_failures(&mut events), 0);
    }
}
