use anyhow::Result;
use clap::ArgMatches;
use clap::parser::ValueSource;
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "./wiki.toml";

/// Complete configuration that merges CLI args, env vars, config files, and defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WikiConfig {
    pub render: RenderConfig,
    /// Renderer configuration (from wiki-core)
    #[serde(flatten)]
    pub core: wiki_core::config::Config,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenderConfig {
    /// Directory with Markdown input
    pub source: String,
    /// Directory for HTML output
    pub dest: String,
    /// Configuration file path
    pub config: String,
    /// Remove the output directory before rendering
    pub clean: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            source: "pages".to_string(),
            dest: "public".to_string(),
            config: DEFAULT_CONFIG_FILE.to_string(),
            clean: false,
        }
    }
}

impl WikiConfig {
    /// Load configuration with cascading precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables (WIKI_*)
    /// 3. Configuration file
    /// 4. Defaults (lowest priority)
    pub fn load(args: &ArgMatches) -> Result<Self> {
        let config_file = args
            .try_get_one::<String>("config")
            .ok()
            .flatten()
            .cloned()
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        let mut builder = ConfigBuilder::builder();

        // 1. Start with defaults
        let defaults = Self::default();
        builder = builder.add_source(ConfigBuilder::try_from(&defaults)?);

        // 2. Add configuration file if it exists
        if Path::new(&config_file).exists() {
            builder = builder.add_source(File::from(Path::new(&config_file)));
        }

        // 3. Add environment variables with WIKI_ prefix
        builder = builder.add_source(
            Environment::with_prefix("WIKI")
                .prefix_separator("_")
                .separator("__"), // Use double underscore for nested keys
        );

        // 4. Override with arguments the user actually typed
        builder = builder.set_override("render.config", config_file.as_str())?;
        if let Some(source) = explicit::<String>(args, "source") {
            builder = builder.set_override("render.source", source.as_str())?;
        }
        if let Some(dest) = explicit::<String>(args, "dest") {
            builder = builder.set_override("render.dest", dest.as_str())?;
        }
        if let Some(true) = explicit::<bool>(args, "clean") {
            builder = builder.set_override("render.clean", true)?;
        }

        let config = builder.build()?;
        let wiki_config: WikiConfig = config.try_deserialize()?;

        Ok(wiki_config)
    }

    pub fn render_config(&self) -> &RenderConfig {
        &self.render
    }
}

// Only values from the command line, so clap defaults don't mask the config file.
fn explicit<T: Clone + Send + Sync + 'static>(args: &ArgMatches, id: &str) -> Option<T> {
    match args.value_source(id) {
        Some(ValueSource::CommandLine) => args.try_get_one::<T>(id).ok().flatten().cloned(),
        _ => None,
    }
}
