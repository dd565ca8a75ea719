use clap::Parser;
use dvcman::config::{DEFAULT_CAPACITY, DEFAULT_PLUGIN_DIR};
use dvcman::DvcManConfig;

#[derive(Clone, Debug)]
pub struct Config {
    pub log_file: Option<String>,
    pub manager: DvcManConfig,
    /// Plugins to load, in order
    pub plugins: Vec<String>,
    pub strict: bool,
}

/// Devolutions DVC plugin manager
#[derive(Parser, Debug)]
#[clap(author = "Devolutions", about = "Loads DVC plugins and reports their listeners")]
#[clap(version, long_about = None)]
struct Args {
    /// Plugins to load, by name (looked up in the plugin directory) or by path
    #[clap(value_parser, required = true)]
    plugins: Vec<String>,

    /// Directory searched for plugins given by name
    #[clap(long, value_parser, default_value_t = String::from(DEFAULT_PLUGIN_DIR))]
    plugin_dir: String,

    /// Maximum number of plugins
    #[clap(long, value_parser, default_value_t = DEFAULT_CAPACITY)]
    max_plugins: usize,

    /// Maximum number of listeners
    #[clap(long, value_parser, default_value_t = DEFAULT_CAPACITY)]
    max_listeners: usize,

    /// A file with logs (stderr when absent)
    #[clap(short, long, value_parser)]
    log_file: Option<String>,

    /// Abort on the first plugin that fails to load instead of skipping it
    #[clap(long)]
    strict: bool,
}

impl Config {
    pub fn parse_args() -> anyhow::Result<Self> {
        Self::from_args(Args::parse())
    }

    pub fn parse_from<I, T>(args: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::from_args(Args::try_parse_from(args)?)
    }

    fn from_args(args: Args) -> anyhow::Result<Self> {
        if args.max_plugins == 0 || args.max_listeners == 0 {
            anyhow::bail!("registry capacities must be greater than zero");
        }

        let manager = DvcManConfig {
            max_plugins: args.max_plugins,
            max_listeners: args.max_listeners,
            plugin_dir: args.plugin_dir.into(),
        };

        Ok(Self {
            log_file: args.log_file,
            manager,
            plugins: args.plugins,
            strict: args.strict,
        })
    }
}
