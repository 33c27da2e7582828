use crate::model::PrefixMapping;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

const DEFAULT_DESCRIBE_DEPTH: usize = 8;

/// Literal handling for one conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    /// Require literal datatypes to match the declared property type, and
    /// write datatypes on output.
    pub strict_typing: bool,
    /// Drop literals whose language tag differs from the property's.
    pub language_aware: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            strict_typing: true,
            language_aware: false,
        }
    }
}

/// Process-wide conversion toggles. Read at the start of every conversion;
/// changes apply to conversions started afterwards.
pub struct GlobalOptions {
    strict_typing: AtomicBool,
    language_aware: AtomicBool,
}

pub static GLOBAL_OPTIONS: GlobalOptions = GlobalOptions::new();

impl GlobalOptions {
    const fn new() -> Self {
        Self {
            strict_typing: AtomicBool::new(true),
            language_aware: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> ConversionOptions {
        ConversionOptions {
            strict_typing: self.strict_typing.load(Ordering::Acquire),
            language_aware: self.language_aware.load(Ordering::Acquire),
        }
    }

    pub fn set_strict_typing(&self, on: bool) {
        self.strict_typing.store(on, Ordering::Release);
    }

    pub fn set_language_aware(&self, on: bool) {
        self.language_aware.store(on, Ordering::Release);
    }

    pub fn apply(&self, options: ConversionOptions) {
        self.set_strict_typing(options.strict_typing);
        self.set_language_aware(options.language_aware);
    }

    /// Back to strict typing without language filtering.
    pub fn reset(&self) {
        self.apply(ConversionOptions::default());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapperConfig {
    pub options: ConversionOptions,
    /// Extra `prefix -> namespace` entries for compact IRIs.
    pub prefixes: IndexMap<String, String>,
    /// How many reference hops `find` follows when describing an entity.
    pub describe_depth: usize,
    /// Namespace for generated keys of types that do not name one.
    pub default_namespace: Option<String>,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            options: ConversionOptions::default(),
            prefixes: IndexMap::new(),
            describe_depth: DEFAULT_DESCRIBE_DEPTH,
            default_namespace: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartialConfig {
    strict_typing: Option<bool>,
    language_aware: Option<bool>,
    prefixes: Option<IndexMap<String, String>>,
    describe_depth: Option<usize>,
    default_namespace: Option<String>,
}

impl MapperConfig {
    /// File values (when a path is given) overridden by `RDFBIND_*`
    /// environment variables, over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file_config = match path {
            Some(path) => load_config_file(path)?,
            None => PartialConfig::default(),
        };
        let env_config = env_config()?;

        let PartialConfig {
            strict_typing,
            language_aware,
            prefixes,
            describe_depth,
            default_namespace,
        } = file_config;

        let defaults = ConversionOptions::default();
        let config = Self {
            options: ConversionOptions {
                strict_typing: env_config
                    .strict_typing
                    .or(strict_typing)
                    .unwrap_or(defaults.strict_typing),
                language_aware: env_config
                    .language_aware
                    .or(language_aware)
                    .unwrap_or(defaults.language_aware),
            },
            prefixes: prefixes.unwrap_or_default(),
            describe_depth: env_config
                .describe_depth
                .or(describe_depth)
                .unwrap_or(DEFAULT_DESCRIBE_DEPTH),
            default_namespace: env_config.default_namespace.or(default_namespace),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Self::load(Some(path))
    }

    pub fn validate(&self) -> Result<()> {
        for (prefix, namespace) in &self.prefixes {
            anyhow::ensure!(!prefix.is_empty(), "prefix for {namespace:?} must not be empty");
            anyhow::ensure!(
                !prefix.contains(':'),
                "prefix {prefix:?} must not contain ':'"
            );
            oxigraph::model::NamedNode::new(namespace.as_str())
                .with_context(|| format!("namespace for prefix {prefix:?} is not an IRI"))?;
        }
        if let Some(ns) = &self.default_namespace {
            oxigraph::model::NamedNode::new(ns.as_str())
                .with_context(|| format!("default namespace {ns:?} is not an IRI"))?;
        }
        Ok(())
    }

    /// Installs the options and prefixes process-wide.
    pub fn apply(&self) {
        GLOBAL_OPTIONS.apply(self.options);
        for (prefix, namespace) in &self.prefixes {
            PrefixMapping::register_global(prefix.as_str(), namespace.as_str());
        }
        tracing::info!(
            strict_typing = self.options.strict_typing,
            language_aware = self.options.language_aware,
            prefixes = self.prefixes.len(),
            "mapper configuration applied"
        );
    }
}

fn env_config() -> Result<PartialConfig> {
    Ok(PartialConfig {
        strict_typing: env_flag("RDFBIND_STRICT_TYPING")?,
        language_aware: env_flag("RDFBIND_LANGUAGE_AWARE")?,
        prefixes: None,
        describe_depth: match env::var("RDFBIND_DESCRIBE_DEPTH") {
            Ok(raw) => Some(
                raw.trim()
                    .parse()
                    .with_context(|| format!("RDFBIND_DESCRIBE_DEPTH={raw:?} is not a number"))?,
            ),
            Err(_) => None,
        },
        default_namespace: env::var("RDFBIND_NAMESPACE").ok(),
    })
}

fn env_flag(name: &str) -> Result<Option<bool>> {
    let Ok(raw) = env::var(name) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        other => anyhow::bail!("{name}={other:?} is not a boolean"),
    }
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        "toml" => toml::from_str(&contents)
            .with_context(|| format!("failed to parse TOML config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn write_config(ext: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(&format!(".{ext}"))
            .tempfile()
            .expect("tempfile");
        file.write_all(body.as_bytes()).expect("write");
        file
    }

    #[test]
    fn defaults_are_strict_and_language_blind() {
        let options = ConversionOptions::default();
        assert!(options.strict_typing);
        assert!(!options.language_aware);
    }

    #[test]
    #[serial]
    fn yaml_file_is_loaded() {
        let file = write_config(
            "yaml",
            "strict_typing: false\nprefixes:\n  ex: \"http://example.org/\"\ndescribe_depth: 2\n",
        );
        let config = MapperConfig::from_file(file.path()).expect("load");
        assert!(!config.options.strict_typing);
        assert_eq!(config.prefixes.get("ex").map(String::as_str), Some("http://example.org/"));
        assert_eq!(config.describe_depth, 2);
    }

    #[test]
    #[serial]
    fn toml_and_json_files_are_loaded() {
        let file = write_config("toml", "language_aware = true\n");
        assert!(MapperConfig::from_file(file.path()).expect("toml").options.language_aware);

        let file = write_config("json", r#"{"default_namespace": "urn:ids:"}"#);
        let config = MapperConfig::from_file(file.path()).expect("json");
        assert_eq!(config.default_namespace.as_deref(), Some("urn:ids:"));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = write_config("ini", "x=1");
        assert!(MapperConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn relative_namespaces_fail_validation() {
        let mut config = MapperConfig::default();
        config.prefixes.insert("ex".into(), "not an iri".into());
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn environment_overrides_file() {
        let file = write_config("yaml", "strict_typing: true\n");
        // SAFETY: serialized with every other test that touches the environment.
        unsafe { env::set_var("RDFBIND_STRICT_TYPING", "off") };
        let config = MapperConfig::from_file(file.path());
        unsafe { env::remove_var("RDFBIND_STRICT_TYPING") };
        assert!(!config.expect("load").options.strict_typing);
    }

    #[test]
    #[serial]
    fn global_options_round_trip() {
        GLOBAL_OPTIONS.set_strict_typing(false);
        GLOBAL_OPTIONS.set_language_aware(true);
        assert_eq!(
            GLOBAL_OPTIONS.snapshot(),
            ConversionOptions {
                strict_typing: false,
                language_aware: true
            }
        );
        GLOBAL_OPTIONS.reset();
        assert_eq!(GLOBAL_OPTIONS.snapshot(), ConversionOptions::default());
    }
}
