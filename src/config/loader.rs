use crate::config::schema::ExporterConfig;
use crate::error::{Error, Result};
use config::{Config, Environment, File, FileFormat};
use std::path::Path;
use validator::Validate;

/// Prefix of environment variables that override file settings,
/// e.g. `PHP_FPM_EXPORTER_FASTCGI_ENDPOINT`.
pub const ENV_PREFIX: &str = "PHP_FPM_EXPORTER";

/// Command-line values; they win over the file and the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub listen_addr: Option<String>,
    pub namespace: Option<String>,
    pub http_endpoint: Option<String>,
    pub fastcgi_endpoint: Option<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<ExporterConfig> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(Self::file_format(path)?));
        }

        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let fields = [
            ("listen_addr", &overrides.listen_addr),
            ("namespace", &overrides.namespace),
            ("http_endpoint", &overrides.http_endpoint),
            ("fastcgi_endpoint", &overrides.fastcgi_endpoint),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                builder = builder.set_override(key, value.clone())?;
            }
        }

        let config: ExporterConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        // Resolve once so a malformed URL fails at startup rather than on the first scrape.
        config.endpoint()?;

        Ok(config)
    }

    fn file_format(path: &Path) -> Result<FileFormat> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(FileFormat::Json),
            Some("yaml") | Some("yml") => Ok(FileFormat::Yaml),
            Some("toml") => Ok(FileFormat::Toml),
            _ => Err(Error::Config(format!(
                "Unsupported file extension: {}",
                path.display()
            ))),
        }
    }
}
