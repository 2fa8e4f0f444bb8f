mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Admission, Catalog, Config, Engine, Events, Output, OutputKind, Pipeline, Service, Sources,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	parse(&raw).map_err(|err| match err {
		Error::ParseConfig { source, .. } =>
			Error::ParseConfig { path: path.to_path_buf(), source },
		other => other,
	})
}

pub fn parse(raw: &str) -> Result<Config> {
	let mut cfg: Config = toml::from_str(raw)
		.map_err(|err| Error::ParseConfig { path: Default::default(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.catalog.location.trim().is_empty() {
		return Err(Error::Validation {
			message: "catalog.location must be non-empty.".to_string(),
		});
	}
	if cfg.catalog.pattern.trim().is_empty() && !cfg.catalog.is_listing() {
		return Err(Error::Validation {
			message: "catalog.pattern must be non-empty when catalog.extensions is empty."
				.to_string(),
		});
	}
	if !cfg.catalog.is_listing() && cfg.catalog.num_partitions == 0 {
		return Err(Error::Validation {
			message: "catalog.num_partitions must be greater than zero when catalog.extensions is empty."
				.to_string(),
		});
	}
	if cfg.catalog.extensions.iter().any(|ext| ext.trim().is_empty()) {
		return Err(Error::Validation {
			message: "catalog.extensions must not contain empty entries.".to_string(),
		});
	}
	if cfg.pipeline.num_workers == 0 {
		return Err(Error::Validation {
			message: "pipeline.num_workers must be greater than zero.".to_string(),
		});
	}
	if cfg.pipeline.batch_interval_ms == 0 {
		return Err(Error::Validation {
			message: "pipeline.batch_interval_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.pipeline.max_batch_requests == 0 {
		return Err(Error::Validation {
			message: "pipeline.max_batch_requests must be greater than zero.".to_string(),
		});
	}
	if cfg.admission.max_backlog == 0 {
		return Err(Error::Validation {
			message: "admission.max_backlog must be greater than zero.".to_string(),
		});
	}
	if cfg.sources.is_empty() {
		return Err(Error::Validation {
			message: "At least one of sources.socket_bind, sources.request_list, or sources.request_dir must be set."
				.to_string(),
		});
	}
	if cfg.engine.api_base.trim().is_empty() {
		return Err(Error::Validation {
			message: "engine.api_base must be non-empty.".to_string(),
		});
	}
	if cfg.engine.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "engine.timeout_ms must be greater than zero.".to_string(),
		});
	}

	for (key, value) in &cfg.engine.default_headers {
		if !value.is_string() {
			return Err(Error::Validation {
				message: format!("engine.default_headers.{key} must be a string."),
			});
		}
	}

	if cfg.output.location.trim().is_empty() {
		return Err(Error::Validation {
			message: "output.location must be non-empty.".to_string(),
		});
	}
	if cfg.output.key_prefix.starts_with('/') {
		return Err(Error::Validation {
			message: "output.key_prefix must be relative.".to_string(),
		});
	}

	if let Some(addr) = cfg.events.forward_addr.as_deref()
		&& !addr.contains(':')
	{
		return Err(Error::Validation {
			message: "events.forward_addr must be in host:port form.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.sources.socket_bind.as_deref().map(|bind| bind.trim().is_empty()).unwrap_or(false) {
		cfg.sources.socket_bind = None;
	}
	if cfg.engine.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.engine.api_key = None;
	}
	if cfg.output.auth_token.as_deref().map(|token| token.trim().is_empty()).unwrap_or(false) {
		cfg.output.auth_token = None;
	}
	if cfg.catalog.auth_token.as_deref().map(|token| token.trim().is_empty()).unwrap_or(false) {
		cfg.catalog.auth_token = None;
	}
	if cfg
		.events
		.forward_addr
		.as_deref()
		.map(|addr| addr.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.events.forward_addr = None;
	}

	cfg.engine.api_base = cfg.engine.api_base.trim_end_matches('/').to_string();
	cfg.output.api_base = cfg.output.api_base.trim_end_matches('/').to_string();
	cfg.catalog.api_base = cfg.catalog.api_base.trim_end_matches('/').to_string();

	if !cfg.output.key_prefix.is_empty() && !cfg.output.key_prefix.ends_with('/') {
		cfg.output.key_prefix.push('/');
	}
}
