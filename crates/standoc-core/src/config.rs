/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Run configuration loaded from `_standoc.yml`.
 */

//! Run configuration.
//!
//! Configuration comes from a `_standoc.yml` (or `_standoc.yaml`) file found
//! by walking up from the input document's directory. Every field has a
//! default, so an empty file and no file at all behave the same.
//!
//! ```yaml
//! bibliography:
//!   local-cache: refcache
//!   staleness-days: 30
//!   source-dir: records
//!   prefixes:
//!     BSI: BSI
//! terms:
//!   term-elements: [domain, subject]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use standoc_bib::{
    BibliographicSource, CacheScopes, CacheStore, DEFAULT_STALENESS_DAYS, DirectorySource,
    FileCacheStore, PrefixTable, Resolver, ResolverOptions, TieredCache,
};

use crate::error::{Result, StandocError};

/// File names searched for, in order, in each directory.
pub const CONFIG_FILE_NAMES: &[&str] = &["_standoc.yml", "_standoc.yaml"];

/// Directory name used for the local cache when none is configured.
pub const DEFAULT_LOCAL_CACHE: &str = "standoc-bib-cache";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StandocConfig {
    pub bibliography: BibliographyConfig,
    pub terms: TermsConfig,
    pub anchors: AnchorsConfig,
}

/// Bibliographic resolution and caching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BibliographyConfig {
    /// Render every citation from its own text, never fetching.
    pub no_fetch: bool,
    pub no_cache: bool,
    /// Name of a local cache directory, relative to the input document.
    pub local_cache: Option<String>,
    pub local_cache_only: bool,
    pub flush_caches: bool,
    /// Global cache directory. Defaults to `~/.standoc/bibliography`.
    pub global_cache: Option<PathBuf>,
    pub staleness_days: i64,
    pub fetch_timeout_secs: u64,
    /// Directory of `<code>.xml` records used as the bibliographic source.
    pub source_dir: Option<PathBuf>,
    /// Code prefix to source name, on top of the built-in table.
    pub prefixes: BTreeMap<String, String>,
}

impl Default for BibliographyConfig {
    fn default() -> Self {
        Self {
            no_fetch: false,
            no_cache: false,
            local_cache: None,
            local_cache_only: false,
            flush_caches: false,
            global_cache: None,
            staleness_days: DEFAULT_STALENESS_DAYS,
            fetch_timeout_secs: 30,
            source_dir: None,
            prefixes: BTreeMap::new(),
        }
    }
}

impl BibliographyConfig {
    pub fn cache_scopes(&self) -> CacheScopes {
        CacheScopes::from_options(
            self.no_cache,
            self.local_cache.is_some(),
            self.local_cache_only,
        )
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            prefixes: PrefixTable::default().with_overrides(self.prefixes.clone()),
            flush_caches: self.flush_caches,
        }
    }

    pub fn local_cache_dir(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(self.local_cache.as_deref().unwrap_or(DEFAULT_LOCAL_CACHE))
    }

    pub fn global_cache_dir(&self) -> Option<PathBuf> {
        self.global_cache.clone().or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".standoc").join("bibliography"))
        })
    }

    /// The cache scopes this configuration asks for, backed by directories.
    /// Relative paths are taken from `base_dir`.
    pub fn build_cache(&self, base_dir: &Path) -> TieredCache {
        let scopes = self.cache_scopes();
        let local = scopes.has_local().then(|| {
            Box::new(FileCacheStore::new(self.local_cache_dir(base_dir))) as Box<dyn CacheStore>
        });
        let global = if scopes.has_global() {
            match self.global_cache_dir() {
                Some(dir) => Some(Box::new(FileCacheStore::new(base_dir.join(dir))) as Box<dyn CacheStore>),
                None => {
                    tracing::warn!("no home directory; global bibliography cache disabled");
                    None
                }
            }
        } else {
            None
        };
        TieredCache::new(scopes, local, global).with_staleness_days(self.staleness_days)
    }

    /// Build the resolver for a document in `base_dir`.
    ///
    /// Without a source directory, or with `no-fetch`, the resolver is
    /// offline and every citation renders from its own text.
    pub fn build_resolver(&self, base_dir: &Path) -> Resolver {
        let source = match (&self.source_dir, self.no_fetch) {
            (Some(dir), false) => {
                Some(Arc::new(DirectorySource::new(base_dir.join(dir))) as Arc<dyn BibliographicSource>)
            }
            _ => None,
        };
        if source.is_none() {
            tracing::debug!("bibliographic resolution is offline");
            return Resolver::offline();
        }
        Resolver::new(source, self.build_cache(base_dir), self.resolver_options())
    }
}

/// Term metadata keys recognised in `dl metadata="true"` lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TermsConfig {
    /// Keys copied onto the designation as attributes.
    pub designation_attributes: Vec<String>,
    /// Keys inserted after `expression/name`, in this order.
    pub expression_elements: Vec<String>,
    /// Keys of the nested `grammar` list, in output order.
    pub grammar_elements: Vec<String>,
    /// Keys inserted once per term, after the first `preferred`.
    pub term_elements: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for TermsConfig {
    fn default() -> Self {
        Self {
            designation_attributes: strings(&[
                "absent",
                "geographicArea",
                "language",
                "script",
                "type",
                "isInternational",
            ]),
            expression_elements: strings(&["abbreviationType", "pronunciation"]),
            grammar_elements: strings(&[
                "gender",
                "isPreposition",
                "isParticiple",
                "isAdjective",
                "isAdverb",
                "isNoun",
                "grammarValue",
            ]),
            term_elements: strings(&["domain", "subject", "usageinfo", "label", "inherit"]),
        }
    }
}

/// Attributes holding references to ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AnchorsConfig {
    /// `element/@attribute` pairs, e.g. `review/@from`.
    pub idref_attributes: Vec<String>,
}

impl Default for AnchorsConfig {
    fn default() -> Self {
        Self {
            idref_attributes: strings(&[
                "review/@from",
                "review/@to",
                "callout/@target",
                "citation/@bibitemid",
                "eref/@bibitemid",
            ]),
        }
    }
}

impl AnchorsConfig {
    /// The configured pairs split into `(element, attribute)`. Entries
    /// without `/@` are skipped.
    pub fn idref_pairs(&self) -> Vec<(&str, &str)> {
        self.idref_attributes
            .iter()
            .filter_map(|entry| entry.split_once("/@"))
            .collect()
    }
}

impl StandocConfig {
    /// Parse configuration from YAML text. An empty document is the default
    /// configuration.
    pub fn from_yaml_str(content: &str, path: &Path) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| StandocError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content, path)
    }

    /// Search `start` and its parents for a configuration file.
    ///
    /// `start` may be a file, in which case the search begins in its
    /// directory. Returns the file found and its parsed contents.
    pub fn discover(start: impl AsRef<Path>) -> Result<Option<(PathBuf, Self)>> {
        let start = start.as_ref().canonicalize()?;
        let mut current = if start.is_file() {
            start
                .parent()
                .ok_or_else(|| StandocError::other("Input file has no parent directory"))?
                .to_path_buf()
        } else {
            start
        };

        loop {
            for name in CONFIG_FILE_NAMES {
                let candidate = current.join(name);
                if candidate.is_file() {
                    tracing::debug!(path = %candidate.display(), "found configuration");
                    let config = Self::load(&candidate)?;
                    return Ok(Some((candidate, config)));
                }
            }
            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = StandocConfig::default();
        assert_eq!(config.bibliography.staleness_days, 90);
        assert_eq!(config.bibliography.cache_scopes(), CacheScopes::GlobalOnly);
        assert_eq!(config.terms.expression_elements, vec!["abbreviationType", "pronunciation"]);
        assert_eq!(config.anchors.idref_pairs()[0], ("review", "from"));
    }

    #[test]
    fn test_parse_kebab_case() {
        let yaml = r#"
bibliography:
  no-cache: true
  staleness-days: 10
  prefixes:
    BSI: BSI
terms:
  term-elements: [domain]
"#;
        let config = StandocConfig::from_yaml_str(yaml, Path::new("_standoc.yml")).unwrap();
        assert!(config.bibliography.no_cache);
        assert_eq!(config.bibliography.staleness_days, 10);
        assert_eq!(config.bibliography.fetch_timeout_secs, 30);
        assert_eq!(config.bibliography.prefixes["BSI"], "BSI");
        assert_eq!(config.terms.term_elements, vec!["domain"]);
        assert_eq!(config.terms.grammar_elements.len(), 7);
        assert_eq!(config.bibliography.cache_scopes(), CacheScopes::None);
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = StandocConfig::from_yaml_str("\n", Path::new("_standoc.yml")).unwrap();
        assert_eq!(config, StandocConfig::default());
    }

    #[test]
    fn test_invalid_yaml_names_the_file() {
        let err = StandocConfig::from_yaml_str("bibliography: [", Path::new("/p/_standoc.yml"))
            .unwrap_err();
        assert!(err.to_string().contains("/p/_standoc.yml"));
    }

    #[test]
    fn test_discover_walks_up() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(
            temp.path().join("_standoc.yaml"),
            "bibliography:\n  local-cache-only: true\n",
        )
        .unwrap();
        let input = nested.join("doc.xml");
        fs::write(&input, "<doc/>").unwrap();

        let (path, config) = StandocConfig::discover(&input).unwrap().unwrap();
        assert!(path.ends_with("_standoc.yaml"));
        assert_eq!(config.bibliography.cache_scopes(), CacheScopes::LocalOnly);
    }

    #[test]
    fn test_local_cache_dir_is_relative_to_document() {
        let config = BibliographyConfig {
            local_cache: Some("refs".to_string()),
            ..BibliographyConfig::default()
        };
        assert_eq!(config.local_cache_dir(Path::new("/doc")), PathBuf::from("/doc/refs"));
        assert_eq!(config.cache_scopes(), CacheScopes::Both);
    }

    #[test]
    fn test_no_source_dir_is_offline() {
        let resolver = BibliographyConfig::default().build_resolver(Path::new("/doc"));
        assert!(resolver.is_offline());

        let config = BibliographyConfig {
            source_dir: Some(PathBuf::from("records")),
            no_fetch: true,
            ..BibliographyConfig::default()
        };
        assert!(config.build_resolver(Path::new("/doc")).is_offline());
    }
}
