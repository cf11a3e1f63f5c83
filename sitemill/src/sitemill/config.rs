use std::env;
use std::fs;
use std::path::{self, Component, MAIN_SEPARATOR, Path, PathBuf};

use anyhow::{Context, Result};
use confik::{Configuration, EnvSource};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use self::yaml::YamlFileSource;

/// Site-wide values handed to every template as `config`.
///
/// The mapping is free-form; only `title` is read by the build itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteConfig(Map<String, Value>);

impl SiteConfig {
    pub fn new(values: Map<String, Value>) -> Self {
        Self(values)
    }

    pub fn title(&self) -> Option<&str> {
        self.0.get("title").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Load `config.yml` from `dir`. A missing file is an empty config.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join("config.yml");
        if !path.exists() {
            log::debug!("no site config at {}", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("reading site config at {}", path.display()))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing site config at {}", path.display()))
    }
}

impl From<Map<String, Value>> for SiteConfig {
    fn from(values: Map<String, Value>) -> Self {
        Self(values)
    }
}

/// Overrides read from `sitemill.yml` and the environment. Anything left
/// unset falls back to [`BuildOptions::default`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, Configuration)]
pub struct OptionOverrides {
    pub pages_dir: Option<String>,
    pub partials_dir: Option<String>,
    pub static_dir: Option<String>,
    pub out_dir: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub pages_dir: PathBuf,
    pub partials_dir: PathBuf,
    pub static_dir: PathBuf,
    pub out_dir: PathBuf,
    /// Base for the relative directories above; `None` means the process
    /// working directory.
    pub cwd: Option<PathBuf>,
    pub port: u16,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            pages_dir: "pages".into(),
            partials_dir: "partials".into(),
            static_dir: "static".into(),
            out_dir: "dist".into(),
            cwd: None,
            port: 8080,
        }
    }
}

impl BuildOptions {
    /// Options for a site rooted at `cwd`, layered from `sitemill.yml` (if
    /// present) and environment variables such as `PORT` or `OUT_DIR`.
    /// Falls back to the defaults when a layer fails to parse.
    pub fn load(cwd: &Path) -> Self {
        let config_path = cwd.join("sitemill.yml");
        let mut builder = OptionOverrides::builder();

        if config_path.exists() {
            builder.override_with(YamlFileSource::new(config_path));
        }

        builder.override_with(EnvSource::new());

        let overrides = match builder.try_build() {
            Ok(overrides) => overrides,
            Err(err) => {
                log::warn!("Failed to load sitemill.yml or env overrides: {err}. Using defaults.");
                OptionOverrides::default()
            }
        };

        Self::default().with_cwd(cwd).apply(overrides)
    }

    pub fn apply(mut self, overrides: OptionOverrides) -> Self {
        if let Some(dir) = overrides.pages_dir {
            self.pages_dir = dir.into();
        }
        if let Some(dir) = overrides.partials_dir {
            self.partials_dir = dir.into();
        }
        if let Some(dir) = overrides.static_dir {
            self.static_dir = dir.into();
        }
        if let Some(dir) = overrides.out_dir {
            self.out_dir = dir.into();
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_pages_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pages_dir = dir.into();
        self
    }

    pub fn with_partials_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.partials_dir = dir.into();
        self
    }

    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = dir.into();
        self
    }

    pub fn with_out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = dir.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// The directories of one build, resolved against the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub cwd: PathBuf,
    pub pages: PathBuf,
    pub partials: PathBuf,
    pub static_dir: PathBuf,
    pub out_dir: PathBuf,
}

impl ResolvedPaths {
    pub fn resolve(options: &BuildOptions) -> Result<Self> {
        let cwd = match &options.cwd {
            Some(cwd) => cwd.clone(),
            None => env::current_dir().context("reading the process working directory")?,
        };
        fs::metadata(&cwd).with_context(|| format!("opening working directory {}", cwd.display()))?;
        let cwd = normalize(
            &path::absolute(&cwd)
                .with_context(|| format!("resolving working directory {}", cwd.display()))?,
        );

        Ok(Self {
            pages: normalize(&cwd.join(&options.pages_dir)),
            partials: normalize(&cwd.join(&options.partials_dir)),
            static_dir: normalize(&cwd.join(&options.static_dir)),
            out_dir: normalize(&cwd.join(&options.out_dir)),
            cwd,
        })
    }

    /// Pages root as handed to templates, with a trailing separator.
    pub fn pages_prefix(&self) -> String {
        with_trailing_separator(&self.pages)
    }

    /// Partials root as handed to templates, with a trailing separator.
    pub fn partials_prefix(&self) -> String {
        with_trailing_separator(&self.partials)
    }
}

/// Drop `.` and fold `..` into its parent without touching the filesystem.
/// Meant for absolute paths: `..` at the root stays at the root.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

fn with_trailing_separator(path: &Path) -> String {
    let mut s = path.display().to_string();
    if !s.ends_with(MAIN_SEPARATOR) {
        s.push(MAIN_SEPARATOR);
    }
    s
}

mod yaml {
    use std::error::Error;
    use std::path::PathBuf;

    use anyhow::Context;
    use confik::{ConfigurationBuilder, Source};
    use serde::de::DeserializeOwned;

    /// `sitemill.yml` as a confik layer. An empty file sets nothing.
    #[derive(Debug)]
    pub struct YamlFileSource {
        path: PathBuf,
    }

    impl YamlFileSource {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }
    }

    impl<T> Source<T> for YamlFileSource
    where
        T: ConfigurationBuilder + DeserializeOwned + Default,
    {
        fn allows_secrets(&self) -> bool {
            false
        }

        fn provide(&self) -> Result<T, Box<dyn Error + Sync + Send>> {
            let contents = std::fs::read_to_string(&self.path)
                .with_context(|| format!("reading {}", self.path.display()))?;
            if contents.trim().is_empty() {
                return Ok(T::default());
            }
            let parsed = serde_yaml::from_str(&contents)
                .with_context(|| format!("parsing {}", self.path.display()))?;
            Ok(parsed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_documented_layout() {
        let options = BuildOptions::default();
        assert_eq!(options.pages_dir, PathBuf::from("pages"));
        assert_eq!(options.partials_dir, PathBuf::from("partials"));
        assert_eq!(options.static_dir, PathBuf::from("static"));
        assert_eq!(options.out_dir, PathBuf::from("dist"));
        assert_eq!(options.port, 8080);
        assert!(options.cwd.is_none());
    }

    #[test]
    fn overrides_only_replace_set_values() {
        let options = BuildOptions::default().apply(OptionOverrides {
            out_dir: Some("public".into()),
            port: Some(3000),
            ..Default::default()
        });
        assert_eq!(options.out_dir, PathBuf::from("public"));
        assert_eq!(options.port, 3000);
        assert_eq!(options.pages_dir, PathBuf::from("pages"));
    }

    #[test]
    fn resolve_joins_relative_and_keeps_absolute() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("elsewhere");
        let options = BuildOptions::default()
            .with_cwd(dir.path())
            .with_out_dir(&out);

        let paths = ResolvedPaths::resolve(&options).unwrap();
        assert_eq!(paths.pages, dir.path().join("pages"));
        assert_eq!(paths.out_dir, out);
        assert!(paths.pages_prefix().ends_with(MAIN_SEPARATOR));
        assert!(paths.partials_prefix().starts_with(&*dir.path().display().to_string()));
    }

    #[test]
    fn resolve_fails_for_missing_cwd() {
        let dir = TempDir::new().unwrap();
        let options = BuildOptions::default().with_cwd(dir.path().join("nope"));
        let err = ResolvedPaths::resolve(&options).unwrap_err();
        assert!(format!("{err:#}").contains("nope"));
    }

    #[test]
    fn relative_cwd_resolves_to_absolute_paths() {
        let options = BuildOptions::default()
            .with_cwd(".")
            .with_out_dir("../dist");

        let paths = ResolvedPaths::resolve(&options).unwrap();
        let here = env::current_dir().unwrap();
        assert_eq!(paths.cwd, normalize(&here));
        for path in [&paths.cwd, &paths.pages, &paths.partials, &paths.static_dir, &paths.out_dir] {
            assert!(path.is_absolute(), "{} should be absolute", path.display());
            assert!(
                path.components().all(|c| !matches!(c, Component::CurDir | Component::ParentDir)),
                "{} should be normalized",
                path.display()
            );
        }
        assert!(Path::new(&paths.pages_prefix()).is_absolute());
        assert_eq!(paths.out_dir, here.parent().unwrap().join("dist"));
    }

    #[test]
    fn parent_segments_fold_into_their_directory() {
        let dir = TempDir::new().unwrap();
        let options = BuildOptions::default()
            .with_cwd(dir.path())
            .with_out_dir("pages/..");

        let paths = ResolvedPaths::resolve(&options).unwrap();
        assert_eq!(paths.out_dir, paths.cwd);
        assert_eq!(normalize(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(normalize(Path::new("/..")), PathBuf::from("/"));
    }

    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    const OVERRIDE_VARS: [&str; 5] = ["PAGES_DIR", "PARTIALS_DIR", "STATIC_DIR", "OUT_DIR", "PORT"];

    /// Run `f` with the option variables cleared, then restore them.
    fn with_clean_env<R>(f: impl FnOnce() -> R) -> R {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let saved: Vec<_> = OVERRIDE_VARS.iter().map(|k| (*k, env::var_os(k))).collect();
        for key in OVERRIDE_VARS {
            unsafe { env::remove_var(key) };
        }
        let result = f();
        for (key, value) in saved {
            match value {
                Some(value) => unsafe { env::set_var(key, value) },
                None => unsafe { env::remove_var(key) },
            }
        }
        result
    }

    #[test]
    fn load_without_overrides_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let options = with_clean_env(|| BuildOptions::load(dir.path()));
        assert_eq!(options, BuildOptions::default().with_cwd(dir.path()));
    }

    #[test]
    fn load_reads_sitemill_yml() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("sitemill.yml"), "out_dir: public\nport: 4000\n").unwrap();

        let options = with_clean_env(|| BuildOptions::load(dir.path()));
        assert_eq!(options.out_dir, PathBuf::from("public"));
        assert_eq!(options.port, 4000);
        assert_eq!(options.pages_dir, PathBuf::from("pages"));
        assert_eq!(options.cwd.as_deref(), Some(dir.path()));
    }

    #[test]
    fn port_variable_beats_sitemill_yml() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("sitemill.yml"), "out_dir: public\nport: 4000\n").unwrap();

        let options = with_clean_env(|| {
            unsafe { env::set_var("PORT", "9123") };
            BuildOptions::load(dir.path())
        });
        assert_eq!(options.port, 9123);
        assert_eq!(options.out_dir, PathBuf::from("public"));
    }

    #[test]
    fn empty_sitemill_yml_sets_nothing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("sitemill.yml"), "\n").unwrap();

        let options = with_clean_env(|| BuildOptions::load(dir.path()));
        assert_eq!(options, BuildOptions::default().with_cwd(dir.path()));
    }

    #[test]
    fn malformed_sitemill_yml_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("sitemill.yml"), "out_dir: public\nport: not-a-port\n").unwrap();

        let options = with_clean_env(|| BuildOptions::load(dir.path()));
        assert_eq!(options, BuildOptions::default().with_cwd(dir.path()));
    }

    #[test]
    fn site_config_loads_yaml_mapping() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("config.yml"),
            "title: Test Site\nnav:\n  - home\n  - about\n",
        )
        .unwrap();

        let config = SiteConfig::load(dir.path()).unwrap();
        assert_eq!(config.title(), Some("Test Site"));
        assert_eq!(config.get("nav"), Some(&json!(["home", "about"])));
    }

    #[test]
    fn site_config_missing_or_empty_is_empty() {
        let dir = TempDir::new().unwrap();
        assert_eq!(SiteConfig::load(dir.path()).unwrap(), SiteConfig::default());

        fs::write(dir.path().join("config.yml"), "  \n").unwrap();
        assert_eq!(SiteConfig::load(dir.path()).unwrap(), SiteConfig::default());
    }

    #[test]
    fn site_config_rejects_malformed_yaml() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.yml"), "- just\n- a list\n").unwrap();
        assert!(SiteConfig::load(dir.path()).is_err());
    }

    #[test]
    fn non_string_title_is_ignored() {
        let config = SiteConfig::new(json!({ "title": 42 }).as_object().unwrap().clone());
        assert_eq!(config.title(), None);
    }
}
