//! # Error Type Catalog
//!
//! The closed set of error types a record can carry, with the static
//! tables that map each type to its category and default severity, and
//! each lifecycle source tag to a type.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Coarse grouping derived from the error type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Source could not be parsed
    Syntax,
    /// Build, bundling or module graph failure
    Build,
    /// Failure while code or tooling is running
    Runtime,
    /// Dev server, proxy or socket failure
    Network,
    /// Stylesheet, image or static asset failure
    Asset,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Syntax => "syntax",
            Category::Build => "build",
            Category::Runtime => "runtime",
            Category::Network => "network",
            Category::Asset => "asset",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How bad an error is, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the catalog table
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub error_type: ErrorType,
    pub name: &'static str,
    pub category: Category,
    pub severity: Severity,
}

macro_rules! error_catalog {
    ($( $variant:ident => $name:literal, $category:ident, $severity:ident; )+) => {
        /// Every error type a record can carry
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ErrorType {
            $( $variant, )+
        }

        // Indexed by `ErrorType as usize`; order must follow the enum.
        static CATALOG: &[CatalogEntry] = &[
            $(
                CatalogEntry {
                    error_type: ErrorType::$variant,
                    name: $name,
                    category: Category::$category,
                    severity: Severity::$severity,
                },
            )+
        ];
    };
}

error_catalog! {
    // build / compile
    SyntaxError => "vite-syntax-error", Syntax, High;
    ParseError => "vite-parse-error", Syntax, High;
    CompileError => "vite-compile-error", Syntax, High;
    TypescriptError => "vite-typescript-error", Syntax, High;
    JsxError => "vite-jsx-error", Syntax, High;
    JsonError => "vite-json-error", Syntax, Medium;
    BuildError => "vite-build-error", Build, Critical;
    BuildStartError => "vite-build-start-error", Build, High;
    TransformError => "vite-transform-error", Build, High;
    EsbuildError => "vite-esbuild-error", Build, High;
    RollupError => "vite-rollup-error", Build, High;
    BundleError => "vite-bundle-error", Build, Critical;
    ChunkError => "vite-chunk-error", Build, Medium;
    WriteBundleError => "vite-write-bundle-error", Build, High;
    CloseBundleError => "vite-close-bundle-error", Build, Medium;
    MinifyError => "vite-minify-error", Build, Medium;
    SourcemapError => "vite-sourcemap-error", Build, Low;
    OptimizeDepsError => "vite-optimize-deps-error", Build, Medium;
    PrebundleError => "vite-prebundle-error", Build, Medium;
    ConfigError => "vite-config-error", Build, Critical;
    ConfigResolvedError => "vite-config-resolved-error", Build, High;
    WorkerError => "vite-worker-error", Build, Medium;
    WasmError => "vite-wasm-error", Build, Medium;
    // module / import
    ModuleNotFound => "vite-module-not-found", Build, High;
    ResolveError => "vite-resolve-error", Build, High;
    LoadError => "vite-load-error", Build, High;
    ImportError => "vite-import-error", Build, High;
    DynamicImportError => "vite-dynamic-import-error", Runtime, Medium;
    ExportError => "vite-export-error", Build, Medium;
    CircularDependency => "vite-circular-dependency", Build, Low;
    AliasError => "vite-alias-error", Build, Medium;
    GlobImportError => "vite-glob-import-error", Build, Medium;
    DependencyError => "vite-dependency-error", Build, High;
    ModuleGraphError => "vite-module-graph-error", Build, Medium;
    // asset / style
    CssError => "vite-css-error", Asset, Medium;
    PostcssError => "vite-postcss-error", Asset, Medium;
    SassError => "vite-sass-error", Asset, Medium;
    LessError => "vite-less-error", Asset, Medium;
    StylusError => "vite-stylus-error", Asset, Medium;
    CssModulesError => "vite-css-modules-error", Asset, Medium;
    AssetError => "vite-asset-error", Asset, Medium;
    ImageError => "vite-image-error", Asset, Low;
    FontError => "vite-font-error", Asset, Low;
    SvgError => "vite-svg-error", Asset, Low;
    HtmlError => "vite-html-error", Asset, Medium;
    PublicDirError => "vite-public-dir-error", Asset, Low;
    // server / network
    ServerError => "vite-server-error", Network, High;
    PreviewServerError => "vite-preview-error", Network, Medium;
    MiddlewareError => "vite-middleware-error", Network, High;
    ProxyError => "vite-proxy-error", Network, Medium;
    WebsocketError => "vite-websocket-error", Network, Medium;
    PortError => "vite-port-error", Network, High;
    HttpsError => "vite-https-error", Network, High;
    CorsError => "vite-cors-error", Network, Low;
    HmrError => "vite-hmr-error", Runtime, Medium;
    WatcherError => "vite-watcher-error", Runtime, Medium;
    FileSystemError => "vite-file-system-error", Runtime, High;
    // plugin / framework
    PluginError => "vite-plugin-error", Build, High;
    PluginTimeout => "vite-plugin-timeout", Build, Medium;
    VueError => "vite-vue-error", Syntax, High;
    SvelteError => "vite-svelte-error", Syntax, High;
    ReactError => "vite-react-error", Runtime, High;
    SsrError => "vite-ssr-error", Runtime, High;
    SsrLoadError => "vite-ssr-load-error", Runtime, High;
    RuntimeError => "vite-runtime-error", Runtime, High;
    UnhandledRejection => "vite-unhandled-rejection", Runtime, High;
    UncaughtException => "vite-uncaught-exception", Runtime, Critical;
    // fallback
    Unknown => "unknown-error", Runtime, Medium;
}

/// Lifecycle source tags emitted by the integration layer
static SOURCE_TAGS: &[(&str, ErrorType)] = &[
    ("syntax-hook", ErrorType::SyntaxError),
    ("parse", ErrorType::ParseError),
    ("compile", ErrorType::CompileError),
    ("typescript", ErrorType::TypescriptError),
    ("jsx", ErrorType::JsxError),
    ("json", ErrorType::JsonError),
    ("build-error", ErrorType::BuildError),
    ("buildEnd", ErrorType::BuildError),
    ("buildStart", ErrorType::BuildStartError),
    ("transform", ErrorType::TransformError),
    ("esbuild", ErrorType::EsbuildError),
    ("rollup", ErrorType::RollupError),
    ("generateBundle", ErrorType::BundleError),
    ("renderChunk", ErrorType::ChunkError),
    ("writeBundle", ErrorType::WriteBundleError),
    ("closeBundle", ErrorType::CloseBundleError),
    ("minify", ErrorType::MinifyError),
    ("sourcemap", ErrorType::SourcemapError),
    ("optimizeDeps", ErrorType::OptimizeDepsError),
    ("prebundle", ErrorType::PrebundleError),
    ("config", ErrorType::ConfigError),
    ("configResolved", ErrorType::ConfigResolvedError),
    ("worker", ErrorType::WorkerError),
    ("wasm", ErrorType::WasmError),
    ("resolveId", ErrorType::ModuleNotFound),
    ("resolve", ErrorType::ResolveError),
    ("load", ErrorType::LoadError),
    ("import", ErrorType::ImportError),
    ("dynamicImport", ErrorType::DynamicImportError),
    ("export", ErrorType::ExportError),
    ("circular", ErrorType::CircularDependency),
    ("alias", ErrorType::AliasError),
    ("globImport", ErrorType::GlobImportError),
    ("dependency", ErrorType::DependencyError),
    ("moduleGraph", ErrorType::ModuleGraphError),
    ("css", ErrorType::CssError),
    ("postcss", ErrorType::PostcssError),
    ("sass", ErrorType::SassError),
    ("scss", ErrorType::SassError),
    ("less", ErrorType::LessError),
    ("stylus", ErrorType::StylusError),
    ("cssModules", ErrorType::CssModulesError),
    ("asset", ErrorType::AssetError),
    ("image", ErrorType::ImageError),
    ("font", ErrorType::FontError),
    ("svg", ErrorType::SvgError),
    ("transformIndexHtml", ErrorType::HtmlError),
    ("publicDir", ErrorType::PublicDirError),
    ("configureServer", ErrorType::ServerError),
    ("configurePreviewServer", ErrorType::PreviewServerError),
    ("middleware", ErrorType::MiddlewareError),
    ("proxy", ErrorType::ProxyError),
    ("websocket", ErrorType::WebsocketError),
    ("listen", ErrorType::PortError),
    ("https", ErrorType::HttpsError),
    ("cors", ErrorType::CorsError),
    ("hmr", ErrorType::HmrError),
    ("handleHotUpdate", ErrorType::HmrError),
    ("watcher", ErrorType::WatcherError),
    ("fs", ErrorType::FileSystemError),
    ("plugin", ErrorType::PluginError),
    ("pluginTimeout", ErrorType::PluginTimeout),
    ("vue", ErrorType::VueError),
    ("svelte", ErrorType::SvelteError),
    ("react", ErrorType::ReactError),
    ("ssr", ErrorType::SsrError),
    ("ssrLoadModule", ErrorType::SsrLoadError),
    ("runtime", ErrorType::RuntimeError),
    ("unhandledRejection", ErrorType::UnhandledRejection),
    ("uncaughtException", ErrorType::UncaughtException),
];

static BY_NAME: Lazy<HashMap<&'static str, ErrorType>> =
    Lazy::new(|| CATALOG.iter().map(|entry| (entry.name, entry.error_type)).collect());

static BY_SOURCE: Lazy<HashMap<&'static str, ErrorType>> =
    Lazy::new(|| SOURCE_TAGS.iter().copied().collect());

impl ErrorType {
    fn entry(&self) -> &'static CatalogEntry {
        &CATALOG[*self as usize]
    }

    /// Wire name, e.g. `vite-syntax-error`
    pub fn as_str(&self) -> &'static str {
        self.entry().name
    }

    /// Category assigned by the catalog
    pub fn category(&self) -> Category {
        self.entry().category
    }

    /// Severity a freshly classified record starts with
    pub fn default_severity(&self) -> Severity {
        self.entry().severity
    }

    /// Looks up the type for a lifecycle source tag.
    ///
    /// Tags that are themselves catalog names resolve to that type; anything
    /// else falls back to [`ErrorType::Unknown`].
    pub fn from_source(source: &str) -> Self {
        let source = source.trim();
        BY_SOURCE
            .get(source)
            .or_else(|| BY_NAME.get(source))
            .copied()
            .unwrap_or(ErrorType::Unknown)
    }

    /// Every catalog member, in table order
    pub fn all() -> impl Iterator<Item = ErrorType> {
        CATALOG.iter().map(|entry| entry.error_type)
    }

    /// The full catalog table
    pub fn catalog() -> &'static [CatalogEntry] {
        CATALOG
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no catalog member
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown error type '{0}'")]
pub struct UnknownErrorType(pub String);

impl FromStr for ErrorType {
    type Err = UnknownErrorType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BY_NAME
            .get(s.trim())
            .copied()
            .ok_or_else(|| UnknownErrorType(s.to_string()))
    }
}

impl Serialize for ErrorType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_is_indexed_by_discriminant() {
        for (index, entry) in CATALOG.iter().enumerate() {
            assert_eq!(entry.error_type as usize, index, "{} is out of order", entry.name);
        }
    }

    #[test]
    fn test_catalog_size_and_unique_names() {
        assert!(CATALOG.len() >= 50);
        let names: HashSet<_> = CATALOG.iter().map(|e| e.name).collect();
        assert_eq!(names.len(), CATALOG.len());
    }

    #[test]
    fn test_every_family_is_present() {
        let categories: HashSet<_> = ErrorType::all().map(|t| t.category()).collect();
        for category in [
            Category::Syntax,
            Category::Build,
            Category::Runtime,
            Category::Network,
            Category::Asset,
        ] {
            assert!(categories.contains(&category), "missing {}", category);
        }
    }

    #[test]
    fn test_source_lookup() {
        assert_eq!(ErrorType::from_source("syntax-hook"), ErrorType::SyntaxError);
        assert_eq!(ErrorType::from_source("resolveId"), ErrorType::ModuleNotFound);
        assert_eq!(ErrorType::from_source("vite-css-error"), ErrorType::CssError);
        assert_eq!(ErrorType::from_source("no-such-hook"), ErrorType::Unknown);
        assert_eq!(ErrorType::from_source(""), ErrorType::Unknown);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(ErrorType::SyntaxError.category(), Category::Syntax);
        assert_eq!(ErrorType::SyntaxError.default_severity(), Severity::High);
        assert_eq!(ErrorType::BuildError.default_severity(), Severity::Critical);
        assert_eq!(ErrorType::HmrError.default_severity(), Severity::Medium);
        assert_eq!(ErrorType::Unknown.as_str(), "unknown-error");
    }

    #[test]
    fn test_name_round_trip_through_serde() {
        let json = serde_json::to_string(&ErrorType::PostcssError).unwrap();
        assert_eq!(json, "\"vite-postcss-error\"");
        let parsed: ErrorType = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ErrorType::PostcssError);
        assert!(serde_json::from_str::<ErrorType>("\"vite-nope\"").is_err());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::High < Severity::Critical);
    }
}
