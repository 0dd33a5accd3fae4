//! Structured file contents.
//!
//! A [`Codec`] turns whole-file bytes into a [`serde_json::Value`] and back.
//! Codecs are looked up by name in a [`CodecRegistry`]; the [`MimeTable`]
//! maps a file extension to a MIME type and a MIME type to a codec name.
//! [`CodecNormalizer`] ties the three together for files on a
//! [`FileSystem`](crate::FileSystem).

mod normalizer;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::vfs::{VfsError, VfsResult};

pub use normalizer::{CodecNormalizer, FileSystemNormalizer, VoidNormalizer};

/// Converts file bytes to values and back.
pub trait Codec: Send + Sync {
    /// Registry name, e.g. `"json"`.
    fn name(&self) -> &'static str;

    fn decode(&self, bytes: &[u8]) -> VfsResult<Value>;

    fn encode(&self, value: &Value) -> VfsResult<Vec<u8>>;
}

/// JSON via `serde_json`. Encodes pretty-printed.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn decode(&self, bytes: &[u8]) -> VfsResult<Value> {
        serde_json::from_slice(bytes).map_err(|e| VfsError::codec(format!("json: {e}")))
    }

    fn encode(&self, value: &Value) -> VfsResult<Vec<u8>> {
        serde_json::to_vec_pretty(value).map_err(|e| VfsError::codec(format!("json: {e}")))
    }
}

/// TOML via `toml`. Only tables can be encoded at the top level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlCodec;

impl Codec for TomlCodec {
    fn name(&self) -> &'static str {
        "toml"
    }

    fn decode(&self, bytes: &[u8]) -> VfsResult<Value> {
        let text = utf8(bytes, "toml")?;
        toml::from_str(text).map_err(|e| VfsError::codec(format!("toml: {e}")))
    }

    fn encode(&self, value: &Value) -> VfsResult<Vec<u8>> {
        toml::to_string(value)
            .map(String::into_bytes)
            .map_err(|e| VfsError::codec(format!("toml: {e}")))
    }
}

/// RON via `ron`. Encodes pretty-printed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RonCodec;

impl Codec for RonCodec {
    fn name(&self) -> &'static str {
        "ron"
    }

    fn decode(&self, bytes: &[u8]) -> VfsResult<Value> {
        let text = utf8(bytes, "ron")?;
        ron::from_str(text).map_err(|e| VfsError::codec(format!("ron: {e}")))
    }

    fn encode(&self, value: &Value) -> VfsResult<Vec<u8>> {
        ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())
            .map(String::into_bytes)
            .map_err(|e| VfsError::codec(format!("ron: {e}")))
    }
}

fn utf8<'a>(bytes: &'a [u8], codec: &str) -> VfsResult<&'a str> {
    std::str::from_utf8(bytes).map_err(|e| VfsError::codec(format!("{codec}: {e}")))
}

/// Codecs by name.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn Codec>>,
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("codecs", &self.names())
            .finish()
    }
}

impl CodecRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the json, toml and ron codecs.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(JsonCodec);
        registry.register(TomlCodec);
        registry.register(RonCodec);
        registry
    }

    /// Add a codec under its own name, replacing any previous one.
    pub fn register(&mut self, codec: impl Codec + 'static) {
        self.codecs.insert(codec.name().to_string(), Arc::new(codec));
    }

    pub fn get(&self, name: &str) -> VfsResult<Arc<dyn Codec>> {
        self.codecs
            .get(name)
            .cloned()
            .ok_or_else(|| VfsError::codec(format!("no codec named {name}")))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.codecs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Extension → MIME type → codec name.
///
/// Extensions are matched case-insensitively, without the leading dot.
#[derive(Debug, Clone, Default)]
pub struct MimeTable {
    extensions: HashMap<String, String>,
    codecs: HashMap<String, String>,
}

impl MimeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mappings for the codecs in [`CodecRegistry::with_defaults`].
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        table.insert_extension("json", "application/json");
        table.insert_extension("toml", "application/toml");
        table.insert_extension("ron", "application/ron");
        table.insert_codec("application/json", "json");
        table.insert_codec("application/toml", "toml");
        table.insert_codec("application/ron", "ron");
        table
    }

    pub fn insert_extension(&mut self, extension: &str, mime: impl Into<String>) {
        self.extensions
            .insert(extension.to_ascii_lowercase(), mime.into());
    }

    pub fn insert_codec(&mut self, mime: impl Into<String>, codec: impl Into<String>) {
        self.codecs.insert(mime.into(), codec.into());
    }

    pub fn mime_for(&self, extension: &str) -> Option<&str> {
        self.extensions
            .get(&extension.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn codec_for_mime(&self, mime: &str) -> Option<&str> {
        self.codecs.get(mime).map(String::as_str)
    }

    /// Codec name for a file extension, through its MIME type.
    pub fn codec_for_extension(&self, extension: &str) -> VfsResult<&str> {
        let mime = self
            .mime_for(extension)
            .ok_or_else(|| VfsError::codec(format!("no MIME type for .{extension}")))?;
        self.codec_for_mime(mime)
            .ok_or_else(|| VfsError::codec(format!("no codec for {mime}")))
    }
}
