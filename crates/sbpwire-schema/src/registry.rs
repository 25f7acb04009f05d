use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::catalog;
use crate::config::RegistryConfig;
use crate::descriptor::MessageDescriptor;
use crate::error::{Result, SchemaError};
use crate::payload;
use crate::value::Record;

/// Anything the frame decoder can resolve message types through.
pub trait DescriptorSource {
    /// Descriptor for `msg_type`, or `None` if the type is not registered.
    fn lookup(&self, msg_type: u16) -> Option<Arc<MessageDescriptor>>;
}

/// Message-type-keyed registry of payload descriptors.
///
/// Populate it during start-up, then share it behind an [`Arc`]: lookups take
/// `&self` and need no locking. Use [`SharedRegistry`] when types must be
/// registered while decoders are running.
#[derive(Debug, Clone)]
pub struct MessageRegistry {
    descriptors: HashMap<u16, Arc<MessageDescriptor>>,
    config: RegistryConfig,
}

impl MessageRegistry {
    /// Create an empty registry with default config.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry with explicit config.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            descriptors: HashMap::new(),
            config,
        }
    }

    /// Create a registry holding the built-in message catalog.
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        for desc in catalog::messages()? {
            registry.add(desc)?;
        }
        Ok(registry)
    }

    /// Register a descriptor under `msg_type`, re-keying it if its own id differs.
    ///
    /// Returns the replaced descriptor, if any.
    pub fn register(
        &mut self,
        msg_type: u16,
        descriptor: MessageDescriptor,
    ) -> Result<Option<Arc<MessageDescriptor>>> {
        if !self.config.allow_replace && self.descriptors.contains_key(&msg_type) {
            return Err(SchemaError::AlreadyRegistered(msg_type));
        }

        let descriptor = descriptor.with_id(msg_type);
        let name = descriptor.name().to_string();
        let previous = self.descriptors.insert(msg_type, Arc::new(descriptor));
        match &previous {
            Some(old) => tracing::debug!(
                msg_type,
                name = %name,
                replaced = old.name(),
                "replaced message descriptor"
            ),
            None => tracing::trace!(msg_type, name = %name, "registered message descriptor"),
        }
        Ok(previous)
    }

    /// Register a descriptor under its own id.
    pub fn add(&mut self, descriptor: MessageDescriptor) -> Result<Option<Arc<MessageDescriptor>>> {
        self.register(descriptor.id(), descriptor)
    }

    /// Register a descriptor from a JSON string.
    pub fn register_json(&mut self, json: &str) -> Result<u16> {
        let descriptor: MessageDescriptor = serde_json::from_str(json)?;
        let msg_type = descriptor.id();
        self.add(descriptor)?;
        Ok(msg_type)
    }

    /// Load from embedded descriptor JSON strings, on top of an empty registry.
    pub fn from_embedded(descriptors: &[&str]) -> Result<Self> {
        let mut registry = Self::new();
        for json in descriptors {
            registry.register_json(json)?;
        }
        Ok(registry)
    }

    /// Load `*.json` descriptor files from a directory.
    pub fn from_directory(path: &Path) -> Result<Self> {
        Self::from_directory_with_config(path, RegistryConfig::default())
    }

    /// Load `*.json` descriptor files from a directory with explicit config.
    pub fn from_directory_with_config(path: &Path, config: RegistryConfig) -> Result<Self> {
        let mut registry = Self::with_config(config);
        registry.load_directory(path)?;
        Ok(registry)
    }

    /// Add every `*.json` descriptor file in `path` to this registry.
    ///
    /// Files are loaded in name order so a later file overrides an earlier
    /// one for the same message type. Returns the number of files loaded.
    pub fn load_directory(&mut self, path: &Path) -> Result<usize> {
        let entries = std::fs::read_dir(path)
            .map_err(|err| SchemaError::LoadFailed(format!("{}: {err}", path.display())))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
            let entry_path = entry.path();
            let is_descriptor = entry_path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            let file_type = entry
                .file_type()
                .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
            if !is_descriptor || !file_type.is_file() {
                continue;
            }
            files.push(entry_path);
        }
        files.sort();

        if files.len() > self.config.max_descriptors_from_directory {
            return Err(SchemaError::LoadFailed(format!(
                "descriptor count exceeds configured max ({}): {}",
                self.config.max_descriptors_from_directory,
                files.len()
            )));
        }

        for file_path in &files {
            let content = self.read_descriptor_file(file_path)?;
            let msg_type = self.register_json(&content).map_err(|err| match err {
                SchemaError::InvalidJson(err) => {
                    SchemaError::LoadFailed(format!("{}: {err}", file_path.display()))
                }
                other => other,
            })?;
            tracing::debug!(msg_type, path = %file_path.display(), "loaded message descriptor");
        }

        Ok(files.len())
    }

    fn read_descriptor_file(&self, path: &Path) -> Result<String> {
        let max_bytes = self.config.max_descriptor_file_size;
        let file = std::fs::File::open(path).map_err(|err| {
            SchemaError::LoadFailed(format!("failed opening {}: {err}", path.display()))
        })?;

        let read_limit = u64::try_from(max_bytes.saturating_add(1)).unwrap_or(u64::MAX);
        let mut content = String::new();
        file.take(read_limit)
            .read_to_string(&mut content)
            .map_err(|err| {
                SchemaError::LoadFailed(format!("failed reading {}: {err}", path.display()))
            })?;
        if content.len() > max_bytes {
            return Err(SchemaError::LoadFailed(format!(
                "descriptor file too large: {}",
                path.display()
            )));
        }
        Ok(content)
    }

    /// Descriptor for `msg_type`.
    pub fn lookup(&self, msg_type: u16) -> Option<Arc<MessageDescriptor>> {
        self.descriptors.get(&msg_type).cloned()
    }

    /// Check if a message type has a registered descriptor.
    pub fn contains(&self, msg_type: u16) -> bool {
        self.descriptors.contains_key(&msg_type)
    }

    /// Registered message types, ascending.
    pub fn msg_types(&self) -> Vec<u16> {
        let mut types: Vec<u16> = self.descriptors.keys().copied().collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Decode a payload of the given message type.
    pub fn decode(&self, msg_type: u16, payload: &[u8]) -> Result<Record> {
        let desc = self
            .descriptors
            .get(&msg_type)
            .ok_or(SchemaError::UnknownMessage(msg_type))?;
        payload::decode(desc, payload)
    }

    /// Encode a record as a payload of the given message type.
    pub fn encode(&self, msg_type: u16, record: &Record) -> Result<Vec<u8>> {
        let desc = self
            .descriptors
            .get(&msg_type)
            .ok_or(SchemaError::UnknownMessage(msg_type))?;
        payload::encode(desc, record)
    }

    /// Get registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl Default for MessageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorSource for MessageRegistry {
    fn lookup(&self, msg_type: u16) -> Option<Arc<MessageDescriptor>> {
        MessageRegistry::lookup(self, msg_type)
    }
}

impl<T: DescriptorSource + ?Sized> DescriptorSource for &T {
    fn lookup(&self, msg_type: u16) -> Option<Arc<MessageDescriptor>> {
        (**self).lookup(msg_type)
    }
}

impl<T: DescriptorSource + ?Sized> DescriptorSource for Arc<T> {
    fn lookup(&self, msg_type: u16) -> Option<Arc<MessageDescriptor>> {
        (**self).lookup(msg_type)
    }
}

/// A registry that can be updated while it is being read.
///
/// Lookups take a shared read lock; registration takes the write lock.
/// Cloning is cheap and every clone sees the same registry.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<RwLock<MessageRegistry>>,
}

impl SharedRegistry {
    pub fn new(registry: MessageRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    /// Register a descriptor under `msg_type` (see [`MessageRegistry::register`]).
    pub fn register(
        &self,
        msg_type: u16,
        descriptor: MessageDescriptor,
    ) -> Result<Option<Arc<MessageDescriptor>>> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(msg_type, descriptor)
    }

    pub fn lookup(&self, msg_type: u16) -> Option<Arc<MessageDescriptor>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .lookup(msg_type)
    }

    /// Copy of the current registry contents.
    pub fn snapshot(&self) -> MessageRegistry {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DescriptorSource for SharedRegistry {
    fn lookup(&self, msg_type: u16) -> Option<Arc<MessageDescriptor>> {
        SharedRegistry::lookup(self, msg_type)
    }
}

/// Process-wide registry, seeded with the built-in catalog on first use.
pub fn global() -> &'static SharedRegistry {
    static GLOBAL: OnceLock<SharedRegistry> = OnceLock::new();
    GLOBAL.get_or_init(|| {
        let registry = MessageRegistry::builtin().unwrap_or_else(|err| {
            tracing::error!(error = %err, "built-in catalog failed to load");
            MessageRegistry::new()
        });
        SharedRegistry::new(registry)
    })
}
