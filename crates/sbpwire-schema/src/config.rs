/// Controls message registry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// When true, registering an existing message type replaces it (last write wins).
    /// When false, it fails with `SchemaError::AlreadyRegistered`.
    pub allow_replace: bool,
    /// Maximum number of descriptors loaded from a directory.
    pub max_descriptors_from_directory: usize,
    /// Maximum bytes allowed per descriptor file loaded from a directory.
    pub max_descriptor_file_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            allow_replace: true,
            max_descriptors_from_directory: 256,
            max_descriptor_file_size: 64 * 1024,
        }
    }
}
