/*!
 * Memory Configuration
 * Serde-backed description of which memory to build and how large
 */

use super::limits::{DEFAULT_GROWTH_STEP, DEFAULT_MAX_MEMORY_SIZE, DEFAULT_MEMORY_SIZE};
use super::types::Size;
use crate::memory::allocator::{DynamicMemoryAllocator, FileMemoryAllocator, FixedMemoryAllocator};
use crate::memory::types::{MemoryError, MemoryResult};
use crate::memory::Memory;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Backing kind of a memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Fixed,
    Dynamic,
    File,
}

impl FromStr for MemoryKind {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(MemoryKind::Fixed),
            "dynamic" => Ok(MemoryKind::Dynamic),
            "file" => Ok(MemoryKind::File),
            other => Err(MemoryError::Config(format!("unknown memory kind '{}'", other))),
        }
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            MemoryKind::Fixed => write!(f, "fixed"),
            MemoryKind::Dynamic => write!(f, "dynamic"),
            MemoryKind::File => write!(f, "file"),
        }
    }
}

/// Memory configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub kind: MemoryKind,
    pub size: Size,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<Size>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth_step: Option<Size>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self::fixed(DEFAULT_MEMORY_SIZE)
    }
}

impl MemoryConfig {
    /// Fixed in-memory buffer
    pub fn fixed(size: Size) -> Self {
        Self {
            kind: MemoryKind::Fixed,
            size,
            max_size: None,
            growth_step: None,
            path: None,
        }
    }

    /// Growable memory; `growth_step` of `None` grows by `size`
    pub fn dynamic(size: Size, max_size: Size, growth_step: Option<Size>) -> Self {
        Self {
            kind: MemoryKind::Dynamic,
            size,
            max_size: Some(max_size),
            growth_step,
            path: None,
        }
    }

    /// Memory mapped onto a file
    pub fn file(path: impl Into<PathBuf>, size: Size, max_size: Option<Size>) -> Self {
        Self {
            kind: MemoryKind::File,
            size,
            max_size,
            growth_step: None,
            path: Some(path.into()),
        }
    }

    /// Dynamic preset: 20KB growing by 5KB up to 40KB
    pub fn dynamic_default() -> Self {
        Self::dynamic(
            DEFAULT_MEMORY_SIZE,
            DEFAULT_MAX_MEMORY_SIZE,
            Some(DEFAULT_GROWTH_STEP),
        )
    }

    /// Parse a JSON document
    pub fn from_json(json: &str) -> MemoryResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| MemoryError::Config(format!("invalid memory config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the environment
    ///
    /// Environment variables:
    /// - VMEM_KIND: fixed, dynamic or file (default: fixed)
    /// - VMEM_SIZE: initial size in bytes (default: 20KB)
    /// - VMEM_MAX_SIZE: maximum size in bytes
    /// - VMEM_GROWTH_STEP: growth step in bytes
    /// - VMEM_PATH: backing file for the file kind
    pub fn from_env() -> MemoryResult<Self> {
        let mut config = Self::default();

        if let Some(kind) = env_var("VMEM_KIND") {
            config.kind = kind.parse()?;
        }
        if let Some(size) = env_var("VMEM_SIZE") {
            config.size = parse_size("VMEM_SIZE", &size)?;
        }
        if let Some(max) = env_var("VMEM_MAX_SIZE") {
            config.max_size = Some(parse_size("VMEM_MAX_SIZE", &max)?);
        }
        if let Some(step) = env_var("VMEM_GROWTH_STEP") {
            config.growth_step = Some(parse_size("VMEM_GROWTH_STEP", &step)?);
        }
        if let Some(path) = env_var("VMEM_PATH") {
            config.path = Some(PathBuf::from(path));
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is buildable
    pub fn validate(&self) -> MemoryResult<()> {
        if self.size == 0 {
            return Err(MemoryError::Config("size must be positive".into()));
        }
        if let Some(max) = self.max_size {
            if max < self.size {
                return Err(MemoryError::Config(format!(
                    "max_size {} is smaller than size {}",
                    max, self.size
                )));
            }
        }
        if self.growth_step == Some(0) {
            return Err(MemoryError::Config("growth_step must be positive".into()));
        }
        match self.kind {
            MemoryKind::Dynamic if self.max_size.is_none() => Err(MemoryError::Config(
                "dynamic memory requires max_size".into(),
            )),
            MemoryKind::File if self.path.is_none() => {
                Err(MemoryError::Config("file memory requires path".into()))
            }
            _ => Ok(()),
        }
    }

    /// Build the memory described by this configuration
    pub fn build(&self) -> MemoryResult<Memory> {
        self.validate()?;
        match self.kind {
            MemoryKind::Fixed => FixedMemoryAllocator::allocate(self.size),
            MemoryKind::Dynamic => DynamicMemoryAllocator::allocate(
                self.size,
                self.max_size.unwrap_or(self.size),
                self.growth_step,
            ),
            MemoryKind::File => match &self.path {
                Some(path) => FileMemoryAllocator::allocate(path, self.size, self.max_size),
                None => Err(MemoryError::Config("file memory requires path".into())),
            },
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_size(name: &str, value: &str) -> MemoryResult<Size> {
    value
        .trim()
        .parse::<Size>()
        .map_err(|e| MemoryError::Config(format!("{}: invalid size '{}': {}", name, value, e)))
}
