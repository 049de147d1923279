//! Command hashing utilities.
//!
//! This module provides the [`CommandHasher`] type used to compute a stable
//! SHA-256 digest for [`CommandNode`] declarations. The digest is the command
//! identity used by [`crate::dedup`]: two declarations that differ only in
//! their name hash identically.
//!
//! # Examples
//!
//! ```
//! use bffgen::graph::CommandNode;
//! use bffgen::hasher::CommandHasher;
//!
//! let a = CommandNode::new("a", vec!["touch out".into()]).with_outputs(vec!["out".into()]);
//! let b = CommandNode::new("b", vec!["touch out".into()]).with_outputs(vec!["out".into()]);
//! assert_eq!(CommandHasher::hash(&a), CommandHasher::hash(&b));
//! ```

use sha2::{Digest, Sha256};

use crate::graph::{CommandNode, ConfigOverride};

/// Computes stable digests for [`CommandNode`] declarations.
pub struct CommandHasher;

impl CommandHasher {
    /// Calculate the hash of a command declaration, ignoring its name.
    #[must_use]
    pub fn hash(command: &CommandNode) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"cmd");
        Self::hash_list(&mut hasher, command.command_lines());
        hasher.update(b"wd");
        Self::hash_optional_string(&mut hasher, command.working_directory());
        hasher.update(b"in");
        Self::hash_list(&mut hasher, command.raw_inputs());
        hasher.update(b"out");
        Self::hash_list(&mut hasher, command.file_outputs());
        hasher.update(b"byp");
        Self::hash_list(&mut hasher, command.byproducts());
        hasher.update(b"sym");
        Self::hash_list(&mut hasher, command.symbolic_outputs());
        hasher.update(b"dep");
        Self::hash_list(&mut hasher, command.depends());
        Self::hash_overrides(&mut hasher, command);
        format!("{:x}", hasher.finalize())
    }

    fn hash_overrides(hasher: &mut Sha256, command: &CommandNode) {
        let mut overrides: Vec<(&String, &ConfigOverride)> = command.overrides().iter().collect();
        overrides.sort_by(|(a, _), (b, _)| a.cmp(b));
        hasher.update(b"cfg");
        hasher.update(format!("{}#", overrides.len()).as_bytes());
        for (configuration, o) in overrides {
            Self::update_with_len(hasher, configuration.as_bytes());
            match &o.command_lines {
                Some(lines) => {
                    hasher.update(b"1");
                    Self::hash_list(hasher, lines);
                }
                None => hasher.update(b"0"),
            }
            Self::hash_optional_string(hasher, o.working_directory.as_deref());
        }
    }

    fn hash_list(hasher: &mut Sha256, items: &[String]) {
        hasher.update(format!("{}#", items.len()).as_bytes());
        for item in items {
            Self::update_with_len(hasher, item.as_bytes());
        }
    }

    fn hash_optional_string(hasher: &mut Sha256, value: Option<&str>) {
        match value {
            Some(v) => {
                hasher.update(b"1");
                Self::update_with_len(hasher, v.as_bytes());
            }
            None => hasher.update(b"0"),
        }
    }

    fn update_with_len(hasher: &mut Sha256, bytes: &[u8]) {
        let len = bytes.len();
        hasher.update(format!("{len}:").as_bytes());
        hasher.update(bytes);
    }
}
