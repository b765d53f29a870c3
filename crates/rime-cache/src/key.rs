//! Cache keys.

use rime_proto::{Name, Question, RecordClass, RecordType};
use std::hash::{Hash, Hasher};

/// The content address of cached data: `(name, type, class)`.
///
/// The name is lowercased on construction so lookups are case-insensitive
/// regardless of what a server echoed back.
#[derive(Debug, Clone, Eq)]
pub struct CacheKey {
    name: Name,
    rtype: RecordType,
    rclass: RecordClass,
}

impl CacheKey {
    /// Creates a key.
    pub fn new(name: &Name, rtype: RecordType, rclass: RecordClass) -> Self {
        Self {
            name: name.lowercased(),
            rtype,
            rclass,
        }
    }

    /// The key for a question.
    pub fn of_question(question: &Question) -> Self {
        Self::new(&question.qname, question.qtype, question.qclass)
    }

    /// The keyed name (lowercased).
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// The keyed record type.
    pub fn rtype(&self) -> RecordType {
        self.rtype
    }

    /// The keyed class.
    pub fn rclass(&self) -> RecordClass {
        self.rclass
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.rtype == other.rtype && self.rclass == other.rclass
    }
}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.rtype.to_u16().hash(state);
        self.rclass.to_u16().hash(state);
    }
}
