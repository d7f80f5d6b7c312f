//! Identifier newtypes.
//!
//! Thin string wrappers rather than a shared `String` alias, so the
//! compiler rejects passing a `TaskId` where an `ActionId` is expected.

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn new<S: Into<String>>(value: S) -> Self {
                $name(value.into())
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(Namespace, "Namespace a workflow or rule-set lives in.");
id_type!(WorkflowName, "Name half of a workflow's `(namespace, name)` identity.");
id_type!(AgentId, "Identifier an agent presents to the dispatcher, usually a MAC address.");
id_type!(TaskId, "Identifier of a `Task` within a workflow.");
id_type!(ActionId, "Identifier of an `Action` within a task.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapper_equality_across_constructors() {
        let a = AgentId::from("machine-mac-1");
        let b = AgentId::from("machine-mac-1".to_string());
        let c = AgentId::new("machine-mac-1");
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.as_str(), "machine-mac-1");
        assert_eq!(a.to_string(), "machine-mac-1");
    }

    #[test]
    fn distinct_id_types_do_not_compare() {
        let task = TaskId::from("t-1");
        let action = ActionId::from("t-1");
        // Same underlying string, different types - this just documents that
        // the newtypes are nominal, not structural.
        assert_eq!(task.as_str(), action.as_str());
    }
}
