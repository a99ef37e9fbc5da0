//! Retention Policy Engine: declarative `(data_type, tier)`-scoped
//! rules, violation detection, and delete/archive/demote enforcement.

mod engine;

pub use engine::{
    EnforcementReport, PolicyEnforcementTarget, RetentionPolicyEngine,
};
