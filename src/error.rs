use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for the plan engine.
///
/// Only contract violations end up here. A step that fails while running is
/// recorded on the `ExecutionResult`, never raised; callers match on these
/// variants to tell a broken plan or gateway apart from a bad configuration.
#[derive(Debug, Error)]
pub enum EngineError {
    // ── Plan structure ──────────────────────────────────────────────────
    #[error("plan: {0}")]
    Plan(#[from] PlanError),

    // ── Gateways ────────────────────────────────────────────────────────
    #[error("gateway: {0}")]
    Gateway(#[from] GatewayError),

    // ── Config ──────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Plan errors ─────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("plan {plan_id} has no steps")]
    Empty { plan_id: String },

    #[error("plan step id cannot be empty")]
    EmptyStepId,

    #[error("duplicate plan step id: {0}")]
    DuplicateStep(String),

    #[error("step {step} depends on unknown step {dependency}")]
    UnknownDependency { step: String, dependency: String },

    #[error("step {0} depends on itself")]
    SelfDependency(String),
}

// ─── Gateway errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("argument resolver failed for step {step}: {message}")]
    Resolver { step: String, message: String },
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, EngineError>;
