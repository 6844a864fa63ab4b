use thiserror::Error;

pub type EsgResult<T> = Result<T, EsgError>;

#[derive(Debug, Error)]
pub enum EsgError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    YieldCurve(#[from] YieldCurveError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Errors raised while flattening and cross-checking a configuration (C4),
/// or while deserialising one (C9) — before any simulation work begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("number_of_simulations ({simulations}) is not divisible by number_of_batches ({batches})")]
    BatchSizeNotDivisible { simulations: u32, batches: u32 },

    #[error("duplicate asset class id: '{0}'")]
    DuplicateAssetClass(String),

    #[error("duplicate output id: '{0}'")]
    DuplicateOutput(String),

    #[error("duplicate random driver id: '{0}'")]
    DuplicateDriver(String),

    #[error("correlation entry references unknown driver '{0}'")]
    UnknownCorrelationDriver(String),

    #[error("driver correlation matrix is not symmetric positive semi-definite")]
    CorrelationNotPositiveSemiDefinite,

    #[error("failed to parse configuration document")]
    Deserialize(#[from] serde_json::Error),

    #[error("missing required parameter '{parameter}' for {context}")]
    MissingParameter { parameter: String, context: String },
}

/// Errors raised while instantiating models and resolving the output graph (C5, C6).
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model '{0}' is not a recognised model id")]
    ModelNotSupported(String),

    #[error("output type '{0}' is not supported by model '{1}'")]
    OutputNotSupported(String, String),

    #[error("output '{output_type}' depends on asset class '{asset_class}', which does not exist")]
    DependencyMissing {
        output_type: String,
        asset_class: String,
    },

    #[error("malformed yield curve parameter key '{0}': expected 'yc_<term>'")]
    MalformedYieldCurveKey(String),
}

/// Errors raised by yield-curve queries (C1).
#[derive(Debug, Error)]
pub enum YieldCurveError {
    #[error("term {term} is outside the stored range [{min}, {max}]")]
    OutOfRange { term: f64, min: f64, max: f64 },

    #[error("term must be non-negative, got {0}")]
    NegativeTerm(f64),

    #[error("yield curve has no points")]
    Empty,
}

/// Errors raised by the binary artifact codec (C2).
#[derive(Debug, Error)]
pub enum IoError {
    #[error("IO operation failed")]
    Io(#[from] std::io::Error),

    #[error("file is not finalised: the 8-byte timestamp prefix is still zero")]
    NotFinalised,

    #[error("output id '{0}' is unknown")]
    UnknownOutputId(String),

    #[error("output index {index} is out of range (0..{count})")]
    OutputIndexOutOfRange { index: usize, count: usize },

    #[error("step {step} is out of range (0..{count})")]
    StepOutOfRange { step: usize, count: usize },

    #[error("simulation index {sim} is out of range (0..{count})")]
    SimulationIndexOutOfRange { sim: usize, count: usize },

    #[error("corrupt header: {0}")]
    CorruptHeader(String),
}

/// Errors raised by validators (C8) when locating outputs in a generated artifact.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("no output of asset class '{asset_class}' matches type '{output_type}' and parameters {parameters:?}")]
    OutputNotFound {
        asset_class: String,
        output_type: String,
        parameters: String,
    },

    #[error("validation analysis id '{0}' is not recognised")]
    AnalysisNotSupported(String),
}
